//! Update decision engine
//!
//! For one dependency:
//! 1. skip when the checker reports it up to date
//! 2. search unlock levels least-disruptive first (`none`, or `own` then `all`)
//! 3. ask the checker for the post-update dependency set
//! 4. defer when a peer in that set can update on its own under `own`

use crate::domain::{Dependency, FileSnapshot, SkipReason, UnlockDecision, UnlockLevel};
use crate::ecosystem::{CheckerFactory, UpdateChecker};
use crate::error::CheckerError;
use std::collections::HashSet;
use tracing::{debug, info};

/// Result of deciding one dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Leave the dependency alone
    Skip(SkipReason),
    /// Update at `level`; `updated` starts with the target dependency
    Accept {
        level: UnlockLevel,
        updated: Vec<Dependency>,
    },
}

impl Decision {
    pub fn is_skip(&self) -> bool {
        matches!(self, Decision::Skip(_))
    }
}

/// Decides, per dependency, whether and how far to unlock requirements
pub struct DecisionEngine<'a> {
    factory: &'a dyn CheckerFactory,
    snapshot: &'a FileSnapshot,
    dependencies: &'a [Dependency],
    lockfile_only: bool,
}

impl<'a> DecisionEngine<'a> {
    /// Creates an engine over one snapshot and its parsed dependencies
    pub fn new(
        factory: &'a dyn CheckerFactory,
        snapshot: &'a FileSnapshot,
        dependencies: &'a [Dependency],
        lockfile_only: bool,
    ) -> Self {
        Self {
            factory,
            snapshot,
            dependencies,
            lockfile_only,
        }
    }

    fn checker(&self, dependency: &Dependency) -> Box<dyn UpdateChecker> {
        self.factory
            .checker(dependency, self.snapshot, self.dependencies)
    }

    /// Runs the full decision for `dependency`
    pub async fn decide(&self, dependency: &Dependency) -> Result<Decision, CheckerError> {
        let checker = self.checker(dependency);

        let latest = checker.latest_version().await?;
        let resolvable = checker.latest_resolvable_version().await?;
        debug!(
            dependency = %dependency.name,
            current = dependency.display_version(),
            latest = latest.as_deref().unwrap_or("none"),
            resolvable = resolvable.as_deref().unwrap_or("none"),
            "checked registry"
        );

        if checker.up_to_date().await? {
            info!(dependency = %dependency.name, "no update needed");
            return Ok(Decision::Skip(SkipReason::UpToDate));
        }

        let level = match self.unlock_decision(checker.as_ref()).await? {
            UnlockDecision::Unlock(level) => level,
            UnlockDecision::UpdateNotPossible => {
                info!(dependency = %dependency.name, "update not possible");
                return Ok(Decision::Skip(SkipReason::UpdateNotPossible));
            }
        };
        info!(dependency = %dependency.name, level = %level, "requirements to unlock");

        let updated = checker.updated_dependencies(level).await?;

        if let Some(peer) = self.peer_conflict(dependency, &updated).await? {
            info!(dependency = %dependency.name, peer = %peer, "deferring to peer update");
            return Ok(Decision::Skip(SkipReason::PeerConflict { peer }));
        }

        Ok(Decision::Accept { level, updated })
    }

    /// Probes unlock levels in increasing order and returns the first that works
    pub async fn unlock_decision(
        &self,
        checker: &dyn UpdateChecker,
    ) -> Result<UnlockDecision, CheckerError> {
        let levels: &[UnlockLevel] = if self.lockfile_only || !checker.requirements_unlocked_or_can_be() {
            &[UnlockLevel::None]
        } else {
            &UnlockLevel::RELAXABLE
        };

        for &level in levels {
            if checker.can_update(level).await? {
                return Ok(UnlockDecision::Unlock(level));
            }
        }
        Ok(UnlockDecision::UpdateNotPossible)
    }

    /// Returns the first peer that could update independently from its previous state
    ///
    /// Peers are probed once each; the target and repeated names are skipped.
    pub async fn peer_conflict(
        &self,
        target: &Dependency,
        updated: &[Dependency],
    ) -> Result<Option<String>, CheckerError> {
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(target.name.as_str());

        for peer in updated {
            if !visited.insert(peer.name.as_str()) {
                continue;
            }

            let original = peer.previous_state();
            let checker = self.checker(&original);
            let independent = checker.can_update(UnlockLevel::Own).await?;
            debug!(dependency = %target.name, peer = %peer.name, independent, "probed peer");

            if independent {
                return Ok(Some(peer.name.clone()));
            }
        }
        Ok(None)
    }
}
