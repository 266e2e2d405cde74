//! Per-dependency outcomes and the run summary

use super::UnlockLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason why a dependency was not updated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Already at the latest resolvable version
    UpToDate,
    /// No unlock level allows an update
    UpdateNotPossible,
    /// A peer in the update set will get its own update
    PeerConflict { peer: String },
    /// Listed in the exclusion set
    Excluded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UpToDate => write!(f, "no update needed"),
            SkipReason::UpdateNotPossible => write!(f, "update not possible"),
            SkipReason::PeerConflict { peer } => {
                write!(f, "peer dependency '{}' can update independently", peer)
            }
            SkipReason::Excluded => write!(f, "excluded by --exclusions"),
        }
    }
}

/// What happened on the git-hosting side for an accepted update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PullRequestStatus {
    /// A commit and a pull request were created
    Created { branch: String },
    /// Branch and open pull request already existed; nothing was written
    AlreadyOpen { branch: String },
    /// An existing pull request received a new commit
    Updated { number: u64, branch: String },
    /// The pull request to update does not exist
    NotFound { number: u64 },
    /// Dry run: nothing was sent to the provider
    NotSubmitted { branch: String },
}

impl PullRequestStatus {
    /// Returns true if a new pull request was opened
    pub fn is_created(&self) -> bool {
        matches!(self, PullRequestStatus::Created { .. })
    }
}

impl fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PullRequestStatus::Created { branch } => write!(f, "created on {}", branch),
            PullRequestStatus::AlreadyOpen { branch } => write!(f, "already open on {}", branch),
            PullRequestStatus::Updated { number, branch } => {
                write!(f, "updated #{} on {}", number, branch)
            }
            PullRequestStatus::NotFound { number } => write!(f, "pull request #{} not found", number),
            PullRequestStatus::NotSubmitted { branch } => write!(f, "would open {}", branch),
        }
    }
}

/// Result of processing a single dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DependencyOutcome {
    /// Files were regenerated and handed to the provider
    Updated {
        dependency: String,
        previous_version: Option<String>,
        new_version: Option<String>,
        unlock_level: UnlockLevel,
        /// Names of the regenerated files
        files: Vec<String>,
        pull_request: PullRequestStatus,
    },
    /// Dependency was left alone
    Skipped { dependency: String, reason: SkipReason },
    /// Processing failed; the run continued
    Failed {
        dependency: String,
        message: String,
        timeout: bool,
    },
}

impl DependencyOutcome {
    /// Creates a Skipped outcome
    pub fn skipped(dependency: impl Into<String>, reason: SkipReason) -> Self {
        DependencyOutcome::Skipped {
            dependency: dependency.into(),
            reason,
        }
    }

    /// Creates a Failed outcome
    pub fn failed(dependency: impl Into<String>, message: impl Into<String>, timeout: bool) -> Self {
        DependencyOutcome::Failed {
            dependency: dependency.into(),
            message: message.into(),
            timeout,
        }
    }

    /// Returns the dependency name
    pub fn dependency(&self) -> &str {
        match self {
            DependencyOutcome::Updated { dependency, .. }
            | DependencyOutcome::Skipped { dependency, .. }
            | DependencyOutcome::Failed { dependency, .. } => dependency,
        }
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, DependencyOutcome::Updated { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, DependencyOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DependencyOutcome::Failed { .. })
    }

    /// Returns true if this outcome prepared a pull request that was not submitted
    pub fn planned_pull_request(&self) -> bool {
        matches!(
            self,
            DependencyOutcome::Updated {
                pull_request: PullRequestStatus::NotSubmitted { .. },
                ..
            }
        )
    }

    /// Returns true if this outcome opened a new pull request
    pub fn created_pull_request(&self) -> bool {
        match self {
            DependencyOutcome::Updated { pull_request, .. } => pull_request.is_created(),
            _ => false,
        }
    }
}

impl fmt::Display for DependencyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyOutcome::Updated {
                dependency,
                previous_version,
                new_version,
                pull_request,
                ..
            } => write!(
                f,
                "{}: {} → {} ({})",
                dependency,
                previous_version.as_deref().unwrap_or("unknown"),
                new_version.as_deref().unwrap_or("unknown"),
                pull_request
            ),
            DependencyOutcome::Skipped { dependency, reason } => {
                write!(f, "{}: skipped ({})", dependency, reason)
            }
            DependencyOutcome::Failed {
                dependency,
                message,
                ..
            } => write!(f, "{}: failed ({})", dependency, message),
        }
    }
}

/// Overall summary of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Outcomes in processing order
    pub outcomes: Vec<DependencyOutcome>,
    /// Whether provider writes were suppressed
    pub dry_run: bool,
    /// Whether the run stopped early on request
    pub cancelled: bool,
    /// Whether the PR budget stopped the run
    pub budget_exhausted: bool,
}

impl RunSummary {
    /// Creates a new RunSummary
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// Adds an outcome
    pub fn add(&mut self, outcome: DependencyOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn updated_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_updated()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_skipped()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    /// Returns the number of newly created pull requests
    pub fn pull_requests_created(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.created_pull_request())
            .count()
    }

    /// Returns the number of pull requests charged against the budget.
    ///
    /// A dry run charges the pull requests it would have created.
    pub fn pull_requests_counted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.created_pull_request() || (self.dry_run && o.planned_pull_request()))
            .count()
    }

    /// Finds the outcome for a dependency
    pub fn outcome_for(&self, dependency: &str) -> Option<&DependencyOutcome> {
        self.outcomes.iter().find(|o| o.dependency() == dependency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn updated(pull_request: PullRequestStatus) -> DependencyOutcome {
        DependencyOutcome::Updated {
            dependency: "left-pad".to_string(),
            previous_version: Some("1.0.0".to_string()),
            new_version: Some("1.3.0".to_string()),
            unlock_level: UnlockLevel::Own,
            files: vec!["package.json".to_string(), "package-lock.json".to_string()],
            pull_request,
        }
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(format!("{}", SkipReason::UpToDate), "no update needed");
        assert_eq!(
            format!(
                "{}",
                SkipReason::PeerConflict {
                    peer: "widget-plugin".to_string()
                }
            ),
            "peer dependency 'widget-plugin' can update independently"
        );
    }

    #[test]
    fn test_outcome_display() {
        let outcome = updated(PullRequestStatus::Created {
            branch: "depbot/npm_and_yarn/left-pad-1.3.0".to_string(),
        });
        assert_eq!(
            format!("{}", outcome),
            "left-pad: 1.0.0 → 1.3.0 (created on depbot/npm_and_yarn/left-pad-1.3.0)"
        );

        let skipped = DependencyOutcome::skipped("core-util", SkipReason::UpToDate);
        assert_eq!(format!("{}", skipped), "core-util: skipped (no update needed)");
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::new(false);
        summary.add(updated(PullRequestStatus::Created {
            branch: "b".to_string(),
        }));
        summary.add(updated(PullRequestStatus::AlreadyOpen {
            branch: "b".to_string(),
        }));
        summary.add(DependencyOutcome::skipped("core-util", SkipReason::UpToDate));
        summary.add(DependencyOutcome::failed("broken", "registry down", false));

        assert_eq!(summary.updated_count(), 2);
        assert_eq!(summary.skipped_count(), 1);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.pull_requests_created(), 1);
        assert!(summary.outcome_for("broken").is_some_and(|o| o.is_failed()));
    }

    #[test]
    fn test_dry_run_counts_planned_pull_requests() {
        let planned = || {
            updated(PullRequestStatus::NotSubmitted {
                branch: "b".to_string(),
            })
        };

        let mut dry = RunSummary::new(true);
        dry.add(planned());
        dry.add(planned());
        assert_eq!(dry.pull_requests_created(), 0);
        assert_eq!(dry.pull_requests_counted(), 2);

        let mut live = RunSummary::new(false);
        live.add(planned());
        live.add(updated(PullRequestStatus::Created {
            branch: "b".to_string(),
        }));
        assert_eq!(live.pull_requests_counted(), 1);
    }

    #[test]
    fn test_serde_outcome() {
        let outcome = DependencyOutcome::skipped(
            "widget",
            SkipReason::PeerConflict {
                peer: "widget-plugin".to_string(),
            },
        );
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"type\":\"skipped\""));
        assert!(json.contains("\"kind\":\"peer_conflict\""));
        let parsed: DependencyOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, outcome);
    }
}
