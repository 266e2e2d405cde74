//! npm update checker
//!
//! Candidate versions come from the registry, minus:
//! - prereleases (unless the current version is one)
//! - deprecated versions
//! - versions matching an ignored range
//! - versions inside a security advisory's vulnerable range
//!
//! Resolution per unlock level:
//! - `none`: the newest candidate the current requirements already admit
//! - `own`:  the newest candidate with no peer conflict; requirements are rewritten
//! - `all`:  the newest candidate whose peer conflicts can be fixed by bumping the peers too
//!
//! A peer conflict is either direction of a `peerDependencies` mismatch: the
//! candidate requires a peer version we do not have, or another dependency's
//! installed version requires a version of us the candidate is not.

use super::registry::{PackageDetails, PackageRegistry, PackageVersion, RegistryConfig};
use super::requirement::{is_non_registry, parse_requirement, updated_requirement};
use crate::domain::{
    Credentials, Dependency, FileSnapshot, RequirementsUpdateStrategy, SecurityAdvisory,
    UnlockLevel,
};
use crate::ecosystem::{CheckerFactory, EcosystemOptions, UpdateChecker};
use crate::error::{CheckerError, RegistryError};
use crate::version::{compare_versions, is_prerelease_version, satisfies};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Version selection rules shared by every checker of a run
#[derive(Debug, Clone, Default)]
pub struct CheckerOptions {
    pub requirements_update_strategy: Option<RequirementsUpdateStrategy>,
    pub security_advisories: Vec<SecurityAdvisory>,
    pub ignored_versions: Vec<String>,
}

/// Builds `NpmChecker`s against a shared registry client
pub struct NpmCheckerFactory {
    registry: Arc<dyn PackageRegistry>,
    credentials: Credentials,
    options: CheckerOptions,
}

impl NpmCheckerFactory {
    pub fn new(
        registry: Arc<dyn PackageRegistry>,
        credentials: Credentials,
        options: CheckerOptions,
    ) -> Self {
        Self {
            registry,
            credentials,
            options,
        }
    }

    /// Builds a factory from run-level ecosystem options
    pub fn from_options(registry: Arc<dyn PackageRegistry>, options: &EcosystemOptions) -> Self {
        Self::new(
            registry,
            options.credentials.clone(),
            CheckerOptions {
                requirements_update_strategy: options.requirements_update_strategy,
                security_advisories: options.security_advisories.clone(),
                ignored_versions: options.ignored_versions.clone(),
            },
        )
    }
}

impl CheckerFactory for NpmCheckerFactory {
    fn checker(
        &self,
        dependency: &Dependency,
        snapshot: &FileSnapshot,
        dependencies: &[Dependency],
    ) -> Box<dyn UpdateChecker> {
        Box::new(NpmChecker {
            dependency: dependency.clone(),
            dependencies: dependencies.to_vec(),
            registry: self.registry.clone(),
            config: RegistryConfig::from_snapshot(snapshot, &self.credentials),
            options: self.options.clone(),
            details: OnceCell::new(),
        })
    }
}

/// A peer that must move together with the checked dependency
#[derive(Debug, Clone)]
enum Conflict {
    /// The candidate requires `range` of `peer`
    Requires { peer: String, range: String },
    /// `peer`'s installed version requires a different version of the checked dependency
    RequiredBy { peer: String },
}

impl Conflict {
    fn peer(&self) -> &str {
        match self {
            Conflict::Requires { peer, .. } | Conflict::RequiredBy { peer } => peer,
        }
    }
}

#[derive(Debug, Clone)]
struct Resolution {
    version: String,
    /// (peer name, new peer version)
    peers: Vec<(String, String)>,
}

/// Update checker for one npm dependency
pub struct NpmChecker {
    dependency: Dependency,
    dependencies: Vec<Dependency>,
    registry: Arc<dyn PackageRegistry>,
    config: RegistryConfig,
    options: CheckerOptions,
    details: OnceCell<Arc<PackageDetails>>,
}

impl NpmChecker {
    async fn details(&self) -> Result<&Arc<PackageDetails>, CheckerError> {
        self.details
            .get_or_try_init(|| async {
                self.registry
                    .package(&self.config, &self.dependency.name)
                    .await
                    .map_err(CheckerError::from)
            })
            .await
    }

    fn is_registry_dependency(&self) -> bool {
        !self
            .dependency
            .requirements
            .iter()
            .any(|r| r.source.is_some() || r.requirement.as_deref().is_some_and(is_non_registry))
    }

    /// The installed version, or the version a pinned requirement names
    fn current_version(&self) -> Option<String> {
        self.dependency.version.clone().or_else(|| {
            self.dependency
                .requirements
                .iter()
                .filter_map(|r| r.requirement.as_deref().and_then(parse_requirement))
                .find(|spec| spec.is_pinned())
                .map(|spec| spec.version)
        })
    }

    fn is_candidate(&self, name: &str, version: &PackageVersion, allow_prerelease: bool) -> bool {
        let v = version.version();
        if version.deprecated || (!allow_prerelease && is_prerelease_version(v)) {
            return false;
        }
        if name == self.dependency.name
            && self
                .options
                .ignored_versions
                .iter()
                .any(|range| satisfies(v, range).unwrap_or(false))
        {
            return false;
        }
        !self
            .options
            .security_advisories
            .iter()
            .any(|a| a.applies_to(name, self.dependency.package_manager) && a.is_vulnerable(v))
    }

    /// Candidates at or below `dist-tags.latest`, newest first
    fn candidates<'d>(&self, details: &'d PackageDetails, allow_prerelease: bool) -> Vec<&'d PackageVersion> {
        let ceiling = details
            .latest_tag
            .as_deref()
            .filter(|tag| !is_prerelease_version(tag) || allow_prerelease);

        let mut candidates: Vec<&PackageVersion> = details
            .versions
            .iter()
            .filter(|v| self.is_candidate(&details.name, v, allow_prerelease))
            .filter(|v| ceiling.map_or(true, |c| compare_versions(v.version(), c) != Ordering::Greater))
            .collect();
        candidates.reverse();
        candidates
    }

    /// Candidates newer than `current`, newest first
    fn newer_candidates<'d>(
        &self,
        details: &'d PackageDetails,
        current: Option<&str>,
    ) -> Vec<&'d PackageVersion> {
        let allow_prerelease = current.is_some_and(is_prerelease_version);
        self.candidates(details, allow_prerelease)
            .into_iter()
            .filter(|v| current.map_or(true, |c| compare_versions(v.version(), c) == Ordering::Greater))
            .collect()
    }

    fn installed(&self, name: &str) -> Option<&Dependency> {
        self.dependencies
            .iter()
            .find(|d| d.name == name && d.name != self.dependency.name)
    }

    fn admitted_by_requirements(&self, version: &str) -> bool {
        self.dependency
            .requirements
            .iter()
            .filter_map(|r| r.requirement.as_deref())
            .all(|req| satisfies(version, req).unwrap_or(false))
    }

    async fn conflicts(&self, candidate: &PackageVersion) -> Vec<Conflict> {
        let mut conflicts = Vec::new();

        for (peer, range) in &candidate.peer_dependencies {
            let Some(installed) = self.installed(peer).and_then(|d| d.version.as_deref()) else {
                continue;
            };
            if satisfies(installed, range) == Some(false) {
                conflicts.push(Conflict::Requires {
                    peer: peer.clone(),
                    range: range.clone(),
                });
            }
        }

        for other in self
            .dependencies
            .iter()
            .filter(|d| d.top_level && d.name != self.dependency.name)
        {
            if conflicts.iter().any(|c| c.peer() == other.name) {
                continue;
            }
            let Some(other_version) = other.version.as_deref() else {
                continue;
            };
            let Some(details) = self.peer_details(&other.name).await else {
                continue;
            };
            let required = details
                .version(other_version)
                .and_then(|v| v.peer_dependencies.get(&self.dependency.name));
            if let Some(range) = required {
                if satisfies(candidate.version(), range) == Some(false) {
                    conflicts.push(Conflict::RequiredBy {
                        peer: other.name.clone(),
                    });
                }
            }
        }

        conflicts
    }

    /// Metadata for another dependency; failures only narrow the conflict check
    async fn peer_details(&self, name: &str) -> Option<Arc<PackageDetails>> {
        match self.registry.package(&self.config, name).await {
            Ok(details) => Some(details),
            Err(RegistryError::PackageNotFound { .. }) => None,
            Err(e) => {
                debug!(dependency = %self.dependency.name, peer = name, error = %e, "peer lookup failed");
                None
            }
        }
    }

    /// Finds new versions for every conflicting peer that are compatible with `candidate`
    async fn resolve_peers(
        &self,
        candidate: &PackageVersion,
        conflicts: &[Conflict],
    ) -> Option<Vec<(String, String)>> {
        let mut bumps = Vec::new();
        for conflict in conflicts {
            let peer = self.installed(conflict.peer())?;
            let details = self.peer_details(&peer.name).await?;
            let compatible = self
                .newer_candidates(&details, peer.version.as_deref())
                .into_iter()
                .find(|peer_version| {
                    let forward = match conflict {
                        Conflict::Requires { range, .. } => {
                            satisfies(peer_version.version(), range).unwrap_or(false)
                        }
                        Conflict::RequiredBy { .. } => true,
                    };
                    let reverse = peer_version
                        .peer_dependencies
                        .get(&self.dependency.name)
                        .map_or(true, |range| satisfies(candidate.version(), range).unwrap_or(false));
                    forward && reverse
                })?;
            bumps.push((peer.name.clone(), compatible.version().to_string()));
        }
        Some(bumps)
    }

    async fn resolve(&self, level: UnlockLevel) -> Result<Option<Resolution>, CheckerError> {
        if !self.is_registry_dependency() {
            return Ok(None);
        }
        if level != UnlockLevel::None && !self.requirements_unlocked_or_can_be() {
            return Ok(None);
        }

        let details = self.details().await?;
        let current = self.current_version();

        for candidate in self.newer_candidates(details, current.as_deref()) {
            if level == UnlockLevel::None
                && self.dependency.top_level
                && !self.admitted_by_requirements(candidate.version())
            {
                continue;
            }

            let conflicts = self.conflicts(candidate).await;
            if conflicts.is_empty() {
                return Ok(Some(Resolution {
                    version: candidate.version().to_string(),
                    peers: Vec::new(),
                }));
            }

            if level == UnlockLevel::All {
                if let Some(peers) = self.resolve_peers(candidate, &conflicts).await {
                    return Ok(Some(Resolution {
                        version: candidate.version().to_string(),
                        peers,
                    }));
                }
            }
            debug!(
                dependency = %self.dependency.name,
                version = candidate.version(),
                level = %level,
                conflicts = ?conflicts.iter().map(Conflict::peer).collect::<Vec<_>>(),
                "candidate has peer conflicts"
            );
        }

        Ok(None)
    }

    fn bumped(&self, dependency: &Dependency, version: &str, level: UnlockLevel) -> Dependency {
        let requirements = if level == UnlockLevel::None {
            dependency.requirements.clone()
        } else {
            dependency
                .requirements
                .iter()
                .map(|r| match r.requirement.as_deref() {
                    Some(text) => r.with_requirement(updated_requirement(
                        text,
                        version,
                        self.options.requirements_update_strategy,
                    )),
                    None => r.clone(),
                })
                .collect()
        };
        dependency.updated(version, requirements)
    }
}

#[async_trait]
impl UpdateChecker for NpmChecker {
    fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    async fn latest_version(&self) -> Result<Option<String>, CheckerError> {
        if !self.is_registry_dependency() {
            return Ok(None);
        }
        let details = self.details().await?;
        let allow_prerelease = self
            .current_version()
            .is_some_and(|v| is_prerelease_version(&v));
        let latest = self
            .candidates(details, allow_prerelease)
            .first()
            .map(|v| v.version().to_string());
        Ok(latest)
    }

    async fn latest_resolvable_version(&self) -> Result<Option<String>, CheckerError> {
        let resolution = match self.resolve(UnlockLevel::Own).await? {
            Some(resolution) => Some(resolution),
            None => self.resolve(UnlockLevel::None).await?,
        };
        Ok(resolution.map(|r| r.version))
    }

    async fn up_to_date(&self) -> Result<bool, CheckerError> {
        let Some(latest) = self.latest_version().await? else {
            return Ok(true);
        };
        let up_to_date = match self.current_version() {
            Some(current) => compare_versions(&latest, &current) != Ordering::Greater,
            None => self.admitted_by_requirements(&latest),
        };
        debug!(
            dependency = %self.dependency.name,
            latest = %latest,
            up_to_date,
            "compared against registry"
        );
        Ok(up_to_date)
    }

    async fn can_update(&self, level: UnlockLevel) -> Result<bool, CheckerError> {
        Ok(self.resolve(level).await?.is_some())
    }

    async fn updated_dependencies(&self, level: UnlockLevel) -> Result<Vec<Dependency>, CheckerError> {
        let resolution = self
            .resolve(level)
            .await?
            .ok_or_else(|| CheckerError::Resolution {
                dependency: self.dependency.name.clone(),
                message: format!("no update possible at unlock level {}", level),
            })?;

        let mut updated = vec![self.bumped(&self.dependency, &resolution.version, level)];
        for (peer, version) in &resolution.peers {
            if let Some(dependency) = self.installed(peer) {
                updated.push(self.bumped(dependency, version, level));
            }
        }
        Ok(updated)
    }

    fn requirements_unlocked_or_can_be(&self) -> bool {
        if self.options.requirements_update_strategy == Some(RequirementsUpdateStrategy::LockfileOnly) {
            return false;
        }
        self.dependency
            .requirements
            .iter()
            .filter_map(|r| r.requirement.as_deref())
            .all(|req| parse_requirement(req).is_some_and(|spec| spec.kind.is_rewritable()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PackageManager, Requirement};
    use std::collections::HashMap;

    struct StaticRegistry(HashMap<String, Arc<PackageDetails>>);

    impl StaticRegistry {
        fn new(packages: Vec<PackageDetails>) -> Arc<Self> {
            Arc::new(Self(
                packages
                    .into_iter()
                    .map(|p| (p.name.clone(), Arc::new(p)))
                    .collect(),
            ))
        }
    }

    #[async_trait]
    impl PackageRegistry for StaticRegistry {
        async fn package(
            &self,
            config: &RegistryConfig,
            name: &str,
        ) -> Result<Arc<PackageDetails>, RegistryError> {
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| RegistryError::package_not_found(name, config.url.clone()))
        }
    }

    fn top_level(name: &str, version: &str, requirement: &str) -> Dependency {
        Dependency::new(
            name,
            Some(version.to_string()),
            vec![Requirement::new(
                "package.json",
                requirement,
                vec!["dependencies".to_string()],
            )],
            PackageManager::NpmAndYarn,
        )
    }

    fn checker(
        registry: Arc<StaticRegistry>,
        dependency: &Dependency,
        dependencies: &[Dependency],
        options: CheckerOptions,
    ) -> Box<dyn UpdateChecker> {
        NpmCheckerFactory::new(registry, Credentials::new(), options).checker(
            dependency,
            &FileSnapshot::default(),
            dependencies,
        )
    }

    fn left_pad_registry() -> Arc<StaticRegistry> {
        StaticRegistry::new(vec![PackageDetails::new(
            "left-pad",
            vec![
                PackageVersion::new("1.0.0"),
                PackageVersion::new("1.1.0"),
                PackageVersion::new("1.3.0"),
                PackageVersion::new("2.0.0-beta.1"),
            ],
        )
        .with_latest_tag("1.3.0")])
    }

    #[tokio::test]
    async fn test_latest_version_skips_prereleases() {
        let dep = top_level("left-pad", "1.0.0", "1.0.0");
        let checker = checker(left_pad_registry(), &dep, &[dep.clone()], CheckerOptions::default());

        assert_eq!(checker.latest_version().await.unwrap().as_deref(), Some("1.3.0"));
        assert!(!checker.up_to_date().await.unwrap());
    }

    #[tokio::test]
    async fn test_up_to_date_at_latest() {
        let dep = top_level("left-pad", "1.3.0", "1.3.0");
        let checker = checker(left_pad_registry(), &dep, &[dep.clone()], CheckerOptions::default());
        assert!(checker.up_to_date().await.unwrap());
    }

    #[tokio::test]
    async fn test_pinned_requirement_needs_own_unlock() {
        let dep = top_level("left-pad", "1.0.0", "1.0.0");
        let checker = checker(left_pad_registry(), &dep, &[dep.clone()], CheckerOptions::default());

        assert!(!checker.can_update(UnlockLevel::None).await.unwrap());
        assert!(checker.can_update(UnlockLevel::Own).await.unwrap());

        let updated = checker.updated_dependencies(UnlockLevel::Own).await.unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].version.as_deref(), Some("1.3.0"));
        assert_eq!(updated[0].previous_version.as_deref(), Some("1.0.0"));
        assert_eq!(updated[0].requirement_in("package.json"), Some("1.3.0"));
    }

    #[tokio::test]
    async fn test_caret_requirement_updates_at_none() {
        let dep = top_level("left-pad", "1.0.0", "^1.0.0");
        let checker = checker(left_pad_registry(), &dep, &[dep.clone()], CheckerOptions::default());

        assert!(checker.can_update(UnlockLevel::None).await.unwrap());
        let updated = checker.updated_dependencies(UnlockLevel::None).await.unwrap();
        assert_eq!(updated[0].version.as_deref(), Some("1.3.0"));
        assert_eq!(updated[0].requirement_in("package.json"), Some("^1.0.0"));
    }

    #[tokio::test]
    async fn test_ignored_and_vulnerable_versions_excluded() {
        let dep = top_level("left-pad", "1.0.0", "1.0.0");
        let options = CheckerOptions {
            ignored_versions: vec![">=1.3.0".to_string()],
            security_advisories: vec![SecurityAdvisory::new(
                "left-pad",
                PackageManager::NpmAndYarn,
                vec!["1.1.0".to_string()],
                vec![],
            )],
            ..CheckerOptions::default()
        };
        let checker = checker(left_pad_registry(), &dep, &[dep.clone()], options);

        assert!(!checker.can_update(UnlockLevel::Own).await.unwrap());
        assert_eq!(checker.latest_version().await.unwrap().as_deref(), Some("1.0.0"));
        assert!(checker.up_to_date().await.unwrap());
    }

    #[tokio::test]
    async fn test_lockfile_only_strategy_locks_requirements() {
        let dep = top_level("left-pad", "1.0.0", "^1.0.0");
        let options = CheckerOptions {
            requirements_update_strategy: Some(RequirementsUpdateStrategy::LockfileOnly),
            ..CheckerOptions::default()
        };
        let checker = checker(left_pad_registry(), &dep, &[dep.clone()], options);

        assert!(!checker.requirements_unlocked_or_can_be());
        assert!(!checker.can_update(UnlockLevel::Own).await.unwrap());
        assert!(checker.can_update(UnlockLevel::None).await.unwrap());
    }

    #[tokio::test]
    async fn test_non_registry_dependency_is_up_to_date() {
        let dep = top_level("private", "1.0.0", "git+https://example.com/private.git");
        let checker = checker(left_pad_registry(), &dep, &[dep.clone()], CheckerOptions::default());
        assert!(checker.up_to_date().await.unwrap());
        assert!(!checker.can_update(UnlockLevel::All).await.unwrap());
    }

    fn widget_registry() -> Arc<StaticRegistry> {
        StaticRegistry::new(vec![
            PackageDetails::new(
                "widget",
                vec![PackageVersion::new("1.0.0"), PackageVersion::new("2.0.0")],
            ),
            PackageDetails::new(
                "widget-plugin",
                vec![
                    PackageVersion::new("1.0.0").with_peer("widget", "^1.0.0"),
                    PackageVersion::new("2.0.0").with_peer("widget", "^2.0.0"),
                ],
            ),
        ])
    }

    #[tokio::test]
    async fn test_peer_conflict_requires_all_unlock() {
        let widget = top_level("widget", "1.0.0", "^1.0.0");
        let plugin = top_level("widget-plugin", "1.0.0", "^1.0.0");
        let deps = vec![widget.clone(), plugin];
        let checker = checker(widget_registry(), &widget, &deps, CheckerOptions::default());

        assert!(!checker.can_update(UnlockLevel::Own).await.unwrap());
        assert!(checker.can_update(UnlockLevel::All).await.unwrap());

        let updated = checker.updated_dependencies(UnlockLevel::All).await.unwrap();
        let names: Vec<&str> = updated.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["widget", "widget-plugin"]);
        assert_eq!(updated[1].version.as_deref(), Some("2.0.0"));
        assert_eq!(updated[1].requirement_in("package.json"), Some("^2.0.0"));
    }

    #[tokio::test]
    async fn test_updated_dependencies_without_resolution_errors() {
        let dep = top_level("left-pad", "1.3.0", "1.3.0");
        let checker = checker(left_pad_registry(), &dep, &[dep.clone()], CheckerOptions::default());
        assert!(matches!(
            checker.updated_dependencies(UnlockLevel::Own).await,
            Err(CheckerError::Resolution { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_package_propagates_registry_error() {
        let dep = top_level("missing", "1.0.0", "1.0.0");
        let checker = checker(left_pad_registry(), &dep, &[dep.clone()], CheckerOptions::default());
        assert!(matches!(
            checker.up_to_date().await,
            Err(CheckerError::Registry(RegistryError::PackageNotFound { .. }))
        ));
    }
}
