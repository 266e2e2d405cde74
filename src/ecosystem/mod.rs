//! Ecosystem capabilities
//!
//! Each package-manager family implements a fixed set of capabilities:
//! - FileFetcher: reads the dependency file snapshot from the provider
//! - FileParser: turns a snapshot into dependencies
//! - UpdateChecker (built by a CheckerFactory): answers version/unlock questions
//! - FileUpdater: regenerates manifest and lock file content
//!
//! `bundle_for` resolves a package-manager tag to its bundle once per run.

pub mod npm;

use crate::domain::{
    Credentials, Dependency, DependencyFile, FileSnapshot, PackageManager,
    RequirementsUpdateStrategy, SecurityAdvisory, Source, UnlockLevel,
};
use crate::error::{CheckerError, FetchError, UpdaterError};
use crate::http::HttpClient;
use crate::provider::Provider;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Reads dependency files from the repository
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Returns the dependency file snapshot
    async fn files(&self) -> Result<FileSnapshot, FetchError>;

    /// Returns the registry configuration text, if the repository has one
    async fn npmrc_content(&self) -> Result<Option<String>, FetchError>;

    /// Returns the commit the snapshot was read from
    async fn commit(&self) -> Result<String, FetchError>;
}

/// Parses a snapshot into dependencies
pub trait FileParser: Send + Sync {
    fn parse(&self, snapshot: &FileSnapshot) -> Result<Vec<Dependency>, FetchError>;
}

/// Answers update questions for one dependency
#[async_trait]
pub trait UpdateChecker: Send + Sync {
    /// The dependency being checked
    fn dependency(&self) -> &Dependency;

    /// Latest version published to the registry (after filtering)
    async fn latest_version(&self) -> Result<Option<String>, CheckerError>;

    /// Latest version that can be resolved given the other dependencies
    async fn latest_resolvable_version(&self) -> Result<Option<String>, CheckerError>;

    /// Returns true if no update is needed
    async fn up_to_date(&self) -> Result<bool, CheckerError>;

    /// Returns true if an update is possible when unlocking up to `level`
    async fn can_update(&self, level: UnlockLevel) -> Result<bool, CheckerError>;

    /// Post-update dependencies for `level`; the checked dependency comes first
    async fn updated_dependencies(&self, level: UnlockLevel) -> Result<Vec<Dependency>, CheckerError>;

    /// Returns true if the declared requirements may be relaxed at all
    fn requirements_unlocked_or_can_be(&self) -> bool;
}

/// Builds update checkers
pub trait CheckerFactory: Send + Sync {
    /// Creates a checker for `dependency` in the context of `snapshot` and its parsed `dependencies`
    fn checker(
        &self,
        dependency: &Dependency,
        snapshot: &FileSnapshot,
        dependencies: &[Dependency],
    ) -> Box<dyn UpdateChecker>;
}

/// Regenerates dependency files for an accepted update set
#[async_trait]
pub trait FileUpdater: Send + Sync {
    /// Returns only the files whose content changed
    ///
    /// Raises `UpdaterError::NoFunctionalChange` when nothing useful was produced.
    async fn updated_dependency_files(
        &self,
        snapshot: &FileSnapshot,
        dependencies: &[Dependency],
    ) -> Result<Vec<DependencyFile>, UpdaterError>;
}

/// Run-level inputs shared by an ecosystem's capabilities
#[derive(Clone)]
pub struct EcosystemOptions {
    pub http: HttpClient,
    pub credentials: Credentials,
    pub requirements_update_strategy: Option<RequirementsUpdateStrategy>,
    pub security_advisories: Vec<SecurityAdvisory>,
    /// npm ranges never proposed as update targets
    pub ignored_versions: Vec<String>,
    pub tool_timeout: Duration,
}

/// Capability bundle for one package-manager family
pub trait Ecosystem: Send + Sync {
    fn package_manager(&self) -> PackageManager;

    fn fetcher(&self, source: &Source, provider: Arc<dyn Provider>) -> Box<dyn FileFetcher>;

    fn parser(&self) -> Box<dyn FileParser>;

    fn checker_factory(&self, options: &EcosystemOptions) -> Arc<dyn CheckerFactory>;

    fn updater(&self, options: &EcosystemOptions) -> Box<dyn FileUpdater>;
}

/// Create the capability bundle for the given package manager
pub fn bundle_for(package_manager: PackageManager) -> Arc<dyn Ecosystem> {
    match package_manager {
        PackageManager::NpmAndYarn => Arc::new(npm::NpmEcosystem),
    }
}
