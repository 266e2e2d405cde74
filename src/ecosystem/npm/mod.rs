//! `npm_and_yarn` capability bundle
//!
//! This module provides:
//! - File fetcher reading package.json, lock files and `.npmrc`
//! - package.json + lock file parser
//! - npm registry update checker
//! - package.json rewriting and native lock file regeneration (npm, yarn, pnpm, rush)
//! - `.npmrc` registry credential handling

mod checker;
mod fetcher;
mod lockfile;
mod manifest;
pub mod npmrc;
mod parser;
mod registry;
mod requirement;

pub use checker::{CheckerOptions, NpmChecker, NpmCheckerFactory};
pub use fetcher::NpmFetcher;
pub use lockfile::{LockStep, LockTool, NativeLockfileGenerator};
pub use manifest::PackageJsonGenerator;
pub use parser::NpmParser;
pub use registry::{
    NpmRegistry, PackageDetails, PackageRegistry, PackageVersion, RegistryConfig, NPM_REGISTRY_URL,
};
pub use requirement::{parse_requirement, updated_requirement};

use crate::domain::{PackageManager, Source};
use crate::ecosystem::{
    CheckerFactory, Ecosystem, EcosystemOptions, FileFetcher, FileParser, FileUpdater,
};
use crate::provider::Provider;
use crate::regenerate::{AuxiliaryLockfile, Regenerator};
use std::sync::Arc;

/// Marker file of a Rush monorepo
pub const RUSH_MARKER: &str = "rush.json";

/// Lock file maintained by Rush
pub const RUSH_LOCKFILE: &str = "common/config/rush/pnpm-lock.yaml";

/// The npm, yarn and pnpm ecosystem
pub struct NpmEcosystem;

impl NpmEcosystem {
    /// Builds the regenerator with every lock file format
    pub fn regenerator(options: &EcosystemOptions) -> Regenerator {
        let timeout = options.tool_timeout;
        let native = |tool| Arc::new(NativeLockfileGenerator::new(tool, timeout));

        Regenerator::new(PackageManager::NpmAndYarn, Arc::new(PackageJsonGenerator))
            .with_lockfile(native(LockTool::Npm))
            .with_lockfile(native(LockTool::Yarn))
            .with_lockfile(native(LockTool::Pnpm))
            .with_auxiliary(AuxiliaryLockfile {
                marker: RUSH_MARKER,
                path: RUSH_LOCKFILE,
                generator: native(LockTool::Rush),
            })
    }
}

impl Ecosystem for NpmEcosystem {
    fn package_manager(&self) -> PackageManager {
        PackageManager::NpmAndYarn
    }

    fn fetcher(&self, source: &Source, provider: Arc<dyn Provider>) -> Box<dyn FileFetcher> {
        Box::new(NpmFetcher::new(source.clone(), provider))
    }

    fn parser(&self) -> Box<dyn FileParser> {
        Box::new(NpmParser)
    }

    fn checker_factory(&self, options: &EcosystemOptions) -> Arc<dyn CheckerFactory> {
        let registry = Arc::new(NpmRegistry::new(options.http.clone()));
        Arc::new(NpmCheckerFactory::from_options(registry, options))
    }

    fn updater(&self, options: &EcosystemOptions) -> Box<dyn FileUpdater> {
        Box::new(Self::regenerator(options))
    }
}
