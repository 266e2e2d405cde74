//! Core domain models for depbot
//!
//! This module contains the fundamental types used throughout the application:
//! - Repository source, credentials and package-manager tags
//! - Dependency files and immutable file snapshots
//! - Dependency and requirement structures
//! - Unlock levels/decisions and requirement update strategies
//! - Per-dependency outcomes and the run summary

mod advisory;
mod credential;
mod dependency;
mod dependency_file;
mod outcome;
mod package_manager;
mod source;
mod unlock;
mod version_spec;

pub use advisory::SecurityAdvisory;
pub use credential::{Credential, CredentialKind, Credentials};
pub use dependency::{Dependency, Requirement};
pub use dependency_file::{DependencyFile, FileSnapshot, FileType, SnapshotFingerprint};
pub use outcome::{DependencyOutcome, PullRequestStatus, RunSummary, SkipReason};
pub use package_manager::PackageManager;
pub use source::{normalize_directory, ProviderKind, Source};
pub use unlock::{RequirementsUpdateStrategy, UnlockDecision, UnlockLevel};
pub use version_spec::{VersionSpec, VersionSpecKind};
