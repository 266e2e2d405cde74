//! Dependency information structures

use super::{PackageManager, SnapshotFingerprint};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A requirement declared for a dependency in one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// File declaring the requirement
    pub file: String,
    /// Constraint text as written (absent for lock-only declarations)
    pub requirement: Option<String>,
    /// Dependency groups (e.g. `dependencies`, `devDependencies`)
    pub groups: Vec<String>,
    /// Non-registry source (git url, tarball) when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Requirement {
    /// Creates a new requirement
    pub fn new(
        file: impl Into<String>,
        requirement: impl Into<String>,
        groups: Vec<String>,
    ) -> Self {
        Self {
            file: file.into(),
            requirement: Some(requirement.into()),
            groups,
            source: None,
        }
    }

    /// Returns a copy carrying a different constraint text
    pub fn with_requirement(&self, requirement: impl Into<String>) -> Self {
        Self {
            requirement: Some(requirement.into()),
            ..self.clone()
        }
    }
}

/// Represents one declared dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Package name
    pub name: String,
    /// Resolved version (from the lock file when there is one)
    pub version: Option<String>,
    /// Version before an update; only set on post-update values
    pub previous_version: Option<String>,
    /// Per-file requirements, in declaration order
    pub requirements: Vec<Requirement>,
    /// Requirements before an update; only set on post-update values
    pub previous_requirements: Option<Vec<Requirement>>,
    /// The ecosystem this dependency belongs to
    pub package_manager: PackageManager,
    /// Declared directly in a manifest (vs. pulled in transitively)
    pub top_level: bool,
    /// Snapshot the dependency was parsed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotFingerprint>,
}

impl Dependency {
    /// Creates a new top-level dependency
    pub fn new(
        name: impl Into<String>,
        version: Option<String>,
        requirements: Vec<Requirement>,
        package_manager: PackageManager,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            previous_version: None,
            requirements,
            previous_requirements: None,
            package_manager,
            top_level: true,
            snapshot: None,
        }
    }

    /// Creates a transitive dependency with no declared requirements
    pub fn transitive(
        name: impl Into<String>,
        version: impl Into<String>,
        package_manager: PackageManager,
    ) -> Self {
        Self {
            top_level: false,
            ..Self::new(name, Some(version.into()), Vec::new(), package_manager)
        }
    }

    /// Records the snapshot this dependency was parsed from (builder pattern)
    pub fn with_snapshot(mut self, fingerprint: impl Into<SnapshotFingerprint>) -> Self {
        self.snapshot = Some(fingerprint.into());
        self
    }

    /// Returns the post-update value; the original is left untouched
    pub fn updated(&self, version: impl Into<String>, requirements: Vec<Requirement>) -> Self {
        Self {
            name: self.name.clone(),
            version: Some(version.into()),
            previous_version: self.version.clone(),
            requirements,
            previous_requirements: Some(self.requirements.clone()),
            package_manager: self.package_manager,
            top_level: self.top_level,
            snapshot: self.snapshot.clone(),
        }
    }

    /// Reconstructs the pre-update state of a post-update value
    pub fn previous_state(&self) -> Self {
        Self {
            name: self.name.clone(),
            version: self.previous_version.clone(),
            previous_version: None,
            requirements: self
                .previous_requirements
                .clone()
                .unwrap_or_else(|| self.requirements.clone()),
            previous_requirements: None,
            package_manager: self.package_manager,
            top_level: self.top_level,
            snapshot: self.snapshot.clone(),
        }
    }

    /// Returns true if any requirement text differs from before the update
    pub fn requirements_changed(&self) -> bool {
        match self.previous_requirements {
            Some(ref previous) => previous != &self.requirements,
            None => false,
        }
    }

    /// Returns true if the resolved version differs from before the update
    pub fn version_changed(&self) -> bool {
        self.previous_version.is_some() && self.previous_version != self.version
    }

    /// Returns the current version or a placeholder
    pub fn display_version(&self) -> &str {
        self.version.as_deref().unwrap_or("unknown")
    }

    /// Returns the constraint declared in the given file, if any
    pub fn requirement_in(&self, file: &str) -> Option<&str> {
        self.requirements
            .iter()
            .find(|r| r.file == file)
            .and_then(|r| r.requirement.as_deref())
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.top_level { "" } else { " (transitive)" };
        write!(
            f,
            "{}@{}{} [{}]",
            self.name,
            self.display_version(),
            marker,
            self.package_manager
        )
    }
}
