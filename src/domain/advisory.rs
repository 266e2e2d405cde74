//! Security advisory data consumed by update checkers

use super::PackageManager;
use crate::version::satisfies;
use serde::{Deserialize, Serialize};

/// Vulnerable/safe version ranges for one dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityAdvisory {
    pub dependency_name: String,
    pub package_manager: PackageManager,
    /// npm ranges; a version inside any of them is vulnerable
    pub vulnerable_versions: Vec<String>,
    /// npm ranges; a version inside any of them is safe even if also listed as vulnerable
    pub safe_versions: Vec<String>,
}

impl SecurityAdvisory {
    /// Creates a new advisory
    pub fn new(
        dependency_name: impl Into<String>,
        package_manager: PackageManager,
        vulnerable_versions: Vec<String>,
        safe_versions: Vec<String>,
    ) -> Self {
        Self {
            dependency_name: dependency_name.into(),
            package_manager,
            vulnerable_versions,
            safe_versions,
        }
    }

    /// Returns true if the advisory targets this dependency
    pub fn applies_to(&self, name: &str, package_manager: PackageManager) -> bool {
        self.dependency_name == name && self.package_manager == package_manager
    }

    /// Returns true if `version` falls in a vulnerable range and no safe range
    pub fn is_vulnerable(&self, version: &str) -> bool {
        let in_any = |ranges: &[String]| {
            ranges
                .iter()
                .any(|range| satisfies(version, range).unwrap_or(false))
        };
        in_any(&self.vulnerable_versions) && !in_any(&self.safe_versions)
    }
}
