//! Package manager (ecosystem) tags

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported package-manager families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManager {
    /// npm, yarn, pnpm and rush managed JavaScript projects
    NpmAndYarn,
}

impl PackageManager {
    /// Returns the tag used on the command line and in branch names
    pub fn tag(&self) -> &'static str {
        match self {
            PackageManager::NpmAndYarn => "npm_and_yarn",
        }
    }

    /// Returns the manifest filename for this ecosystem
    pub fn manifest_filename(&self) -> &'static str {
        match self {
            PackageManager::NpmAndYarn => "package.json",
        }
    }

    /// Returns the lock filenames for this ecosystem
    pub fn lock_filenames(&self) -> &'static [&'static str] {
        match self {
            PackageManager::NpmAndYarn => &[
                "package-lock.json",
                "npm-shrinkwrap.json",
                "yarn.lock",
                "pnpm-lock.yaml",
            ],
        }
    }

    /// Returns the pull request label for this ecosystem
    pub fn label(&self) -> &'static str {
        match self {
            PackageManager::NpmAndYarn => "javascript",
        }
    }

    /// Returns the display name for this ecosystem
    pub fn display_name(&self) -> &'static str {
        match self {
            PackageManager::NpmAndYarn => "npm/yarn",
        }
    }

    /// Returns true if the file name is one of this ecosystem's lock files
    pub fn is_lockfile(&self, name: &str) -> bool {
        self.lock_filenames()
            .iter()
            .any(|lock| name == *lock || name.ends_with(&format!("/{}", lock)))
    }

    /// Returns true if the file name is this ecosystem's manifest
    pub fn is_manifest(&self, name: &str) -> bool {
        let manifest = self.manifest_filename();
        name == manifest || name.ends_with(&format!("/{}", manifest))
    }
}

impl FromStr for PackageManager {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "npm_and_yarn" | "npm" | "yarn" | "pnpm" => Ok(PackageManager::NpmAndYarn),
            other => Err(ConfigError::UnsupportedPackageManager {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!(
            "npm_and_yarn".parse::<PackageManager>().unwrap(),
            PackageManager::NpmAndYarn
        );
        assert_eq!(
            "pnpm".parse::<PackageManager>().unwrap(),
            PackageManager::NpmAndYarn
        );
        assert!("bundler".parse::<PackageManager>().is_err());
    }

    #[test]
    fn test_lockfile_detection() {
        let pm = PackageManager::NpmAndYarn;
        assert!(pm.is_lockfile("package-lock.json"));
        assert!(pm.is_lockfile("common/config/rush/pnpm-lock.yaml"));
        assert!(pm.is_lockfile("packages/a/yarn.lock"));
        assert!(!pm.is_lockfile("package.json"));
        assert!(!pm.is_lockfile("rush.json"));
    }

    #[test]
    fn test_manifest_detection() {
        let pm = PackageManager::NpmAndYarn;
        assert!(pm.is_manifest("package.json"));
        assert!(pm.is_manifest("packages/a/package.json"));
        assert!(!pm.is_manifest("package-lock.json"));
    }

    #[test]
    fn test_serde_serialization() {
        let json = serde_json::to_string(&PackageManager::NpmAndYarn).unwrap();
        assert_eq!(json, "\"npm_and_yarn\"");
        assert_eq!(PackageManager::NpmAndYarn.to_string(), "npm_and_yarn");
    }
}
