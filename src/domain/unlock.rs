//! Unlock levels, unlock decisions and requirement update strategies

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How far a dependency's declared constraints may be widened
///
/// Ordered from least to most disruptive: `None < Own < All`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockLevel {
    /// Only the lock file may change
    None,
    /// The dependency's own requirements may change
    Own,
    /// Requirements of other dependencies may change too
    All,
}

impl UnlockLevel {
    /// Levels probed when requirements may be relaxed, in search order
    pub const RELAXABLE: [UnlockLevel; 2] = [UnlockLevel::Own, UnlockLevel::All];
}

impl fmt::Display for UnlockLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnlockLevel::None => write!(f, "none"),
            UnlockLevel::Own => write!(f, "own"),
            UnlockLevel::All => write!(f, "all"),
        }
    }
}

/// Outcome of the unlock-level search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "level", rename_all = "snake_case")]
pub enum UnlockDecision {
    /// Update is possible at this level
    Unlock(UnlockLevel),
    /// No probed level allows an update
    UpdateNotPossible,
}

impl UnlockDecision {
    /// Returns the selected level, if any
    pub fn level(&self) -> Option<UnlockLevel> {
        match self {
            UnlockDecision::Unlock(level) => Some(*level),
            UnlockDecision::UpdateNotPossible => None,
        }
    }
}

impl fmt::Display for UnlockDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnlockDecision::Unlock(level) => write!(f, "{}", level),
            UnlockDecision::UpdateNotPossible => write!(f, "update-not-possible"),
        }
    }
}

/// How requirement text is rewritten when a dependency is bumped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementsUpdateStrategy {
    /// Widen a range so it also admits the new version
    WidenRanges,
    /// Rewrite the requirement to the new version, keeping its operator
    BumpVersions,
    /// Rewrite only when the current requirement does not admit the new version
    BumpVersionsIfNecessary,
    /// Never touch requirements; only the lock file changes
    LockfileOnly,
}

impl RequirementsUpdateStrategy {
    /// Parses the CLI value; `auto` means "let the checker choose"
    pub fn parse_override(value: &str) -> Result<Option<Self>, ConfigError> {
        match value.trim() {
            "" | "auto" => Ok(None),
            other => other.parse().map(Some),
        }
    }
}

impl FromStr for RequirementsUpdateStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "widen_ranges" => Ok(RequirementsUpdateStrategy::WidenRanges),
            "bump_versions" => Ok(RequirementsUpdateStrategy::BumpVersions),
            "bump_versions_if_necessary" => Ok(RequirementsUpdateStrategy::BumpVersionsIfNecessary),
            "lockfile_only" => Ok(RequirementsUpdateStrategy::LockfileOnly),
            other => Err(ConfigError::InvalidStrategy {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for RequirementsUpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequirementsUpdateStrategy::WidenRanges => "widen_ranges",
            RequirementsUpdateStrategy::BumpVersions => "bump_versions",
            RequirementsUpdateStrategy::BumpVersionsIfNecessary => "bump_versions_if_necessary",
            RequirementsUpdateStrategy::LockfileOnly => "lockfile_only",
        };
        write!(f, "{}", s)
    }
}
