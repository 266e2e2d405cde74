//! Version comparison and npm range helpers
//!
//! This module provides:
//! - VersionInfo: a registry version with its publish date
//! - semver-aware comparison with a lenient fallback
//! - npm range satisfaction (`^1.2.3`, `>=1 <2`, `1.x || 2.x`, `1.0.0 - 2.0.0`)

use chrono::{DateTime, Utc};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Information about a package version from the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// The version string (e.g., "1.2.3")
    pub version: String,
    /// When this version was published, when the registry says so
    pub released_at: Option<DateTime<Utc>>,
}

impl VersionInfo {
    /// Create a new VersionInfo
    pub fn new(version: impl Into<String>, released_at: Option<DateTime<Utc>>) -> Self {
        Self {
            version: version.into(),
            released_at,
        }
    }

    /// Returns true if this is a prerelease version
    pub fn is_prerelease(&self) -> bool {
        is_prerelease_version(&self.version)
    }
}

impl Ord for VersionInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_versions(&self.version, &other.version)
    }
}

impl PartialOrd for VersionInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Parses a version, tolerating a leading `v`
pub fn parse_version(s: &str) -> Option<Version> {
    let s = s.trim();
    Version::parse(s.strip_prefix('v').unwrap_or(s)).ok()
}

/// Compare two version strings; semver when both parse, numeric parts otherwise
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    if let (Some(va), Some(vb)) = (parse_version(a), parse_version(b)) {
        return va.cmp(&vb);
    }

    let parse_parts = |s: &str| -> Vec<u64> {
        let s = s.strip_prefix('v').unwrap_or(s);
        s.split(['.', '-']).filter_map(|p| p.parse().ok()).collect()
    };

    let parts_a = parse_parts(a);
    let parts_b = parse_parts(b);

    for (pa, pb) in parts_a.iter().zip(parts_b.iter()) {
        match pa.cmp(pb) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    parts_a.len().cmp(&parts_b.len())
}

/// Returns true if the version carries a prerelease tag (alpha, beta, rc, ...)
pub fn is_prerelease_version(version: &str) -> bool {
    match parse_version(version) {
        Some(v) => !v.pre.is_empty(),
        None => version.contains('-'),
    }
}

/// Converts an npm range into semver requirements, one per `||` alternative
pub fn npm_range_to_reqs(range: &str) -> Option<Vec<VersionReq>> {
    range
        .split("||")
        .map(|alternative| {
            let converted = convert_alternative(alternative.trim())?;
            VersionReq::parse(&converted).ok()
        })
        .collect()
}

/// Returns whether `version` satisfies the npm `range`; None when either is unparseable
pub fn satisfies(version: &str, range: &str) -> Option<bool> {
    let version = parse_version(version)?;
    let reqs = npm_range_to_reqs(range)?;
    Some(reqs.iter().any(|req| req.matches(&version)))
}

fn convert_alternative(alternative: &str) -> Option<String> {
    if alternative.is_empty() || alternative == "*" || alternative.eq_ignore_ascii_case("x") {
        return Some("*".to_string());
    }

    // Hyphen range: "1.0.0 - 2.0.0"
    if let Some((low, high)) = alternative.split_once(" - ") {
        return Some(format!(
            ">={}, <={}",
            low.trim().trim_start_matches('v'),
            high.trim().trim_start_matches('v')
        ));
    }

    // Re-attach operators separated from their version by whitespace (">= 1.0.0")
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op = String::new();
    for token in alternative.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '^' | '~')) {
            pending_op.push_str(token);
            continue;
        }
        comparators.push(format!("{}{}", pending_op, token));
        pending_op.clear();
    }
    if !pending_op.is_empty() || comparators.is_empty() {
        return None;
    }

    let converted: Vec<String> = comparators.iter().map(|c| convert_comparator(c)).collect();
    Some(converted.join(", "))
}

fn convert_comparator(comparator: &str) -> String {
    let op_len = comparator
        .find(|c: char| !matches!(c, '<' | '>' | '=' | '^' | '~'))
        .unwrap_or(comparator.len());
    let (op, version) = comparator.split_at(op_len);
    let version = version.trim_start_matches('v');

    if !op.is_empty() {
        return format!("{}{}", op, version);
    }

    // npm treats a bare full version as exact and a partial one as a wildcard
    let parts = version.split('.').count();
    let is_wildcard = version.contains(['x', 'X', '*']);
    if parts >= 3 && !is_wildcard {
        format!("={}", version)
    } else if is_wildcard {
        version.to_string()
    } else {
        format!("{}.*", version)
    }
}
