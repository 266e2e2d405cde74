//! npm requirement text parsing and rewriting
//!
//! Handles version formats:
//! - Exact: `1.2.3`
//! - Caret: `^1.2.3`
//! - Tilde: `~1.2.3`
//! - Comparison: `>=1.2.3`, `>1.2.3`, `<=1.2.3`, `<1.2.3`
//! - Wildcard: `*`, `1.x`, `1.2.*`
//! - Range: `>=1.0.0 <2.0.0`, `1.0.0 - 2.0.0`
//!
//! Git urls, tarballs, `file:`/`link:`/`workspace:` and `npm:` aliases are
//! non-registry sources and are never rewritten.

use crate::domain::{RequirementsUpdateStrategy, VersionSpec, VersionSpecKind};
use crate::version::satisfies;
use regex::Regex;
use std::sync::LazyLock;

static CARET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\^(\d+\.\d+\.\d+(?:-[\w.]+)?)$").unwrap());
static TILDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^~(\d+\.\d+\.\d+(?:-[\w.]+)?)$").unwrap());
static GTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^>=(\d+\.\d+\.\d+(?:-[\w.]+)?)$").unwrap());
static GT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^>(\d+\.\d+\.\d+(?:-[\w.]+)?)$").unwrap());
static LTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<=(\d+\.\d+\.\d+(?:-[\w.]+)?)$").unwrap());
static LT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<(\d+\.\d+\.\d+(?:-[\w.]+)?)$").unwrap());
static EXACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^=?(\d+\.\d+\.\d+(?:-[\w.]+)?)$").unwrap());
static WILDCARD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?\.)?[xX*]$|^\*$").unwrap());
static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[<>=]+\s*\d+\.\d+\.\d+\s+[<>=]+\s*\d+\.\d+\.\d+$|^\d+\.\d+\.\d+\s*-\s*\d+\.\d+\.\d+$|\|\|")
        .unwrap()
});

const NON_REGISTRY_PREFIXES: &[&str] = &[
    "git+", "git:", "git@", "github:", "gitlab:", "bitbucket:", "http:", "https:", "file:",
    "link:", "workspace:", "npm:", "portal:", "patch:",
];

/// Returns true if the requirement points outside the registry
pub fn is_non_registry(requirement: &str) -> bool {
    let trimmed = requirement.trim();
    NON_REGISTRY_PREFIXES
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
        // `user/repo` GitHub shorthand
        || (trimmed.contains('/') && !trimmed.starts_with('@') && !trimmed.contains(' '))
}

/// Parses requirement text into a version spec
pub fn parse_requirement(requirement: &str) -> Option<VersionSpec> {
    let trimmed = requirement.trim();

    if trimmed.is_empty() || is_non_registry(trimmed) {
        return None;
    }

    let prefixed: [(&LazyLock<Regex>, VersionSpecKind, &str); 6] = [
        (&CARET_RE, VersionSpecKind::Caret, "^"),
        (&TILDE_RE, VersionSpecKind::Tilde, "~"),
        (&GTE_RE, VersionSpecKind::GreaterOrEqual, ">="),
        (&GT_RE, VersionSpecKind::Greater, ">"),
        (&LTE_RE, VersionSpecKind::LessOrEqual, "<="),
        (&LT_RE, VersionSpecKind::Less, "<"),
    ];
    for (re, kind, prefix) in prefixed {
        if let Some(caps) = re.captures(trimmed) {
            let version = caps.get(1)?.as_str();
            return Some(VersionSpec::new(kind, trimmed, version).with_prefix(prefix));
        }
    }

    if RANGE_RE.is_match(trimmed) {
        let first_version = trimmed
            .split_whitespace()
            .next()
            .map(|s| s.trim_start_matches(|c: char| !c.is_ascii_digit()).to_string())
            .unwrap_or_default();
        return Some(VersionSpec::new(VersionSpecKind::Range, trimmed, first_version));
    }

    if WILDCARD_RE.is_match(trimmed) {
        return Some(VersionSpec::new(VersionSpecKind::Wildcard, trimmed, trimmed));
    }

    if let Some(caps) = EXACT_RE.captures(trimmed) {
        let version = caps.get(1)?.as_str();
        return Some(VersionSpec::new(VersionSpecKind::Exact, trimmed, version));
    }

    None
}

/// Returns the rewritten requirement text, or the original when it needs no change
///
/// `None` strategy means the default: bump versions.
pub fn updated_requirement(
    current: &str,
    new_version: &str,
    strategy: Option<RequirementsUpdateStrategy>,
) -> String {
    let Some(spec) = parse_requirement(current) else {
        return current.to_string();
    };
    let admits = satisfies(new_version, current).unwrap_or(false);

    match strategy.unwrap_or(RequirementsUpdateStrategy::BumpVersions) {
        RequirementsUpdateStrategy::LockfileOnly => current.to_string(),
        RequirementsUpdateStrategy::BumpVersions if spec.kind.is_rewritable() => {
            spec.format_updated(new_version)
        }
        RequirementsUpdateStrategy::BumpVersionsIfNecessary if spec.kind.is_rewritable() => {
            if admits {
                current.to_string()
            } else {
                spec.format_updated(new_version)
            }
        }
        // Widening, and the fallback for wildcards and ranges
        _ => {
            if admits {
                current.to_string()
            } else if spec.kind.is_pinned() {
                new_version.to_string()
            } else {
                format!("{} || ^{}", current.trim(), new_version)
            }
        }
    }
}
