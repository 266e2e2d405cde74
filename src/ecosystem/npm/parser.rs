//! package.json and lock file parser
//!
//! Handles:
//! - dependencies
//! - devDependencies
//! - peerDependencies
//! - optionalDependencies
//!
//! Installed versions come from `package-lock.json`/`npm-shrinkwrap.json`
//! (v1 `dependencies`, v2/v3 `packages`) and `yarn.lock`. Locked packages not
//! declared in any manifest become transitive dependencies.

use super::requirement::{is_non_registry, parse_requirement};
use crate::domain::{Dependency, FileSnapshot, PackageManager, Requirement};
use crate::ecosystem::FileParser;
use crate::error::FetchError;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

const DEPENDENCY_GROUPS: [&str; 4] = [
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

static YARN_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s+version:?\s+"?([^"\s]+)"?"#).unwrap());

/// Parser for npm, yarn and pnpm projects
pub struct NpmParser;

impl FileParser for NpmParser {
    fn parse(&self, snapshot: &FileSnapshot) -> Result<Vec<Dependency>, FetchError> {
        let pm = PackageManager::NpmAndYarn;
        let fingerprint = snapshot.fingerprint();

        // name -> requirements, in first-declaration order
        let mut declared: Vec<(String, Vec<Requirement>)> = Vec::new();
        for manifest in snapshot.files().iter().filter(|f| pm.is_manifest(&f.name)) {
            for (name, requirement) in parse_manifest(&manifest.name, &manifest.content)? {
                match declared.iter_mut().find(|(n, _)| *n == name) {
                    Some((_, requirements)) => requirements.push(requirement),
                    None => declared.push((name, vec![requirement])),
                }
            }
        }

        let mut locked: BTreeMap<String, String> = BTreeMap::new();
        for lockfile in snapshot.files().iter().filter(|f| pm.is_lockfile(&f.name)) {
            let versions = if lockfile.name.ends_with(".json") {
                parse_package_lock(&lockfile.name, &lockfile.content)?
            } else if lockfile.name.ends_with("yarn.lock") {
                parse_yarn_lock(&lockfile.content)
            } else {
                BTreeMap::new()
            };
            for (name, version) in versions {
                locked.entry(name).or_insert(version);
            }
        }

        let mut dependencies: Vec<Dependency> = declared
            .into_iter()
            .map(|(name, requirements)| {
                let version = locked.get(&name).cloned().or_else(|| pinned_version(&requirements));
                Dependency::new(name, version, requirements, pm).with_snapshot(fingerprint.clone())
            })
            .collect();

        for (name, version) in locked {
            if !dependencies.iter().any(|d| d.name == name) {
                dependencies.push(Dependency::transitive(name, version, pm).with_snapshot(fingerprint.clone()));
            }
        }

        debug!(
            total = dependencies.len(),
            top_level = dependencies.iter().filter(|d| d.top_level).count(),
            "parsed dependencies"
        );
        Ok(dependencies)
    }
}

/// Parses every dependency group of one package.json
fn parse_manifest(file: &str, content: &str) -> Result<Vec<(String, Requirement)>, FetchError> {
    let json: Value =
        serde_json::from_str(content).map_err(|e| FetchError::unparseable(file, e.to_string()))?;

    let mut output = Vec::new();
    for group in DEPENDENCY_GROUPS {
        if let Some(deps) = json.get(group).and_then(|v| v.as_object()) {
            parse_dependency_object(file, group, deps, &mut output);
        }
    }
    Ok(output)
}

fn parse_dependency_object(
    file: &str,
    group: &str,
    deps: &Map<String, Value>,
    output: &mut Vec<(String, Requirement)>,
) {
    for (name, value) in deps {
        let Some(text) = value.as_str() else {
            continue;
        };
        let mut requirement = Requirement::new(file, text, vec![group.to_string()]);
        if is_non_registry(text) {
            requirement.source = Some(text.to_string());
        }
        output.push((name.clone(), requirement));
    }
}

fn pinned_version(requirements: &[Requirement]) -> Option<String> {
    requirements
        .iter()
        .filter_map(|r| r.requirement.as_deref().and_then(parse_requirement))
        .find(|spec| spec.is_pinned())
        .map(|spec| spec.version)
}

/// Top-level installed versions from package-lock.json / npm-shrinkwrap.json
fn parse_package_lock(file: &str, content: &str) -> Result<BTreeMap<String, String>, FetchError> {
    let json: Value =
        serde_json::from_str(content).map_err(|e| FetchError::unparseable(file, e.to_string()))?;
    let mut versions = BTreeMap::new();

    // lockfileVersion 2/3
    if let Some(packages) = json.get("packages").and_then(|v| v.as_object()) {
        for (path, entry) in packages {
            let Some(name) = path.strip_prefix("node_modules/") else {
                continue;
            };
            if name.contains("/node_modules/") {
                continue;
            }
            if let Some(version) = entry.get("version").and_then(|v| v.as_str()) {
                versions.insert(name.to_string(), version.to_string());
            }
        }
        return Ok(versions);
    }

    // lockfileVersion 1
    if let Some(deps) = json.get("dependencies").and_then(|v| v.as_object()) {
        for (name, entry) in deps {
            if let Some(version) = entry.get("version").and_then(|v| v.as_str()) {
                versions.insert(name.clone(), version.to_string());
            }
        }
    }
    Ok(versions)
}

/// Installed versions from yarn.lock (v1 and berry)
fn parse_yarn_lock(content: &str) -> BTreeMap<String, String> {
    let mut versions = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        if !line.starts_with(char::is_whitespace) {
            current = line.trim_end_matches(':').split(',').next().and_then(yarn_entry_name);
            continue;
        }
        if let Some(caps) = YARN_VERSION_RE.captures(line) {
            if let Some(name) = current.take() {
                versions.entry(name).or_insert_with(|| caps[1].to_string());
            }
        }
    }
    versions
}

/// `"@scope/name@^1.0.0"` → `@scope/name`
fn yarn_entry_name(spec: &str) -> Option<String> {
    let spec = spec.trim().trim_matches('"');
    let at = spec.get(1..)?.find('@')? + 1;
    let name = &spec[..at];
    (!name.is_empty() && name != "__metadata").then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DependencyFile, FileType};

    fn snapshot(files: Vec<(&str, &str, FileType)>) -> FileSnapshot {
        FileSnapshot::new(
            files
                .into_iter()
                .map(|(name, content, file_type)| DependencyFile::new(name, "/", content, file_type))
                .collect(),
        )
    }

    const PACKAGE_JSON: &str = r#"{
        "dependencies": {"left-pad": "1.0.0", "react": "^18.2.0", "private": "git+https://example.com/p.git"},
        "devDependencies": {"typescript": "^5.0.0"},
        "peerDependencies": {"react": ">=17.0.0"}
    }"#;

    #[test]
    fn test_parse_manifest_groups() {
        let deps = NpmParser
            .parse(&snapshot(vec![("package.json", PACKAGE_JSON, FileType::Manifest)]))
            .unwrap();

        assert_eq!(deps.len(), 4);
        assert!(deps.iter().all(|d| d.top_level));

        let react = deps.iter().find(|d| d.name == "react").unwrap();
        assert_eq!(react.requirements.len(), 2);
        assert_eq!(react.requirements[0].groups, vec!["dependencies"]);
        assert_eq!(react.requirements[1].groups, vec!["peerDependencies"]);
        assert_eq!(react.version, None);

        let left_pad = deps.iter().find(|d| d.name == "left-pad").unwrap();
        assert_eq!(left_pad.version.as_deref(), Some("1.0.0"));

        let private = deps.iter().find(|d| d.name == "private").unwrap();
        assert!(private.requirements[0].source.is_some());
    }

    #[test]
    fn test_versions_from_package_lock_v3() {
        let lock = r#"{
            "lockfileVersion": 3,
            "packages": {
                "": {"name": "app"},
                "node_modules/react": {"version": "18.2.0"},
                "node_modules/loose-envify": {"version": "1.4.0"},
                "node_modules/react/node_modules/nested": {"version": "0.1.0"}
            }
        }"#;
        let snap = snapshot(vec![
            ("package.json", PACKAGE_JSON, FileType::Manifest),
            ("package-lock.json", lock, FileType::Lockfile),
        ]);
        let deps = NpmParser.parse(&snap).unwrap();

        let react = deps.iter().find(|d| d.name == "react").unwrap();
        assert_eq!(react.version.as_deref(), Some("18.2.0"));

        let envify = deps.iter().find(|d| d.name == "loose-envify").unwrap();
        assert!(!envify.top_level);
        assert_eq!(envify.version.as_deref(), Some("1.4.0"));
        assert!(deps.iter().all(|d| d.name != "nested"));
        assert!(deps.iter().all(|d| d.snapshot.as_deref() == Some(snap.fingerprint().as_str())));
    }

    #[test]
    fn test_versions_from_package_lock_v1() {
        let lock = r#"{"lockfileVersion": 1, "dependencies": {"left-pad": {"version": "1.0.0"}}}"#;
        assert_eq!(
            parse_package_lock("package-lock.json", lock).unwrap().get("left-pad"),
            Some(&"1.0.0".to_string())
        );
    }

    #[test]
    fn test_versions_from_yarn_lock() {
        let lock = "# yarn lockfile v1\n\n\
                    \"@babel/core@^7.0.0\", \"@babel/core@^7.1.0\":\n  version \"7.22.5\"\n  resolved \"x\"\n\n\
                    left-pad@^1.0.0:\n  version \"1.3.0\"\n";
        let versions = parse_yarn_lock(lock);
        assert_eq!(versions.get("@babel/core"), Some(&"7.22.5".to_string()));
        assert_eq!(versions.get("left-pad"), Some(&"1.3.0".to_string()));
    }

    #[test]
    fn test_malformed_manifest() {
        let err = NpmParser
            .parse(&snapshot(vec![("package.json", "{ not json", FileType::Manifest)]))
            .unwrap_err();
        assert!(matches!(err, FetchError::Unparseable { .. }));
    }
}
