//! package.json requirement rewriting
//!
//! Uses regex-based text replacement so formatting and key order survive.
//! Each requirement is rewritten inside its own dependency group, so a
//! package declared in several groups is updated once per group.

use crate::domain::{Dependency, DependencyFile, Requirement};
use crate::error::UpdaterError;
use crate::regenerate::ManifestGenerator;
use regex::Regex;

/// Rewrites changed requirements in package.json files
pub struct PackageJsonGenerator;

impl ManifestGenerator for PackageJsonGenerator {
    fn updated_manifest_content(
        &self,
        manifest: &DependencyFile,
        dependencies: &[Dependency],
    ) -> Result<String, UpdaterError> {
        let mut content = manifest.content.clone();

        for dependency in dependencies {
            for requirement in dependency.requirements.iter().filter(|r| r.file == manifest.name) {
                let Some(new) = requirement.requirement.as_deref() else {
                    continue;
                };
                let Some(old) = previous_requirement(dependency, requirement) else {
                    continue;
                };
                if old == new {
                    continue;
                }
                content = update_requirement(
                    &content,
                    &manifest.name,
                    &dependency.name,
                    requirement.groups.first().map(String::as_str),
                    old,
                    new,
                )?;
            }
        }

        Ok(content)
    }
}

fn previous_requirement<'d>(dependency: &'d Dependency, requirement: &Requirement) -> Option<&'d str> {
    dependency
        .previous_requirements
        .as_ref()?
        .iter()
        .find(|r| r.file == requirement.file && r.groups == requirement.groups)
        .and_then(|r| r.requirement.as_deref())
}

/// Replaces `"package": "old"` with `"package": "new"` inside `group`.
///
/// Without a group, or when the group object cannot be found, every
/// declaration in the file is rewritten.
pub fn update_requirement(
    content: &str,
    file: &str,
    package: &str,
    group: Option<&str>,
    old: &str,
    new: &str,
) -> Result<String, UpdaterError> {
    // Escape special characters in package name (e.g., @scope/package)
    let pattern = format!(
        r#"("{}"\s*:\s*)"{}""#,
        regex::escape(package),
        regex::escape(old)
    );
    let re = Regex::new(&pattern).map_err(|e| UpdaterError::ManifestUpdate {
        file: file.to_string(),
        dependency: package.to_string(),
        message: format!("invalid regex pattern: {}", e),
    })?;

    let (start, end) = group
        .and_then(|g| group_span(content, g))
        .unwrap_or((0, content.len()));
    let scope = &content[start..end];

    if !re.is_match(scope) {
        return Err(UpdaterError::ManifestUpdate {
            file: file.to_string(),
            dependency: package.to_string(),
            message: match group {
                Some(g) => format!("requirement \"{}\" not found in {}", old, g),
                None => format!("requirement \"{}\" not found", old),
            },
        });
    }

    let replaced = re.replace_all(scope, |caps: &regex::Captures| {
        format!(r#"{}"{}""#, &caps[1], new)
    });
    Ok(format!("{}{}{}", &content[..start], replaced, &content[end..]))
}

/// Byte range of the body of the `"group": { ... }` object
fn group_span(content: &str, group: &str) -> Option<(usize, usize)> {
    let re = Regex::new(&format!(r#""{}"\s*:\s*\{{"#, regex::escape(group))).ok()?;
    let start = re.find(content)?.end();

    let mut depth = 1usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in content[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, start + offset));
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FileType, PackageManager};

    const PACKAGE_JSON: &str = r#"{
  "name": "app",
  "dependencies": {
    "left-pad": "1.0.0",
    "@scope/util":   "^2.1.0"
  },
  "devDependencies": {
    "typescript": "~5.0.0"
  }
}
"#;

    fn manifest() -> DependencyFile {
        DependencyFile::new("package.json", "/", PACKAGE_JSON, FileType::Manifest)
    }

    fn bump(name: &str, old: &str, new_req: &str, new_version: &str, group: &str) -> Dependency {
        let dep = Dependency::new(
            name,
            Some(old.trim_start_matches(['^', '~']).to_string()),
            vec![Requirement::new("package.json", old, vec![group.to_string()])],
            PackageManager::NpmAndYarn,
        );
        let req = dep.requirements[0].with_requirement(new_req);
        dep.updated(new_version, vec![req])
    }

    #[test]
    fn test_update_preserves_formatting() {
        let dep = bump("left-pad", "1.0.0", "1.3.0", "1.3.0", "dependencies");
        let updated = PackageJsonGenerator
            .updated_manifest_content(&manifest(), &[dep])
            .unwrap();
        assert_eq!(updated, PACKAGE_JSON.replace(r#""left-pad": "1.0.0""#, r#""left-pad": "1.3.0""#));
    }

    #[test]
    fn test_update_scoped_package_with_spacing() {
        let dep = bump("@scope/util", "^2.1.0", "^3.0.0", "3.0.0", "dependencies");
        let updated = PackageJsonGenerator
            .updated_manifest_content(&manifest(), &[dep])
            .unwrap();
        assert!(updated.contains(r#""@scope/util":   "^3.0.0""#));
    }

    #[test]
    fn test_unchanged_requirement_leaves_content() {
        let dep = bump("typescript", "~5.0.0", "~5.0.0", "5.0.4", "devDependencies");
        let updated = PackageJsonGenerator
            .updated_manifest_content(&manifest(), &[dep])
            .unwrap();
        assert_eq!(updated, PACKAGE_JSON);
    }

    #[test]
    fn test_missing_requirement_is_error() {
        let dep = bump("left-pad", "0.9.0", "1.3.0", "1.3.0", "dependencies");
        let err = PackageJsonGenerator
            .updated_manifest_content(&manifest(), &[dep])
            .unwrap_err();
        assert!(matches!(err, UpdaterError::ManifestUpdate { .. }));
    }

    #[test]
    fn test_same_requirement_in_two_groups() {
        let content = r#"{
  "peerDependencies": {
    "react": "^17.0.0"
  },
  "devDependencies": {
    "react": "^17.0.0"
  }
}
"#;
        let file = DependencyFile::new("package.json", "/", content, FileType::Manifest);
        let dep = Dependency::new(
            "react",
            Some("17.0.2".to_string()),
            vec![
                Requirement::new("package.json", "^17.0.0", vec!["peerDependencies".to_string()]),
                Requirement::new("package.json", "^17.0.0", vec!["devDependencies".to_string()]),
            ],
            PackageManager::NpmAndYarn,
        );
        let reqs = dep
            .requirements
            .iter()
            .map(|r| r.with_requirement("^18.0.0"))
            .collect();
        let dep = dep.updated("18.2.0", reqs);

        let updated = PackageJsonGenerator
            .updated_manifest_content(&file, &[dep])
            .unwrap();
        assert_eq!(updated, content.replace("^17.0.0", "^18.0.0"));
    }

    #[test]
    fn test_update_limited_to_group() {
        let content = r#"{
  "dependencies": { "react": "^17.0.0" },
  "peerDependencies": { "react": "^17.0.0" }
}"#;
        let updated = update_requirement(content, "package.json", "react", Some("dependencies"), "^17.0.0", "^18.0.0")
            .unwrap();
        assert_eq!(
            updated,
            r#"{
  "dependencies": { "react": "^18.0.0" },
  "peerDependencies": { "react": "^17.0.0" }
}"#
        );
    }

    #[test]
    fn test_group_span_skips_braces_in_strings() {
        let content = r#"{"scripts": {"x": "echo }"}, "dependencies": {"a": "1"}}"#;
        let (start, end) = group_span(content, "scripts").unwrap();
        assert_eq!(&content[start..end], r#""x": "echo }""#);
    }

    #[test]
    fn test_other_files_ignored() {
        let dep = bump("left-pad", "1.0.0", "1.3.0", "1.3.0", "dependencies");
        let other = DependencyFile::new("packages/a/package.json", "/", PACKAGE_JSON, FileType::Manifest);
        let updated = PackageJsonGenerator
            .updated_manifest_content(&other, &[dep])
            .unwrap();
        assert_eq!(updated, PACKAGE_JSON);
    }
}
