//! Pull request lifecycle
//!
//! This module provides:
//! - PullRequestRecord: branch name, title, description and files for one accepted update
//! - PullRequestCreator: idempotent branch/commit/PR creation
//! - PullRequestUpdater: pushes a new commit onto an existing pull request's branch

mod creator;
mod updater;

pub use creator::PullRequestCreator;
pub use updater::PullRequestUpdater;

use crate::domain::{Dependency, DependencyFile, PackageManager, Source};
use crate::provider::AuthorDetails;

/// Prefix of every branch this tool creates
pub const BRANCH_PREFIX: &str = "depbot";

/// Label attached to every pull request
pub const DEPENDENCIES_LABEL: &str = "dependencies";

/// Everything needed to submit one accepted update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRecord {
    pub branch_name: String,
    pub base_commit: String,
    /// Target branch; the provider's default branch when absent
    pub target_branch: Option<String>,
    pub files: Vec<DependencyFile>,
    pub commit_message: String,
    pub title: String,
    pub description: String,
    pub labels: Vec<String>,
    pub author: Option<AuthorDetails>,
}

impl PullRequestRecord {
    /// Builds the record for an accepted update set; the target dependency comes first
    pub fn build(
        source: &Source,
        package_manager: PackageManager,
        dependencies: &[Dependency],
        files: Vec<DependencyFile>,
        base_commit: impl Into<String>,
    ) -> Self {
        let title = title(source, dependencies);
        let description = description(dependencies);
        let commit_message = format!("{}\n\n{}", title, description);

        Self {
            branch_name: branch_name(source, package_manager, dependencies),
            base_commit: base_commit.into(),
            target_branch: source.branch.clone(),
            files,
            commit_message,
            title,
            description,
            labels: vec![
                DEPENDENCIES_LABEL.to_string(),
                package_manager.label().to_string(),
            ],
            author: None,
        }
    }

    /// Sets the commit author (builder pattern)
    pub fn with_author(mut self, author: AuthorDetails) -> Self {
        self.author = Some(author);
        self
    }

    /// Names of the files carried by this record
    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.name.clone()).collect()
    }
}

/// `depbot/<package-manager>/<dir>/<name>-<version>`; the dir segment is omitted for `/`
pub fn branch_name(
    source: &Source,
    package_manager: PackageManager,
    dependencies: &[Dependency],
) -> String {
    let names: Vec<String> = dependencies
        .iter()
        .map(|d| d.name.replace('@', ""))
        .collect();
    let version = dependencies
        .first()
        .map(|d| d.display_version().to_string())
        .unwrap_or_default();

    let mut segments = vec![BRANCH_PREFIX.to_string(), package_manager.tag().to_string()];
    let dir = source.directory.trim_matches('/');
    if !dir.is_empty() {
        segments.push(dir.to_string());
    }
    segments.push(format!("{}-{}", names.join("-and-"), version));
    segments.join("/")
}

/// `Bump <name> from <prev> to <new>`, or `Bump a, b and c` for multiple dependencies
pub fn title(source: &Source, dependencies: &[Dependency]) -> String {
    let mut title = match dependencies {
        [single] => format!(
            "Bump {} from {} to {}",
            single.name,
            previous_label(single),
            single.display_version()
        ),
        _ => format!("Bump {}", join_names(dependencies)),
    };

    if source.directory != "/" {
        title.push_str(&format!(" in {}", source.directory));
    }
    title
}

/// Markdown body listing every updated dependency and changed requirement
pub fn description(dependencies: &[Dependency]) -> String {
    let mut lines = Vec::new();

    for dep in dependencies {
        lines.push(format!(
            "Bumps `{}` from {} to {}.",
            dep.name,
            previous_label(dep),
            dep.display_version()
        ));
    }

    let changed: Vec<&Dependency> = dependencies
        .iter()
        .filter(|d| d.requirements_changed())
        .collect();
    if !changed.is_empty() {
        lines.push(String::new());
        lines.push("| Dependency | File | From | To |".to_string());
        lines.push("|---|---|---|---|".to_string());
        for dep in changed {
            let previous = dep.previous_requirements.as_deref().unwrap_or_default();
            for req in &dep.requirements {
                let before = previous
                    .iter()
                    .find(|p| p.file == req.file)
                    .and_then(|p| p.requirement.as_deref())
                    .unwrap_or("-");
                let after = req.requirement.as_deref().unwrap_or("-");
                if before != after {
                    lines.push(format!("| {} | {} | `{}` | `{}` |", dep.name, req.file, before, after));
                }
            }
        }
    }

    lines.join("\n")
}

fn previous_label(dep: &Dependency) -> String {
    if let Some(version) = dep.previous_version.as_deref() {
        return version.to_string();
    }
    dep.previous_requirements
        .as_deref()
        .and_then(|reqs| reqs.iter().find_map(|r| r.requirement.clone()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn join_names(dependencies: &[Dependency]) -> String {
    let names: Vec<&str> = dependencies.iter().map(|d| d.name.as_str()).collect();
    match names.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} and {}", rest.join(", "), last),
        Some((last, _)) => last.to_string(),
        None => String::new(),
    }
}
