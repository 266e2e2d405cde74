//! Repository source description

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Git-hosting provider kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Azure DevOps repositories
    Azure,
}

impl ProviderKind {
    /// Host used to select git-source credentials
    pub fn hostname(&self) -> &'static str {
        match self {
            ProviderKind::Azure => "dev.azure.com",
        }
    }

    /// REST API base URL
    pub fn api_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::Azure => "https://dev.azure.com/",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "azure" => Ok(ProviderKind::Azure),
            other => Err(ConfigError::UnsupportedProvider {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Azure => write!(f, "azure"),
        }
    }
}

/// Where dependency files are read from and where pull requests are targeted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Git-hosting provider
    pub provider: ProviderKind,
    /// Repository identifier (e.g. `org/project/_git/repo`)
    pub repo: String,
    /// Directory holding the dependency files, always starting with `/`
    pub directory: String,
    /// Target branch; the provider's default branch when absent
    pub branch: Option<String>,
    /// Commit to read files from; the branch tip when absent
    pub commit: Option<String>,
}

impl Source {
    /// Creates a new Source, normalising the directory
    pub fn new(
        provider: ProviderKind,
        repo: impl Into<String>,
        directory: impl AsRef<str>,
        branch: Option<String>,
        commit: Option<String>,
    ) -> Self {
        Self {
            provider,
            repo: repo.into(),
            directory: normalize_directory(directory.as_ref()),
            branch,
            commit,
        }
    }

    /// Returns the repository path split into segments
    pub fn repo_segments(&self) -> Vec<&str> {
        self.repo.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Returns the path of a file relative to the repository root
    pub fn file_path(&self, name: &str) -> String {
        let dir = self.directory.trim_matches('/');
        if dir.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", dir, name)
        }
    }
}

/// Normalises a directory to a leading-slash, no-trailing-slash form
pub fn normalize_directory(directory: &str) -> String {
    let trimmed = directory.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}
