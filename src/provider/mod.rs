//! Git-hosting provider clients
//!
//! This module provides:
//! - The provider trait consumed by the file fetcher and pull request lifecycle
//! - Azure DevOps REST implementation
//! - In-memory implementation recording every write

mod azure;
mod memory;

pub use azure::{AzureProvider, AzureRepo};
pub use memory::{MemoryProvider, RecordedCommit, RecordedPullRequest};

use crate::domain::{Credentials, DependencyFile, ProviderKind, Source};
use crate::error::{ConfigError, ProviderError};
use crate::http::HttpClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A branch reference as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    /// Full ref name (`refs/heads/...`)
    pub name: String,
    /// Commit the branch points at
    pub object_id: String,
}

/// Minimal pull request metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub number: u64,
    pub title: String,
    /// Source branch without the `refs/heads/` prefix
    pub source_branch: String,
    /// Target branch without the `refs/heads/` prefix
    pub target_branch: String,
}

/// Commit author metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorDetails {
    pub name: String,
    pub email: String,
}

/// Operations the pipeline needs from a git-hosting provider
#[async_trait]
pub trait Provider: Send + Sync {
    /// Looks up a branch; `None` when it does not exist
    async fn branch(&self, name: &str) -> Result<Option<BranchRef>, ProviderError>;

    /// Lists active pull requests from `source_branch` into `target_branch`
    async fn pull_requests(
        &self,
        source_branch: &str,
        target_branch: &str,
    ) -> Result<Vec<PullRequestInfo>, ProviderError>;

    /// Pushes one commit carrying `files` on top of `base_commit`, creating the branch if needed
    async fn create_commit(
        &self,
        branch: &str,
        base_commit: &str,
        message: &str,
        files: &[DependencyFile],
        author: Option<&AuthorDetails>,
    ) -> Result<(), ProviderError>;

    /// Opens a pull request
    async fn create_pull_request(
        &self,
        title: &str,
        source_branch: &str,
        target_branch: &str,
        description: &str,
        labels: &[String],
    ) -> Result<PullRequestInfo, ProviderError>;

    /// Fetches a pull request by number; `None` when it does not exist
    async fn get_pull_request(&self, number: u64) -> Result<Option<PullRequestInfo>, ProviderError>;

    /// Returns the default branch name of `repo`
    async fn fetch_default_branch(&self, repo: &str) -> Result<String, ProviderError>;

    /// Returns the tip commit of `branch`
    async fn fetch_commit(&self, branch: &str) -> Result<String, ProviderError>;

    /// Reads a file at a commit; `None` when it does not exist
    async fn fetch_file(&self, commit: &str, path: &str) -> Result<Option<String>, ProviderError>;
}

/// Create a provider client for the given source
pub fn create_provider(
    source: &Source,
    credentials: &Credentials,
    client: HttpClient,
) -> Result<Arc<dyn Provider>, ConfigError> {
    match source.provider {
        ProviderKind::Azure => Ok(Arc::new(AzureProvider::for_source(
            source,
            credentials,
            client,
        )?)),
    }
}

/// Strips the `refs/heads/` prefix from a ref name
pub fn short_ref(name: &str) -> &str {
    name.strip_prefix("refs/heads/").unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_ref() {
        assert_eq!(short_ref("refs/heads/main"), "main");
        assert_eq!(short_ref("main"), "main");
        assert_eq!(short_ref("refs/heads/depbot/npm_and_yarn/a-1.0.0"), "depbot/npm_and_yarn/a-1.0.0");
    }
}
