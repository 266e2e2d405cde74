//! Pushing a refreshed commit onto an existing pull request

use crate::domain::{DependencyFile, PullRequestStatus};
use crate::error::ProviderError;
use crate::provider::Provider;

/// Rewrites the tip of an existing pull request's source branch
pub struct PullRequestUpdater<'a> {
    provider: &'a dyn Provider,
    number: u64,
}

impl<'a> PullRequestUpdater<'a> {
    /// Creates an updater for pull request `number`
    pub fn new(provider: &'a dyn Provider, number: u64) -> Self {
        Self { provider, number }
    }

    /// Commits `files` from `old_commit` onto the pull request's source branch
    ///
    /// Returns `NotFound` without writing when the pull request does not exist.
    pub async fn update(
        &self,
        old_commit: &str,
        commit_message: &str,
        files: &[DependencyFile],
    ) -> Result<PullRequestStatus, ProviderError> {
        let pull_request = match self.provider.get_pull_request(self.number).await? {
            Some(pr) if !pr.source_branch.is_empty() => pr,
            _ => {
                tracing::warn!(number = self.number, "pull request not found; nothing to update");
                return Ok(PullRequestStatus::NotFound {
                    number: self.number,
                });
            }
        };

        self.provider
            .create_commit(&pull_request.source_branch, old_commit, commit_message, files, None)
            .await?;

        Ok(PullRequestStatus::Updated {
            number: self.number,
            branch: pull_request.source_branch,
        })
    }
}
