//! Idempotent pull request creation

use super::PullRequestRecord;
use crate::domain::{PullRequestStatus, Source};
use crate::error::ProviderError;
use crate::provider::Provider;

/// Creates a branch, commit and pull request unless they already exist
pub struct PullRequestCreator<'a> {
    provider: &'a dyn Provider,
    source: &'a Source,
}

impl<'a> PullRequestCreator<'a> {
    /// Creates a new creator
    pub fn new(provider: &'a dyn Provider, source: &'a Source) -> Self {
        Self { provider, source }
    }

    /// Resolves the target branch of the record
    pub async fn target_branch(&self, record: &PullRequestRecord) -> Result<String, ProviderError> {
        match record.target_branch {
            Some(ref branch) => Ok(branch.clone()),
            None => self.provider.fetch_default_branch(&self.source.repo).await,
        }
    }

    /// Returns true if both the branch and an open pull request from it exist
    pub async fn pull_request_exists(
        &self,
        record: &PullRequestRecord,
        target_branch: &str,
    ) -> Result<bool, ProviderError> {
        if self.provider.branch(&record.branch_name).await?.is_none() {
            return Ok(false);
        }
        let open = self
            .provider
            .pull_requests(&record.branch_name, target_branch)
            .await?;
        Ok(!open.is_empty())
    }

    /// Runs `start → create-commit → create-pull-request`, or stops at `already-open`
    ///
    /// A failed pull request creation leaves the pushed commit in place.
    pub async fn create(&self, record: &PullRequestRecord) -> Result<PullRequestStatus, ProviderError> {
        let target_branch = self.target_branch(record).await?;

        if self.pull_request_exists(record, &target_branch).await? {
            tracing::info!(branch = %record.branch_name, "pull request already open");
            return Ok(PullRequestStatus::AlreadyOpen {
                branch: record.branch_name.clone(),
            });
        }

        self.provider
            .create_commit(
                &record.branch_name,
                &record.base_commit,
                &record.commit_message,
                &record.files,
                record.author.as_ref(),
            )
            .await?;

        self.provider
            .create_pull_request(
                &record.title,
                &record.branch_name,
                &target_branch,
                &record.description,
                &record.labels,
            )
            .await?;

        Ok(PullRequestStatus::Created {
            branch: record.branch_name.clone(),
        })
    }
}
