//! In-memory provider
//!
//! Keeps branches, pull requests and files in process memory and records every
//! write. Used to exercise the pipeline without a git-hosting service.

use super::{AuthorDetails, BranchRef, Provider, PullRequestInfo};
use crate::domain::DependencyFile;
use crate::error::ProviderError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// A commit pushed through the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommit {
    pub branch: String,
    pub base_commit: String,
    pub message: String,
    pub files: Vec<DependencyFile>,
}

/// A pull request opened through the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPullRequest {
    pub title: String,
    pub source_branch: String,
    pub target_branch: String,
    pub description: String,
    pub labels: Vec<String>,
}

#[derive(Default)]
struct State {
    branches: HashMap<String, String>,
    pull_requests: Vec<PullRequestInfo>,
    files: HashMap<String, String>,
    commits: Vec<RecordedCommit>,
    created: Vec<RecordedPullRequest>,
}

/// Provider backed by process memory
pub struct MemoryProvider {
    default_branch: String,
    tip: String,
    state: Mutex<State>,
    calls: AtomicUsize,
    commit_failure: Option<(u16, String)>,
    pull_request_failure: Option<(u16, String)>,
}

impl MemoryProvider {
    /// Creates an empty provider whose default branch is `default_branch`
    pub fn new(default_branch: impl Into<String>) -> Self {
        Self {
            default_branch: default_branch.into(),
            tip: "0000000000000000000000000000000000000000".to_string(),
            state: Mutex::new(State::default()),
            calls: AtomicUsize::new(0),
            commit_failure: None,
            pull_request_failure: None,
        }
    }

    /// Sets the tip commit reported for every branch (builder pattern)
    pub fn with_tip(mut self, commit: impl Into<String>) -> Self {
        self.tip = commit.into();
        self
    }

    /// Makes every commit fail with the given status (builder pattern)
    pub fn failing_commits(mut self, status: u16, message: impl Into<String>) -> Self {
        self.commit_failure = Some((status, message.into()));
        self
    }

    /// Makes every pull request creation fail with the given status (builder pattern)
    pub fn failing_pull_requests(mut self, status: u16, message: impl Into<String>) -> Self {
        self.pull_request_failure = Some((status, message.into()));
        self
    }

    /// Adds a file at repository path `path`
    pub fn add_file(&self, path: impl Into<String>, content: impl Into<String>) {
        self.lock().files.insert(path.into(), content.into());
    }

    /// Adds an existing branch
    pub fn add_branch(&self, name: impl Into<String>, object_id: impl Into<String>) {
        self.lock().branches.insert(name.into(), object_id.into());
    }

    /// Adds an open pull request
    pub fn add_pull_request(
        &self,
        number: u64,
        source_branch: impl Into<String>,
        target_branch: impl Into<String>,
    ) {
        self.lock().pull_requests.push(PullRequestInfo {
            number,
            title: String::new(),
            source_branch: source_branch.into(),
            target_branch: target_branch.into(),
        });
    }

    /// Commits pushed so far
    pub fn commits(&self) -> Vec<RecordedCommit> {
        self.lock().commits.clone()
    }

    /// Pull requests opened so far
    pub fn created_pull_requests(&self) -> Vec<RecordedPullRequest> {
        self.lock().created.clone()
    }

    /// Number of write operations performed
    pub fn write_count(&self) -> usize {
        let state = self.lock();
        state.commits.len() + state.created.len()
    }

    /// Number of provider calls of any kind
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicked test thread must not hide the recorded state from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    async fn branch(&self, name: &str) -> Result<Option<BranchRef>, ProviderError> {
        self.record_call();
        Ok(self.lock().branches.get(name).map(|object_id| BranchRef {
            name: format!("refs/heads/{}", name),
            object_id: object_id.clone(),
        }))
    }

    async fn pull_requests(
        &self,
        source_branch: &str,
        target_branch: &str,
    ) -> Result<Vec<PullRequestInfo>, ProviderError> {
        self.record_call();
        Ok(self
            .lock()
            .pull_requests
            .iter()
            .filter(|pr| pr.source_branch == source_branch && pr.target_branch == target_branch)
            .cloned()
            .collect())
    }

    async fn create_commit(
        &self,
        branch: &str,
        base_commit: &str,
        message: &str,
        files: &[DependencyFile],
        _author: Option<&AuthorDetails>,
    ) -> Result<(), ProviderError> {
        self.record_call();
        if let Some((status, ref message)) = self.commit_failure {
            return Err(ProviderError::api("creating commit", status, message.clone()));
        }

        let mut state = self.lock();
        let object_id = format!("commit-{}", state.commits.len() + 1);
        state.branches.insert(branch.to_string(), object_id);
        state.commits.push(RecordedCommit {
            branch: branch.to_string(),
            base_commit: base_commit.to_string(),
            message: message.to_string(),
            files: files.to_vec(),
        });
        Ok(())
    }

    async fn create_pull_request(
        &self,
        title: &str,
        source_branch: &str,
        target_branch: &str,
        description: &str,
        labels: &[String],
    ) -> Result<PullRequestInfo, ProviderError> {
        self.record_call();
        if let Some((status, ref message)) = self.pull_request_failure {
            return Err(ProviderError::api("creating pull request", status, message.clone()));
        }

        let mut state = self.lock();
        let info = PullRequestInfo {
            number: state.pull_requests.len() as u64 + 1,
            title: title.to_string(),
            source_branch: source_branch.to_string(),
            target_branch: target_branch.to_string(),
        };
        state.pull_requests.push(info.clone());
        state.created.push(RecordedPullRequest {
            title: title.to_string(),
            source_branch: source_branch.to_string(),
            target_branch: target_branch.to_string(),
            description: description.to_string(),
            labels: labels.to_vec(),
        });
        Ok(info)
    }

    async fn get_pull_request(&self, number: u64) -> Result<Option<PullRequestInfo>, ProviderError> {
        self.record_call();
        Ok(self
            .lock()
            .pull_requests
            .iter()
            .find(|pr| pr.number == number)
            .cloned())
    }

    async fn fetch_default_branch(&self, _repo: &str) -> Result<String, ProviderError> {
        self.record_call();
        Ok(self.default_branch.clone())
    }

    async fn fetch_commit(&self, _branch: &str) -> Result<String, ProviderError> {
        self.record_call();
        Ok(self.tip.clone())
    }

    async fn fetch_file(&self, _commit: &str, path: &str) -> Result<Option<String>, ProviderError> {
        self.record_call();
        Ok(self.lock().files.get(path.trim_start_matches('/')).cloned())
    }
}
