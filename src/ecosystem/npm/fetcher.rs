//! Reads npm dependency files through the provider

use crate::domain::{DependencyFile, FileSnapshot, FileType, Source};
use crate::ecosystem::FileFetcher;
use crate::error::FetchError;
use crate::provider::Provider;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

const MANIFEST: &str = "package.json";

/// Optional files, in snapshot order
const OPTIONAL_FILES: [(&str, FileType); 7] = [
    ("package-lock.json", FileType::Lockfile),
    ("npm-shrinkwrap.json", FileType::Lockfile),
    ("yarn.lock", FileType::Lockfile),
    ("pnpm-lock.yaml", FileType::Lockfile),
    ("rush.json", FileType::Support),
    ("common/config/rush/pnpm-lock.yaml", FileType::Lockfile),
    (".npmrc", FileType::Support),
];

/// Fetches package.json, lock files and registry configuration once per run
pub struct NpmFetcher {
    source: Source,
    provider: Arc<dyn Provider>,
    commit: OnceCell<String>,
    files: OnceCell<FileSnapshot>,
}

impl NpmFetcher {
    pub fn new(source: Source, provider: Arc<dyn Provider>) -> Self {
        Self {
            source,
            provider,
            commit: OnceCell::new(),
            files: OnceCell::new(),
        }
    }

    async fn resolve_commit(&self) -> Result<String, FetchError> {
        if let Some(commit) = &self.source.commit {
            return Ok(commit.clone());
        }
        let branch = match &self.source.branch {
            Some(branch) => branch.clone(),
            None => self.provider.fetch_default_branch(&self.source.repo).await?,
        };
        let commit = self.provider.fetch_commit(&branch).await?;
        debug!(branch = %branch, commit = %commit, "resolved base commit");
        Ok(commit)
    }

    async fn fetch(&self, commit: &str, name: &str, file_type: FileType) -> Result<Option<DependencyFile>, FetchError> {
        let path = self.source.file_path(name);
        let content = self.provider.fetch_file(commit, &path).await?;
        Ok(content.map(|c| DependencyFile::new(name, self.source.directory.clone(), c, file_type)))
    }

    async fn fetch_files(&self) -> Result<FileSnapshot, FetchError> {
        let commit = self.commit().await?;

        let manifest = self
            .fetch(&commit, MANIFEST, FileType::Manifest)
            .await?
            .ok_or_else(|| FetchError::FileNotFound {
                path: self.source.file_path(MANIFEST),
            })?;

        let mut files = vec![manifest];
        for (name, file_type) in OPTIONAL_FILES {
            if let Some(file) = self.fetch(&commit, name, file_type).await? {
                files.push(file);
            }
        }

        let snapshot = FileSnapshot::new(files);
        info!(
            commit = %commit,
            files = ?snapshot.names(),
            "fetched dependency files"
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl FileFetcher for NpmFetcher {
    async fn files(&self) -> Result<FileSnapshot, FetchError> {
        self.files.get_or_try_init(|| self.fetch_files()).await.cloned()
    }

    async fn npmrc_content(&self) -> Result<Option<String>, FetchError> {
        Ok(self.files().await?.get(".npmrc").map(|f| f.content.clone()))
    }

    async fn commit(&self) -> Result<String, FetchError> {
        self.commit.get_or_try_init(|| self.resolve_commit()).await.cloned()
    }
}
