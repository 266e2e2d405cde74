//! The `files` stage: a manifest of file metadata plus one raw file per entry

use super::{write_file, CacheStage, StagedCache, SCHEMA_VERSION};
use crate::domain::{DependencyFile, FileSnapshot, FileType};
use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Metadata of one cached file; content is stored beside the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFileEntry {
    pub name: String,
    pub directory: String,
    pub file_type: FileType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symlink_target: Option<String>,
}

/// `cache-manifest-<package manager>.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesManifest {
    pub schema_version: u32,
    pub files: Vec<CachedFileEntry>,
}

impl FilesManifest {
    fn from_snapshot(snapshot: &FileSnapshot) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            files: snapshot
                .files()
                .iter()
                .map(|f| CachedFileEntry {
                    name: f.name.clone(),
                    directory: f.directory.clone(),
                    file_type: f.file_type,
                    symlink_target: f.symlink_target.clone(),
                })
                .collect(),
        }
    }
}

impl StagedCache {
    fn manifest_path(&self) -> PathBuf {
        self.root()
            .join(format!("cache-manifest-{}.json", self.package_manager.tag()))
    }

    fn content_path(&self, name: &str) -> PathBuf {
        self.root().join(name)
    }

    /// Returns the cached snapshot when enabled and complete, otherwise fetches and persists one
    pub async fn read_or_fetch_files<F, Fut, E>(&self, fetch: F) -> Result<FileSnapshot, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FileSnapshot, E>>,
        E: From<CacheError>,
    {
        if self.is_enabled(CacheStage::Files) {
            match self.read_files()? {
                Some(snapshot) => {
                    info!(path = %self.root().display(), files = snapshot.len(), "reading dependency files from cache");
                    return Ok(snapshot);
                }
                None => info!(
                    path = %self.manifest_path().display(),
                    "failed to read all dependency files from cache manifest"
                ),
            }
        }

        let snapshot = fetch().await?;
        self.write_files(&snapshot)?;
        Ok(snapshot)
    }

    /// Reads the cached snapshot; `None` unless the manifest is current and every file is present
    pub fn read_files(&self) -> Result<Option<FileSnapshot>, CacheError> {
        let path = self.manifest_path();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };

        let manifest: FilesManifest = match serde_json::from_slice(&bytes) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable cache manifest");
                return Ok(None);
            }
        };
        if manifest.schema_version != SCHEMA_VERSION {
            warn!(found = manifest.schema_version, expected = SCHEMA_VERSION, "stale cache manifest");
            return Ok(None);
        }

        let mut files = Vec::with_capacity(manifest.files.len());
        for entry in manifest.files {
            let content_path = self.content_path(&entry.name);
            let content = match std::fs::read_to_string(&content_path) {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(file = %entry.name, "cached file missing");
                    return Ok(None);
                }
                Err(e) => return Err(CacheError::io(content_path, e)),
            };
            let mut file = DependencyFile::new(entry.name, entry.directory, content, entry.file_type);
            file.symlink_target = entry.symlink_target;
            files.push(file);
        }

        Ok(Some(FileSnapshot::new(files)))
    }

    /// Persists the manifest and every file's content
    pub fn write_files(&self, snapshot: &FileSnapshot) -> Result<(), CacheError> {
        let manifest = FilesManifest::from_snapshot(snapshot);
        let json = serde_json::to_vec_pretty(&manifest).map_err(|e| CacheError::Serialize {
            stage: CacheStage::Files.name().to_string(),
            message: e.to_string(),
        })?;
        write_file(&self.manifest_path(), &json)?;
        self.write_through(snapshot.files())?;
        debug!(path = %self.root().display(), files = snapshot.len(), "dumped dependency files");
        Ok(())
    }

    /// Overwrites cached file contents with regenerated ones
    pub fn write_through(&self, files: &[DependencyFile]) -> Result<(), CacheError> {
        for file in files {
            let path = self.content_path(&file.name);
            write_file(&path, file.content.as_bytes())?;
            debug!(path = %path.display(), "wrote file");
        }
        Ok(())
    }
}
