//! Staged cache of intermediate pipeline artifacts
//!
//! Artifacts live under `<cache_root>/<repo segments>/<branch>/<directory>`:
//! - `cache-manifest-<package manager>.json` plus one raw file per cached
//!   dependency file (the `files` stage)
//! - `cache/<stage>.json` for every other stage, wrapped in a versioned envelope
//!
//! A stage is read back only when enabled; computed values are always persisted.
//! Writes are not atomic and assume a single process per cache root.

mod files;

pub use files::{CachedFileEntry, FilesManifest};

use crate::domain::{Dependency, PackageManager, Source};
use crate::error::{CacheError, ConfigError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Bumped whenever a cached artifact's shape changes
pub const SCHEMA_VERSION: u32 = 1;

/// Pipeline stages that can be cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStage {
    Files,
    Dependencies,
}

impl CacheStage {
    pub fn name(&self) -> &'static str {
        match self {
            CacheStage::Files => "files",
            CacheStage::Dependencies => "dependencies",
        }
    }

    /// Parses a comma-separated stage list (`files,dependencies`)
    pub fn parse_list(value: &str) -> Result<Vec<CacheStage>, ConfigError> {
        let mut stages = Vec::new();
        for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let stage = part.parse()?;
            if !stages.contains(&stage) {
                stages.push(stage);
            }
        }
        Ok(stages)
    }
}

impl FromStr for CacheStage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "files" => Ok(CacheStage::Files),
            "dependencies" => Ok(CacheStage::Dependencies),
            other => Err(ConfigError::InvalidCacheStage {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for CacheStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A cacheable stage and the type of value it produces
pub trait Stage {
    type Value: Serialize + DeserializeOwned;
    const KIND: CacheStage;
}

/// Parsed dependencies
pub struct DependenciesStage;

impl Stage for DependenciesStage {
    type Value = Vec<Dependency>;
    const KIND: CacheStage = CacheStage::Dependencies;
}

#[derive(Serialize, Deserialize)]
struct Artifact<T> {
    schema_version: u32,
    stage: CacheStage,
    value: T,
}

/// Cache rooted at one (repository, branch, directory)
#[derive(Debug, Clone)]
pub struct StagedCache {
    root: PathBuf,
    package_manager: PackageManager,
    enabled: Vec<CacheStage>,
}

impl StagedCache {
    /// Creates a cache for `source` under `cache_root`
    pub fn new(
        cache_root: impl AsRef<Path>,
        source: &Source,
        package_manager: PackageManager,
        enabled: Vec<CacheStage>,
    ) -> Self {
        let mut root = cache_root.as_ref().to_path_buf();
        for segment in source.repo_segments() {
            root.push(segment);
        }
        if let Some(branch) = source.branch.as_deref().filter(|b| !b.is_empty()) {
            for segment in branch.split('/').filter(|s| !s.is_empty()) {
                root.push(segment);
            }
        }
        for segment in source.directory.split('/').filter(|s| !s.is_empty()) {
            root.push(segment);
        }

        Self {
            root,
            package_manager,
            enabled,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_enabled(&self, stage: CacheStage) -> bool {
        self.enabled.contains(&stage)
    }

    fn artifact_path(&self, stage: CacheStage) -> PathBuf {
        self.root.join("cache").join(format!("{}.json", stage.name()))
    }

    /// Returns the cached value of `S` when enabled and valid, otherwise runs `producer` and persists its value
    pub async fn read_or_compute<S, F, Fut, E>(&self, producer: F) -> Result<S::Value, E>
    where
        S: Stage,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S::Value, E>>,
        E: From<CacheError>,
    {
        if self.is_enabled(S::KIND) {
            if let Some(value) = self.read_artifact::<S>()? {
                info!(stage = %S::KIND, path = %self.artifact_path(S::KIND).display(), "cache hit");
                return Ok(value);
            }
            info!(stage = %S::KIND, "cache miss");
        }

        let value = producer().await?;
        self.write_artifact::<S>(&value)?;
        Ok(value)
    }

    /// Removes the artifact of `stage`; a missing artifact is not an error
    pub fn invalidate(&self, stage: CacheStage) -> Result<(), CacheError> {
        let path = self.artifact_path(stage);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(stage = %stage, "cache artifact removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    fn read_artifact<S: Stage>(&self) -> Result<Option<S::Value>, CacheError> {
        let path = self.artifact_path(S::KIND);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };

        match serde_json::from_slice::<Artifact<S::Value>>(&bytes) {
            Ok(artifact) if artifact.schema_version == SCHEMA_VERSION && artifact.stage == S::KIND => {
                Ok(Some(artifact.value))
            }
            Ok(artifact) => {
                warn!(
                    stage = %S::KIND,
                    found = artifact.schema_version,
                    expected = SCHEMA_VERSION,
                    "stale cache artifact; recomputing"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(stage = %S::KIND, error = %e, "unreadable cache artifact; recomputing");
                Ok(None)
            }
        }
    }

    fn write_artifact<S: Stage>(&self, value: &S::Value) -> Result<(), CacheError> {
        let path = self.artifact_path(S::KIND);
        let artifact = Artifact {
            schema_version: SCHEMA_VERSION,
            stage: S::KIND,
            value,
        };
        let json = serde_json::to_vec_pretty(&artifact).map_err(|e| CacheError::Serialize {
            stage: S::KIND.name().to_string(),
            message: e.to_string(),
        })?;
        write_file(&path, &json)?;
        debug!(stage = %S::KIND, path = %path.display(), "cache artifact written");
        Ok(())
    }
}

/// Writes `bytes` to `path`, creating parent directories
pub(crate) fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
    }
    std::fs::write(path, bytes).map_err(|e| CacheError::io(path, e))
}
