//! File regeneration orchestrator
//!
//! Turns an accepted update set into new file contents:
//! 1. verify every dependency came from the snapshot being regenerated
//! 2. filter the snapshot to the files the update set touches
//! 3. rewrite manifests, then regenerate lock files against the new manifests
//! 4. regenerate auxiliary lock files when their marker file is present
//! 5. raise `NoFunctionalChange` when nothing useful was produced

mod filter;

pub use filter::files_requiring_update;

use crate::domain::{Dependency, DependencyFile, FileSnapshot, PackageManager};
use crate::ecosystem::FileUpdater;
use crate::error::UpdaterError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Rewrites requirement text in one manifest
pub trait ManifestGenerator: Send + Sync {
    fn updated_manifest_content(
        &self,
        manifest: &DependencyFile,
        dependencies: &[Dependency],
    ) -> Result<String, UpdaterError>;
}

/// Regenerates one lock file format
#[async_trait]
pub trait LockfileGenerator: Send + Sync {
    /// Tool name used in logs and errors
    fn name(&self) -> &'static str;

    /// True if this generator owns files with this name
    fn handles(&self, file_name: &str) -> bool;

    /// Returns the new content, or `None` when the tool produced nothing usable
    ///
    /// `files` is the snapshot with updated manifests already substituted.
    async fn regenerate(
        &self,
        lockfile: &DependencyFile,
        files: &[DependencyFile],
        dependencies: &[Dependency],
    ) -> Result<Option<String>, UpdaterError>;
}

/// A lock file maintained by a secondary tool, regenerated when its marker is present
#[derive(Clone)]
pub struct AuxiliaryLockfile {
    /// File whose presence enables the secondary tool (e.g. `rush.json`)
    pub marker: &'static str,
    /// Path of the secondary lock file
    pub path: &'static str,
    pub generator: Arc<dyn LockfileGenerator>,
}

/// Orchestrates manifest and lock file regeneration for one ecosystem
pub struct Regenerator {
    package_manager: PackageManager,
    manifest: Arc<dyn ManifestGenerator>,
    lockfiles: Vec<Arc<dyn LockfileGenerator>>,
    auxiliary: Vec<AuxiliaryLockfile>,
}

impl Regenerator {
    /// Creates a regenerator with a manifest generator and no lock file formats
    pub fn new(package_manager: PackageManager, manifest: Arc<dyn ManifestGenerator>) -> Self {
        Self {
            package_manager,
            manifest,
            lockfiles: Vec::new(),
            auxiliary: Vec::new(),
        }
    }

    /// Registers a lock file format (builder pattern)
    pub fn with_lockfile(mut self, generator: Arc<dyn LockfileGenerator>) -> Self {
        self.lockfiles.push(generator);
        self
    }

    /// Registers an auxiliary lock file (builder pattern)
    pub fn with_auxiliary(mut self, auxiliary: AuxiliaryLockfile) -> Self {
        self.auxiliary.push(auxiliary);
        self
    }

    /// Regenerates the files touched by `dependencies`
    pub async fn regenerate(
        &self,
        snapshot: &FileSnapshot,
        dependencies: &[Dependency],
    ) -> Result<Vec<DependencyFile>, UpdaterError> {
        verify_snapshot(snapshot, dependencies)?;

        let manifest_name = self.package_manager.manifest_filename();
        if snapshot.get(manifest_name).is_none() {
            return Err(UpdaterError::MissingFile {
                name: manifest_name.to_string(),
            });
        }

        let filtered = files_requiring_update(snapshot, dependencies, self.package_manager);
        debug!(files = ?names(&filtered), "files requiring update");

        let active_auxiliary: Vec<&AuxiliaryLockfile> = self
            .auxiliary
            .iter()
            .filter(|aux| marker_present(snapshot, aux.marker))
            .collect();

        let mut updated = Vec::new();

        for file in filtered
            .iter()
            .filter(|f| self.package_manager.is_manifest(&f.name))
        {
            let content = self.manifest.updated_manifest_content(file, dependencies)?;
            if content != file.content {
                updated.push(file.with_content(content));
            }
        }

        let working_files = substitute(snapshot.files(), &updated);

        for file in filtered
            .iter()
            .filter(|f| self.package_manager.is_lockfile(&f.name))
            .filter(|f| !active_auxiliary.iter().any(|aux| aux.path == f.name))
        {
            let generator = match self.lockfiles.iter().find(|g| g.handles(base_name(file))) {
                Some(generator) => generator,
                None => {
                    warn!(file = %file.name, "no generator for lock file; leaving unchanged");
                    continue;
                }
            };

            if let Some(file) =
                regenerate_one(generator.as_ref(), file, &working_files, dependencies).await?
            {
                updated.push(file);
            }
        }

        for aux in active_auxiliary {
            let Some(file) = snapshot.get(aux.path) else {
                debug!(marker = aux.marker, path = aux.path, "auxiliary lock file absent");
                continue;
            };
            if let Some(file) =
                regenerate_one(aux.generator.as_ref(), file, &working_files, dependencies).await?
            {
                updated.push(file);
            }
        }

        check_functional_change(&updated, &filtered, snapshot, dependencies)?;

        info!(files = ?names(&updated), "regenerated dependency files");
        Ok(updated)
    }
}

#[async_trait]
impl FileUpdater for Regenerator {
    async fn updated_dependency_files(
        &self,
        snapshot: &FileSnapshot,
        dependencies: &[Dependency],
    ) -> Result<Vec<DependencyFile>, UpdaterError> {
        self.regenerate(snapshot, dependencies).await
    }
}

async fn regenerate_one(
    generator: &dyn LockfileGenerator,
    file: &DependencyFile,
    working_files: &[DependencyFile],
    dependencies: &[Dependency],
) -> Result<Option<DependencyFile>, UpdaterError> {
    match generator.regenerate(file, working_files, dependencies).await? {
        Some(content) if content != file.content => Ok(Some(file.with_content(content))),
        Some(_) => {
            debug!(file = %file.name, tool = generator.name(), "lock file unchanged");
            Ok(None)
        }
        None => {
            warn!(file = %file.name, tool = generator.name(), "tool produced no lock file");
            Ok(None)
        }
    }
}

/// Fails fast when a dependency was parsed from a different snapshot
pub fn verify_snapshot(snapshot: &FileSnapshot, dependencies: &[Dependency]) -> Result<(), UpdaterError> {
    let fingerprint = snapshot.fingerprint();
    match dependencies
        .iter()
        .find(|d| d.snapshot.as_ref().is_some_and(|fp| *fp != fingerprint))
    {
        Some(dep) => Err(UpdaterError::SnapshotMismatch {
            dependency: dep.name.clone(),
        }),
        None => Ok(()),
    }
}

/// Raises `NoFunctionalChange` for an empty output or one equal to the filtered input
fn check_functional_change(
    updated: &[DependencyFile],
    filtered: &[DependencyFile],
    snapshot: &FileSnapshot,
    dependencies: &[Dependency],
) -> Result<(), UpdaterError> {
    let message = if updated.is_empty() {
        "No files were updated!"
    } else if sorted_by_name(updated) == sorted_by_name(filtered) {
        "Updated files are unchanged!"
    } else {
        return Ok(());
    };

    Err(UpdaterError::NoFunctionalChange {
        message: message.to_string(),
        dependencies: dependencies
            .iter()
            .map(|d| d.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        updated_files: names(updated),
        dependency_files: snapshot.names(),
    })
}

fn sorted_by_name(files: &[DependencyFile]) -> Vec<&DependencyFile> {
    let mut sorted: Vec<&DependencyFile> = files.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted
}

fn substitute(files: &[DependencyFile], updated: &[DependencyFile]) -> Vec<DependencyFile> {
    files
        .iter()
        .map(|file| {
            updated
                .iter()
                .find(|u| u.name == file.name)
                .cloned()
                .unwrap_or_else(|| file.clone())
        })
        .collect()
}

fn marker_present(snapshot: &FileSnapshot, marker: &str) -> bool {
    snapshot
        .files()
        .iter()
        .any(|f| f.name == marker || f.name.ends_with(&format!("/{}", marker)))
}

fn base_name(file: &DependencyFile) -> &str {
    file.name.rsplit('/').next().unwrap_or(&file.name)
}

fn names(files: &[DependencyFile]) -> Vec<String> {
    files.iter().map(|f| f.name.clone()).collect()
}
