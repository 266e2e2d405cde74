//! Dependency files and immutable file snapshots

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Role a file plays for its ecosystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// Human-edited dependency declarations
    Manifest,
    /// Machine-generated resolution pins
    Lockfile,
    /// Read for context only (registry config, workspace markers)
    Support,
}

/// One named file of a repository at one commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyFile {
    /// Path relative to `directory`
    pub name: String,
    /// Directory the file was fetched from
    pub directory: String,
    /// File content
    pub content: String,
    /// Role of this file
    pub file_type: FileType,
    /// Target when the file is a symlink in the repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symlink_target: Option<String>,
}

impl DependencyFile {
    /// Creates a new dependency file
    pub fn new(
        name: impl Into<String>,
        directory: impl Into<String>,
        content: impl Into<String>,
        file_type: FileType,
    ) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            content: content.into(),
            file_type,
            symlink_target: None,
        }
    }

    /// Sets the symlink target (builder pattern)
    pub fn with_symlink_target(mut self, target: impl Into<String>) -> Self {
        self.symlink_target = Some(target.into());
        self
    }

    /// Returns a new file with the same identity and different content
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..self.clone()
        }
    }

    /// Returns true for support files
    pub fn is_support_file(&self) -> bool {
        self.file_type == FileType::Support
    }

    /// Returns the repository-relative path of this file
    pub fn path(&self) -> String {
        let dir = self.directory.trim_matches('/');
        if dir.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", dir, self.name)
        }
    }
}

impl PartialEq for DependencyFile {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.directory == other.directory && self.content == other.content
    }
}

impl Eq for DependencyFile {}

/// Fingerprint identifying the snapshot a value was derived from
pub type SnapshotFingerprint = String;

/// Immutable set of dependency files representing one commit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileSnapshot {
    files: Vec<DependencyFile>,
}

impl FileSnapshot {
    /// Creates a snapshot from a list of files
    pub fn new(files: Vec<DependencyFile>) -> Self {
        Self { files }
    }

    /// Returns all files in fetch order
    pub fn files(&self) -> &[DependencyFile] {
        &self.files
    }

    /// Finds a file by name
    pub fn get(&self, name: &str) -> Option<&DependencyFile> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Returns the file names
    pub fn names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Content digest over sorted (directory, name, content)
    pub fn fingerprint(&self) -> SnapshotFingerprint {
        let mut hasher = Sha256::new();
        for file in self.sorted() {
            hasher.update(file.directory.as_bytes());
            hasher.update([0]);
            hasher.update(file.name.as_bytes());
            hasher.update([0]);
            hasher.update(file.content.as_bytes());
            hasher.update([0]);
        }
        hex::encode(hasher.finalize())
    }

    fn sorted(&self) -> Vec<&DependencyFile> {
        let mut files: Vec<&DependencyFile> = self.files.iter().collect();
        files.sort_by(|a, b| (&a.directory, &a.name).cmp(&(&b.directory, &b.name)));
        files
    }
}

impl PartialEq for FileSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.files.len() == other.files.len() && self.sorted() == other.sorted()
    }
}

impl Eq for FileSnapshot {}
