//! Application error types using thiserror
//!
//! Error hierarchy:
//! - ConfigError: missing/invalid run inputs (fatal, before any work)
//! - FetchError: dependency files could not be retrieved or parsed (fatal for the run)
//! - CheckerError: registry/resolution failure for one dependency (recovered)
//! - UpdaterError: file regeneration failures, including the no-functional-change defect
//! - ProviderError: git-hosting provider failures (fatal for one pull request)
//! - CacheError: staged cache IO/serialization failures

use std::path::PathBuf;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// File fetching/parsing errors
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Update checker errors
    #[error(transparent)]
    Checker(#[from] CheckerError),

    /// File updater errors
    #[error(transparent)]
    Updater(#[from] UpdaterError),

    /// Git-hosting provider errors
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Staged cache errors
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl AppError {
    /// Returns true if this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Config(_) | AppError::Fetch(_) | AppError::Cache(_)
        )
    }

    /// Returns true if the failure was caused by a bounded timeout
    pub fn is_timeout(&self) -> bool {
        match self {
            AppError::Checker(CheckerError::Registry(RegistryError::Timeout { .. })) => true,
            AppError::Updater(UpdaterError::ToolTimeout { .. }) => true,
            AppError::Provider(ProviderError::Timeout { .. }) => true,
            AppError::Fetch(FetchError::Provider(ProviderError::Timeout { .. })) => true,
            _ => false,
        }
    }
}

/// Errors related to run configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required input is missing or blank
    #[error("missing required input: {name}")]
    MissingInput { name: String },

    /// Invalid PR count
    #[error("invalid PR count '{value}': expected a positive number")]
    InvalidPrCount { value: String },

    /// No capability bundle registered for the package manager
    #[error("unsupported package manager '{name}'")]
    UnsupportedPackageManager { name: String },

    /// Unknown git-hosting provider
    #[error("unsupported provider '{name}': expected 'azure'")]
    UnsupportedProvider { name: String },

    /// Repository identifier could not be interpreted
    #[error("invalid repository '{repo}': {message}")]
    InvalidRepository { repo: String, message: String },

    /// Unknown requirements update strategy
    #[error(
        "invalid requirements update strategy '{value}': expected 'auto', 'widen_ranges', \
         'bump_versions', 'bump_versions_if_necessary' or 'lockfile_only'"
    )]
    InvalidStrategy { value: String },

    /// Unknown cache stage name
    #[error("invalid cache stage '{value}': expected 'files' or 'dependencies'")]
    InvalidCacheStage { value: String },

    /// Conflicting options
    #[error("conflicting options: {message}")]
    ConflictingOptions { message: String },

    /// Registry configuration file could not be written
    #[error("failed to write {path}: {message}")]
    Npmrc { path: PathBuf, message: String },
}

/// Errors raised while fetching or parsing the dependency file snapshot
#[derive(Error, Debug)]
pub enum FetchError {
    /// A required dependency file is absent from the repository
    #[error("required dependency file not found: {path}")]
    FileNotFound { path: String },

    /// Dependency file could not be parsed
    #[error("failed to parse {file}: {message}")]
    Unparseable { file: String, message: String },

    /// The provider failed while serving files
    #[error("failed to fetch dependency files: {0}")]
    Provider(#[from] ProviderError),
}

/// Errors related to package registry communication
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Package not found in registry
    #[error("package '{package}' not found in {registry} registry")]
    PackageNotFound { package: String, registry: String },

    /// Network request failed
    #[error("failed to fetch package '{package}' from {registry}: {message}")]
    NetworkError {
        package: String,
        registry: String,
        message: String,
    },

    /// Rate limit exceeded
    #[error("rate limit exceeded for {registry} registry")]
    RateLimitExceeded { registry: String },

    /// Invalid response from registry
    #[error("invalid response from {registry} for '{package}': {message}")]
    InvalidResponse {
        package: String,
        registry: String,
        message: String,
    },

    /// Timeout
    #[error("timeout while fetching '{package}' from {registry}")]
    Timeout { package: String, registry: String },

    /// Authentication error
    #[error("authentication failed for {registry}: {message}")]
    AuthenticationError { registry: String, message: String },
}

/// Errors raised by an update checker for a single dependency
#[derive(Error, Debug)]
pub enum CheckerError {
    /// Registry communication failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Version resolution failed
    #[error("failed to resolve '{dependency}': {message}")]
    Resolution { dependency: String, message: String },
}

/// Errors raised while regenerating dependency files
#[derive(Error, Debug)]
pub enum UpdaterError {
    /// Regeneration produced no diff despite an accepted update decision
    #[error("no functional change for {dependencies}: {message}")]
    NoFunctionalChange {
        message: String,
        dependencies: String,
        updated_files: Vec<String>,
        dependency_files: Vec<String>,
    },

    /// A file required by the ecosystem is not in the snapshot
    #[error("required file '{name}' is missing from the snapshot")]
    MissingFile { name: String },

    /// Dependencies and files originate from different snapshots
    #[error("dependency '{dependency}' was not parsed from the snapshot being regenerated")]
    SnapshotMismatch { dependency: String },

    /// Manifest content could not be rewritten
    #[error("failed to update {dependency} in {file}: {message}")]
    ManifestUpdate {
        file: String,
        dependency: String,
        message: String,
    },

    /// Native tool could not be started or its output read
    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    /// Native tool exceeded its time budget
    #[error("{tool} timed out after {seconds}s")]
    ToolTimeout { tool: String, seconds: u64 },
}

/// Errors returned by the git-hosting provider
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Non-2xx response
    #[error("error occurred while {operation}. Response status code: {status} and error message: {message}")]
    Api {
        operation: String,
        status: u16,
        message: String,
    },

    /// Transport failure
    #[error("request failed while {operation}: {message}")]
    Transport { operation: String, message: String },

    /// Body could not be interpreted
    #[error("invalid response while {operation}: {message}")]
    InvalidResponse { operation: String, message: String },

    /// Request exceeded its time budget
    #[error("timeout while {operation}")]
    Timeout { operation: String },
}

/// Errors related to the staged cache
#[derive(Error, Debug)]
pub enum CacheError {
    /// IO failure
    #[error("cache IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Artifact could not be serialized
    #[error("failed to serialize '{stage}' cache artifact: {message}")]
    Serialize { stage: String, message: String },
}

impl ConfigError {
    /// Creates a new MissingInput error
    pub fn missing(name: impl Into<String>) -> Self {
        ConfigError::MissingInput { name: name.into() }
    }

    /// Creates a new InvalidRepository error
    pub fn invalid_repository(repo: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidRepository {
            repo: repo.into(),
            message: message.into(),
        }
    }
}

impl FetchError {
    /// Creates a new Unparseable error
    pub fn unparseable(file: impl Into<String>, message: impl Into<String>) -> Self {
        FetchError::Unparseable {
            file: file.into(),
            message: message.into(),
        }
    }
}

impl RegistryError {
    /// Creates a new PackageNotFound error
    pub fn package_not_found(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::PackageNotFound {
            package: package.into(),
            registry: registry.into(),
        }
    }

    /// Creates a new NetworkError
    pub fn network_error(
        package: impl Into<String>,
        registry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RegistryError::NetworkError {
            package: package.into(),
            registry: registry.into(),
            message: message.into(),
        }
    }

    /// Creates a new Timeout error
    pub fn timeout(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::Timeout {
            package: package.into(),
            registry: registry.into(),
        }
    }
}

impl UpdaterError {
    /// Creates a new Tool error
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        UpdaterError::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Returns true for the no-functional-change defect signal
    pub fn is_no_functional_change(&self) -> bool {
        matches!(self, UpdaterError::NoFunctionalChange { .. })
    }
}

impl ProviderError {
    /// Creates a new Api error
    pub fn api(operation: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        ProviderError::Api {
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates a new Transport error
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a new InvalidResponse error
    pub fn invalid_response(operation: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::InvalidResponse {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

impl CacheError {
    /// Creates a new Io error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}
