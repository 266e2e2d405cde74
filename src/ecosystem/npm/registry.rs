//! npm registry adapter
//!
//! Fetches package metadata from `<registry>/<package>`: published versions,
//! publish times, `dist-tags.latest` and each version's peerDependencies.
//! The registry comes from the snapshot's `.npmrc` when it names one.

use super::npmrc;
use crate::domain::{CredentialKind, Credentials, FileSnapshot};
use crate::error::RegistryError;
use crate::http::{Authorization, HttpClient};
use crate::version::VersionInfo;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Public npm registry base URL
pub const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Where and how to reach the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub url: String,
    pub auth: Option<Authorization>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: NPM_REGISTRY_URL.to_string(),
            auth: None,
        }
    }
}

impl RegistryConfig {
    /// Uses the first registry in the snapshot's `.npmrc`, authenticated when a credential matches
    pub fn from_snapshot(snapshot: &FileSnapshot, credentials: &Credentials) -> Self {
        let Some(npmrc) = snapshot.get(".npmrc") else {
            return Self::default();
        };
        let Some(registry) = npmrc::registries(&npmrc.content).into_iter().next() else {
            return Self::default();
        };

        let host = registry.trim_start_matches("//");
        let auth = credentials
            .find(CredentialKind::NpmRegistry, host)
            .map(|credential| authorization(&credential.secret));

        Self {
            url: format!("https://{}", host.trim_end_matches('/')),
            auth,
        }
    }

    /// Builds the metadata URL for a package; scoped names keep their `@` and escape the `/`
    pub fn package_url(&self, package: &str) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), package.replace('/', "%2F"))
    }
}

/// Basic auth for base64 `:token` secrets, bearer otherwise
fn authorization(secret: &str) -> Authorization {
    general_purpose::STANDARD
        .decode(secret)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|decoded| {
            decoded
                .split_once(':')
                .map(|(username, password)| Authorization::Basic {
                    username: username.to_string(),
                    password: password.to_string(),
                })
        })
        .unwrap_or_else(|| Authorization::Bearer(secret.to_string()))
}

/// One published version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageVersion {
    pub info: VersionInfo,
    pub peer_dependencies: BTreeMap<String, String>,
    pub deprecated: bool,
}

impl PackageVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            info: VersionInfo::new(version, None),
            peer_dependencies: BTreeMap::new(),
            deprecated: false,
        }
    }

    /// Adds a peer requirement (builder pattern)
    pub fn with_peer(mut self, name: impl Into<String>, requirement: impl Into<String>) -> Self {
        self.peer_dependencies.insert(name.into(), requirement.into());
        self
    }

    pub fn version(&self) -> &str {
        &self.info.version
    }
}

/// Registry metadata for one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDetails {
    pub name: String,
    /// Ascending by version
    pub versions: Vec<PackageVersion>,
    /// `dist-tags.latest`
    pub latest_tag: Option<String>,
}

impl PackageDetails {
    pub fn new(name: impl Into<String>, mut versions: Vec<PackageVersion>) -> Self {
        versions.sort_by(|a, b| a.info.cmp(&b.info));
        Self {
            name: name.into(),
            versions,
            latest_tag: None,
        }
    }

    /// Sets `dist-tags.latest` (builder pattern)
    pub fn with_latest_tag(mut self, latest: impl Into<String>) -> Self {
        self.latest_tag = Some(latest.into());
        self
    }

    pub fn version(&self, version: &str) -> Option<&PackageVersion> {
        self.versions.iter().find(|v| v.version() == version)
    }
}

/// Source of package metadata
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    async fn package(
        &self,
        config: &RegistryConfig,
        name: &str,
    ) -> Result<Arc<PackageDetails>, RegistryError>;
}

#[derive(Debug, Deserialize)]
struct NpmPackageResponse {
    #[serde(default)]
    time: HashMap<String, String>,
    #[serde(default)]
    versions: HashMap<String, NpmVersionManifest>,
    #[serde(default, rename = "dist-tags")]
    dist_tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct NpmVersionManifest {
    #[serde(default, rename = "peerDependencies")]
    peer_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    deprecated: Option<serde_json::Value>,
}

/// npm registry client; metadata is memoized per registry and package for the run
pub struct NpmRegistry {
    client: HttpClient,
    cache: Mutex<HashMap<String, Arc<PackageDetails>>>,
}

impl NpmRegistry {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, url: &str) -> Option<Arc<PackageDetails>> {
        self.cache.lock().ok().and_then(|cache| cache.get(url).cloned())
    }
}

#[async_trait]
impl PackageRegistry for NpmRegistry {
    async fn package(
        &self,
        config: &RegistryConfig,
        name: &str,
    ) -> Result<Arc<PackageDetails>, RegistryError> {
        let url = config.package_url(name);
        if let Some(details) = self.cached(&url) {
            return Ok(details);
        }

        debug!(package = name, url = %url, "fetching registry metadata");
        let response: NpmPackageResponse = self
            .client
            .get_json(&url, config.auth.as_ref(), name, "npm")
            .await?;

        let details = Arc::new(into_details(name, response));
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(url, details.clone());
        }
        Ok(details)
    }
}

fn into_details(name: &str, response: NpmPackageResponse) -> PackageDetails {
    let versions = response
        .versions
        .into_iter()
        .map(|(version, manifest)| {
            let released_at = response
                .time
                .get(&version)
                .and_then(|t| t.parse::<DateTime<Utc>>().ok());
            PackageVersion {
                info: VersionInfo::new(version, released_at),
                peer_dependencies: manifest.peer_dependencies,
                deprecated: manifest
                    .deprecated
                    .is_some_and(|d| !matches!(d, serde_json::Value::Bool(false))),
            }
        })
        .collect();

    let details = PackageDetails::new(name, versions);
    match response.dist_tags.get("latest") {
        Some(latest) => details.with_latest_tag(latest.clone()),
        None => details,
    }
}
