//! Credentials passed through to collaborators

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a credential grants access to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Git-hosting provider access
    GitSource,
    /// Private npm registry access
    NpmRegistry,
}

/// A single credential; the secret is opaque to the core
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub kind: CredentialKind,
    pub host: String,
    pub secret: String,
}

impl Credential {
    /// Creates a new credential
    pub fn new(kind: CredentialKind, host: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            kind,
            host: host.into(),
            secret: secret.into(),
        }
    }

    /// Creates a git-source credential
    pub fn git_source(host: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::new(CredentialKind::GitSource, host, secret)
    }

    /// Creates an npm registry credential
    pub fn npm_registry(host: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::new(CredentialKind::NpmRegistry, host, secret)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Ordered credential list; the first match wins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials(Vec<Credential>);

impl Credentials {
    /// Creates an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a credential
    pub fn push(&mut self, credential: Credential) {
        self.0.push(credential);
    }

    /// Returns the first credential matching kind and host
    pub fn find(&self, kind: CredentialKind, host: &str) -> Option<&Credential> {
        self.0
            .iter()
            .find(|c| c.kind == kind && host_matches(&c.host, host))
    }

    /// Iterates over credentials of one kind
    pub fn of_kind(&self, kind: CredentialKind) -> impl Iterator<Item = &Credential> {
        self.0.iter().filter(move |c| c.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Extend<Credential> for Credentials {
    fn extend<T: IntoIterator<Item = Credential>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl FromIterator<Credential> for Credentials {
    fn from_iter<T: IntoIterator<Item = Credential>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Registry credentials are stored with a path (`host/_packaging/feed/npm/registry/`)
fn host_matches(credential_host: &str, host: &str) -> bool {
    let credential_host = credential_host.trim_end_matches('/');
    let host = host.trim_end_matches('/');
    credential_host == host || host.starts_with(&format!("{}/", credential_host))
}
