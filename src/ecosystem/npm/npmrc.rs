//! Registry credentials derived from `.npmrc`
//!
//! Every `registry=` line names a registry. Each registry yields:
//! - an `npm_registry` credential whose token is base64(":" + registry token)
//! - `:username=`, `:_password=` and `:email=` entries in the user's `.npmrc`
//!
//! The user-level `.npmrc` is written through `NpmrcGuard`, which restores
//! the previous file (or removes the new one) when dropped.

use crate::domain::Credential;
use crate::error::ConfigError;
use base64::{engine::general_purpose, Engine as _};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PLACEHOLDER_EMAIL: &str = "xyz@abc.com";

/// Returns the unique registries named in `.npmrc` content, scheme stripped (`//host/path/`)
pub fn registries(npmrc_content: &str) -> Vec<String> {
    let mut registries: Vec<String> = Vec::new();
    for token in npmrc_content.split_whitespace() {
        if !token.contains("registry=") {
            continue;
        }
        let Some(value) = token.split('=').nth(1) else {
            continue;
        };
        let value = value.replace("https:", "").replace("http:", "");
        if !value.is_empty() && !registries.contains(&value) {
            registries.push(value);
        }
    }
    registries
}

/// Builds one `npm_registry` credential per registry
pub fn registry_credentials(npmrc_content: Option<&str>, registry_token: &str) -> Vec<Credential> {
    let Some(content) = npmrc_content else {
        return Vec::new();
    };
    let token = general_purpose::STANDARD.encode(format!(":{}", registry_token));
    registries(content)
        .into_iter()
        .map(|registry| {
            let host = registry.trim_start_matches("//").to_string();
            Credential::npm_registry(host, token.clone())
        })
        .collect()
}

/// Renders the user-level `.npmrc` entries for every registry
pub fn npmrc_entries(npmrc_content: &str, registry_token: &str) -> String {
    let password = general_purpose::STANDARD.encode(registry_token);
    registries(npmrc_content)
        .iter()
        .map(|registry| {
            // `//pkgs.example.com/_packaging/feed/npm/registry/` → `pkgs`
            let username = registry
                .trim_start_matches("//")
                .split('/')
                .next()
                .and_then(|host| host.split('.').next())
                .unwrap_or_default();
            format!(
                "{reg}:username={user}\n{reg}:_password={password}\n{reg}:email={email}\n",
                reg = registry,
                user = username,
                password = password,
                email = PLACEHOLDER_EMAIL,
            )
        })
        .collect()
}

/// Default location of the user-level `.npmrc`
pub fn default_npmrc_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join(".npmrc"))
}

/// Scoped `.npmrc` file: written on creation, restored on drop
#[derive(Debug)]
pub struct NpmrcGuard {
    path: PathBuf,
    previous: Option<Vec<u8>>,
}

impl NpmrcGuard {
    /// Replaces the file at `path` with `content`, remembering what was there
    pub fn install(path: impl Into<PathBuf>, content: &str) -> Result<Self, ConfigError> {
        let path = path.into();
        let previous = match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(npmrc_error(&path, e)),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| npmrc_error(&path, e))?;
        }
        fs::write(&path, content).map_err(|e| npmrc_error(&path, e))?;
        debug!(path = %path.display(), restores = previous.is_some(), "wrote .npmrc");

        Ok(Self { path, previous })
    }

    /// Path the guard manages
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for NpmrcGuard {
    fn drop(&mut self) {
        let result = match self.previous.take() {
            Some(bytes) => fs::write(&self.path, bytes),
            None => fs::remove_file(&self.path),
        };
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failed to restore .npmrc");
        }
    }
}

fn npmrc_error(path: &Path, e: std::io::Error) -> ConfigError {
    ConfigError::Npmrc {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CredentialKind;
    use tempfile::TempDir;

    const NPMRC: &str = "registry=https://msasg.pkgs.visualstudio.com/_packaging/ARIA-SDK/npm/registry/\n\
                         always-auth=true\n\
                         @scope:registry=http://npm.internal.example/\n\
                         registry=https://msasg.pkgs.visualstudio.com/_packaging/ARIA-SDK/npm/registry/\n";

    #[test]
    fn test_unique_registries() {
        assert_eq!(
            registries(NPMRC),
            vec![
                "//msasg.pkgs.visualstudio.com/_packaging/ARIA-SDK/npm/registry/",
                "//npm.internal.example/",
            ]
        );
    }

    #[test]
    fn test_registry_credentials() {
        let creds = registry_credentials(Some(NPMRC), "secret");
        assert_eq!(creds.len(), 2);
        assert_eq!(creds[0].kind, CredentialKind::NpmRegistry);
        assert_eq!(
            creds[0].host,
            "msasg.pkgs.visualstudio.com/_packaging/ARIA-SDK/npm/registry/"
        );
        assert_eq!(creds[0].secret, general_purpose::STANDARD.encode(":secret"));
        assert!(registry_credentials(None, "secret").is_empty());
    }

    #[test]
    fn test_npmrc_entries() {
        let entries = npmrc_entries("registry=https://msasg.pkgs.visualstudio.com/feed/", "secret");
        let password = general_purpose::STANDARD.encode("secret");
        assert_eq!(
            entries,
            format!(
                "//msasg.pkgs.visualstudio.com/feed/:username=msasg\n\
                 //msasg.pkgs.visualstudio.com/feed/:_password={}\n\
                 //msasg.pkgs.visualstudio.com/feed/:email=xyz@abc.com\n",
                password
            )
        );
    }

    #[test]
    fn test_guard_restores_previous_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".npmrc");
        fs::write(&path, "original").unwrap();

        {
            let guard = NpmrcGuard::install(&path, "generated").unwrap();
            assert_eq!(guard.path(), path.as_path());
            assert_eq!(fs::read_to_string(&path).unwrap(), "generated");
        }

        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
    }

    #[test]
    fn test_guard_removes_created_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".npmrc");

        {
            let _guard = NpmrcGuard::install(&path, "generated").unwrap();
            assert!(path.exists());
        }

        assert!(!path.exists());
    }
}
