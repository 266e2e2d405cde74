//! HTTP client shared foundation
//!
//! This module provides a shared HTTP client with:
//! - Configurable timeout and User-Agent
//! - Basic/bearer authorization
//! - Exponential backoff retry for idempotent GETs (max 3 retries)
//! - Rate limit error handling
//!
//! Writes (POST) are sent exactly once.

use crate::error::RegistryError;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default User-Agent header
const DEFAULT_USER_AGENT: &str = concat!("depbot/", env!("CARGO_PKG_VERSION"));

/// Maximum number of retry attempts
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BASE_DELAY_MS: u64 = 100;

/// Authorization attached to a request
#[derive(Clone, PartialEq, Eq)]
pub enum Authorization {
    Basic { username: String, password: String },
    Bearer(String),
}

impl std::fmt::Debug for Authorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Authorization::Basic { username, .. } => write!(f, "Basic({}:<redacted>)", username),
            Authorization::Bearer(_) => write!(f, "Bearer(<redacted>)"),
        }
    }
}

impl Authorization {
    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Authorization::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            Authorization::Bearer(token) => request.bearer_auth(token),
        }
    }
}

/// HTTP client wrapper with retry logic
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: u32,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, RegistryError> {
        Self::with_config(DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
    }

    /// Create a new HTTP client with a custom request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self, RegistryError> {
        Self::with_config(timeout, DEFAULT_USER_AGENT)
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(timeout: Duration, user_agent: &str) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| RegistryError::NetworkError {
                package: String::new(),
                registry: "HTTP client".to_string(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Set the maximum number of retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// GET with retry on transport errors, 429 and 5xx
    ///
    /// Returns the last response (whatever its status) or the last transport error.
    pub async fn get_with_retry(
        &self,
        url: &str,
        auth: Option<&Authorization>,
    ) -> Result<Response, reqwest::Error> {
        let mut delay = BASE_DELAY_MS;
        let mut attempt = 0;

        loop {
            let mut request = self.client.get(url);
            if let Some(auth) = auth {
                request = auth.apply(request);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status != StatusCode::TOO_MANY_REQUESTS && !status.is_server_error() {
                        return Ok(response);
                    }
                    if attempt >= self.max_retries {
                        return Ok(response);
                    }
                    tracing::debug!(url, status = status.as_u16(), attempt, "retrying GET");
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(e);
                    }
                    tracing::debug!(url, error = %e, attempt, "retrying GET");
                }
            }

            tokio::time::sleep(Duration::from_millis(delay)).await;
            delay *= 2;
            attempt += 1;
        }
    }

    /// POST a JSON body once; no retry
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        auth: Option<&Authorization>,
        body: &B,
    ) -> Result<Response, reqwest::Error> {
        let mut request = self.client.post(url).json(body);
        if let Some(auth) = auth {
            request = auth.apply(request);
        }
        request.send().await
    }

    /// Perform a registry GET and map failures to RegistryError
    pub async fn get_with_context(
        &self,
        url: &str,
        auth: Option<&Authorization>,
        package: &str,
        registry: &str,
    ) -> Result<Response, RegistryError> {
        let response = self.get_with_retry(url, auth).await.map_err(|e| {
            if e.is_timeout() {
                RegistryError::timeout(package, registry)
            } else {
                RegistryError::network_error(package, registry, e.to_string())
            }
        })?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(RegistryError::RateLimitExceeded {
                registry: registry.to_string(),
            }),
            StatusCode::NOT_FOUND => Err(RegistryError::package_not_found(package, registry)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(RegistryError::AuthenticationError {
                    registry: registry.to_string(),
                    message: format!("HTTP {}", response.status()),
                })
            }
            status if !status.is_success() => Err(RegistryError::network_error(
                package,
                registry,
                format!("HTTP {}", status),
            )),
            _ => Ok(response),
        }
    }

    /// Perform a registry GET and parse the JSON response
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        auth: Option<&Authorization>,
        package: &str,
        registry: &str,
    ) -> Result<T, RegistryError> {
        let response = self.get_with_context(url, auth, package, registry).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| RegistryError::InvalidResponse {
                package: package.to_string(),
                registry: registry.to_string(),
                message: format!("failed to parse JSON: {}", e),
            })
    }
}
