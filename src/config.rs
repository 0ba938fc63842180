//! Configuration types for the dispatcher and its HTTP transport.
//!
//! This module provides serializable configuration structures that can be
//! loaded from external config files or environment variables.

use std::collections::BTreeMap;
use std::time::Duration;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;
use crate::{Error, Result};

/// Top-level client configuration consumed by [`Dispatcher::from_config`]
/// and [`ReqwestTransport::from_config`].
///
/// This struct is designed to be deserialized from configuration files (JSON, YAML, TOML, etc.).
/// Everything except `base_url` has a default.
///
/// # Example
///
/// ```rust
/// use tollgate::{ClientConfig, Credentials};
/// use serde_json::json;
///
/// let config: ClientConfig = serde_json::from_value(json!({
///     "base_url": "https://api.example.com/v1",
///     "max_retry": 2,
///     "min_wait_ms": 250,
///     "default_headers": { "Accept": "application/json" },
///     "credentials": { "method": "static_token", "token": "secret" }
/// }))
/// .unwrap();
///
/// assert_eq!(config.max_retry, 2);
/// assert!(matches!(config.credentials, Credentials::StaticToken { .. }));
/// ```
///
/// [`Dispatcher::from_config`]: crate::Dispatcher::from_config
/// [`ReqwestTransport::from_config`]: crate::ReqwestTransport::from_config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL every request path is appended to
    pub base_url: String,
    /// Maximum number of retries after the first attempt of a rate-limited call
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,
    /// Floor for the wait between rate-limited attempts, in milliseconds
    #[serde(default = "default_min_wait_ms")]
    pub min_wait_ms: u64,
    /// Headers attached to every request
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
    /// How requests are authenticated
    #[serde(default)]
    pub credentials: Credentials,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Maximum number of requests in flight on the transport
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Overrides the transport's default user agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Credential method used by the dispatcher.
///
/// - `none`: no `Authorization` header is attached
/// - `static_token`: the configured token is sent as a bearer token
/// - `client_credentials`: tokens come from a caller-supplied
///   [`TokenProvider`](crate::TokenProvider) that performs the exchange
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Credentials {
    #[default]
    None,
    StaticToken {
        /// Bearer token (not serialized for security)
        #[serde(skip_serializing)]
        token: SecretString,
    },
    ClientCredentials,
}

fn default_max_retry() -> u32 {
    3
}

fn default_min_wait_ms() -> u64 {
    1000
}

fn default_timeout_seconds() -> u64 {
    90
}

fn default_max_concurrent_requests() -> usize {
    300
}

pub(crate) fn check_max_concurrent_requests(max_concurrent_requests: usize) -> Result<()> {
    if max_concurrent_requests == 0 {
        return Err(Error::InvalidConfig {
            reason: "max_concurrent_requests must be at least 1".to_string(),
        });
    }
    Ok(())
}

impl ClientConfig {
    /// Creates a configuration for `base_url` with every other field at its default.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_retry: default_max_retry(),
            min_wait_ms: default_min_wait_ms(),
            default_headers: BTreeMap::new(),
            credentials: Credentials::None,
            timeout_seconds: default_timeout_seconds(),
            max_concurrent_requests: default_max_concurrent_requests(),
            user_agent: None,
        }
    }

    /// Checks the values a transport or dispatcher would otherwise reject later.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the base URL is blank or the
    /// concurrency limit is zero, and a header error if a default header
    /// cannot be encoded.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig {
                reason: "base_url must not be empty".to_string(),
            });
        }
        check_max_concurrent_requests(self.max_concurrent_requests)?;
        self.header_map()?;
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retry, Duration::from_millis(self.min_wait_ms))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Encodes `default_headers` as an HTTP header map.
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::with_capacity(self.default_headers.len());
        for (name, value) in &self.default_headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|source| {
                    Error::InvalidHeaderName {
                        name: name.clone(),
                        source,
                    }
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|source| Error::InvalidHeaderValue {
                    name: name.clone(),
                    source,
                })?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }
}
