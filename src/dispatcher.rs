//! Authenticated, retry-aware request dispatch.
//!
//! The [`Dispatcher`] sits between call sites and a [`TransportSender`]. For
//! every logical call it builds a fresh header set from the configured
//! defaults, attaches a bearer token when a [`TokenProvider`] is configured,
//! and hands the call to the [`RetryPolicy`] loop, which retries only
//! rate-limited attempts.
//!
//! # Example
//!
//! ```rust,no_run
//! use tokio_util::sync::CancellationToken;
//! use tollgate::{ClientConfig, Dispatcher, RequestDescriptor};
//!
//! # async fn example() -> tollgate::Result<()> {
//! let config: ClientConfig = serde_json::from_value(serde_json::json!({
//!     "base_url": "https://api.example.com/v1",
//!     "max_retry": 2,
//!     "min_wait_ms": 500,
//!     "credentials": { "method": "static_token", "token": "YOUR_TOKEN" }
//! }))
//! .unwrap();
//! let dispatcher = Dispatcher::with_reqwest(&config, None)?;
//!
//! let cancel = CancellationToken::new();
//! let user: serde_json::Value = dispatcher
//!     .send(&RequestDescriptor::get("/users/42"), "get_user", &cancel)
//!     .await?;
//! dispatcher
//!     .send_empty(&RequestDescriptor::delete("/users/42"), "delete_user", &cancel)
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use http::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{
    ApiResponse, RequestDescriptor, StaticTokenProvider, TokenProvider, TransportSender,
};
use crate::config::{ClientConfig, Credentials};
use crate::reqwestx::ReqwestTransport;
use crate::retry::{RetryPolicy, cancellable};
use crate::{Error, Result};

/// Orchestrates one logical API call end to end.
///
/// Holds only shared, read-only collaborators and configuration, so a single
/// instance can serve any number of concurrent calls. Cloning is cheap.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn TransportSender>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    default_headers: HeaderMap,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn TransportSender>,
        token_provider: Option<Arc<dyn TokenProvider>>,
        default_headers: HeaderMap,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            token_provider,
            default_headers,
            policy,
        }
    }

    /// Builds a dispatcher from configuration and a caller-supplied transport.
    ///
    /// `token_provider` is required for `client_credentials` and ignored
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or
    /// `client_credentials` is configured without a provider.
    pub fn from_config(
        config: &ClientConfig,
        transport: Arc<dyn TransportSender>,
        token_provider: Option<Arc<dyn TokenProvider>>,
    ) -> Result<Self> {
        config.validate()?;

        let token_provider: Option<Arc<dyn TokenProvider>> = match &config.credentials {
            Credentials::None => None,
            Credentials::StaticToken { token } => {
                Some(Arc::new(StaticTokenProvider::new(token.clone())))
            }
            Credentials::ClientCredentials => {
                Some(token_provider.ok_or(Error::MissingTokenProvider)?)
            }
        };

        Ok(Self::new(
            transport,
            token_provider,
            config.header_map()?,
            config.retry_policy(),
        ))
    }

    /// Builds a dispatcher over a [`ReqwestTransport`] created from the same configuration.
    pub fn with_reqwest(
        config: &ClientConfig,
        token_provider: Option<Arc<dyn TokenProvider>>,
    ) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::from_config(config)?);
        Self::from_config(config, transport, token_provider)
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Sends `request` and decodes the JSON response body as `T`.
    ///
    /// # Errors
    ///
    /// Everything [`send_raw`](Self::send_raw) returns, plus
    /// [`Error::JsonDecode`] if the body does not decode as `T`.
    pub async fn send<T: DeserializeOwned>(
        &self,
        request: &RequestDescriptor,
        operation: &str,
        cancel: &CancellationToken,
    ) -> Result<T> {
        self.send_raw(request, operation, cancel).await?.json()
    }

    /// Sends `request` for an operation whose response body carries nothing.
    ///
    /// # Errors
    ///
    /// The same errors as [`send_raw`](Self::send_raw); the body is discarded unread.
    pub async fn send_empty(
        &self,
        request: &RequestDescriptor,
        operation: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.send_raw(request, operation, cancel).await.map(|_| ())
    }

    /// Sends `request` and returns the transport's response unchanged.
    ///
    /// # Errors
    ///
    /// - [`Error::Authentication`] if the token provider fails; no request is sent
    /// - [`Error::RateLimited`] once the retry budget is exhausted
    /// - [`Error::Cancelled`] if `cancel` fires at any suspension point
    /// - any other transport error on its first occurrence
    pub async fn send_raw(
        &self,
        request: &RequestDescriptor,
        operation: &str,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse> {
        let headers = self.headers_for(operation, cancel).await?;

        self.policy
            .run(cancel, || {
                self.transport.send(request, &headers, operation, cancel)
            })
            .await
    }

    async fn headers_for(&self, operation: &str, cancel: &CancellationToken) -> Result<HeaderMap> {
        let mut headers = self.default_headers.clone();

        let Some(provider) = &self.token_provider else {
            return Ok(headers);
        };

        let token = match cancellable(cancel, provider.access_token(cancel)).await {
            Ok(token) => token,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(err) => {
                warn!("Token acquisition for {} failed: {}", operation, err);
                return Err(Error::Authentication {
                    operation: operation.to_string(),
                    source: Box::new(err),
                });
            }
        };

        if token.expose_secret().is_empty() {
            debug!("Empty token for {}, sending without authorization", operation);
            return Ok(headers);
        }

        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|err| Error::Authentication {
                operation: operation.to_string(),
                source: Box::new(err),
            })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);

        Ok(headers)
    }
}
