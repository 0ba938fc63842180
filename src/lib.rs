//! # Tollgate
//!
//! The authenticated-dispatch layer of an HTTP API client: attaches bearer
//! credentials to every call, classifies failures into typed errors, and
//! retries rate-limited calls using the server's reset hint.
//!
//! ## Features
//!
//! - **Dispatcher**: one entry point per logical call, with typed and empty-body variants
//! - **Authentication**: bearer tokens from a pluggable [`TokenProvider`], fetched once per call
//! - **Rate-limit retries**: bounded by `max_retry`, waiting the reset hint or the
//!   configured floor, whichever is longer
//! - **Cancellation**: every suspension point honors a [`CancellationToken`]
//! - **Transport**: a `reqwest` based [`TransportSender`] mapping 401/403/429 onto error kinds
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tokio_util::sync::CancellationToken;
//! use tollgate::{ClientConfig, Dispatcher, ReqwestTransport, RequestDescriptor};
//!
//! # async fn example() -> tollgate::Result<()> {
//! let config = ClientConfig::new("https://api.example.com/v1");
//! let transport = Arc::new(ReqwestTransport::from_config(&config)?);
//! let dispatcher = Dispatcher::from_config(&config, transport, None)?;
//!
//! let request = RequestDescriptor::post("/widgets")
//!     .json(&serde_json::json!({ "name": "sprocket" }))?;
//! let created: serde_json::Value = dispatcher
//!     .send(&request, "create_widget", &CancellationToken::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`dispatcher`] - Credential attachment and the retry-aware send path
//! - [`retry`] - The bounded rate-limit backoff loop
//! - Configuration, transport and error types re-exported at the crate root
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

mod api;
mod config;
pub mod dispatcher;
mod error;
mod reqwestx;
pub mod retry;

pub use api::{
    ApiResponse, RequestDescriptor, StaticTokenProvider, TokenProvider, TransportSender,
};
pub use config::*;
pub use dispatcher::Dispatcher;
pub use error::{BoxError, Error, ErrorKind, Result};
pub use reqwestx::{ReqwestTransport, ReqwestTransportConfig};
pub use retry::RetryPolicy;
