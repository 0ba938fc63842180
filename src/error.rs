use std::time::Duration;

use reqwest::StatusCode;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification used by the dispatcher to decide between
/// retrying and propagating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    RateLimit,
    Generic,
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("authentication failed for {operation}: {source}")]
    Authentication {
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("{operation} was rejected as unauthorized with status {status}")]
    Unauthorized {
        operation: String,
        status: StatusCode,
        body: Option<String>,
    },

    #[error("{operation} was rate limited{}", format_reset_hint(.reset_in))]
    RateLimited {
        operation: String,
        reset_in: Option<Duration>,
    },

    #[error("{operation} failed with status {status}")]
    ApiStatus {
        operation: String,
        status: StatusCode,
        body: Option<String>,
    },

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("http client build failed: {0}")]
    HttpClientBuild(#[source] reqwest::Error),

    #[error("request json encode failed: {0}")]
    JsonEncode(#[source] serde_json::Error),

    #[error("response json decode failed: {0}")]
    JsonDecode(#[source] serde_json::Error),

    #[error("invalid header name '{name}': {source}")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: http::header::InvalidHeaderName,
    },

    #[error("invalid value for header '{name}': {source}")]
    InvalidHeaderValue {
        name: String,
        #[source]
        source: http::header::InvalidHeaderValue,
    },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("client_credentials configured but no token provider was supplied")]
    MissingTokenProvider,

    /// The transport's concurrency limiter was closed. `ReqwestTransport`
    /// never closes its own semaphore, so it does not produce this in
    /// practice; custom transports built on a shared `Semaphore` may.
    #[error("transport concurrency semaphore closed")]
    SemaphoreClosed,

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Authentication { .. } | Error::Unauthorized { .. } => ErrorKind::Authentication,
            Error::RateLimited { .. } => ErrorKind::RateLimit,
            Error::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Generic,
        }
    }

    /// Server-advertised wait before a rate-limited call may be retried.
    pub fn reset_hint(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { reset_in, .. } => *reset_in,
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind() == ErrorKind::RateLimit
    }
}

fn format_reset_hint(reset_in: &Option<Duration>) -> String {
    match reset_in {
        Some(reset_in) => format!(" (reset in {}ms)", reset_in.as_millis()),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
