use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Caller-built description of one outbound call.
///
/// The dispatcher never mutates a descriptor; it only supplies an extra
/// header set alongside it when handing it to a [`TransportSender`].
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path appended to the transport's base URL, e.g. `/users/42`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Bytes>,
    /// Per-call headers
    pub headers: HeaderMap,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Serializes `payload` as the JSON body and sets `Content-Type`.
    pub fn json<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self> {
        let body = serde_json::to_vec(payload).map_err(Error::JsonEncode)?;
        self.body = Some(Bytes::from(body));
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|source| Error::InvalidHeaderName {
                name: name.to_string(),
                source,
            })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|source| Error::InvalidHeaderValue {
                name: name.to_string(),
                source,
            })?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }
}

/// Successful response returned by a [`TransportSender`].
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(Error::JsonDecode)
    }
}

/// Source of bearer tokens for the dispatcher.
///
/// Implementations may perform their own network calls and caching; they
/// must be safe to call concurrently. Returning an empty token means no
/// `Authorization` header is attached. A token that cannot be used should be
/// reported as an error here rather than returned.
///
/// # Example Implementation
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use secrecy::SecretString;
/// use tokio_util::sync::CancellationToken;
/// use tollgate::{Result, TokenProvider};
///
/// struct EnvToken;
///
/// #[async_trait]
/// impl TokenProvider for EnvToken {
///     async fn access_token(&self, _cancel: &CancellationToken) -> Result<SecretString> {
///         Ok(SecretString::from(std::env::var("API_TOKEN").unwrap_or_default()))
///     }
/// }
/// ```
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a currently valid access token.
    ///
    /// # Errors
    ///
    /// Any error is reported to the caller of the dispatch as
    /// [`Error::Authentication`], except [`Error::Cancelled`] which is passed
    /// through.
    async fn access_token(&self, cancel: &CancellationToken) -> Result<SecretString>;
}

/// Executes exactly one HTTP call.
///
/// Implementations must not retry internally and must be safe to call
/// concurrently. Failures are reported as:
///
/// - [`Error::Unauthorized`] for authentication rejections
/// - [`Error::RateLimited`] with an optional reset hint for rate limiting
/// - any other [`Error`] for everything else
#[async_trait]
pub trait TransportSender: Send + Sync {
    async fn send(
        &self,
        request: &RequestDescriptor,
        headers: &HeaderMap,
        operation: &str,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse>;
}

/// Token provider for a fixed, pre-issued bearer token.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: SecretString,
}

impl StaticTokenProvider {
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self, _cancel: &CancellationToken) -> Result<SecretString> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serde_json::json;

    #[test]
    fn json_body_sets_content_type() {
        let request = RequestDescriptor::post("/widgets")
            .json(&json!({ "name": "sprocket" }))
            .unwrap()
            .query("dry_run", "true");

        assert_eq!(request.method, Method::POST);
        assert_eq!(
            request.headers.get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(
            request.body.as_deref(),
            Some(br#"{"name":"sprocket"}"#.as_slice())
        );
        assert_eq!(
            request.query,
            vec![("dry_run".to_string(), "true".to_string())]
        );
    }

    #[test]
    fn header_rejects_invalid_values() {
        let err = RequestDescriptor::get("/").header("X-Trace", "a\nb").unwrap_err();
        assert!(matches!(err, Error::InvalidHeaderValue { .. }));

        let err = RequestDescriptor::get("/").header("bad name", "x").unwrap_err();
        assert!(matches!(err, Error::InvalidHeaderName { .. }));
    }

    #[test]
    fn response_json_decodes_body() {
        let response = ApiResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(br#"{"id":7}"#),
        };
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value, json!({ "id": 7 }));

        let response = ApiResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"not json"),
        };
        assert!(matches!(
            response.json::<serde_json::Value>(),
            Err(Error::JsonDecode(_))
        ));
    }

    #[tokio::test]
    async fn static_provider_returns_its_token() {
        let provider = StaticTokenProvider::new(SecretString::from("abc"));
        let token = provider
            .access_token(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(token.expose_secret(), "abc");
    }
}
