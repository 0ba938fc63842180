use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use http::header::{AUTHORIZATION, HeaderMap, RETRY_AFTER};
use http::StatusCode;
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::api::{ApiResponse, RequestDescriptor, TransportSender};
use crate::config::{ClientConfig, check_max_concurrent_requests};
use crate::retry::cancellable;
use crate::{Error, Result};

const RETRY_AFTER_MS: &str = "retry-after-ms";

#[derive(Debug, Clone)]
pub struct ReqwestTransportConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_concurrent_requests: usize,
    pub user_agent: Option<String>,
}

impl Default for ReqwestTransportConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(90),
            max_concurrent_requests: 300,
            user_agent: None,
        }
    }
}

/// [`TransportSender`] backed by a shared `reqwest` client.
///
/// Sends exactly one request per call and maps the response status onto the
/// crate's error kinds. Never retries.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    concurrent_semaphore: Arc<Semaphore>,
}

impl ReqwestTransport {
    pub fn new(config: ReqwestTransportConfig) -> Result<Self> {
        check_max_concurrent_requests(config.max_concurrent_requests)?;

        let client = Client::builder()
            .user_agent(
                config
                    .user_agent
                    .unwrap_or_else(|| format!("tollgate/{}", env!("CARGO_PKG_VERSION"))),
            )
            .timeout(config.timeout)
            .build()
            .map_err(Error::HttpClientBuild)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            concurrent_semaphore: Arc::new(Semaphore::new(config.max_concurrent_requests)),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Self::new(ReqwestTransportConfig {
            base_url: config.base_url.clone(),
            timeout: config.timeout(),
            max_concurrent_requests: config.max_concurrent_requests,
            user_agent: config.user_agent.clone(),
        })
    }

    fn merged_headers(request: &RequestDescriptor, headers: &HeaderMap) -> HeaderMap {
        let mut merged = headers.clone();
        for (name, value) in &request.headers {
            if name == AUTHORIZATION && headers.contains_key(AUTHORIZATION) {
                continue;
            }
            merged.insert(name.clone(), value.clone());
        }
        merged
    }

    async fn execute(
        &self,
        request: &RequestDescriptor,
        headers: &HeaderMap,
        operation: &str,
    ) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!("Sending {} {} for {}", request.method, url, operation);

        let _request_permit = self
            .concurrent_semaphore
            .acquire()
            .await
            .map_err(|_| Error::SemaphoreClosed)?;

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(Self::merged_headers(request, headers));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(Error::Request)?;
        let status = response.status();

        if status.is_success() {
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(Error::Request)?;
            trace!("{} succeeded with status {}", operation, status);
            return Ok(ApiResponse {
                status,
                headers,
                body,
            });
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let reset_in = reset_hint(response.headers(), SystemTime::now());
                debug!("{} rate limited, reset hint {:?}", operation, reset_in);
                Err(Error::RateLimited {
                    operation: operation.to_string(),
                    reset_in,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Unauthorized {
                operation: operation.to_string(),
                status,
                body: error_body(response).await,
            }),
            _ => Err(Error::ApiStatus {
                operation: operation.to_string(),
                status,
                body: error_body(response).await,
            }),
        }
    }
}

#[async_trait]
impl TransportSender for ReqwestTransport {
    async fn send(
        &self,
        request: &RequestDescriptor,
        headers: &HeaderMap,
        operation: &str,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse> {
        cancellable(cancel, self.execute(request, headers, operation)).await
    }
}

async fn error_body(response: reqwest::Response) -> Option<String> {
    response.text().await.ok().filter(|text| !text.is_empty())
}

/// Reads the server's reset hint from `retry-after-ms` or `Retry-After`.
///
/// `Retry-After` may carry delta-seconds or an HTTP date; dates in the past
/// yield a zero hint. A `retry-after-ms` value that is negative, not finite or
/// too large for a [`Duration`] is ignored.
fn reset_hint(headers: &HeaderMap, now: SystemTime) -> Option<Duration> {
    if let Some(millis) = headers
        .get(RETRY_AFTER_MS)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        && let Ok(reset_in) = Duration::try_from_secs_f64(millis / 1000.0)
    {
        return Some(reset_in);
    }

    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = httpdate::parse_http_date(value).ok()?;
    Some(at.duration_since(now).unwrap_or(Duration::ZERO))
}
