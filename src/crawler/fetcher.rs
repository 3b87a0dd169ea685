//! HTTP fetcher implementation
//!
//! This module defines the request executor seam the crawler consumes,
//! including:
//! - The `RequestExecutor` trait and its request/response types
//! - Error classification into page states
//! - A reference executor built on `reqwest`
//!
//! Retries, caching, and tracing layers belong in executors that wrap another
//! executor; the crawler itself never retries.

use crate::state::PageState;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{redirect::Policy, Client, Method};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Maximum redirects followed by the reference executor
const MAX_REDIRECTS: usize = 10;

/// A single request handed to an executor
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub timeout: Duration,
}

impl FetchRequest {
    /// A plain GET with no extra headers
    pub fn get(url: Url, timeout: Duration) -> Self {
        Self {
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            timeout,
        }
    }
}

/// Response returned by an executor
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status of the final response
    pub status: u16,

    /// Body decoded as text
    pub body: String,

    /// Response headers
    pub headers: HeaderMap,

    /// Time from sending the request to reading the whole body
    pub elapsed: Duration,

    /// URL after redirects
    pub final_url: Url,
}

impl FetchResponse {
    /// Returns true for any 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The Content-Type header value, if present and valid text
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Whether the body should be parsed as HTML
    ///
    /// A missing Content-Type is treated as HTML.
    pub fn is_html(&self) -> bool {
        match self.content_type() {
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            }
            None => true,
        }
    }

    /// Parses a Retry-After header given in seconds
    ///
    /// HTTP-date values are ignored.
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

/// Transport-level failure for a single request
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request cancelled before it was sent")]
    Cancelled,
}

impl FetchError {
    /// Maps the error to the page state recorded for the attempt
    pub fn page_state(&self) -> PageState {
        match self {
            Self::Timeout(_) => PageState::TimedOut,
            Self::Connect(_) => PageState::Unreachable,
            Self::Request(_) | Self::Cancelled => PageState::Failed,
        }
    }

    fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            Self::Timeout(timeout)
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// Performs HTTP requests on behalf of the crawler
///
/// Implementations must not start a request once `cancel` has fired, but a
/// request that is already on the wire is allowed to finish.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn send(
        &self,
        request: FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse, FetchError>;
}

#[async_trait]
impl<E: RequestExecutor + ?Sized> RequestExecutor for Arc<E> {
    async fn send(
        &self,
        request: FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse, FetchError> {
        (**self).send(request, cancel).await
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The User-Agent header value
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use ripple_crawl::crawler::build_http_client;
///
/// let client = build_http_client("ripple-crawl/0.1 (+https://example.com/bot)").unwrap();
/// ```
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Reference executor over a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    client: Client,
}

impl ReqwestExecutor {
    /// Creates an executor with a freshly built client
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(user_agent)?,
        })
    }
}

#[async_trait]
impl RequestExecutor for ReqwestExecutor {
    async fn send(
        &self,
        request: FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let timeout = request.timeout;
        let started = Instant::now();

        let response = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))?;

        Ok(FetchResponse {
            status,
            body,
            headers,
            elapsed: started.elapsed(),
            final_url,
        })
    }
}
