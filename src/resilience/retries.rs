//! Retrying transport.
//!
//! # Responsibilities
//! - Deliver a buffered request to the backend through any [`SendRequest`]
//! - Retry connection-level failures with exponential backoff
//! - Pass HTTP error statuses through untouched
//! - Tag responses to fragment requests with [`SkipRewrite`]

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderName, Method, Request, Response, Uri, Version};
use futures_util::future::BoxFuture;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use thiserror::Error;

use crate::observability::metrics;
use crate::resilience::backoff::RetryPolicy;
use crate::rewrite::SkipRewrite;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Something that can put one HTTP request on the wire.
pub trait SendRequest: Send + Sync {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, BoxError>>;
}

impl SendRequest for Client<HttpConnector, Body> {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, BoxError>> {
        let response = self.request(request);
        Box::pin(async move {
            let response = response.await?;
            Ok(response.map(Body::new))
        })
    }
}

/// Error returned once the retry budget is spent.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("max retries reached for URL {uri:?} after {attempts} attempts")]
    RetriesExhausted {
        uri: String,
        attempts: u32,
        #[source]
        source: BoxError,
    },
}

/// A request whose body has been read into memory so it can be replayed.
#[derive(Debug, Clone)]
pub struct BufferedRequest {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BufferedRequest {
    /// Build a fresh request for one delivery attempt.
    pub fn to_request(&self) -> Request<Body> {
        let mut request = Request::new(Body::from(self.body.clone()));
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.version_mut() = self.version;
        *request.headers_mut() = self.headers.clone();
        request
    }
}

/// Request header identifying a partial-page update.
#[derive(Debug, Clone)]
pub struct FragmentMarker {
    pub header: HeaderName,
    pub value: String,
}

impl FragmentMarker {
    pub fn new(header: HeaderName, value: impl Into<String>) -> Self {
        Self {
            header,
            value: value.into(),
        }
    }

    pub fn matches(&self, headers: &HeaderMap) -> bool {
        headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case(&self.value))
    }
}

/// Decorator adding bounded retries to a [`SendRequest`].
pub struct RetryingTransport<S> {
    sender: S,
    policy: RetryPolicy,
    fragment: Option<FragmentMarker>,
}

impl<S: SendRequest> RetryingTransport<S> {
    pub fn new(sender: S, policy: RetryPolicy) -> Self {
        Self {
            sender,
            policy,
            fragment: None,
        }
    }

    /// Mark responses to requests carrying `marker` as not rewritable.
    pub fn with_fragment_marker(mut self, marker: FragmentMarker) -> Self {
        self.fragment = Some(marker);
        self
    }

    /// Deliver `request`, retrying connection failures per the policy.
    pub async fn execute(&self, request: &BufferedRequest) -> Result<Response<Body>, TransportError> {
        let skip_rewrite = self
            .fragment
            .as_ref()
            .is_some_and(|marker| marker.matches(&request.headers));

        let mut attempt = 0;
        loop {
            match self.sender.send(request.to_request()).await {
                Ok(mut response) => {
                    if attempt > 0 {
                        tracing::debug!(uri = %request.uri, attempts = attempt + 1, "Backend reachable after retries");
                    }
                    if skip_rewrite {
                        response.extensions_mut().insert(SkipRewrite);
                    }
                    return Ok(response);
                }
                Err(source) => {
                    attempt += 1;
                    if attempt >= self.policy.max_retries {
                        tracing::warn!(uri = %request.uri, attempts = attempt, error = %source, "Giving up on backend");
                        return Err(TransportError::RetriesExhausted {
                            uri: request.uri.to_string(),
                            attempts: attempt,
                            source,
                        });
                    }

                    let delay = self.policy.delay_for(attempt - 1);
                    tracing::debug!(uri = %request.uri, attempt, delay = ?delay, error = %source, "Backend unavailable, retrying");
                    metrics::record_retry();
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
