//! Single-target forwarding pipeline.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → request.rs (target URI, outbound headers)
//!     → body buffered once
//!     → RetryingTransport (dial backend, retry with backoff)
//!     → 101? websocket.rs bridges the upgraded connections
//!     → response.rs (strip hop-by-hop)
//!     → HtmlRewriter (inject reload script into HTML documents)
//!     → client
//! ```

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::ConnectInfo,
    http::{header, HeaderName, Request, Response, Version},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::config::ProxyConfig;
use crate::http::{request, response, websocket};
use crate::observability::metrics;
use crate::resilience::{BufferedRequest, FragmentMarker, RetryPolicy, RetryingTransport};
use crate::rewrite::{HtmlRewriter, SkipRewrite};

pub type HttpClient = Client<HttpConnector, Body>;

/// Build the pooled backend client.
pub fn build_client(connect_timeout: Duration) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    Client::builder(TokioExecutor::new()).build(connector)
}

/// Forwards every non-internal request to the configured backend.
pub struct Forwarder {
    target: Url,
    transport: RetryingTransport<HttpClient>,
    rewriter: Option<HtmlRewriter>,
    max_body_bytes: usize,
}

impl Forwarder {
    /// Create a forwarder for an already validated `target`.
    pub fn new(target: Url, config: &ProxyConfig) -> Self {
        let client = build_client(Duration::from_secs(config.timeouts.connect_secs));
        let mut transport = RetryingTransport::new(client, RetryPolicy::from(&config.retries));

        match HeaderName::from_bytes(config.rewrite.fragment_header.as_bytes()) {
            Ok(header) => {
                transport = transport.with_fragment_marker(FragmentMarker::new(
                    header,
                    config.rewrite.fragment_value.clone(),
                ));
            }
            Err(_) => tracing::warn!(
                header = %config.rewrite.fragment_header,
                "Invalid fragment header name, fragment detection disabled"
            ),
        }

        let rewriter = config
            .rewrite
            .enabled
            .then(|| HtmlRewriter::new(config.limits.max_body_bytes));

        Self {
            target,
            transport,
            rewriter,
            max_body_bytes: config.limits.max_body_bytes,
        }
    }

    /// Forward `request` and produce the response for the client.
    pub async fn forward(&self, mut request: Request<Body>) -> Response<Body> {
        let start = Instant::now();
        let response = self.forward_inner(&mut request).await;
        metrics::record_request(response.status().as_u16(), start);
        response
    }

    async fn forward_inner(&self, request: &mut Request<Body>) -> Response<Body> {
        let request_id = request
            .headers()
            .get(request::X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let client_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let client_upgrade = request::is_upgrade_request(request.headers())
            .then(|| hyper::upgrade::on(&mut *request));

        let uri = match request::target_uri(&self.target, request.uri()) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Cannot map request onto target");
                return response::bad_request("Invalid request URI");
            }
        };

        if exceeds_limit(request.headers(), self.max_body_bytes) {
            return response::payload_too_large(self.max_body_bytes);
        }
        let body = std::mem::replace(request.body_mut(), Body::empty());
        let body: Bytes = match axum::body::to_bytes(body, self.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
                return response::bad_request("Failed to read request body");
            }
        };

        let buffered = BufferedRequest {
            method: request.method().clone(),
            uri,
            version: Version::HTTP_11,
            headers: request::outbound_headers(request.headers(), client_ip),
            body,
        };

        tracing::debug!(
            request_id = %request_id,
            method = %buffered.method,
            uri = %buffered.uri,
            "Forwarding request"
        );

        let backend_response = match self.transport.execute(&buffered).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Backend unreachable");
                return response::bad_gateway(&e.to_string());
            }
        };

        if let Some(client_upgrade) = client_upgrade {
            if websocket::is_switching_protocols(&backend_response) {
                return websocket::bridge(client_upgrade, backend_response);
            }
        }

        let mut backend_response = response::sanitize_backend_response(backend_response);
        if !response::has_body(&buffered.method, backend_response.status()) {
            backend_response.extensions_mut().insert(SkipRewrite);
        }

        let Some(rewriter) = &self.rewriter else {
            return backend_response;
        };
        match rewriter.modify_response(backend_response).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Failed to relay backend response");
                response::bad_gateway(&e.to_string())
            }
        }
    }
}

fn exceeds_limit(headers: &axum::http::HeaderMap, limit: usize) -> bool {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len > limit)
}
