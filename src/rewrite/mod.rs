//! HTML response rewriting.
//!
//! # Data Flow
//! ```text
//! backend response (after the retrying transport)
//!     → text/html and no SkipRewrite? otherwise untouched
//!     → encoding.rs (decompress identity/gzip/br)
//!     → csp.rs (nonce from script-src)
//!     → html.rs (append <script> to the first <body>)
//!     → encoding.rs (recompress), Content-Length recomputed
//! ```
//!
//! Any decode or structure failure serves the original bytes unchanged.

pub mod csp;
pub mod encoding;
pub mod html;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Response};
use futures_util::stream::{self, StreamExt};
use thiserror::Error;

use crate::observability::metrics;
use crate::reload::SCRIPT_PATH;

pub use encoding::Encoding;

/// Response extension telling the rewriter to leave a response alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipRewrite;

/// Errors raised while rewriting an HTML response.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("body not found")]
    BodyNotFound,

    #[error("failed to decode {encoding} body: {source}")]
    Decode {
        encoding: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {encoding} body: {source}")]
    Encode {
        encoding: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("HTML rewriting failed: {0}")]
    Html(String),

    #[error("failed to read response body: {0}")]
    ReadBody(#[source] axum::Error),
}

/// Injects the reload script into proxied HTML documents.
#[derive(Debug, Clone)]
pub struct HtmlRewriter {
    script_src: String,
    max_body_bytes: usize,
}

impl HtmlRewriter {
    pub fn new(max_body_bytes: usize) -> Self {
        Self {
            script_src: SCRIPT_PATH.to_string(),
            max_body_bytes,
        }
    }

    /// Whether `response` is an HTML document eligible for injection.
    pub fn should_rewrite(response: &Response<Body>) -> bool {
        if response.extensions().get::<SkipRewrite>().is_some() {
            return false;
        }
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"))
    }

    /// Rewrite `response` in place of the original.
    ///
    /// Only an unreadable upstream body is an error; rewriting failures fall
    /// back to the original bytes.
    pub async fn modify_response(&self, response: Response<Body>) -> Result<Response<Body>, RewriteError> {
        if !Self::should_rewrite(&response) {
            return Ok(response);
        }
        if Encoding::from_headers(response.headers()).is_none() || self.exceeds_limit(response.headers()) {
            tracing::debug!("Leaving HTML response untouched (unsupported encoding or oversized)");
            return Ok(response);
        }

        let (mut parts, body) = response.into_parts();
        let original = match buffer_body(body, self.max_body_bytes)
            .await
            .map_err(RewriteError::ReadBody)?
        {
            Buffered::Complete(bytes) => bytes,
            Buffered::Oversized(body) => {
                metrics::record_rewrite("oversized");
                tracing::debug!(limit = self.max_body_bytes, "HTML body over the rewrite limit, streaming it untouched");
                return Ok(Response::from_parts(parts, body));
            }
        };

        match self.rewrite_document(&parts.headers, &original) {
            Ok(rewritten) => {
                metrics::record_rewrite("injected");
                set_content_length(&mut parts.headers, rewritten.len());
                Ok(Response::from_parts(parts, Body::from(rewritten)))
            }
            Err(e) => {
                metrics::record_rewrite("skipped");
                tracing::warn!(error = %e, "Unable to insert reload script, serving original body");
                set_content_length(&mut parts.headers, original.len());
                Ok(Response::from_parts(parts, Body::from(original)))
            }
        }
    }

    /// Decode `body`, inject the script and re-encode with the same encoding.
    pub fn rewrite_document(&self, headers: &HeaderMap, body: &[u8]) -> Result<Bytes, RewriteError> {
        let encoding = Encoding::from_headers(headers).unwrap_or(Encoding::Identity);
        let decoded = encoding.decode(body).map_err(|source| RewriteError::Decode {
            encoding: encoding.as_str(),
            source,
        })?;

        let nonce = headers
            .get(header::CONTENT_SECURITY_POLICY)
            .and_then(|v| v.to_str().ok())
            .and_then(csp::script_nonce);
        let tag = html::script_tag(&self.script_src, nonce);
        let injected = html::inject_into_body(&decoded, &tag)?;

        let encoded = encoding.encode(&injected).map_err(|source| RewriteError::Encode {
            encoding: encoding.as_str(),
            source,
        })?;
        Ok(Bytes::from(encoded))
    }

    fn exceeds_limit(&self, headers: &HeaderMap) -> bool {
        headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
            .is_some_and(|len| len > self.max_body_bytes)
    }
}

enum Buffered {
    Complete(Bytes),
    /// The limit was crossed; holds the chunks read so far followed by the
    /// unread remainder.
    Oversized(Body),
}

/// Read `body` into memory unless it grows past `limit` bytes.
async fn buffer_body(body: Body, limit: usize) -> Result<Buffered, axum::Error> {
    let mut frames = body.into_data_stream();
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut total = 0usize;

    while let Some(chunk) = frames.next().await {
        let chunk = chunk?;
        total += chunk.len();
        chunks.push(chunk);
        if total > limit {
            let read = stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>));
            return Ok(Buffered::Oversized(Body::from_stream(read.chain(frames))));
        }
    }

    if chunks.len() == 1 {
        return Ok(Buffered::Complete(chunks.remove(0)));
    }
    let mut buf = Vec::with_capacity(total);
    for chunk in &chunks {
        buf.extend_from_slice(chunk);
    }
    Ok(Buffered::Complete(Bytes::from(buf)))
}

fn set_content_length(headers: &mut HeaderMap, len: usize) {
    headers.remove(header::TRANSFER_ENCODING);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    const TAG: &str = r#"<script src="/_reload/script.js"></script>"#;

    fn html_response(body: impl Into<Body>, headers: &[(&'static str, &'static str)]) -> Response<Body> {
        let mut builder = Response::builder().status(StatusCode::OK);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(body.into()).unwrap()
    }

    async fn body_bytes(response: Response<Body>) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    fn content_length(response: &Response<Body>) -> usize {
        response.headers()[header::CONTENT_LENGTH].to_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn test_injects_script_and_updates_length() {
        let rewriter = HtmlRewriter::new(1024 * 1024);
        let response = html_response(
            "<html><body>Hi</body></html>",
            &[("content-type", "text/html; charset=utf-8"), ("content-length", "28")],
        );

        let response = rewriter.modify_response(response).await.unwrap();
        let len = content_length(&response);
        let body = body_bytes(response).await;
        let text = std::str::from_utf8(&body).unwrap();

        assert_eq!(text, format!("<html><body>Hi{TAG}</body></html>"));
        assert_eq!(text.matches("/_reload/script.js").count(), 1);
        assert_eq!(len, body.len());
    }

    #[tokio::test]
    async fn test_copies_csp_nonce() {
        let rewriter = HtmlRewriter::new(1024 * 1024);
        let response = html_response(
            "<html><body></body></html>",
            &[
                ("content-type", "text/html"),
                ("content-security-policy", "default-src 'self'; script-src 'nonce-XYZ'"),
            ],
        );

        let body = body_bytes(rewriter.modify_response(response).await.unwrap()).await;
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.contains(r#"<script src="/_reload/script.js" nonce="XYZ"></script>"#));
    }

    #[tokio::test]
    async fn test_skip_marker_passes_bytes_through() {
        let rewriter = HtmlRewriter::new(1024 * 1024);
        let original = "<html><body>fragment</body></html>";
        let mut response = html_response(original, &[("content-type", "text/html")]);
        response.extensions_mut().insert(SkipRewrite);

        let response = rewriter.modify_response(response).await.unwrap();
        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
        assert_eq!(&body_bytes(response).await[..], original.as_bytes());
    }

    #[tokio::test]
    async fn test_non_html_untouched() {
        let rewriter = HtmlRewriter::new(1024 * 1024);
        let original = r#"{"body": "<body></body>"}"#;
        let response = html_response(original, &[("content-type", "application/json")]);

        let response = rewriter.modify_response(response).await.unwrap();
        assert_eq!(&body_bytes(response).await[..], original.as_bytes());
    }

    #[tokio::test]
    async fn test_missing_body_serves_original() {
        let rewriter = HtmlRewriter::new(1024 * 1024);
        let original = "<html><head><title>no body</title></head></html>";
        let response = html_response(original, &[("content-type", "text/html")]);

        let response = rewriter.modify_response(response).await.unwrap();
        assert_eq!(content_length(&response), original.len());
        assert_eq!(&body_bytes(response).await[..], original.as_bytes());
    }

    #[tokio::test]
    async fn test_gzip_round_trip() {
        let rewriter = HtmlRewriter::new(1024 * 1024);
        let packed = Encoding::Gzip.encode(b"<html><body>zipped</body></html>").unwrap();
        let response = html_response(packed, &[("content-type", "text/html"), ("content-encoding", "gzip")]);

        let response = rewriter.modify_response(response).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
        let len = content_length(&response);
        let body = body_bytes(response).await;
        assert_eq!(len, body.len());

        let unpacked = Encoding::Gzip.decode(&body).unwrap();
        assert_eq!(
            std::str::from_utf8(&unpacked).unwrap(),
            format!("<html><body>zipped{TAG}</body></html>")
        );
    }

    #[tokio::test]
    async fn test_brotli_round_trip() {
        let rewriter = HtmlRewriter::new(1024 * 1024);
        let packed = Encoding::Brotli.encode(b"<html><body>br</body></html>").unwrap();
        let response = html_response(packed, &[("content-type", "text/html"), ("content-encoding", "br")]);

        let body = body_bytes(rewriter.modify_response(response).await.unwrap()).await;
        let unpacked = Encoding::Brotli.decode(&body).unwrap();
        assert!(std::str::from_utf8(&unpacked).unwrap().contains(TAG));
    }

    #[tokio::test]
    async fn test_corrupt_gzip_serves_original() {
        let rewriter = HtmlRewriter::new(1024 * 1024);
        let original: &'static [u8] = b"\x1f\x8bnot really gzip";
        let response = html_response(original, &[("content-type", "text/html"), ("content-encoding", "gzip")]);

        let body = body_bytes(rewriter.modify_response(response).await.unwrap()).await;
        assert_eq!(&body[..], original);
    }

    #[tokio::test]
    async fn test_streamed_body_over_limit_passes_through() {
        let rewriter = HtmlRewriter::new(16);
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"<html><body>")),
            Ok(Bytes::from_static(b"<p>longer than the limit</p>")),
            Ok(Bytes::from_static(b"</body></html>")),
        ];
        let response = html_response(
            Body::from_stream(futures_util::stream::iter(chunks)),
            &[("content-type", "text/html")],
        );

        let response = rewriter.modify_response(response).await.unwrap();
        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
        assert_eq!(
            &body_bytes(response).await[..],
            b"<html><body><p>longer than the limit</p></body></html>"
        );
    }

    #[tokio::test]
    async fn test_streamed_body_under_limit_is_rewritten() {
        let rewriter = HtmlRewriter::new(1024);
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"<html><body>")),
            Ok(Bytes::from_static(b"Hi</body></html>")),
        ];
        let response = html_response(
            Body::from_stream(futures_util::stream::iter(chunks)),
            &[("content-type", "text/html")],
        );

        let response = rewriter.modify_response(response).await.unwrap();
        let len = content_length(&response);
        let body = body_bytes(response).await;
        assert_eq!(&body[..], format!("<html><body>Hi{TAG}</body></html>").as_bytes());
        assert_eq!(len, body.len());
    }

    #[tokio::test]
    async fn test_unsupported_encoding_untouched() {
        let rewriter = HtmlRewriter::new(1024 * 1024);
        let original: &'static [u8] = b"opaque zstd bytes";
        let response = html_response(original, &[("content-type", "text/html"), ("content-encoding", "zstd")]);

        let response = rewriter.modify_response(response).await.unwrap();
        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
        assert_eq!(&body_bytes(response).await[..], original);
    }
}
