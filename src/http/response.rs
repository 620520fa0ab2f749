//! Response handling and transformation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers from backend responses
//! - Map forwarding failures to gateway-style client responses

use axum::{
    body::Body,
    http::{header, HeaderValue, Response, StatusCode},
    response::IntoResponse,
};

use crate::http::request::remove_hop_by_hop;

/// Remove hop-by-hop headers from a backend response before relaying it.
pub fn sanitize_backend_response(mut response: Response<Body>) -> Response<Body> {
    remove_hop_by_hop(response.headers_mut());
    response
}

/// Whether a response to `method` with `status` can carry a body at all.
pub fn has_body(method: &axum::http::Method, status: StatusCode) -> bool {
    !(method == axum::http::Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

/// Plain-text error page served when the backend cannot be reached.
pub fn bad_gateway(detail: &str) -> Response<Body> {
    error_response(StatusCode::BAD_GATEWAY, &format!("Proxy error: {detail}\n"))
}

pub fn payload_too_large(limit: usize) -> Response<Body> {
    error_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        &format!("Request body exceeds {limit} bytes\n"),
    )
}

pub fn bad_request(detail: &str) -> Response<Body> {
    error_response(StatusCode::BAD_REQUEST, &format!("{detail}\n"))
}

fn error_response(status: StatusCode, body: &str) -> Response<Body> {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))],
        body.to_string(),
    )
        .into_response()
}
