//! Protocol upgrade pass-through (WebSocket and friends).
//!
//! # Data Flow
//! ```text
//! Client ←──── upgraded bytes ────→ Proxy ←──── upgraded bytes ────→ Backend
//! ```
//!
//! The handshake travels through the normal forwarding path. When the backend
//! answers `101 Switching Protocols`, both connections are taken over and
//! bytes are copied in each direction until either side closes.

use axum::{
    body::Body,
    http::{Response, StatusCode},
};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;

/// Relay the backend's `101` to the client and bridge the two upgraded
/// connections on a background task.
pub fn bridge(client: OnUpgrade, mut backend_response: Response<Body>) -> Response<Body> {
    let backend = hyper::upgrade::on(&mut backend_response);

    tokio::spawn(async move {
        let (client, backend) = match tokio::try_join!(client, backend) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "Protocol upgrade failed");
                return;
            }
        };

        let mut client = TokioIo::new(client);
        let mut backend = TokioIo::new(backend);
        match tokio::io::copy_bidirectional(&mut client, &mut backend).await {
            Ok((to_backend, to_client)) => {
                tracing::debug!(to_backend, to_client, "Upgraded connection closed");
            }
            Err(e) => tracing::debug!(error = %e, "Upgraded connection ended with error"),
        }
    });

    let (parts, _) = backend_response.into_parts();
    Response::from_parts(parts, Body::empty())
}

/// Whether the backend accepted the protocol switch.
pub fn is_switching_protocols(response: &Response<Body>) -> bool {
    response.status() == StatusCode::SWITCHING_PROTOCOLS
}
