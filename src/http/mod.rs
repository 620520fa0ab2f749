//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, fixed reload paths, middleware)
//!     → reload paths: crate::reload::handlers
//!     → everything else: forward.rs
//!         → request.rs (target URI, outbound headers)
//!         → crate::resilience (retrying transport)
//!         → websocket.rs (protocol upgrades)
//!         → response.rs (hop-by-hop, gateway errors)
//!         → crate::rewrite (script injection)
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use forward::Forwarder;
pub use request::X_REQUEST_ID;
pub use server::{AppState, ProxyServer};
