//! Live-reload development proxy library.
//!
//! Sits between the browser and a backend dev server: forwards traffic with
//! retries while the backend restarts, injects a reload script into HTML
//! pages, and pushes reload events to open tabs over Server-Sent Events.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod reload;
pub mod resilience;
pub mod rewrite;

pub use config::schema::ProxyConfig;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
pub use reload::{notify_proxy, ReloadHub};
