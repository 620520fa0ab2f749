//! Live-reload subsystem.
//!
//! # Data Flow
//! ```text
//! browser tab
//!     → GET SCRIPT_PATH  (handlers.rs serves script.js)
//!     → GET EVENTS_PATH  (hub.rs registers a subscriber, SSE stream opens)
//!
//! build orchestrator
//!     → POST EVENTS_PATH (notify.rs on the client side)
//!     → hub.rs fans ("message", "reload") out to every subscriber
//!     → script.js calls window.location.reload()
//! ```

pub mod event;
pub mod handlers;
pub mod hub;
pub mod notify;

pub use event::Event;
pub use handlers::ReloadState;
pub use hub::{ReloadHub, SubscriberId, Subscription};
pub use notify::{notify_proxy, NotifyError};

/// Path serving the embedded reload client.
pub const SCRIPT_PATH: &str = "/_reload/script.js";

/// Path of the SSE stream (GET) and broadcast trigger (POST).
pub const EVENTS_PATH: &str = "/_reload/events";
