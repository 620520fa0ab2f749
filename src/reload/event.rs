//! Reload hub events.

use axum::response::sse;

/// SSE event type used for every hub message.
pub const MESSAGE: &str = "message";
/// Data of the event telling browsers to refresh.
pub const RELOAD: &str = "reload";
/// Data of the heartbeat event.
pub const PING: &str = "ping";

/// A `(type, data)` pair delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub event_type: String,
    pub data: String,
}

impl Event {
    /// Create an event. Line breaks in `event_type` are replaced with spaces,
    /// since the SSE `event:` field is a single line.
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        let event_type = event_type.into().replace(['\r', '\n'], " ");
        Self {
            event_type,
            data: data.into(),
        }
    }

    pub fn reload() -> Self {
        Self::new(MESSAGE, RELOAD)
    }

    pub fn ping() -> Self {
        Self::new(MESSAGE, PING)
    }
}

impl From<&Event> for sse::Event {
    fn from(event: &Event) -> Self {
        sse::Event::default().event(&event.event_type).data(&event.data)
    }
}
