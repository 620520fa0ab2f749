//! HTTP handlers for the reload endpoints.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{
        sse::{self, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures_util::{stream, StreamExt};

use crate::reload::event::Event;
use crate::reload::hub::ReloadHub;

/// Browser-side client that listens for reload events.
pub const RELOAD_SCRIPT: &str = include_str!("script.js");

/// State shared by the reload handlers.
#[derive(Debug, Clone)]
pub struct ReloadState {
    pub hub: Arc<ReloadHub>,
    pub heartbeat: Duration,
}

/// `GET` script path: the embedded reload client.
pub async fn serve_script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript")], RELOAD_SCRIPT)
}

/// `GET` events path: open an SSE stream for one browser tab.
pub async fn subscribe_events(State(state): State<ReloadState>) -> Response {
    let subscription = state.hub.subscribe();
    tracing::info!(subscriber = subscription.id(), "Reload subscriber connected");

    let events = stream::once(async { Event::ping() })
        .chain(subscription.into_stream())
        .map(|event| Ok::<_, Infallible>(sse::Event::from(&event)));

    let keep_alive = KeepAlive::new()
        .interval(state.heartbeat)
        .event(sse::Event::from(&Event::ping()));

    let mut response = Sse::new(events).keep_alive(keep_alive).into_response();
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    response
}

/// `POST` events path: tell every open tab to reload.
pub async fn broadcast_reload(State(state): State<ReloadState>) -> StatusCode {
    state.hub.broadcast(Event::reload());
    StatusCode::NO_CONTENT
}

/// Any other method on the events path.
pub async fn events_method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "GET, POST")],
        "only GET or POST method allowed",
    )
}
