//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Validate the backend target before anything is bound
//! - Create the Axum Router: fixed reload paths, everything else forwarded
//! - Wire up middleware (tracing, request ID)
//! - Serve on a listener until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{FromRef, State},
    http::Request,
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::config::{parse_target, validate_config, ConfigError, ProxyConfig};
use crate::http::forward::Forwarder;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::reload::{
    handlers::{broadcast_reload, events_method_not_allowed, serve_script, subscribe_events},
    ReloadHub, ReloadState, EVENTS_PATH, SCRIPT_PATH,
};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub reload: ReloadState,
    pub forwarder: Arc<Forwarder>,
}

impl FromRef<AppState> for ReloadState {
    fn from_ref(state: &AppState) -> Self {
        state.reload.clone()
    }
}

/// The live-reload proxy: one listener, one backend, one reload hub.
pub struct ProxyServer {
    config: ProxyConfig,
    target: Url,
    hub: Arc<ReloadHub>,
    router: Router,
}

impl ProxyServer {
    /// Create a proxy server, failing fast on an invalid configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let target = parse_target(&config.target.url)?;

        let hub = Arc::new(ReloadHub::new(config.reload.subscriber_queue));
        let state = AppState {
            reload: ReloadState {
                hub: Arc::clone(&hub),
                heartbeat: Duration::from_secs(config.reload.heartbeat_secs),
            },
            forwarder: Arc::new(Forwarder::new(target.clone(), &config)),
        };

        let router = Self::build_router(state);
        Ok(Self {
            config,
            target,
            hub,
            router,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route(SCRIPT_PATH, get(serve_script))
            .route(
                EVENTS_PATH,
                get(subscribe_events)
                    .post(broadcast_reload)
                    .fallback(events_method_not_allowed),
            )
            .fallback(proxy_handler)
            .with_state(state)
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Bind the configured listener address.
    pub async fn bind(&self) -> Result<TcpListener, std::io::Error> {
        TcpListener::bind(self.config.bind_address()).await
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            target = %self.target,
            "Proxy listening"
        );

        let hub = Arc::clone(&self.hub);
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
                // Open event streams never end on their own.
                hub.close();
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The reload hub, for in-process broadcasts.
    pub fn hub(&self) -> Arc<ReloadHub> {
        Arc::clone(&self.hub)
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// URL browsers should open.
    pub fn url(&self) -> String {
        format!("http://{}", self.config.bind_address())
    }

    /// The fully layered router, for driving the proxy without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Everything outside the reload paths goes to the backend.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.forwarder.forward(request).await
}
