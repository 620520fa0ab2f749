//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration (fatal before any socket is bound)
//! - Start the optional metrics exporter
//! - Bind the listener and serve until shutdown

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::{ConfigError, ProxyConfig};
use crate::http::ProxyServer;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Run the proxy described by `config` until `shutdown` fires.
pub async fn run(config: ProxyConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    let server = ProxyServer::new(config)?;

    if server.config().observability.metrics_enabled {
        let address = &server.config().observability.metrics_address;
        match address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(metrics_address = %address, error = %e, "Failed to parse metrics address"),
        }
    }

    let address = server.config().bind_address();
    let listener = server.bind().await.map_err(|source| StartupError::Bind {
        address: address.clone(),
        source,
    })?;

    tracing::info!(
        url = %server.url(),
        target = %server.target(),
        "Live reload proxy is up"
    );

    server
        .run(listener, shutdown.subscribe())
        .await
        .map_err(StartupError::Serve)
}
