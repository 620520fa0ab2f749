//! Live-reload development proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────┐
//!                          │                 RELOAD PROXY                 │
//!     Browser request      │  ┌──────────┐      ┌───────────────────────┐ │
//!     ─────────────────────┼─▶│  router  │─────▶│ reload hub (SSE)      │ │
//!                          │  │          │      │ script.js / events    │ │
//!                          │  └────┬─────┘      └───────────▲───────────┘ │
//!                          │       │                        │ POST events │◀── build
//!                          │       ▼                        │             │    orchestrator
//!                          │  ┌──────────┐      ┌───────────┴───────────┐ │
//!                          │  │ retrying │─────▶│ backend dev server    │─┼──▶ Backend
//!                          │  │transport │◀─────│                       │ │
//!                          │  └────┬─────┘      └───────────────────────┘ │
//!     Browser response     │       ▼                                      │
//!     ◀────────────────────┼─ html rewriter (inject <script>)             │
//!                          └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use reload_proxy::config::{load_config, ProxyConfig};
use reload_proxy::lifecycle::{startup, Shutdown};
use reload_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "reload-proxy")]
#[command(about = "Live-reload proxy for local web development", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to.
    #[arg(short, long)]
    bind: Option<String>,

    /// Port to bind to.
    #[arg(short, long)]
    port: Option<u16>,

    /// Backend base URL, e.g. http://127.0.0.1:8080.
    #[arg(short, long)]
    target: Option<String>,

    /// Log level used when RUST_LOG is unset.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<ProxyConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.listener.bind_host = bind;
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(target) = self.target {
            config.target.url = target;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.bind_address(),
        target = %config.target.url,
        max_retries = config.retries.max_retries,
        "reload-proxy starting"
    );

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    startup::run(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
