//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the reload proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind host and port).
    pub listener: ListenerConfig,

    /// Backend application the proxy forwards to.
    pub target: TargetConfig,

    /// Retry configuration for dialing the backend.
    pub retries: RetryConfig,

    /// Reload hub (SSE) settings.
    pub reload: ReloadConfig,

    /// HTML response rewriting settings.
    pub rewrite: RewriteConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request/response size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Address string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listener.bind_host, self.listener.port)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host or IP to bind to.
    pub bind_host: String,

    /// Port to bind to.
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            port: 7331,
        }
    }
}

/// Backend target configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Base URL of the backend (e.g., "http://127.0.0.1:8080").
    pub url: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of delivery attempts before giving up.
    pub max_retries: u32,

    /// Delay before the second attempt, in milliseconds.
    pub initial_delay_ms: u64,

    /// Growth factor applied to the delay after every failed attempt.
    pub backoff_exponent: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 20,
            initial_delay_ms: 100,
            backoff_exponent: 1.5,
        }
    }
}

/// Reload hub configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Seconds of silence before a `ping` heartbeat is written.
    pub heartbeat_secs: u64,

    /// Capacity of each subscriber's event queue.
    pub subscriber_queue: usize,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: 5,
            subscriber_queue: 16,
        }
    }
}

/// HTML rewriting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Inject the reload script into HTML documents.
    pub enabled: bool,

    /// Request header marking a partial/fragment update.
    pub fragment_header: String,

    /// Value of `fragment_header` that marks a fragment request.
    pub fragment_value: String,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fragment_header: "hx-request".to_string(),
            fragment_value: "true".to_string(),
        }
    }
}

/// Timeout configuration for backend connections.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { connect_secs: 5 }
    }
}

/// Size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest request or HTML response body buffered in memory, in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 16 * 1024 * 1024, // 16MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
