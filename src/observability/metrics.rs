//! Metrics collection and exposition.
//!
//! # Metrics
//! - `reload_proxy_requests_total` (counter): forwarded requests by status
//! - `reload_proxy_request_duration_seconds` (histogram): forwarding latency
//! - `reload_proxy_upstream_retries_total` (counter): backend dial retries
//! - `reload_proxy_rewrites_total` (counter): HTML rewrites by outcome
//! - `reload_proxy_broadcasts_total` (counter): reload broadcasts
//! - `reload_proxy_sse_subscribers` (gauge): open event streams
//!
//! Without an installed recorder these calls are no-ops.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16, start: Instant) {
    counter!("reload_proxy_requests_total", "status" => status.to_string()).increment(1);
    histogram!("reload_proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_retry() {
    counter!("reload_proxy_upstream_retries_total").increment(1);
}

pub fn record_rewrite(outcome: &'static str) {
    counter!("reload_proxy_rewrites_total", "outcome" => outcome).increment(1);
}

pub fn record_broadcast() {
    counter!("reload_proxy_broadcasts_total").increment(1);
}

pub fn set_subscribers(count: usize) {
    gauge!("reload_proxy_sse_subscribers").set(count as f64);
}
