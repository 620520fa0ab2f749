//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the backend target is a usable absolute http URL
//! - Validate value ranges (retries > 0, exponent >= 1, port valid)
//!
//! Returns all validation errors, not just the first.

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid target URL {url:?}: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("listener port must be non-zero")]
    ZeroPort,

    #[error("retries.max_retries must be at least 1")]
    ZeroRetries,

    #[error("retries.backoff_exponent must be a finite number >= 1.0, got {0}")]
    InvalidBackoffExponent(f64),

    #[error("reload.heartbeat_secs must be at least 1")]
    ZeroHeartbeat,

    #[error("reload.subscriber_queue must be at least 1")]
    ZeroSubscriberQueue,

    #[error("rewrite.fragment_header {0:?} is not a valid header name")]
    InvalidFragmentHeader(String),
}

/// Parse and check the backend target URL.
pub fn parse_target(raw: &str) -> Result<Url, ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidTarget {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if url.scheme() != "http" {
        return Err(invalid(&format!(
            "unsupported scheme {:?}, only plain http backends are supported",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(url)
}

/// Validate a loaded configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = parse_target(&config.target.url) {
        errors.push(e);
    }
    if config.listener.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }
    if config.retries.max_retries == 0 {
        errors.push(ValidationError::ZeroRetries);
    }
    let exponent = config.retries.backoff_exponent;
    if !exponent.is_finite() || exponent < 1.0 {
        errors.push(ValidationError::InvalidBackoffExponent(exponent));
    }
    if config.reload.heartbeat_secs == 0 {
        errors.push(ValidationError::ZeroHeartbeat);
    }
    if config.reload.subscriber_queue == 0 {
        errors.push(ValidationError::ZeroSubscriberQueue);
    }
    if axum::http::HeaderName::from_bytes(config.rewrite.fragment_header.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidFragmentHeader(
            config.rewrite.fragment_header.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
