//! Client side of the broadcast endpoint, used by build orchestrators.

use thiserror::Error;

use crate::reload::EVENTS_PATH;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("reload request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("proxy answered reload request with {0}")]
    Status(reqwest::StatusCode),
}

/// Events endpoint of a proxy listening on `host:port`.
pub fn events_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}{EVENTS_PATH}")
}

/// Ask the proxy on `host:port` to reload every open tab.
pub async fn notify_proxy(host: &str, port: u16) -> Result<(), NotifyError> {
    notify_with(&reqwest::Client::new(), host, port).await
}

/// Same as [`notify_proxy`] with a caller-provided client.
pub async fn notify_with(client: &reqwest::Client, host: &str, port: u16) -> Result<(), NotifyError> {
    let response = client.post(events_url(host, port)).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(NotifyError::Status(status));
    }
    tracing::debug!(host, port, "Reload notification sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_url() {
        assert_eq!(events_url("127.0.0.1", 7331), "http://127.0.0.1:7331/_reload/events");
    }
}
