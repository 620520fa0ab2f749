//! Exponential backoff.

use std::time::Duration;

use crate::config::RetryConfig;

/// Retry schedule: attempt budget plus geometric delay growth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never zero.
    pub max_retries: u32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Factor applied to the delay after each further failure.
    pub backoff_exponent: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, backoff_exponent: f64) -> Self {
        Self {
            max_retries: max_retries.max(1),
            initial_delay,
            backoff_exponent,
        }
    }

    /// Delay to sleep after failed attempt number `attempt` (counted from 0).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.initial_delay, self.backoff_exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.initial_delay_ms),
            config.backoff_exponent,
        )
    }
}

/// `initial * exponent^attempt`, saturating instead of overflowing.
pub fn calculate_backoff(attempt: u32, initial: Duration, exponent: f64) -> Duration {
    let factor = exponent.powi(attempt.min(i32::MAX as u32) as i32);
    let nanos = (initial.as_nanos() as f64 * factor).round();
    if !nanos.is_finite() || nanos >= u64::MAX as f64 {
        return Duration::MAX;
    }
    Duration::from_nanos(nanos as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let initial = Duration::from_millis(100);

        assert_eq!(calculate_backoff(0, initial, 1.5), Duration::from_millis(100));
        assert_eq!(calculate_backoff(1, initial, 1.5), Duration::from_millis(150));
        assert_eq!(calculate_backoff(2, initial, 1.5), Duration::from_millis(225));
        assert_eq!(calculate_backoff(3, initial, 2.0), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_saturates() {
        let d = calculate_backoff(10_000, Duration::from_secs(1), 10.0);
        assert_eq!(d, Duration::MAX);
    }

    #[test]
    fn test_policy_never_zero_attempts() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1), 1.0);
        assert_eq!(policy.max_retries, 1);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 20);
        assert_eq!(policy.initial_delay, Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(150));
    }
}
