//! Bounded retry with clamped exponential backoff.

use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;
use crate::metrics;

/// Retry policy applied to every acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub multiplier: Duration,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            multiplier: secs(config.multiplier_secs),
            min_wait: secs(config.min_wait_secs),
            max_wait: secs(config.max_wait_secs),
        }
    }
}

/// Seconds to a duration, saturating instead of panicking on non-finite input.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt `attempt` (1-based).
    ///
    /// `min(max(multiplier * 2^(attempt-1), min_wait), max_wait)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let raw = self.multiplier.saturating_mul(1u32 << exp);
        raw.max(self.min_wait).min(self.max_wait)
    }

    /// Whether another attempt may follow failed attempt `attempt`.
    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Log failed attempt `attempt` and wait out its backoff.
    pub async fn backoff<E: std::fmt::Display>(&self, attempt: u32, error: &E) {
        let delay = self.delay_for(attempt);
        warn!(
            attempt,
            max_attempts = self.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Attempt failed, retrying"
        );
        metrics::RETRY_ATTEMPTS.inc();
        tokio::time::sleep(delay).await;
    }
}
