//! Retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use crate::error::ShimError;

/// Retry policy for opening a backing-service call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Default backoff with a different attempt budget. Zero means one attempt.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Never retry.
    pub fn none() -> Self {
        Self::with_max_attempts(1)
    }

    /// Execute an async operation, retrying errors that report
    /// [`ShimError::is_retryable`].
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, ShimError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ShimError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !err.is_retryable() || attempt >= attempts {
                return Err(err);
            }

            let delay = match err {
                ShimError::RateLimited {
                    retry_after_ms: Some(ms),
                } => Duration::from_millis(ms).min(self.max_backoff),
                _ => jittered(backoff),
            };
            tracing::warn!(
                attempt,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying backing service call"
            );
            tokio::time::sleep(delay).await;

            backoff = Duration::from_secs_f64(
                (backoff.as_secs_f64() * self.multiplier).min(self.max_backoff.as_secs_f64()),
            );
        }
    }
}

// 75%..125% of `backoff`.
fn jittered(backoff: Duration) -> Duration {
    let sample = (uuid::Uuid::new_v4().as_u128() % 10_000) as f64 / 10_000.0;
    Duration::from_secs_f64(backoff.as_secs_f64() * (0.75 + sample * 0.5))
}
