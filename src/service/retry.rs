//! Exponential backoff for optimistic-concurrency commits.
//!
//! Only [`GatewayError::TransactionConflict`] is retried. Validation and
//! business-rule failures (duplicate, overlap, full) are returned on the
//! first attempt. When every attempt loses its race the caller receives
//! [`GatewayError::StoreUnavailable`].

use std::future::Future;
use std::time::Duration;

use crate::error::GatewayError;

/// Retry policy for contended commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never below 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Ceiling for the doubled delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Policy with the given attempt budget and initial backoff.
    #[must_use]
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            ..Self::default()
        }
    }

    /// Delay after the given failed attempt (0-based): doubles each time,
    /// capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error from `op`, or
    /// [`GatewayError::StoreUnavailable`] once every attempt conflicted.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let attempts = self.max_attempts.max(1);
        for attempt in 0..attempts {
            match op().await {
                Err(err) if err.is_retryable() => {
                    if attempt + 1 < attempts {
                        let delay = self.delay_for_attempt(attempt);
                        tracing::debug!(operation, attempt, ?delay, "commit conflicted, retrying");
                        tokio::time::sleep(delay).await;
                    }
                }
                other => return other,
            }
        }
        tracing::warn!(operation, attempts, "retry budget exhausted");
        Err(GatewayError::StoreUnavailable(format!(
            "{operation} kept conflicting after {attempts} attempts"
        )))
    }
}
