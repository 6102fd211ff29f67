//! Retry with exponential backoff.
//!
//! Meant for wrapping individual tasks before handing them to
//! [`run_limited`](crate::run_limited), so that transient failures are retried
//! inside the task and only persistent ones fail the batch.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::LimiterError;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every further retry.
    #[serde(with = "timing::serde_millis")]
    pub base_delay: Duration,
    /// Upper bound for a single delay (before jitter).
    #[serde(with = "timing::serde_millis")]
    pub max_delay: Duration,
    /// Add 0-50% random jitter to every delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), LimiterError> {
        if self.max_delay < self.base_delay {
            return Err(LimiterError::InvalidConfig(format!(
                "max_delay ({:?}) is shorter than base_delay ({:?})",
                self.max_delay, self.base_delay
            )));
        }
        Ok(())
    }

    /// Delay before retry number `attempt + 1`, with jitter applied.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let exponential = base.saturating_mul(2_u64.saturating_pow(attempt));
        let delay = exponential.min(self.max_delay.as_millis() as u64);

        if self.jitter {
            let jitter = fastrand::u64(0..=delay / 2);
            Duration::from_millis(delay + jitter)
        } else {
            Duration::from_millis(delay)
        }
    }
}

/// Result of a retried operation.
#[derive(Debug, Clone)]
pub struct RetryOutcome<T, E> {
    /// The last attempt's result.
    pub result: Result<T, E>,
    /// Number of attempts made (1 = no retries needed).
    pub attempts: u32,
    /// Total time spent, including backoff.
    pub total_duration: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Run `operation` until it succeeds or `max_retries` retries are used up.
///
/// The closure receives the zero-based attempt number.
pub async fn retry_async<T, E, F, Fut>(config: &RetryConfig, operation: F) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_async_if(config, operation, |_| true).await
}

/// Like [`retry_async`], but gives up early on errors for which `retryable`
/// returns false.
pub async fn retry_async_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    mut operation: F,
    retryable: P,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        let result = operation(attempt).await;
        let give_up = match &result {
            Ok(_) => true,
            Err(err) => attempt >= config.max_retries || !retryable(err),
        };
        if give_up {
            return RetryOutcome {
                result,
                attempts: attempt + 1,
                total_duration: start.elapsed(),
            };
        }

        let delay = config.delay_for(attempt);
        tracing::debug!(attempt, ?delay, "operation failed; retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
