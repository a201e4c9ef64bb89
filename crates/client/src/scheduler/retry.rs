//! Retrying scheduler with exponential backoff.

use async_trait::async_trait;
use revrest_core::{AppConfig, Error};
use std::sync::Arc;
use std::time::Duration;

use super::{Attempt, Scheduler, Task};

/// Retry policy for tasks that request a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 disables retrying)
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry
    pub base_delay: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, base_delay: Duration::from_millis(1_000), max_delay: Duration::from_millis(30_000) }
    }
}

impl From<&AppConfig> for RetryConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_retries: config.retry_max_attempts,
            base_delay: config.retry_base_delay(),
            max_delay: config.retry_max_delay(),
        }
    }
}

impl RetryConfig {
    pub fn disabled() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Re-runs a task through the inner scheduler while it asks for a retry.
///
/// Once retries are exhausted the last `RetryRequested` attempt is returned
/// unchanged; callers decide what a final throttled result means.
pub struct RetryScheduler<T> {
    inner: Arc<dyn Scheduler<T>>,
    config: RetryConfig,
}

impl<T: Send + 'static> RetryScheduler<T> {
    pub fn new(inner: Arc<dyn Scheduler<T>>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<T: Send + 'static> Scheduler<T> for RetryScheduler<T> {
    async fn schedule(&self, task: Task<T>) -> Result<Attempt<T>, Error> {
        let mut retry = 0;
        loop {
            let attempt = self.inner.schedule(task.clone()).await?;
            if !attempt.is_retry_requested() || retry >= self.config.max_retries {
                return Ok(attempt);
            }

            let delay = self.config.delay_for(retry);
            tracing::debug!(retry = retry + 1, max_retries = self.config.max_retries, ?delay, "retrying task");
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}
