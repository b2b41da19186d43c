//! Timeouts and bounded retries around external calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, ProviderError};

/// Run `fut`, failing with `Error::Timeout` if it does not finish in `after`.
pub async fn with_timeout<T, F>(operation: &'static str, after: Duration, fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout { operation, after }),
    }
}

/// Exponential backoff for transient provider failures.
///
/// Only errors for which `ProviderError::is_transient` holds are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2, base_delay: Duration::from_millis(500) }
    }
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self { max_retries: 0, base_delay: Duration::ZERO }
    }

    pub fn with_max_retries(max_retries: u32) -> Self {
        Self { max_retries, ..Self::default() }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Outer deadline for `run` when each attempt is capped at `per_call`:
    /// every attempt, every backoff sleep, and one further backoff step of
    /// slack so the deadline never races the last attempt's own timeout.
    pub fn budget(&self, per_call: Duration) -> Duration {
        let attempts = per_call.saturating_mul(self.max_retries.saturating_add(1));
        (0..=self.max_retries).fold(attempts, |total, attempt| total.saturating_add(self.delay_for(attempt)))
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    let wait = self.delay_for(attempt);
                    warn!(operation, attempt = attempt + 1, max_retries = self.max_retries, error = %err, ?wait, "transient provider failure, retrying");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
