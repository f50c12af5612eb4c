//! Retry policy with backoff
//!
//! Decides whether a failed request is replayed and how long to wait first.
//! Reads may be replayed after any transient failure. Mutations are replayed
//! only when the server certainly did not apply them (429, or a failure
//! before the request was sent), see [`Error::is_retryable`].

use crate::error::{Error, Result};
use crate::types::BackoffType;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry and backoff settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// How the delay grows between attempts
    pub backoff_type: BackoffType,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Calculate backoff delay for a given attempt (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let delay = match self.backoff_type {
            BackoffType::Constant => self.base_delay,
            BackoffType::Linear => self.base_delay.saturating_mul(attempt.saturating_add(1)),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.base_delay.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.max_delay)
    }

    /// Delay before retrying after `err`; a server `Retry-After` wins over
    /// the computed backoff but is still capped
    pub fn delay_for(&self, attempt: u32, err: &Error) -> Duration {
        match err.retry_after() {
            Some(hint) => std::cmp::min(hint, self.max_delay),
            None => self.backoff(attempt),
        }
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out.
    ///
    /// `op` receives the 0-based attempt number. The last concrete error is
    /// returned once retries are exhausted.
    pub async fn run<T, F, Fut>(&self, idempotent: bool, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries && err.is_retryable(idempotent) => {
                    let delay = self.delay_for(attempt, &err);
                    warn!(
                        "{} failed ({}), attempt {}/{}, retrying in {:?}",
                        label,
                        err,
                        attempt + 1,
                        self.max_retries + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
