//! Retry with Exponential Backoff
//!
//! Re-invokes an async operation when its failure is classified as transient
//! (rate limiting or resource exhaustion). Delays double per attempt with no
//! jitter, and the final attempt never waits: it either succeeds or its error
//! is returned to the caller.

use crate::config::RetryConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

const RATE_LIMIT_MARKERS: [&str; 2] = ["429", "RESOURCE_EXHAUSTED"];

/// Default classifier: retry only when the rendered error mentions HTTP 429
/// or a resource-exhaustion status.
pub fn is_rate_limited<E: Display + ?Sized>(error: &E) -> bool {
    let message = error.to_string();
    RATE_LIMIT_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// Bookkeeping for one invocation of a retried operation
#[derive(Debug)]
pub struct RetryAttempt<E> {
    pub attempt_number: u32,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub last_error: Option<E>,
}

impl<E> RetryAttempt<E> {
    fn first(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempt_number: 1,
            max_attempts,
            base_delay,
            last_error: None,
        }
    }

    pub fn is_final(&self) -> bool {
        self.attempt_number >= self.max_attempts
    }

    /// Wait before the next attempt: `base_delay * 2^(attempt_number - 1)`.
    pub fn backoff(&self) -> Duration {
        let exponent = self.attempt_number.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    fn advance(&mut self, error: E) {
        self.last_error = Some(error);
        self.attempt_number += 1;
    }
}

/// Bounded retry decorator for async operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
        )
    }

    /// Run `operation`, retrying failures the default classifier accepts.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_with(operation, |err: &E| is_rate_limited(err))
            .await
    }

    /// Run `operation`, retrying failures for which `is_retryable` returns true.
    ///
    /// Returns the first success, or the error of the last attempt made.
    /// A non-retryable error is returned immediately without waiting.
    pub async fn execute_with<T, E, F, Fut, C>(
        &self,
        mut operation: F,
        is_retryable: C,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        C: Fn(&E) -> bool,
    {
        // An operation always runs at least once.
        let mut attempt = RetryAttempt::first(self.max_attempts.max(1), self.base_delay);

        loop {
            if let Some(previous) = attempt.last_error.as_ref() {
                debug!(
                    attempt = attempt.attempt_number,
                    max_attempts = attempt.max_attempts,
                    previous_error = %previous,
                    "Retrying operation"
                );
            }

            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !is_retryable(&err) {
                debug!(
                    attempt = attempt.attempt_number,
                    error = %err,
                    "Non-retryable failure"
                );
                return Err(err);
            }

            if attempt.is_final() {
                error!(
                    attempts = attempt.attempt_number,
                    error = %err,
                    "Retryable failure persisted after final attempt"
                );
                return Err(err);
            }

            let delay = attempt.backoff();
            warn!(
                attempt = attempt.attempt_number,
                max_attempts = attempt.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retryable failure, backing off"
            );
            attempt.advance(err);
            sleep(delay).await;
        }
    }
}
