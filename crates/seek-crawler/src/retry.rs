//! Bounded retry with a fixed delay between attempts.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Pause after a failed attempt before the next one.
    pub delay: Duration,
}

/// Terminal failure of a retried operation.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed.
    #[error("{operation} failed after {attempts} attempt(s): {last}")]
    Exhausted {
        operation: String,
        attempts: u32,
        last: E,
    },

    /// An attempt failed with an error the caller marked as not retryable.
    #[error("{operation} failed on attempt {attempt}: {error}")]
    Aborted {
        operation: String,
        attempt: u32,
        error: E,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::Aborted { attempt, .. } => *attempt,
        }
    }

    /// The error from the final attempt.
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Aborted { error, .. } => error,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A single attempt, no retries.
    #[must_use]
    pub const fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `op` until it succeeds or the attempts run out.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_if(operation, |_| true, op).await
    }

    /// Like [`RetryPolicy::run`], but stops early when `is_retryable`
    /// rejects an error.
    pub async fn run_if<T, E, F, Fut, P>(
        &self,
        operation: &str,
        is_retryable: P,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if !is_retryable(&error) => {
                    tracing::warn!(operation, attempt, error = %error, "Non-retryable failure");
                    return Err(RetryError::Aborted {
                        operation: operation.to_string(),
                        attempt,
                        error,
                    });
                }
                Err(error) if attempt >= max_attempts => {
                    tracing::warn!(
                        operation,
                        attempts = attempt,
                        error = %error,
                        "All attempts failed"
                    );
                    return Err(RetryError::Exhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last: error,
                    });
                }
                Err(error) => {
                    tracing::info!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %error,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
