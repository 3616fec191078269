//! Bounded retry with delay
//!
//! Every network call and process invocation that can fail transiently runs
//! through a [`RetryPolicy`]. The wrapped operation classifies each attempt
//! itself: [`Attempt::Retry`] asks for another try after the delay, while a
//! returned `Err` is treated as non-retryable and stops the loop at once.
//!
//! Operations run here may execute several times and must be safe to repeat.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Outcome of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// The operation finished; stop retrying
    Done(T),

    /// The operation should be tried again; carries the reason for logging
    Retry(String),
}

/// Delay between two attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every attempt
    Fixed(Duration),

    /// Doubling delay starting at `initial`, capped at `max`
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay to wait after the given (1-based) attempt failed
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Terminal failure of a retried operation
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt asked for a retry
    #[error("{operation} failed after {attempts} attempt(s): {last_reason}")]
    Exhausted {
        operation: String,
        attempts: u32,
        last_reason: String,
    },

    /// An attempt failed with a non-retryable error
    #[error(transparent)]
    Aborted(E),
}

/// Attempt budget plus delay schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Policy with a fixed delay between attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    /// Policy with a doubling delay, capped at `max`
    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential { initial, max },
        }
    }

    /// Effective attempt budget (a zero budget still runs once)
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Runs `op` until it reports [`Attempt::Done`], fails, or the budget is spent
    ///
    /// `op` receives the 1-based attempt number. No delay follows the last attempt.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Attempt<T>, E>>,
    {
        let max_attempts = self.attempts();
        let mut last_reason = String::new();

        for attempt in 1..=max_attempts {
            match op(attempt).await {
                Ok(Attempt::Done(value)) => {
                    if attempt > 1 {
                        debug!("{} succeeded after {} attempt(s)", operation, attempt);
                    }
                    return Ok(value);
                }
                Ok(Attempt::Retry(reason)) => {
                    warn!(
                        "{} not done (attempt {}/{}): {}",
                        operation, attempt, max_attempts, reason
                    );
                    last_reason = reason;

                    if attempt < max_attempts {
                        tokio::time::sleep(self.backoff.delay_after(attempt)).await;
                    }
                }
                Err(e) => return Err(RetryError::Aborted(e)),
            }
        }

        Err(RetryError::Exhausted {
            operation: operation.to_string(),
            attempts: max_attempts,
            last_reason,
        })
    }
}
