//! Retry with exponential backoff for batch writes

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::api::{ApiError, WriteResponse};

/// Blocking pause between attempts; replaceable so tests need not sleep
pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// Sleeper that blocks the current thread
pub fn thread_sleeper() -> Sleeper {
    Arc::new(std::thread::sleep)
}

/// How often and how patiently a batch write is retried.
///
/// Only server errors (status >= 500) and transport failures are retried.
/// After failed attempt `n` (1-based) the caller waits `base_delay ** n`
/// seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Backoff base in seconds
    pub base_delay: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: 1.5,
        }
    }
}

/// Terminal outcome of a retried write
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    /// The store answered with a non-retryable status (success or not)
    Answered {
        response: WriteResponse,
        attempts: u32,
    },
    /// Every attempt failed with a retryable error
    Exhausted { attempts: u32, last_error: String },
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after failed attempt `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        Duration::try_from_secs_f64(self.base_delay.powi(exponent)).unwrap_or(Duration::MAX)
    }

    /// Run `write` until it yields a non-retryable answer or attempts run out
    pub fn run<F>(&self, sleeper: &Sleeper, mut write: F) -> RetryOutcome
    where
        F: FnMut() -> Result<WriteResponse, ApiError>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let failure = match write() {
                Ok(response) if !response.is_server_error() => {
                    return RetryOutcome::Answered {
                        response,
                        attempts: attempt,
                    };
                }
                Ok(response) => format!("Server {}: {}", response.status, response.payload),
                Err(e) => e.to_string(),
            };

            if attempt >= max_attempts {
                return RetryOutcome::Exhausted {
                    attempts: attempt,
                    last_error: failure,
                };
            }

            let delay = self.delay_for_attempt(attempt);
            warn!(
                "POST retry {}/{} in {:.1}s due to: {}",
                attempt,
                max_attempts,
                delay.as_secs_f64(),
                failure
            );
            sleeper(delay);
            attempt += 1;
        }
    }
}
