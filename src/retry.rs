//! Bounded retry for rate-limited calls.
//!
//! Only [`Error::RateLimited`] is retried. The wait between attempts honors
//! the server's reset hint when it is at least the configured floor and falls
//! back to the floor otherwise.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{Error, Result};

/// Retry bounds for one dispatcher, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retry: u32,
    min_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// `max_retry` counts retries after the first attempt; `min_wait` is the backoff floor.
    pub fn new(max_retry: u32, min_wait: Duration) -> Self {
        Self {
            max_retry,
            min_wait,
        }
    }

    pub fn max_retry(&self) -> u32 {
        self.max_retry
    }

    pub fn min_wait(&self) -> Duration {
        self.min_wait
    }

    pub fn max_attempts(&self) -> u64 {
        u64::from(self.max_retry) + 1
    }

    /// Wait before the next attempt given the server's reset hint.
    pub fn wait_for(&self, reset_in: Option<Duration>) -> Duration {
        match reset_in {
            Some(reset_in) if reset_in >= self.min_wait => reset_in,
            _ => self.min_wait,
        }
    }

    /// Runs `action` until it succeeds, fails with anything other than a
    /// rate limit, or exhausts `max_retry` retries.
    ///
    /// On exhaustion the last [`Error::RateLimited`] is returned as-is.
    /// Cancellation is checked before each attempt and raced against each
    /// attempt and each backoff sleep; it surfaces as [`Error::Cancelled`].
    pub async fn run<F, Fut, T>(&self, cancel: &CancellationToken, mut action: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            attempt += 1;
            trace!("Dispatch attempt {} of {}", attempt, self.max_attempts());

            let err = match cancellable(cancel, action()).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Operation succeeded after {} attempts", attempt);
                    }
                    return Ok(value);
                }
                Err(err) if err.is_rate_limited() => err,
                Err(err) => return Err(err),
            };

            if attempt > u64::from(self.max_retry) {
                warn!(
                    "Max retries ({}) exceeded. Last error: {}",
                    self.max_retry, err
                );
                return Err(err);
            }

            let wait = self.wait_for(err.reset_hint());
            debug!("{}. Retrying in {:?}", err, wait);

            if !wait.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = sleep(wait) => {}
                }
            }
        }
    }
}

/// Races `future` against `cancel`, preferring cancellation when both are ready.
pub async fn cancellable<F, T>(cancel: &CancellationToken, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = future => result,
    }
}
