//! Call pacing and retry with exponential backoff.
//!
//! Every outbound API call goes through one [`RateLimiter`]. It keeps a single
//! piece of long-lived state, the latest call instant (finished or reserved), and
//! uses it to space calls `min_interval` apart. [`RateLimiter::acquire`] reserves its
//! start slot under the lock, so callers sharing one limiter are serialized onto
//! distinct slots. Failed attempts are classified and retried with
//! `2^attempt * min_interval` of backoff until the attempt cap is reached.
//!
//! # Call states
//!
//! ```text
//! Idle --acquire--> Calling --ok------------------------------> Success
//!                      |
//!                      +--throttled/transient--> BackoffWait --> Calling
//!                      |                         (attempt < max)
//!                      +--throttled/transient, attempt == max--> ExhaustedRetries
//!                      +--any other error-----------------------> Failed
//! ```
//!
//! Sleeping uses `tokio::time`, so only the task issuing the call is suspended and
//! tests can drive the limiter with a paused clock.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::{Instant, sleep, sleep_until};

use crate::config::RateLimitConfig;
use crate::error::AppError;

/// What the caller should do after an attempt completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The attempt succeeded.
    Done,
    /// Retryable failure: wait `delay`, then try again.
    Retry { delay: Duration },
    /// Retryable failure, but the attempt cap is reached.
    Exhausted,
    /// Failure that another attempt would not fix.
    Fatal,
}

/// Shared choke point for outbound calls.
///
/// Owned by the pipeline (wrap it in an `Arc` to share it) and never reset while the
/// process lives, so pacing carries over from one run to the next.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            last_call: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Minimum spacing between two calls.
    pub fn min_interval(&self) -> Duration {
        self.config.min_interval()
    }

    /// Latest call instant: the end of the previous call, or a start slot already
    /// reserved by a pending [`acquire`](Self::acquire), whichever is later.
    pub fn last_call(&self) -> Option<Instant> {
        *self
            .last_call
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reserves the next start slot and waits for it.
    ///
    /// The slot is `min_interval` after the latest call instant, or now if that is
    /// already past. A reservation dropped mid-wait is not handed back.
    pub async fn acquire(&self) {
        let start = {
            let mut guard = self
                .last_call
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let now = Instant::now();
            let start = match *guard {
                Some(last) => (last + self.min_interval()).max(now),
                None => now,
            };
            *guard = Some(start);
            start
        };

        if start > Instant::now() {
            let wait = start - Instant::now();
            tracing::debug!(wait_ms = wait.as_millis() as u64, "Pacing next API call");
            sleep_until(start).await;
        }
    }

    /// Stamps the end of a call. Called after every attempt, successful or not.
    ///
    /// Never moves the latest call instant backwards, so a slot reserved by another
    /// caller survives.
    pub fn mark_call(&self) {
        let mut guard = self
            .last_call
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        *guard = Some(guard.map_or(now, |last| last.max(now)));
    }

    /// Backoff before retrying after the given (1-based) attempt failed.
    ///
    /// # Examples
    ///
    /// ```
    /// use plutus_core::{RateLimitConfig, RateLimiter};
    /// use std::time::Duration;
    ///
    /// let limiter = RateLimiter::new(RateLimitConfig::default());
    /// assert_eq!(limiter.backoff_delay(1), Duration::from_secs(24));
    /// assert_eq!(limiter.backoff_delay(2), Duration::from_secs(48));
    /// ```
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.min_interval().checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    /// Records the outcome of an attempt and decides the next transition.
    ///
    /// The last-call timestamp is updated unconditionally, so a run of failures is
    /// paced exactly like a run of successes.
    pub fn record_outcome(&self, attempt: u32, error: Option<&AppError>) -> RetryDecision {
        self.mark_call();

        let Some(error) = error else {
            return RetryDecision::Done;
        };
        if !error.is_retryable() {
            return RetryDecision::Fatal;
        }
        if attempt >= self.config.max_attempts {
            return RetryDecision::Exhausted;
        }

        let backoff = self.backoff_delay(attempt);
        let delay = match error.retry_after() {
            Some(hint) => backoff.max(hint),
            None => backoff,
        };
        RetryDecision::Retry { delay }
    }

    /// Runs `op` under pacing and retry.
    ///
    /// Returns the first success, the first non-retryable error unchanged, or
    /// [`AppError::ExhaustedRetries`] once `max_attempts` retryable failures
    /// happened in a row.
    pub async fn call<T, F, Fut>(&self, mut op: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt: u32 = 1;
        loop {
            self.acquire().await;
            let result = op().await;
            let decision = self.record_outcome(attempt, result.as_ref().err());

            match (result, decision) {
                (Ok(value), _) => return Ok(value),
                (Err(e), RetryDecision::Retry { delay }) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.config.max_attempts,
                        delay_secs = delay.as_secs_f64(),
                        throttled = e.is_throttled(),
                        error = %e,
                        "API call failed, backing off"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                (Err(e), RetryDecision::Exhausted) => {
                    tracing::error!(attempts = attempt, error = %e, "Retries exhausted");
                    return Err(AppError::ExhaustedRetries {
                        attempts: attempt,
                        last_error: Box::new(e),
                    });
                }
                (Err(e), _) => return Err(e),
            }
        }
    }
}
