//! Bounded retry for workload writes
//!
//! Wraps a fallible async unit of work in a fixed attempt budget with
//! exponential backoff between attempts.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

/// Attempt cap, backoff curve and retryable-error predicate
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    factor: u32,
    max_delay: Duration,
    retryable: fn(&Error) -> bool,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("factor", &self.factor)
            .field("max_delay", &self.max_delay)
            .finish_non_exhaustive()
    }
}

fn any_error(_: &Error) -> bool {
    true
}

fn conflict_error(err: &Error) -> bool {
    err.is_conflict()
}

impl Default for RetryPolicy {
    /// 5 attempts, 10ms doubling up to 1s, every error retried
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            factor: 2,
            max_delay: Duration::from_secs(1),
            retryable: any_error,
        }
    }
}

impl RetryPolicy {
    /// Same budget as the default, but only conflicts are retried
    pub fn on_conflict() -> Self {
        Self {
            retryable: conflict_error,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, initial: Duration, factor: u32, max: Duration) -> Self {
        self.initial_delay = initial;
        self.factor = factor.max(1);
        self.max_delay = max;
        self
    }

    pub fn with_predicate(mut self, retryable: fn(&Error) -> bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_retryable(&self, err: &Error) -> bool {
        (self.retryable)(err)
    }

    /// Delay after the given (0-indexed) failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = self.factor.saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            attempt += 1;

            if !self.is_retryable(&err) {
                return Err(err);
            }
            if attempt >= self.max_attempts {
                return Err(Error::RetryExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let delay = self.delay_for(attempt - 1);
            debug!(
                "Attempt {}/{} failed ({}), retrying in {:?}",
                attempt, self.max_attempts, err, delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}
