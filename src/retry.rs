//! Bounded retry around a fallible operation.
//!
//! A [`RetryPolicy`] wraps one invocation of a task body: a fresh attempt
//! counter per call, a maximum-attempts bound, and a caller-supplied
//! predicate deciding whether a given failure is worth another attempt.
//! No backoff is applied between attempts; tasks needing a delay build it
//! into the operation itself (the rate limiter already gates admission of
//! each attempt).

use std::future::Future;

use crate::error::{Error, Result, TaskError};
use crate::wlog_debug;

/// Retry policy for a single task invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// Allow up to `max_attempts` attempts total (clamped to at least one).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// A single attempt, no retries. Failures propagate as
    /// [`Error::TaskExecution`].
    pub fn none() -> Self {
        Self { max_attempts: 1 }
    }

    /// The configured attempt bound.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds or the budget is spent.
    ///
    /// On each failure the predicate is consulted first: `false` propagates
    /// the error immediately as [`Error::NonRetryable`] regardless of
    /// remaining attempts. When attempts run out, the last failure is
    /// returned as [`Error::RetryExhausted`]. A single-attempt policy skips
    /// classification entirely and surfaces the failure as
    /// [`Error::TaskExecution`].
    pub async fn run<T, F, Fut, P>(&self, is_retryable: P, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, TaskError>>,
        P: Fn(&TaskError) -> bool,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if self.max_attempts <= 1 {
                        return Err(Error::TaskExecution(err));
                    }
                    if !is_retryable(&err) {
                        return Err(Error::NonRetryable(err));
                    }
                    if attempt >= self.max_attempts {
                        return Err(Error::RetryExhausted {
                            attempts: attempt,
                            source: err,
                        });
                    }
                    attempt += 1;
                    wlog_debug!(
                        "retrying after failure ({}): attempt {}/{}",
                        err,
                        attempt,
                        self.max_attempts
                    );
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
