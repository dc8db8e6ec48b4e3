//! Token-bucket rate limiting shared across tasks.
//!
//! Each rate-limited resource is a [`TokenBucket`]: a capped token count
//! refilled lazily from elapsed wall-clock time, never by a background timer.
//! The [`RateLimiter`] registry maps a resource key to its bucket; tasks that
//! declare a key wait on the bucket before each attempt.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::wlog_debug;

/// Fixed interval between consume attempts while a bucket is empty.
pub const RATE_LIMIT_POLL: Duration = Duration::from_millis(100);

/// Rate limit configuration for one resource.
///
/// `rate` is how quickly tokens return to the bucket, in tokens per second.
/// `capacity` is the maximum number of tokens the bucket can hold.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimit {
    pub key: String,
    pub capacity: f64,
    pub rate: f64,
}

impl RateLimit {
    pub fn new(key: impl Into<String>, capacity: f64, rate: f64) -> Self {
        Self {
            key: key.into(),
            capacity,
            rate,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A single rate-limited resource counter.
///
/// Refill is computed on each access from elapsed time, so a bucket left
/// untouched for a long interval refills fully (up to capacity) on its next
/// access without ever overfilling. The refresh-and-spend sequence is
/// serialized behind a mutex; concurrent consumers cannot both observe the
/// same tokens and double-spend.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a bucket with tokens initialized to capacity.
    pub fn new(rate: f64, capacity: f64) -> Self {
        Self {
            rate,
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
        state.last_refill = now;
    }

    /// Refresh and return the current token count.
    pub fn tokens(&self) -> f64 {
        let mut state = self.state.lock().expect("token bucket poisoned");
        self.refill(&mut state);
        state.tokens
    }

    /// Try to spend `n` tokens. Refreshes first; on insufficient tokens the
    /// count is left unchanged and `false` is returned.
    pub fn consume(&self, n: f64) -> bool {
        let mut state = self.state.lock().expect("token bucket poisoned");
        self.refill(&mut state);
        if state.tokens >= n {
            state.tokens -= n;
            true
        } else {
            false
        }
    }
}

/// Registry of token buckets keyed by resource name.
///
/// Built once from the configured [`RateLimit`]s before any task runs and
/// shared read-only with every worker; only the bucket interiors mutate.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: HashMap<String, TokenBucket>,
}

impl RateLimiter {
    /// Build the registry from a list of rate limit configs.
    pub fn new(limits: Vec<RateLimit>) -> Self {
        let buckets = limits
            .into_iter()
            .map(|limit| {
                (
                    limit.key,
                    TokenBucket::new(limit.rate, limit.capacity),
                )
            })
            .collect();
        Self { buckets }
    }

    /// An empty registry; every key runs unthrottled.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Look up the bucket for a key.
    pub fn bucket(&self, key: &str) -> Option<&TokenBucket> {
        self.buckets.get(key)
    }

    /// Block until a token is available for `key`, then take it.
    ///
    /// An unconfigured key returns immediately. Waiting is a fixed-interval
    /// poll of the bucket, not a computed delay; lack of tokens is a blocking
    /// condition, never an error. Callers wanting to abandon the wait race
    /// this future against a cancellation signal.
    pub async fn acquire(&self, key: &str) {
        let Some(bucket) = self.bucket(key) else {
            return;
        };
        while !bucket.consume(1.0) {
            wlog_debug!("rate limiting on resource {}", key);
            tokio::time::sleep(RATE_LIMIT_POLL).await;
        }
    }
}
