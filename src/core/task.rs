//! Task model for the pipeline.
//!
//! A task is the atomic unit of work: a unique name, a `perform` body that
//! reads the shared [`Context`], and optional hooks declaring a rate-limited
//! resource and a retry policy.

use serde::{Deserialize, Serialize};

use crate::config::Context;
use crate::error::TaskError;
use crate::retry::RetryPolicy;

/// A unit of work in the pipeline.
///
/// Implementations are registered once into a
/// [`DependencyGraph`](crate::core::graph::DependencyGraph) and live for the
/// lifetime of the registry. `perform` runs on a blocking worker, so bodies
/// may block on IO or sleep.
pub trait Task: Send + Sync {
    /// Unique name identifying this task in the registry.
    fn name(&self) -> &str;

    /// Execute the task. Called zero or more times per run; more than once
    /// only under retry.
    fn perform(&self, ctx: &Context) -> std::result::Result<(), TaskError>;

    /// Key of the rate-limited resource this task consumes, if any.
    ///
    /// A key with no configured bucket in the active
    /// [`RateLimiter`](crate::limiter::RateLimiter) runs unthrottled.
    fn rate_limit_key(&self) -> Option<&str> {
        None
    }

    /// Retry policy applied around `perform`. The default makes a single
    /// attempt with no retries.
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::none()
    }

    /// Classify a failure as worth retrying. Consulted only when the retry
    /// policy has budget remaining; returning `false` propagates the error
    /// immediately regardless of remaining attempts.
    fn is_retryable(&self, _error: &TaskError) -> bool {
        true
    }
}

/// Terminal state of one task within one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TaskOutcome {
    /// The task ran and succeeded.
    Completed,
    /// The task ran and failed permanently (retries exhausted or the error
    /// was classified non-retryable).
    Failed {
        /// Description of the terminal failure.
        error: String,
    },
    /// The task was never submitted because an ancestor failed.
    Skipped {
        /// Name of the failed ancestor that cut off this branch.
        ancestor: String,
    },
    /// The task was never submitted because the run was cancelled.
    Cancelled,
}

impl TaskOutcome {
    /// Whether this outcome is a success.
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed)
    }

    /// Whether the task ran and failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed { .. })
    }
}

impl std::fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskOutcome::Completed => write!(f, "completed"),
            TaskOutcome::Failed { error } => write!(f, "failed: {}", error),
            TaskOutcome::Skipped { ancestor } => write!(f, "skipped: ancestor {} failed", ancestor),
            TaskOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}
