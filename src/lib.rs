//! weir - a lightweight pipeline engine.
//!
//! Tasks are registered into a [`DependencyGraph`] with at most one named
//! prerequisite each. A [`Scheduler`] validates the graph at construction,
//! computing a deterministic flat execution order (and rejecting cycles and
//! dangling prerequisite names), and the [`ExecutionEngine`] runs the
//! pipeline over a bounded worker pool: work propagates to dependents as
//! their prerequisites complete, failed subtrees are skipped without
//! stopping unrelated branches, and every task lands in the [`RunReport`]
//! with exactly one outcome.
//!
//! Task bodies run behind two composable wrappers: a [`RetryPolicy`] that
//! re-attempts retryable failures up to a fixed budget, and a keyed
//! [`RateLimiter`] whose token buckets pace access to shared resources.
//!
//! ```no_run
//! use std::sync::Arc;
//! use weir::{
//!     Context, DependencyGraph, ExecutionEngine, RateLimiter, Scheduler, Task, TaskError,
//! };
//!
//! struct Provision;
//!
//! impl Task for Provision {
//!     fn name(&self) -> &str {
//!         "provision"
//!     }
//!
//!     fn perform(&self, _ctx: &Context) -> Result<(), TaskError> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> weir::Result<()> {
//! let mut graph = DependencyGraph::new();
//! graph.register(Arc::new(Provision), None)?;
//! let scheduler = Scheduler::new(graph)?;
//!
//! let engine = ExecutionEngine::new(
//!     Arc::new(Context::empty()),
//!     Arc::new(RateLimiter::unlimited()),
//! );
//! let report = engine.run(&scheduler).await?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod exec;
pub mod limiter;
pub mod log;
pub mod reporter;
pub mod retry;

pub use config::Context;
pub use crate::core::{DependencyGraph, Task, TaskOutcome, TaskTracker};
pub use error::{Error, Result, TaskError};
pub use exec::{ExecutionEngine, RunReport, Scheduler};
pub use limiter::{RateLimit, RateLimiter, TokenBucket, RATE_LIMIT_POLL};
pub use reporter::{ConsolePlanReporter, LogPlanReporter, PlanReporter};
pub use retry::RetryPolicy;
