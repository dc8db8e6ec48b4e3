//! Run planning and execution.

pub mod engine;
pub mod scheduler;

pub use engine::{ExecutionEngine, RunReport};
pub use scheduler::Scheduler;
