//! Core pipeline data model: tasks, the dependency graph, and the per-run
//! tracker forest.

pub mod graph;
pub mod task;
pub mod tracker;

pub use graph::DependencyGraph;
pub use task::{Task, TaskOutcome};
pub use tracker::TaskTracker;
