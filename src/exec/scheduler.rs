//! Plan-level scheduling.
//!
//! The [`Scheduler`] validates the dependency graph at construction (cycles
//! and dangling prerequisites abort before any task can run), stores the flat
//! execution order for reporting and serial runs, and produces the start set
//! the concurrent engine consumes.

use std::sync::Arc;

use crate::core::graph::DependencyGraph;
use crate::core::tracker::TaskTracker;
use crate::reporter::PlanReporter;
use crate::{wlog, Result};

pub struct Scheduler {
    graph: DependencyGraph,
    execution_order: Vec<String>,
    reporters: Vec<Box<dyn PlanReporter>>,
}

impl Scheduler {
    /// Validate the graph and compute the flat execution order.
    ///
    /// Fails with `CircularDependency` or `UnknownTask` before any execution
    /// is possible; there is no partial-registry execution.
    pub fn new(graph: DependencyGraph) -> Result<Self> {
        let execution_order = graph.build_execution_order()?;
        wlog!(
            "scheduler validated {} tasks, plan: {}",
            execution_order.len(),
            execution_order.join(" -> ")
        );
        Ok(Self {
            graph,
            execution_order,
            reporters: Vec::new(),
        })
    }

    /// Register a plan reporter. Reporters run in registration order.
    pub fn add_reporter(&mut self, reporter: Box<dyn PlanReporter>) {
        self.reporters.push(reporter);
    }

    /// Hand the flat plan to every registered reporter.
    pub fn report_plan(&self) {
        for reporter in &self.reporters {
            reporter.report(&self.execution_order);
        }
    }

    /// The validated flat execution order.
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// The underlying dependency graph (read-only from here on).
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Build a fresh tracker forest and return its roots: the tasks with no
    /// prerequisite, the initial work for the concurrent engine.
    pub fn start_set(&self) -> Result<Vec<Arc<TaskTracker>>> {
        self.graph.build_tracker_forest()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.execution_order.len())
            .field("reporters", &self.reporters.len())
            .finish()
    }
}
