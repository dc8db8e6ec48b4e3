//! Plan reporting.
//!
//! Before a run starts, the scheduler hands the computed flat execution order
//! to every registered reporter. Reporters are purely observational; they
//! cannot influence scheduling.

use crate::wlog;

/// Observes the computed execution plan before a run.
pub trait PlanReporter: Send + Sync {
    fn report(&self, order: &[String]);
}

/// Prints the numbered plan to stdout.
#[derive(Debug, Default)]
pub struct ConsolePlanReporter;

impl PlanReporter for ConsolePlanReporter {
    fn report(&self, order: &[String]) {
        println!("Execution plan ({} tasks):", order.len());
        for (i, name) in order.iter().enumerate() {
            println!("  {}. {}", i + 1, name);
        }
    }
}

/// Writes the plan to the weir log.
#[derive(Debug, Default)]
pub struct LogPlanReporter;

impl PlanReporter for LogPlanReporter {
    fn report(&self, order: &[String]) {
        wlog!("execution plan: {}", order.join(" -> "));
    }
}
