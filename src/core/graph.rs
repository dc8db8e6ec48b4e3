//! Dependency graph built from task registrations.
//!
//! The graph records, for each task, its direct prerequisites (the
//! registration interface accepts at most one, but the adjacency is shaped
//! for several) and derives two things from them: a validated flat execution
//! order for planning and serial runs, and the per-run tracker forest the
//! concurrent engine consumes. Registration order is preserved and used as
//! the deterministic tie-break in the flat order.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::core::task::Task;
use crate::core::tracker::TaskTracker;
use crate::error::{Error, Result};

#[derive(Default)]
pub struct DependencyGraph {
    /// Task names in registration order.
    names: Vec<String>,
    tasks: HashMap<String, Arc<dyn Task>>,
    /// Dependent name -> names of its prerequisites.
    dependencies: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task with an optional single prerequisite.
    ///
    /// The prerequisite is recorded by name and may refer to a task
    /// registered later; dangling names are caught when the execution order
    /// is built. A reused task name fails with [`Error::DuplicateTask`] and
    /// leaves the registry untouched.
    pub fn register(&mut self, task: Arc<dyn Task>, prerequisite: Option<&str>) -> Result<()> {
        let name = task.name().to_string();
        if self.tasks.contains_key(&name) {
            return Err(Error::DuplicateTask(name));
        }
        if let Some(prereq) = prerequisite {
            self.dependencies
                .entry(name.clone())
                .or_default()
                .push(prereq.to_string());
        }
        self.names.push(name.clone());
        self.tasks.insert(name, task);
        Ok(())
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no tasks have been registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether a task name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Task names in registration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Look up a registered task.
    pub fn task(&self, name: &str) -> Option<&Arc<dyn Task>> {
        self.tasks.get(name)
    }

    /// Direct prerequisites of a task (empty for roots and unknown names).
    pub fn prerequisites_of(&self, name: &str) -> &[String] {
        self.dependencies.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn validate_prerequisites(&self) -> Result<()> {
        for name in &self.names {
            for prereq in self.prerequisites_of(name) {
                if !self.tasks.contains_key(prereq) {
                    return Err(Error::UnknownTask {
                        name: prereq.clone(),
                        required_by: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Compute a validated linear execution order with Kahn's algorithm.
    ///
    /// The in-degree of a task is its prerequisite count. Zero-in-degree
    /// tasks seed the queue in registration order; draining a task decrements
    /// the in-degree of every task listing it as a prerequisite, again
    /// scanning in registration order so ties are broken deterministically.
    /// An order shorter than the registry means a cycle: the queue never
    /// drained the tasks on it.
    pub fn build_execution_order(&self) -> Result<Vec<String>> {
        self.validate_prerequisites()?;

        let mut in_degree: HashMap<&str, usize> = self
            .names
            .iter()
            .map(|name| (name.as_str(), self.prerequisites_of(name).len()))
            .collect();

        let mut queue: VecDeque<&str> = self
            .names
            .iter()
            .map(String::as_str)
            .filter(|name| in_degree[name] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.names.len());
        while let Some(task) = queue.pop_front() {
            order.push(task.to_string());
            for candidate in &self.names {
                if self
                    .prerequisites_of(candidate)
                    .iter()
                    .any(|prereq| prereq == task)
                {
                    let degree = in_degree.get_mut(candidate.as_str()).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(candidate);
                    }
                }
            }
        }

        if order.len() != self.names.len() {
            let stuck: Vec<&str> = self
                .names
                .iter()
                .map(String::as_str)
                .filter(|name| !order.iter().any(|done| done == name))
                .collect();
            return Err(Error::CircularDependency(stuck.join(", ")));
        }

        Ok(order)
    }

    /// Build the per-run tracker forest and return its roots (the start set).
    ///
    /// Trackers are constructed in reverse execution order so every
    /// dependent exists before its prerequisite's tracker owns it; the weak
    /// back-references are wired afterwards. The forest shares no mutable
    /// state with the flat order.
    pub fn build_tracker_forest(&self) -> Result<Vec<Arc<TaskTracker>>> {
        let order = self.build_execution_order()?;

        // prerequisite name -> dependent names, in registration order
        let mut dependents_of: HashMap<&str, Vec<&str>> = HashMap::new();
        for name in &self.names {
            for prereq in self.prerequisites_of(name) {
                dependents_of
                    .entry(prereq.as_str())
                    .or_default()
                    .push(name.as_str());
            }
        }

        let mut trackers: HashMap<&str, Arc<TaskTracker>> = HashMap::new();
        for name in order.iter().rev() {
            let dependents = dependents_of
                .get(name.as_str())
                .map(|children| {
                    children
                        .iter()
                        .map(|child| Arc::clone(&trackers[child]))
                        .collect()
                })
                .unwrap_or_default();
            let task = Arc::clone(&self.tasks[name.as_str()]);
            trackers.insert(name.as_str(), TaskTracker::new(task, dependents));
        }

        for name in &self.names {
            for prereq in self.prerequisites_of(name) {
                trackers[name.as_str()].set_prerequisite(&trackers[prereq.as_str()]);
            }
        }

        Ok(self
            .names
            .iter()
            .filter(|name| self.prerequisites_of(name).is_empty())
            .map(|name| Arc::clone(&trackers[name.as_str()]))
            .collect())
    }
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("tasks", &self.names.len())
            .field(
                "edges",
                &self.dependencies.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}
