//! Per-run tracker forest.
//!
//! A [`TaskTracker`] wraps a registered task for the duration of one
//! execution run: it owns the task, holds a weak back-reference to its single
//! prerequisite tracker (unset for roots), and owns the list of dependent
//! trackers. The engine walks this forest, submitting dependents as their
//! prerequisite completes. Trackers are rebuilt fresh for every run and
//! discarded afterwards.

use std::sync::{Arc, OnceLock, Weak};

use crate::core::task::Task;

pub struct TaskTracker {
    task: Arc<dyn Task>,
    // Unset for root trackers; set exactly once during forest wiring.
    prerequisite: OnceLock<Weak<TaskTracker>>,
    dependents: Vec<Arc<TaskTracker>>,
}

impl TaskTracker {
    pub(crate) fn new(task: Arc<dyn Task>, dependents: Vec<Arc<TaskTracker>>) -> Arc<Self> {
        Arc::new(Self {
            task,
            prerequisite: OnceLock::new(),
            dependents,
        })
    }

    pub(crate) fn set_prerequisite(&self, parent: &Arc<TaskTracker>) {
        // A task has at most one prerequisite, so this never races.
        let _ = self.prerequisite.set(Arc::downgrade(parent));
    }

    /// The wrapped task.
    pub fn task(&self) -> &Arc<dyn Task> {
        &self.task
    }

    /// Name of the wrapped task.
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Trackers for the tasks that depend directly on this one.
    pub fn dependents(&self) -> &[Arc<TaskTracker>] {
        &self.dependents
    }

    /// The prerequisite tracker, if this task has one and the forest is
    /// still alive.
    pub fn prerequisite(&self) -> Option<Arc<TaskTracker>> {
        self.prerequisite.get().and_then(Weak::upgrade)
    }

    /// Whether this tracker is a root of the forest (no prerequisite).
    pub fn is_root(&self) -> bool {
        self.prerequisite.get().is_none()
    }
}

impl std::fmt::Debug for TaskTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskTracker")
            .field("task", &self.name())
            .field("root", &self.is_root())
            .field("dependents", &self.dependents.len())
            .finish()
    }
}
