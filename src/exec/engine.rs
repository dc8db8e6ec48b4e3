//! Concurrent execution engine.
//!
//! The engine drives one run of the pipeline: the start set is submitted to a
//! bounded worker pool, each unit performs its task behind the retry and
//! rate-limit wrappers, and completions flow back to a single driving loop
//! over an mpsc channel. The loop owns the in-flight count and the per-task
//! outcomes; when a unit succeeds its dependent trackers are submitted, and
//! when it fails permanently its whole dependent subtree is marked skipped
//! without ever being submitted. Sibling branches keep running either way.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::Context;
use crate::core::task::{Task, TaskOutcome};
use crate::core::tracker::TaskTracker;
use crate::error::{Error, Result};
use crate::exec::scheduler::Scheduler;
use crate::limiter::RateLimiter;
use crate::{wlog, wlog_error, wlog_warn};

/// Outcome of every task in one run, keyed by task name.
///
/// A finished run does not imply every task succeeded: the report records
/// which tasks completed, which failed permanently, and which were never
/// reached because an ancestor failed or the run was cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    outcomes: BTreeMap<String, TaskOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Outcome of a single task, if it was part of the run.
    pub fn outcome(&self, name: &str) -> Option<&TaskOutcome> {
        self.outcomes.get(name)
    }

    /// All per-task outcomes.
    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &TaskOutcome)> {
        self.outcomes.iter().map(|(name, o)| (name.as_str(), o))
    }

    /// Number of tasks in the report.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether the report covers no tasks.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn names_where(&self, pred: impl Fn(&TaskOutcome) -> bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| pred(outcome))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Names of tasks that ran and succeeded.
    pub fn completed(&self) -> Vec<&str> {
        self.names_where(TaskOutcome::is_completed)
    }

    /// Names of tasks that ran and failed permanently.
    pub fn failed(&self) -> Vec<&str> {
        self.names_where(TaskOutcome::is_failed)
    }

    /// Names of tasks skipped because an ancestor failed.
    pub fn skipped(&self) -> Vec<&str> {
        self.names_where(|o| matches!(o, TaskOutcome::Skipped { .. }))
    }

    /// Names of tasks that never ran because the run was cancelled.
    pub fn cancelled(&self) -> Vec<&str> {
        self.names_where(|o| matches!(o, TaskOutcome::Cancelled))
    }

    /// Whether every task in the run completed.
    pub fn is_success(&self) -> bool {
        self.outcomes.values().all(TaskOutcome::is_completed)
    }

    /// Persist the report as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a previously saved report.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Message sent from a worker unit back to the driving loop.
struct UnitCompletion {
    name: String,
    result: Result<()>,
    dependents: Vec<Arc<TaskTracker>>,
}

/// Drives concurrent execution of a validated pipeline.
pub struct ExecutionEngine {
    context: Arc<Context>,
    limiter: Arc<RateLimiter>,
    workers: usize,
    cancel: CancellationToken,
}

impl ExecutionEngine {
    /// Create an engine with the default pool bound (available parallelism).
    pub fn new(context: Arc<Context>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            context,
            limiter,
            workers: default_workers(),
            cancel: CancellationToken::new(),
        }
    }

    /// Override the worker pool bound (clamped to at least one).
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// The configured pool bound.
    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// A handle that cancels this engine's runs when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the current (and any future) run: no new units are submitted
    /// and in-flight rate-limit waits are interrupted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Execute the pipeline concurrently, propagating work to dependents as
    /// prerequisites complete.
    ///
    /// Every registered task appears in the returned report exactly once.
    pub async fn run(&self, scheduler: &Scheduler) -> Result<RunReport> {
        scheduler.report_plan();
        let roots = scheduler.start_set()?;
        let total = scheduler.graph().len();
        let started_at = Utc::now();
        wlog!("run starting: {} tasks, {} workers", total, self.workers);

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let (tx, mut rx) = mpsc::channel::<UnitCompletion>(total.max(1));
        let mut outcomes: BTreeMap<String, TaskOutcome> = BTreeMap::new();
        let mut in_flight = 0usize;

        for tracker in &roots {
            if self.cancel.is_cancelled() {
                mark_subtree_cancelled(tracker, &mut outcomes);
            } else {
                self.submit(tracker, &tx, &semaphore);
                in_flight += 1;
            }
        }

        // Single driving loop: the only mutator of in_flight and outcomes.
        while in_flight > 0 {
            let Some(done) = rx.recv().await else { break };
            in_flight -= 1;
            match done.result {
                Ok(()) => {
                    wlog!("task {} completed", done.name);
                    outcomes.insert(done.name.clone(), TaskOutcome::Completed);
                    for dependent in &done.dependents {
                        if self.cancel.is_cancelled() {
                            mark_subtree_cancelled(dependent, &mut outcomes);
                        } else {
                            self.submit(dependent, &tx, &semaphore);
                            in_flight += 1;
                        }
                    }
                }
                Err(Error::Cancelled) => {
                    wlog_warn!("task {} cancelled", done.name);
                    outcomes.insert(done.name.clone(), TaskOutcome::Cancelled);
                    for dependent in &done.dependents {
                        mark_subtree_cancelled(dependent, &mut outcomes);
                    }
                }
                Err(err) => {
                    wlog_error!("task {} failed: {}", done.name, err);
                    outcomes.insert(
                        done.name.clone(),
                        TaskOutcome::Failed {
                            error: err.to_string(),
                        },
                    );
                    for dependent in &done.dependents {
                        mark_subtree_skipped(dependent, &done.name, &mut outcomes);
                    }
                }
            }
        }

        let report = RunReport {
            outcomes,
            started_at,
            finished_at: Utc::now(),
        };
        wlog!(
            "run finished: {} completed, {} failed, {} skipped, {} cancelled",
            report.completed().len(),
            report.failed().len(),
            report.skipped().len(),
            report.cancelled().len()
        );
        Ok(report)
    }

    /// Execute the pipeline serially in the computed flat order.
    ///
    /// Useful for debugging and deterministic runs; partial-failure semantics
    /// match the concurrent path (a failed task's descendants are skipped,
    /// unrelated branches proceed).
    pub async fn run_serial(&self, scheduler: &Scheduler) -> Result<RunReport> {
        scheduler.report_plan();
        let started_at = Utc::now();
        let graph = scheduler.graph();
        let mut outcomes: BTreeMap<String, TaskOutcome> = BTreeMap::new();

        for name in scheduler.execution_order() {
            if self.cancel.is_cancelled() {
                outcomes.insert(name.clone(), TaskOutcome::Cancelled);
                continue;
            }
            let blocked = graph
                .prerequisites_of(name)
                .iter()
                .find(|p| !matches!(outcomes.get(p.as_str()), Some(TaskOutcome::Completed)));
            if let Some(prereq) = blocked {
                let outcome = match outcomes.get(prereq.as_str()) {
                    Some(TaskOutcome::Skipped { ancestor }) => TaskOutcome::Skipped {
                        ancestor: ancestor.clone(),
                    },
                    Some(TaskOutcome::Cancelled) => TaskOutcome::Cancelled,
                    _ => TaskOutcome::Skipped {
                        ancestor: prereq.clone(),
                    },
                };
                outcomes.insert(name.clone(), outcome);
                continue;
            }

            wlog!("executing {}", name);
            let task = graph
                .task(name)
                .map(Arc::clone)
                .expect("execution order only contains registered tasks");
            let result = run_unit(
                task,
                Arc::clone(&self.context),
                Arc::clone(&self.limiter),
                self.cancel.clone(),
            )
            .await;
            match result {
                Ok(()) => {
                    outcomes.insert(name.clone(), TaskOutcome::Completed);
                }
                Err(Error::Cancelled) => {
                    outcomes.insert(name.clone(), TaskOutcome::Cancelled);
                }
                Err(err) => {
                    wlog_error!("task {} failed: {}", name, err);
                    outcomes.insert(
                        name.clone(),
                        TaskOutcome::Failed {
                            error: err.to_string(),
                        },
                    );
                }
            }
        }

        Ok(RunReport {
            outcomes,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn submit(
        &self,
        tracker: &Arc<TaskTracker>,
        tx: &mpsc::Sender<UnitCompletion>,
        semaphore: &Arc<Semaphore>,
    ) {
        let task = Arc::clone(tracker.task());
        let dependents = tracker.dependents().to_vec();
        let context = Arc::clone(&self.context);
        let limiter = Arc::clone(&self.limiter);
        let cancel = self.cancel.clone();
        let tx = tx.clone();
        let semaphore = Arc::clone(semaphore);

        tokio::spawn(async move {
            let name = task.name().to_string();
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(Error::Cancelled),
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(_permit) => run_unit(task, context, limiter, cancel.clone()).await,
                    Err(_) => Err(Error::Cancelled),
                },
            };
            let _ = tx
                .send(UnitCompletion {
                    name,
                    result,
                    dependents,
                })
                .await;
        });
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("workers", &self.workers)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Run one task with its wrappers: retry governs how many attempts are made,
/// and each attempt independently re-acquires a rate-limit token before the
/// body runs on a blocking worker. The whole unit races the cancellation
/// token, which also interrupts rate-limit polling.
async fn run_unit(
    task: Arc<dyn Task>,
    context: Arc<Context>,
    limiter: Arc<RateLimiter>,
    cancel: CancellationToken,
) -> Result<()> {
    let policy = task.retry_policy();
    let predicate_task = Arc::clone(&task);
    let work = policy.run(
        move |err| predicate_task.is_retryable(err),
        || {
            let task = Arc::clone(&task);
            let context = Arc::clone(&context);
            let limiter = Arc::clone(&limiter);
            async move {
                if let Some(key) = task.rate_limit_key() {
                    limiter.acquire(key).await;
                }
                let body_task = Arc::clone(&task);
                match tokio::task::spawn_blocking(move || body_task.perform(&context)).await {
                    Ok(result) => result,
                    Err(join_err) => Err(format!("task body panicked: {join_err}").into()),
                }
            }
        },
    );

    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = work => result,
    }
}

fn mark_subtree_skipped(
    tracker: &Arc<TaskTracker>,
    ancestor: &str,
    outcomes: &mut BTreeMap<String, TaskOutcome>,
) {
    outcomes.insert(
        tracker.name().to_string(),
        TaskOutcome::Skipped {
            ancestor: ancestor.to_string(),
        },
    );
    for dependent in tracker.dependents() {
        mark_subtree_skipped(dependent, ancestor, outcomes);
    }
}

fn mark_subtree_cancelled(tracker: &Arc<TaskTracker>, outcomes: &mut BTreeMap<String, TaskOutcome>) {
    outcomes.insert(tracker.name().to_string(), TaskOutcome::Cancelled);
    for dependent in tracker.dependents() {
        mark_subtree_cancelled(dependent, outcomes);
    }
}
