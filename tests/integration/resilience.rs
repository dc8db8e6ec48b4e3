//! Retry, rate limiting, and cancellation under realistic pipeline shapes.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use weir::{
    Context, DependencyGraph, ExecutionEngine, RateLimit, RateLimiter, Scheduler, TaskOutcome,
};

use crate::fixtures::{event_log, FlakyApiTask, StepTask};

#[tokio::test]
async fn test_flaky_tasks_recover_behind_shared_limit() {
    let t1 = Arc::new(FlakyApiTask::new("push-1", "registry", 2, 3));
    let t2 = Arc::new(FlakyApiTask::new("push-2", "registry", 3, 3));
    let a1 = Arc::clone(&t1.attempts);
    let a2 = Arc::clone(&t2.attempts);

    let mut graph = DependencyGraph::new();
    graph.register(t1, None).unwrap();
    graph.register(t2, None).unwrap();
    let scheduler = Scheduler::new(graph).unwrap();

    let limiter = Arc::new(RateLimiter::new(vec![RateLimit::new(
        "registry", 5.0, 50.0,
    )]));
    let engine = ExecutionEngine::new(Arc::new(Context::empty()), limiter).workers(2);

    let report = engine.run(&scheduler).await.unwrap();
    assert!(report.is_success(), "failed: {:?}", report.failed());
    assert_eq!(a1.load(Ordering::SeqCst), 2);
    assert_eq!(a2.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_budget_exhaustion_reported() {
    // Needs 5 attempts, only 2 allowed
    let task = Arc::new(FlakyApiTask::new("hopeless", "registry", 5, 2));
    let attempts = Arc::clone(&task.attempts);

    let mut graph = DependencyGraph::new();
    graph.register(task, None).unwrap();
    let scheduler = Scheduler::new(graph).unwrap();
    let engine = ExecutionEngine::new(
        Arc::new(Context::empty()),
        Arc::new(RateLimiter::unlimited()),
    );

    let report = engine.run(&scheduler).await.unwrap();
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    match report.outcome("hopeless") {
        Some(TaskOutcome::Failed { error }) => {
            assert!(error.contains("2 attempts"), "unexpected error: {error}")
        }
        other => panic!("expected Failed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limit_paces_sequential_acquisitions() {
    // Capacity 1, 10 tokens/s: three tasks on the same key need two refill
    // waits of roughly 100ms each.
    let tasks: Vec<Arc<FlakyApiTask>> = (0..3)
        .map(|i| Arc::new(FlakyApiTask::new(&format!("call-{i}"), "api", 1, 1)))
        .collect();

    let mut graph = DependencyGraph::new();
    for task in &tasks {
        graph
            .register(Arc::clone(task) as Arc<dyn weir::Task>, None)
            .unwrap();
    }
    let scheduler = Scheduler::new(graph).unwrap();

    let limiter = Arc::new(RateLimiter::new(vec![RateLimit::new("api", 1.0, 10.0)]));
    let engine = ExecutionEngine::new(Arc::new(Context::empty()), limiter).workers(3);

    let start = Instant::now();
    let report = engine.run(&scheduler).await.unwrap();

    assert!(report.is_success());
    assert!(
        start.elapsed() >= Duration::from_millis(180),
        "limiter did not pace: {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_unconfigured_key_is_not_throttled() {
    let task = Arc::new(FlakyApiTask::new("free", "unknown-key", 1, 1));
    let mut graph = DependencyGraph::new();
    graph.register(task, None).unwrap();
    let scheduler = Scheduler::new(graph).unwrap();
    let engine = ExecutionEngine::new(
        Arc::new(Context::empty()),
        Arc::new(RateLimiter::new(vec![RateLimit::new("other", 1.0, 1.0)])),
    );

    let start = Instant::now();
    let report = engine.run(&scheduler).await.unwrap();
    assert!(report.is_success());
    assert!(start.elapsed() < Duration::from_millis(90));
}

#[tokio::test]
async fn test_cancellation_interrupts_rate_limit_wait() {
    // Bucket is empty after the first task; the second would poll forever at
    // rate zero, so cancellation must break the wait.
    let t1 = Arc::new(FlakyApiTask::new("first", "frozen", 1, 1));
    let t2 = Arc::new(FlakyApiTask::new("second", "frozen", 1, 1));
    let mut graph = DependencyGraph::new();
    graph.register(t1, None).unwrap();
    graph.register(t2, None).unwrap();
    let scheduler = Scheduler::new(graph).unwrap();

    let limiter = Arc::new(RateLimiter::new(vec![RateLimit::new("frozen", 1.0, 0.0)]));
    let engine = ExecutionEngine::new(Arc::new(Context::empty()), limiter).workers(2);

    let token = engine.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        token.cancel();
    });

    let start = Instant::now();
    let report = engine.run(&scheduler).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(2));
    let cancelled = report.cancelled();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(report.completed().len(), 1);
    assert!(cancelled == vec!["first"] || cancelled == vec!["second"]);
}

#[tokio::test]
async fn test_cancellation_skips_downstream_chain() {
    let events = event_log();
    let mut graph = DependencyGraph::new();
    graph
        .register(Arc::new(StepTask::new("long", &events).sleeping(400)), None)
        .unwrap();
    graph
        .register(Arc::new(StepTask::new("after", &events)), Some("long"))
        .unwrap();
    graph
        .register(Arc::new(StepTask::new("last", &events)), Some("after"))
        .unwrap();
    let scheduler = Scheduler::new(graph).unwrap();

    let engine = ExecutionEngine::new(
        Arc::new(Context::empty()),
        Arc::new(RateLimiter::unlimited()),
    );
    let token = engine.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let report = engine.run(&scheduler).await.unwrap();
    assert_eq!(report.outcome("long"), Some(&TaskOutcome::Cancelled));
    assert_eq!(report.outcome("after"), Some(&TaskOutcome::Cancelled));
    assert_eq!(report.outcome("last"), Some(&TaskOutcome::Cancelled));
    assert!(report.completed().is_empty());
}
