//! Shared task types for the integration suite.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use weir::{Context, RetryPolicy, Task, TaskError};

pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events_in(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Records start/end events, optionally sleeps, optionally fails.
pub struct StepTask {
    name: String,
    events: EventLog,
    millis: u64,
    fail_message: Option<String>,
}

impl StepTask {
    pub fn new(name: &str, events: &EventLog) -> Self {
        Self {
            name: name.to_string(),
            events: Arc::clone(events),
            millis: 0,
            fail_message: None,
        }
    }

    pub fn sleeping(mut self, millis: u64) -> Self {
        self.millis = millis;
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.fail_message = Some(message.to_string());
        self
    }
}

impl Task for StepTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn perform(&self, _ctx: &Context) -> Result<(), TaskError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("start:{}", self.name));
        if self.millis > 0 {
            std::thread::sleep(Duration::from_millis(self.millis));
        }
        self.events
            .lock()
            .unwrap()
            .push(format!("end:{}", self.name));
        match &self.fail_message {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }
}

/// Simulates a throttled remote call: fails with a transient error until the
/// configured attempt, retries only transient errors, and paces itself
/// through a shared rate-limit key.
pub struct FlakyApiTask {
    name: String,
    key: String,
    succeed_on: u32,
    budget: u32,
    pub attempts: Arc<AtomicU32>,
}

impl FlakyApiTask {
    pub fn new(name: &str, key: &str, succeed_on: u32, budget: u32) -> Self {
        Self {
            name: name.to_string(),
            key: key.to_string(),
            succeed_on,
            budget,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }
}

impl Task for FlakyApiTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn perform(&self, _ctx: &Context) -> Result<(), TaskError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt >= self.succeed_on {
            Ok(())
        } else {
            Err("connection reset".into())
        }
    }

    fn rate_limit_key(&self) -> Option<&str> {
        Some(&self.key)
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.budget)
    }

    fn is_retryable(&self, error: &TaskError) -> bool {
        error.to_string().contains("connection reset")
    }
}

/// Fails unless the run context holds the expected string under a key.
pub struct ContextCheckTask {
    name: String,
    key: String,
    expected: String,
}

impl ContextCheckTask {
    pub fn new(name: &str, key: &str, expected: &str) -> Self {
        Self {
            name: name.to_string(),
            key: key.to_string(),
            expected: expected.to_string(),
        }
    }
}

impl Task for ContextCheckTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn perform(&self, ctx: &Context) -> Result<(), TaskError> {
        match ctx.get_str(&self.key) {
            Some(value) if value == self.expected => Ok(()),
            other => Err(format!(
                "expected {}={:?}, found {:?}",
                self.key, self.expected, other
            )
            .into()),
        }
    }
}
