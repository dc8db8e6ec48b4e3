use thiserror::Error;

/// Error raised by a task body. Tasks report failures as boxed errors;
/// the engine classifies them via the task's retry predicate.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("Unknown task referenced as prerequisite: {name} (required by {required_by})")]
    UnknownTask { name: String, required_by: String },

    #[error("Circular dependency detected among tasks: {0}")]
    CircularDependency(String),

    #[error("Task execution failed: {0}")]
    TaskExecution(#[source] TaskError),

    #[error("Retries exhausted after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: TaskError,
    },

    #[error("Non-retryable error: {0}")]
    NonRetryable(#[source] TaskError),

    #[error("Run cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
