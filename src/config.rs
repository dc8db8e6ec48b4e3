//! Shared task configuration.
//!
//! A [`Context`] is a read-only key-value blob loaded once at process startup
//! and handed to every task. Tasks read from it during `perform`; nothing
//! mutates it after initialization, so it is safe to share across workers
//! behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::{wlog_debug, Result};

/// Read-only configuration handed to every task at execution time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Context {
    values: BTreeMap<String, toml::Value>,
}

impl Context {
    /// Create an empty context, for pipelines whose tasks need no configuration.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a context from an in-memory table.
    pub fn from_table(values: BTreeMap<String, toml::Value>) -> Self {
        Self { values }
    }

    /// Load a context from a TOML file.
    ///
    /// A missing or malformed file is a startup error; there is no partial
    /// fallback because tasks are constructed against the loaded values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        wlog_debug!("Context::from_file path={}", path.display());
        let context: Self = toml::from_str(&fs::read_to_string(path)?)?;
        wlog_debug!("Context loaded: {} keys", context.values.len());
        Ok(context)
    }

    /// Parse a context from a TOML string.
    pub fn from_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Get a raw value by key.
    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        self.values.get(key)
    }

    /// Get a string value by key.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    /// Get an integer value by key.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(|v| v.as_integer())
    }

    /// Check whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the context holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
