//! Runner configuration.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};

/// Concurrency used when nothing else is configured.
pub const DEFAULT_CAPACITY: usize = 5;

const DEFAULT_LABEL: &str = "directly";

/// Configuration shared by the batch and streaming runners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Maximum number of work items in flight at once.
    pub capacity: usize,
    /// Name attached to every log event emitted by the runner.
    #[serde(default = "default_label")]
    pub label: String,
}

fn default_label() -> String {
    DEFAULT_LABEL.to_string()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            label: default_label(),
        }
    }
}

impl RunnerConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Build a config from the environment.
    ///
    /// - `DIRECTLY_CONCURRENCY`: positive integer capacity
    /// - `DIRECTLY_LABEL`: log label
    ///
    /// Missing or malformed values fall back to the defaults.
    pub fn from_env() -> Self {
        let capacity = std::env::var("DIRECTLY_CONCURRENCY")
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_CAPACITY);
        let label = std::env::var("DIRECTLY_LABEL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(default_label);
        Self { capacity, label }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::configuration_with_context(
                "capacity must be at least 1",
                ErrorContext::new()
                    .with_field_path("capacity")
                    .with_details("got 0")
                    .with_source("runner_config"),
            ));
        }
        Ok(())
    }
}
