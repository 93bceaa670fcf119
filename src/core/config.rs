//! Writer configuration
//!
//! Plain data that can be loaded from JSON and handed to
//! [`AsyncLogWriter::from_config`](super::writer::AsyncLogWriter::from_config).

use super::error::{LoggerError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_CAPACITY: usize = 8192;
pub const DEFAULT_THREAD_NAME: &str = "async-log-writer";

/// # Example
///
/// ```
/// use async_log_writer::WriterConfig;
///
/// let config = WriterConfig::from_json(r#"{ "capacity": 1024 }"#).unwrap();
/// assert_eq!(config.capacity, 1024);
/// assert_eq!(config.thread_name, "async-log-writer");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Maximum number of queued messages
    pub capacity: usize,
    /// Name of the writer thread
    pub thread_name: String,
    /// How long the idle writer parks before polling the queue again
    pub idle_wait_ms: u64,
}

impl WriterConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: WriterConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(LoggerError::config(
                "WriterConfig",
                "capacity must be greater than zero",
            ));
        }
        if self.thread_name.is_empty() {
            return Err(LoggerError::config(
                "WriterConfig",
                "thread_name must not be empty",
            ));
        }
        if self.idle_wait_ms == 0 {
            return Err(LoggerError::config(
                "WriterConfig",
                "idle_wait_ms must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            idle_wait_ms: 1,
        }
    }
}
