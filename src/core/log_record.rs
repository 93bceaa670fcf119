//! Log records as they travel through the queue
//!
//! Producers describe a record with the borrowed [`LogMsg`]; the queue only
//! ever stores the owned [`LogRecord`], which copies everything it needs so
//! it stays valid after the producing call returns.

use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
    static THREAD_NAME_CACHE: RefCell<Option<Option<String>>> = const { RefCell::new(None) };
}

fn current_thread_id() -> String {
    THREAD_ID_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| format!("{:?}", std::thread::current().id()))
            .clone()
    })
}

fn current_thread_name() -> Option<String> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| std::thread::current().name().map(String::from))
            .clone()
    })
}

/// Where a record was emitted from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation<'a> {
    pub file: &'a str,
    pub line: u32,
    pub module_path: &'a str,
}

impl<'a> SourceLocation<'a> {
    pub const fn new(file: &'a str, line: u32, module_path: &'a str) -> Self {
        Self {
            file,
            line,
            module_path,
        }
    }
}

/// Expands to the [`SourceLocation`] of the call site.
#[macro_export]
macro_rules! source_location {
    () => {
        $crate::core::SourceLocation::new(file!(), line!(), module_path!())
    };
}

/// Borrowed view of a record on the producer's stack
///
/// Nothing here outlives the call that posts it; [`LogRecord::from`] takes
/// the deep copy that is actually enqueued.
#[derive(Debug, Clone, Copy)]
pub struct LogMsg<'a> {
    pub level: LogLevel,
    pub logger_name: &'a str,
    pub payload: &'a str,
    pub location: Option<SourceLocation<'a>>,
    pub timestamp: DateTime<Utc>,
}

impl<'a> LogMsg<'a> {
    pub fn new(level: LogLevel, logger_name: &'a str, payload: &'a str) -> Self {
        Self {
            level,
            logger_name,
            payload,
            location: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_location(mut self, location: SourceLocation<'a>) -> Self {
        self.location = Some(location);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub logger_name: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub module_path: Option<String>,
    pub thread_id: String,
    pub thread_name: Option<String>,
}

impl LogRecord {
    /// Sanitize log message to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// to prevent attackers from injecting fake log entries.
    fn sanitize_message(message: &str) -> String {
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(level: LogLevel, message: impl AsRef<str>) -> Self {
        Self {
            level,
            message: Self::sanitize_message(message.as_ref()),
            timestamp: Utc::now(),
            logger_name: String::new(),
            file: None,
            line: None,
            module_path: None,
            thread_id: current_thread_id(),
            thread_name: current_thread_name(),
        }
    }

    pub fn with_logger_name(mut self, name: impl Into<String>) -> Self {
        self.logger_name = name.into();
        self
    }

    pub fn with_location(mut self, location: SourceLocation<'_>) -> Self {
        self.file = Some(location.file.to_string());
        self.line = Some(location.line);
        self.module_path = Some(location.module_path.to_string());
        self
    }
}

impl From<&LogMsg<'_>> for LogRecord {
    fn from(msg: &LogMsg<'_>) -> Self {
        let mut record = LogRecord::new(msg.level, msg.payload).with_logger_name(msg.logger_name);
        record.timestamp = msg.timestamp;
        match msg.location {
            Some(location) => record.with_location(location),
            None => record,
        }
    }
}

impl From<LogMsg<'_>> for LogRecord {
    fn from(msg: LogMsg<'_>) -> Self {
        LogRecord::from(&msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outlives_borrowed_payload() {
        let record = {
            let payload = format!("request {} finished", 42);
            let name = String::from("http");
            let msg = LogMsg::new(LogLevel::Warn, &name, &payload)
                .with_location(SourceLocation::new("server.rs", 17, "app::server"));
            LogRecord::from(&msg)
        };

        assert_eq!(record.message, "request 42 finished");
        assert_eq!(record.logger_name, "http");
        assert_eq!(record.level, LogLevel::Warn);
        assert_eq!(record.file.as_deref(), Some("server.rs"));
        assert_eq!(record.line, Some(17));
        assert_eq!(record.module_path.as_deref(), Some("app::server"));
    }

    #[test]
    fn test_record_keeps_producer_timestamp() {
        let msg = LogMsg::new(LogLevel::Info, "", "tick");
        let record = LogRecord::from(msg);
        assert_eq!(record.timestamp, msg.timestamp);
    }

    #[test]
    fn test_message_is_sanitized() {
        let record = LogRecord::new(LogLevel::Info, "a\nb\rc\td");
        assert_eq!(record.message, "a\\nb\\rc\\td");
    }

    #[test]
    fn test_thread_info_is_captured() {
        let record = std::thread::Builder::new()
            .name("producer-7".into())
            .spawn(|| LogRecord::new(LogLevel::Info, "hello"))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(record.thread_name.as_deref(), Some("producer-7"));
        assert!(record.thread_id.starts_with("ThreadId("));
    }

    #[test]
    fn test_source_location_macro() {
        let location = crate::source_location!();
        assert!(location.file.ends_with("log_record.rs"));
        assert_eq!(location.module_path, module_path!());
    }
}
