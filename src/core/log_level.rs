//! Severity carried by every log record

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::LoggerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl LogLevel {
    /// Every level, from least to most severe
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Records at this level go to stderr rather than stdout
    pub fn is_severe(self) -> bool {
        self >= LogLevel::Error
    }

    #[cfg(feature = "console")]
    pub(crate) fn color(self) -> colored::Color {
        use colored::Color;
        match self {
            LogLevel::Trace => Color::BrightBlack,
            LogLevel::Debug => Color::Blue,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
            LogLevel::Fatal => Color::BrightRed,
        }
    }
}

impl fmt::Display for LogLevel {
    // pad so width specifiers like `{:5}` line columns up
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LoggerError;

    /// Case-insensitive; `WARNING` is accepted for `Warn`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .or_else(|| s.eq_ignore_ascii_case("WARNING").then_some(LogLevel::Warn))
            .ok_or_else(|| LoggerError::config("LogLevel", format!("unknown level '{}'", s)))
    }
}
