//! Console appender implementation

use crate::core::{Appender, LogRecord, Result};
use colored::Colorize;

pub struct ConsoleAppender {
    use_colors: bool,
}

impl ConsoleAppender {
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    fn format_line(&self, record: &LogRecord) -> String {
        let level_str = format!("{:5}", record.level);
        let level_str = if self.use_colors {
            level_str.as_str().color(record.level.color()).to_string()
        } else {
            level_str
        };

        let thread = record.thread_name.as_ref().unwrap_or(&record.thread_id);
        let timestamp = record.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ");

        if record.logger_name.is_empty() {
            format!("[{}] [{}] {} - {}", timestamp, level_str, thread, record.message)
        } else {
            format!(
                "[{}] [{}] [{}] {} - {}",
                timestamp, level_str, record.logger_name, thread, record.message
            )
        }
    }
}

impl Default for ConsoleAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for ConsoleAppender {
    fn append(&mut self, record: &LogRecord) -> Result<()> {
        let output = self.format_line(record);

        if record.level.is_severe() {
            eprintln!("{}", output);
        } else {
            println!("{}", output);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        use std::io::Write;
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
