//! File appender implementation

use crate::core::{Appender, LogRecord, LoggerError, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Appends one line per record to a file
///
/// Output is buffered; it reaches the file on `flush`, which the writer
/// thread calls for every flush request and once more when it stops.
pub struct FileAppender {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    timestamp_format: String,
}

impl FileAppender {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                LoggerError::io_operation(
                    "opening log file",
                    format!("cannot open '{}'", path.display()),
                    e,
                )
            })?;

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        })
    }

    /// Set a strftime-compatible timestamp format
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use async_log_writer::appenders::FileAppender;
    ///
    /// let appender = FileAppender::new("/var/log/app.log")
    ///     .unwrap()
    ///     .with_timestamp_format("%d/%b/%Y:%H:%M:%S %z");
    /// ```
    #[must_use]
    pub fn with_timestamp_format(mut self, format_str: &str) -> Self {
        self.timestamp_format = format_str.to_string();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Appender for FileAppender {
    fn append(&mut self, record: &LogRecord) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::appender("file", "writer not initialized"))?;

        let mut output = format!(
            "[{}] [{:5}] [{}] {}",
            record.timestamp.format(&self.timestamp_format),
            record.level,
            record.thread_name.as_ref().unwrap_or(&record.thread_id),
            record.message
        );

        if let (Some(file), Some(line)) = (&record.file, record.line) {
            output.push_str(&format!(" ({}:{})", file, line));
        }

        output.push('\n');

        writer.write_all(output.as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileAppender {
    fn drop(&mut self) {
        // Ensure all buffered data is flushed to disk
        let _ = self.flush();
    }
}
