//! Appender trait for log output destinations
//!
//! Appenders are owned by the writer thread and only ever called from it.
//! Errors and panics raised here are contained by the writer; they never
//! stop delivery to the other appenders or of later records.

use super::{error::Result, log_record::LogRecord};

pub trait Appender: Send {
    fn append(&mut self, record: &LogRecord) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn name(&self) -> &str;
}
