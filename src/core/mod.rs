//! Core queue, envelope and writer types

pub mod appender;
pub mod config;
pub mod envelope;
pub mod error;
pub mod log_level;
pub mod log_record;
pub mod metrics;
pub mod overflow_policy;
pub mod queue;
mod ring;
pub mod writer;

pub use appender::Appender;
pub use config::WriterConfig;
pub use envelope::{Envelope, EnvelopeKind};
pub use error::{LoggerError, Result};
pub use log_level::LogLevel;
pub use log_record::{LogMsg, LogRecord, SourceLocation};
pub use metrics::WriterMetrics;
pub use overflow_policy::{OverflowCallback, OverflowPolicy, PushResult};
pub use queue::LockFreeQueue;
pub use writer::{
    AsyncLogWriter, AsyncLogWriterBuilder, StartupHook, WriterState, DEFAULT_SHUTDOWN_TIMEOUT,
};
