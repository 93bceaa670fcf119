//! # Async Log Writer
//!
//! A bounded, lock-free queue and the background thread that drains it,
//! decoupling log-producing threads from slow output sinks.
//!
//! ## Features
//!
//! - **Lock-Free Queue**: Multiple producers publish through atomic claim and
//!   commit counters over a fixed ring; no mutex on the hot path
//! - **Ordered Delivery**: Records reach the appenders in commit order
//! - **Overflow Policies**: Block, block with timeout, or drop the newest
//!   message with an overrun counter
//! - **Graceful Shutdown**: Termination is queued behind pending work and the
//!   writer thread is always joined

pub mod appenders;
pub mod core;

pub mod prelude {
    #[cfg(feature = "console")]
    pub use crate::appenders::ConsoleAppender;
    pub use crate::appenders::{FileAppender, MemoryAppender};
    pub use crate::core::{
        Appender, AsyncLogWriter, AsyncLogWriterBuilder, Envelope, LockFreeQueue, LogLevel,
        LogMsg, LogRecord, LoggerError, OverflowCallback, OverflowPolicy, PushResult, Result,
        SourceLocation, WriterConfig, WriterMetrics, WriterState, DEFAULT_SHUTDOWN_TIMEOUT,
    };
}

#[cfg(feature = "console")]
pub use crate::appenders::ConsoleAppender;
pub use crate::appenders::{FileAppender, MemoryAppender};
pub use crate::core::{
    Appender, AsyncLogWriter, AsyncLogWriterBuilder, Envelope, EnvelopeKind, LockFreeQueue,
    LogLevel, LogMsg, LogRecord, LoggerError, OverflowCallback, OverflowPolicy, PushResult,
    Result, SourceLocation, StartupHook, WriterConfig, WriterMetrics, WriterState,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
