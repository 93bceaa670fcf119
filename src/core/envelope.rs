//! Messages carried from producers to the writer thread

use super::log_record::{LogMsg, LogRecord};
use std::fmt;

/// A queued unit of work for the writer thread.
///
/// Envelopes are moved into the queue and moved back out; they are never
/// shared between threads.
#[derive(Debug)]
pub enum Envelope {
    /// Deliver a record to every appender
    Log(LogRecord),
    /// Flush every appender
    Flush,
    /// Stop the writer loop
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Log,
    Flush,
    Terminate,
}

impl Envelope {
    /// Build a log envelope, copying everything `msg` borrows.
    pub fn log(msg: &LogMsg<'_>) -> Self {
        Envelope::Log(LogRecord::from(msg))
    }

    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::Log(_) => EnvelopeKind::Log,
            Envelope::Flush => EnvelopeKind::Flush,
            Envelope::Terminate => EnvelopeKind::Terminate,
        }
    }

    pub fn is_terminate(&self) -> bool {
        matches!(self, Envelope::Terminate)
    }
}

impl From<LogRecord> for Envelope {
    fn from(record: LogRecord) -> Self {
        Envelope::Log(record)
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeKind::Log => write!(f, "log"),
            EnvelopeKind::Flush => write!(f, "flush"),
            EnvelopeKind::Terminate => write!(f, "terminate"),
        }
    }
}
