//! In-memory capture appender
//!
//! Clones share the same buffer, so one handle can be given to the writer
//! while another is kept to inspect what was delivered.

use crate::core::{Appender, LogRecord, Result};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Captured {
    records: Vec<LogRecord>,
    flushes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAppender {
    captured: Arc<Mutex<Captured>>,
}

impl MemoryAppender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record delivered so far, in delivery order
    pub fn records(&self) -> Vec<LogRecord> {
        self.captured.lock().records.clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.captured
            .lock()
            .records
            .iter()
            .map(|record| record.message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.captured.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flush_count(&self) -> usize {
        self.captured.lock().flushes
    }

    pub fn clear(&self) {
        let mut captured = self.captured.lock();
        captured.records.clear();
        captured.flushes = 0;
    }
}

impl Appender for MemoryAppender {
    fn append(&mut self, record: &LogRecord) -> Result<()> {
        self.captured.lock().records.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.captured.lock().flushes += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
