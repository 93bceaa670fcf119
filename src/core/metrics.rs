//! Writer metrics for observability
//!
//! Counters updated by producers and by the writer thread. The queue keeps
//! its own overrun counter; these cover everything around it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for writer observability
///
/// # Example
///
/// ```
/// use async_log_writer::WriterMetrics;
///
/// let metrics = WriterMetrics::new();
///
/// metrics.record_dropped();
/// metrics.record_delivered();
///
/// assert_eq!(metrics.dropped_count(), 1);
/// assert_eq!(metrics.delivered_count(), 1);
/// ```
#[derive(Debug)]
pub struct WriterMetrics {
    /// Records handed to every appender without error
    delivered: AtomicU64,

    /// Records that could not be enqueued
    dropped: AtomicU64,

    /// Appender calls that returned an error or panicked
    sink_failures: AtomicU64,

    /// Flush requests processed by the writer thread
    flushes: AtomicU64,

    /// Posts that had to wait for a free slot
    block_events: AtomicU64,
}

impl WriterMetrics {
    pub const fn new() -> Self {
        Self {
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    /// Record a delivered record, returning the previous count
    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.delivered.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a dropped message, returning the previous count
    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_failure(&self) -> u64 {
        self.sink_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_flush(&self) -> u64 {
        self.flushes.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    /// Get drop rate as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if nothing has been delivered or dropped.
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped_count() as f64;
        let total = self.delivered_count() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }

    pub fn reset(&self) {
        self.delivered.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.sink_failures.store(0, Ordering::Relaxed);
        self.flushes.store(0, Ordering::Relaxed);
        self.block_events.store(0, Ordering::Relaxed);
    }
}

impl Default for WriterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for WriterMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            delivered: AtomicU64::new(self.delivered_count()),
            dropped: AtomicU64::new(self.dropped_count()),
            sink_failures: AtomicU64::new(self.sink_failures()),
            flushes: AtomicU64::new(self.flush_count()),
            block_events: AtomicU64::new(self.block_events()),
        }
    }
}
