//! Background writer thread draining the lock-free queue
//!
//! Producers post envelopes from any thread; exactly one worker thread pops
//! them and drives the appenders. Shutdown travels through the same queue as
//! a `Terminate` envelope, so everything posted before it is delivered first.

use super::{
    appender::Appender,
    config::WriterConfig,
    envelope::Envelope,
    error::{LoggerError, Result},
    log_record::LogRecord,
    metrics::WriterMetrics,
    overflow_policy::{OverflowCallback, OverflowPolicy, PushResult},
    queue::LockFreeQueue,
};
use crossbeam_utils::Backoff;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{self, AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default shutdown timeout used by callers that do not need a custom one
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Hook run once on the writer thread before it starts consuming
pub type StartupHook = Box<dyn FnOnce() + Send + 'static>;

/// Lifecycle of the writer thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WriterState {
    /// Accepting and delivering messages
    Running = 0,
    /// Terminate has been posted; earlier messages are still being delivered
    Draining = 1,
    /// The worker loop has exited
    Stopped = 2,
}

impl WriterState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WriterState::Running,
            1 => WriterState::Draining,
            _ => WriterState::Stopped,
        }
    }
}

struct Shared {
    queue: LockFreeQueue<Envelope>,
    state: AtomicU8,
    /// Set while the worker is about to park on an empty queue
    idle: AtomicBool,
    metrics: WriterMetrics,
}

impl Shared {
    fn state(&self) -> WriterState {
        WriterState::from_u8(self.state.load(Ordering::Acquire))
    }
}

/// Asynchronous log writer backed by a bounded lock-free queue
///
/// # Example
///
/// ```
/// use async_log_writer::prelude::*;
///
/// let sink = MemoryAppender::new();
/// let writer = AsyncLogWriter::builder()
///     .capacity(1024)
///     .appender(sink.clone())
///     .build()
///     .unwrap();
///
/// let _ = writer.post_log(&LogMsg::new(LogLevel::Info, "app", "started"), OverflowPolicy::Block);
/// drop(writer);
///
/// assert_eq!(sink.messages(), vec!["started".to_string()]);
/// ```
pub struct AsyncLogWriter {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    on_overflow: Option<OverflowCallback>,
    /// Draining was entered but `Terminate` has not been queued yet
    terminate_pending: bool,
}

impl AsyncLogWriter {
    /// Writer with default settings and no appenders
    pub fn new(capacity: usize) -> Result<Self> {
        Self::builder().capacity(capacity).build()
    }

    pub fn from_config(config: WriterConfig, appenders: Vec<Box<dyn Appender>>) -> Result<Self> {
        Self::spawn(config, appenders, None, None)
    }

    #[must_use]
    pub fn builder() -> AsyncLogWriterBuilder {
        AsyncLogWriterBuilder::new()
    }

    fn spawn(
        config: WriterConfig,
        appenders: Vec<Box<dyn Appender>>,
        on_thread_start: Option<StartupHook>,
        on_overflow: Option<OverflowCallback>,
    ) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            queue: LockFreeQueue::new(config.capacity)?,
            state: AtomicU8::new(WriterState::Running as u8),
            idle: AtomicBool::new(false),
            metrics: WriterMetrics::new(),
        });

        let worker = Worker {
            shared: Arc::clone(&shared),
            appenders,
            idle_wait: config.idle_wait(),
        };

        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || worker.run(on_thread_start))
            .map_err(|e| LoggerError::thread_spawn(config.thread_name, e))?;

        Ok(Self {
            shared,
            worker: Some(handle),
            on_overflow,
            terminate_pending: false,
        })
    }

    /// Enqueue a log record.
    ///
    /// Accepts a borrowed [`LogMsg`](super::LogMsg), which is deep-copied
    /// before it is queued, or an owned [`LogRecord`].
    pub fn post_log(&self, record: impl Into<LogRecord>, policy: OverflowPolicy) -> PushResult {
        self.post(Envelope::Log(record.into()), policy)
    }

    /// Ask the writer thread to flush every appender.
    pub fn post_flush(&self, policy: OverflowPolicy) -> PushResult {
        self.post(Envelope::Flush, policy)
    }

    fn post(&self, envelope: Envelope, policy: OverflowPolicy) -> PushResult {
        if self.shared.state() != WriterState::Running {
            return PushResult::Closed;
        }

        let result = self.shared.queue.push(envelope, &policy);
        match result {
            PushResult::Enqueued => self.wake_worker(),
            PushResult::EnqueuedAfterWait => {
                self.shared.metrics.record_block();
                self.wake_worker();
            }
            PushResult::Dropped => self.handle_drop(policy),
            PushResult::Closed => {}
        }
        result
    }

    fn handle_drop(&self, policy: OverflowPolicy) {
        let dropped_count = self.shared.metrics.record_dropped();
        if policy != OverflowPolicy::AlertAndDrop {
            return;
        }

        // Alert on first drop and periodically thereafter
        if dropped_count == 0 || (dropped_count + 1) % 1000 == 0 {
            eprintln!(
                "[LOGGER WARNING] Queue full, {} messages dropped. \
                 Consider increasing capacity or posting with OverflowPolicy::Block.",
                dropped_count + 1
            );

            if let Some(ref callback) = self.on_overflow {
                callback(dropped_count + 1);
            }
        }
    }

    fn wake_worker(&self) {
        // Pairs with the fence in Worker::next_envelope
        atomic::fence(Ordering::SeqCst);
        if self.shared.idle.load(Ordering::Relaxed) {
            self.unpark_worker();
        }
    }

    fn unpark_worker(&self) {
        if let Some(ref handle) = self.worker {
            handle.thread().unpark();
        }
    }

    /// Messages dropped because the queue was full
    pub fn overrun_counter(&self) -> u64 {
        self.shared.queue.overrun_counter()
    }

    pub fn reset_overrun_counter(&self) {
        self.shared.queue.reset_overrun_counter();
    }

    /// Committed messages waiting for the writer thread
    pub fn queue_size(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    pub fn state(&self) -> WriterState {
        self.shared.state()
    }

    pub fn metrics(&self) -> &WriterMetrics {
        &self.shared.metrics
    }

    /// Queue `Terminate` once. It is never dropped.
    ///
    /// With a deadline, gives up when the queue stays full past it and
    /// returns `false`; the next call retries. Without one, blocks until
    /// there is room.
    fn request_terminate(&mut self, deadline: Option<Instant>) -> bool {
        if self
            .shared
            .state
            .compare_exchange(
                WriterState::Running as u8,
                WriterState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.terminate_pending = true;
        }
        if !self.terminate_pending {
            return true;
        }

        let queued = match deadline {
            None => self
                .shared
                .queue
                .push(Envelope::Terminate, &OverflowPolicy::Block)
                .is_enqueued(),
            Some(deadline) => self.push_terminate_until(deadline),
        };
        if queued {
            self.terminate_pending = false;
            self.unpark_worker();
        }
        queued
    }

    fn push_terminate_until(&self, deadline: Instant) -> bool {
        let backoff = Backoff::new();
        loop {
            if self.shared.queue.try_push(Envelope::Terminate).is_ok() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            // the worker may be parked with a full queue
            self.unpark_worker();
            backoff.snooze();
        }
    }

    /// Terminate the writer thread, waiting at most `timeout` for it to drain.
    ///
    /// Returns `true` once the thread has been joined. On timeout the thread
    /// keeps draining and is joined when the writer is dropped. If the queue
    /// was too full to take `Terminate` in time, the drop queues it.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use async_log_writer::{AsyncLogWriter, DEFAULT_SHUTDOWN_TIMEOUT};
    ///
    /// let mut writer = AsyncLogWriter::new(1024).unwrap();
    /// if !writer.shutdown(DEFAULT_SHUTDOWN_TIMEOUT) {
    ///     eprintln!("Warning: writer shutdown timed out");
    /// }
    /// ```
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        if !self.request_terminate(Some(deadline)) {
            eprintln!(
                "[LOGGER WARNING] Writer queue stayed full for {:?}; \
                 termination is deferred until the writer is dropped.",
                timeout
            );
            return false;
        }

        let Some(handle) = self.worker.take() else {
            return true;
        };

        loop {
            if handle.is_finished() {
                return Self::join_worker(handle);
            }

            if Instant::now() >= deadline {
                eprintln!(
                    "[LOGGER WARNING] Writer thread did not finish within {:?}; \
                     it will be joined when the writer is dropped.",
                    timeout
                );
                self.worker = Some(handle);
                return false;
            }

            thread::sleep(Duration::from_millis(10));
        }
    }

    fn join_worker(handle: JoinHandle<()>) -> bool {
        match handle.join() {
            Ok(()) => true,
            Err(panic) => {
                eprintln!(
                    "[LOGGER ERROR] Writer thread panicked during shutdown: {}",
                    panic_message(panic.as_ref())
                );
                false
            }
        }
    }
}

impl Drop for AsyncLogWriter {
    fn drop(&mut self) {
        self.request_terminate(None);

        if let Some(handle) = self.worker.take() {
            Self::join_worker(handle);
        }

        let dropped = self.shared.metrics.dropped_count();
        if dropped > 0 {
            eprintln!(
                "[LOGGER WARNING] Writer shutting down with {} dropped messages (drop rate: {:.2}%)",
                dropped,
                self.shared.metrics.drop_rate()
            );
        }
    }
}

impl fmt::Debug for AsyncLogWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncLogWriter")
            .field("state", &self.state())
            .field("queue", &self.shared.queue)
            .field("metrics", &self.shared.metrics)
            .finish()
    }
}

struct Worker {
    shared: Arc<Shared>,
    appenders: Vec<Box<dyn Appender>>,
    idle_wait: Duration,
}

impl Worker {
    fn run(mut self, on_thread_start: Option<StartupHook>) {
        if let Some(hook) = on_thread_start {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(hook)) {
                eprintln!(
                    "[LOGGER CRITICAL] Writer startup hook panicked: {}. Continuing without it.",
                    panic_message(panic.as_ref())
                );
            }
        }

        while self.process_next_msg() {}

        // Final flush so buffered appenders do not lose the drained records
        self.flush_appenders();
        self.shared
            .state
            .store(WriterState::Stopped as u8, Ordering::Release);
    }

    /// Returns `false` once `Terminate` has been received.
    fn process_next_msg(&mut self) -> bool {
        match self.next_envelope() {
            Envelope::Log(record) => {
                self.deliver(&record);
                true
            }
            Envelope::Flush => {
                self.flush_appenders();
                self.shared.metrics.record_flush();
                true
            }
            Envelope::Terminate => false,
        }
    }

    /// Pop, spinning and then parking while the queue is empty.
    fn next_envelope(&self) -> Envelope {
        let backoff = Backoff::new();
        loop {
            if let Some(envelope) = self.shared.queue.pop() {
                return envelope;
            }

            if !backoff.is_completed() {
                backoff.snooze();
                continue;
            }

            self.shared.idle.store(true, Ordering::Relaxed);
            // Pairs with the fence in AsyncLogWriter::wake_worker
            atomic::fence(Ordering::SeqCst);
            if self.shared.queue.is_empty() {
                thread::park_timeout(self.idle_wait);
            }
            self.shared.idle.store(false, Ordering::Relaxed);
            backoff.reset();
        }
    }

    /// Per-appender panic isolation: one failing appender does not keep the
    /// record from the others.
    fn deliver(&mut self, record: &LogRecord) {
        let mut has_error = false;

        for (idx, appender) in self.appenders.iter_mut().enumerate() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| appender.append(record)));

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    eprintln!(
                        "[LOGGER ERROR] Appender #{} ({}) failed: {}",
                        idx,
                        appender_name(&**appender),
                        e
                    );
                    has_error = true;
                    self.shared.metrics.record_sink_failure();
                }
                Err(panic) => {
                    eprintln!(
                        "[LOGGER CRITICAL] Appender #{} ({}) panicked: {}. \
                         Other appenders continue to function.",
                        idx,
                        appender_name(&**appender),
                        panic_message(panic.as_ref())
                    );
                    has_error = true;
                    self.shared.metrics.record_sink_failure();
                }
            }
        }

        if !has_error {
            self.shared.metrics.record_delivered();
        }
    }

    fn flush_appenders(&mut self) {
        for (idx, appender) in self.appenders.iter_mut().enumerate() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| appender.flush()));

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    eprintln!("[LOGGER ERROR] Appender #{} flush failed: {}", idx, e);
                    self.shared.metrics.record_sink_failure();
                }
                Err(panic) => {
                    eprintln!(
                        "[LOGGER CRITICAL] Appender #{} panicked during flush: {}. \
                         Other appenders continue to function.",
                        idx,
                        panic_message(panic.as_ref())
                    );
                    self.shared.metrics.record_sink_failure();
                }
            }
        }
    }
}

/// `name()` is user code too; a panic there must not take the worker down.
fn appender_name(appender: &dyn Appender) -> String {
    panic::catch_unwind(AssertUnwindSafe(|| appender.name().to_string()))
        .unwrap_or_else(|_| "<unnamed>".to_string())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Builder for [`AsyncLogWriter`]
///
/// # Example
/// ```
/// use async_log_writer::prelude::*;
/// use std::sync::Arc;
///
/// let writer = AsyncLogWriter::builder()
///     .capacity(4096)
///     .thread_name("app-log-writer")
///     .appender(MemoryAppender::new())
///     .on_thread_start(|| eprintln!("log writer started"))
///     .on_overflow(Arc::new(|count| eprintln!("ALERT: {} messages dropped", count)))
///     .build()
///     .unwrap();
/// ```
pub struct AsyncLogWriterBuilder {
    config: WriterConfig,
    appenders: Vec<Box<dyn Appender>>,
    on_thread_start: Option<StartupHook>,
    on_overflow: Option<OverflowCallback>,
}

impl AsyncLogWriterBuilder {
    pub fn new() -> Self {
        Self {
            config: WriterConfig::default(),
            appenders: Vec::new(),
            on_thread_start: None,
            on_overflow: None,
        }
    }

    /// Replace every queue and thread setting at once
    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: WriterConfig) -> Self {
        self.config = config;
        self
    }

    /// Maximum number of queued messages. Must be greater than zero.
    #[must_use = "builder methods return a new value"]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Upper bound on how long an idle writer sleeps between polls.
    /// Rounded down to whole milliseconds, minimum one.
    #[must_use = "builder methods return a new value"]
    pub fn idle_wait(mut self, wait: Duration) -> Self {
        self.config.idle_wait_ms = (wait.as_millis() as u64).max(1);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn appender<A: Appender + 'static>(mut self, appender: A) -> Self {
        self.appenders.push(Box::new(appender));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn boxed_appender(mut self, appender: Box<dyn Appender>) -> Self {
        self.appenders.push(appender);
        self
    }

    /// Run `hook` on the writer thread before it consumes anything
    #[must_use = "builder methods return a new value"]
    pub fn on_thread_start<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_thread_start = Some(Box::new(hook));
        self
    }

    /// Callback for `AlertAndDrop` overflow alerts
    ///
    /// Receives the total number of dropped messages so far.
    #[must_use = "builder methods return a new value"]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    /// Validate the configuration and start the writer thread
    pub fn build(self) -> Result<AsyncLogWriter> {
        AsyncLogWriter::spawn(
            self.config,
            self.appenders,
            self.on_thread_start,
            self.on_overflow,
        )
    }
}

impl Default for AsyncLogWriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
