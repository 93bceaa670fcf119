//! Basic async writer usage example
//!
//! Demonstrates posting records from several threads, overflow policies,
//! flush requests and a bounded shutdown.
//!
//! Run with: cargo run --example basic_usage

use async_log_writer::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Async Log Writer - Basic Usage Example ===\n");

    let mut writer = AsyncLogWriter::builder()
        .capacity(64)
        .thread_name("demo-writer")
        .appender(ConsoleAppender::new())
        .appender(FileAppender::new("async_demo.log")?)
        .on_thread_start(|| println!("   writer thread started"))
        .on_overflow(Arc::new(|dropped| println!("   queue full, {} dropped so far", dropped)))
        .build()?;

    println!("1. Logging at different levels:");
    for level in LogLevel::ALL {
        let text = format!("This is a {} message", level);
        let msg = LogMsg::new(level, "demo", &text).with_location(async_log_writer::source_location!());
        let _ = writer.post_log(&msg, OverflowPolicy::Block);
    }

    println!("\n2. Multi-threaded logging:");
    thread::scope(|scope| {
        for thread_id in 0..4 {
            let writer = &writer;
            scope.spawn(move || {
                for i in 0..10 {
                    let text = format!("Thread {} - Message {}", thread_id, i);
                    let _ = writer.post_log(
                        &LogMsg::new(LogLevel::Info, "worker", &text),
                        OverflowPolicy::BlockWithTimeout(Duration::from_millis(50)),
                    );
                }
            });
        }
    });

    println!("\n3. Dropping on overflow:");
    for i in 0..200 {
        let text = format!("burst {}", i);
        let _ = writer.post_log(&LogMsg::new(LogLevel::Debug, "burst", &text), OverflowPolicy::AlertAndDrop);
    }

    let _ = writer.post_flush(OverflowPolicy::Block);

    if !writer.shutdown(DEFAULT_SHUTDOWN_TIMEOUT) {
        eprintln!("writer did not stop in time");
    }

    let metrics = writer.metrics();
    println!("\n=== Example completed successfully! ===");
    println!(
        "delivered: {}, dropped: {}, sink failures: {}",
        metrics.delivered_count(),
        metrics.dropped_count(),
        metrics.sink_failures()
    );
    println!("Check 'async_demo.log' for file output");

    Ok(())
}
