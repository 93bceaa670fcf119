//! Stress tests for concurrent producers
//!
//! These tests verify:
//! - Every committed message is popped exactly once, in per-producer order
//! - The queue never reports more than its capacity
//! - Terminate is never lost, however loaded the queue is
//! - Delivered plus dropped always accounts for every post

use async_log_writer::appenders::MemoryAppender;
use async_log_writer::core::{
    AsyncLogWriter, LockFreeQueue, LogLevel, LogRecord, OverflowPolicy, WriterState,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const PRODUCERS: usize = 4;
const PER_PRODUCER: usize = 5_000;

/// Verify each producer's items arrived in the order it pushed them
fn assert_per_producer_order(items: &[(usize, usize)]) {
    let mut next = vec![0usize; PRODUCERS];
    for &(producer, seq) in items {
        assert_eq!(seq, next[producer], "producer {} out of order", producer);
        next[producer] += 1;
    }
    assert!(next.iter().all(|&n| n == PER_PRODUCER));
}

/// Push from `PRODUCERS` threads under `policy` while one thread pops,
/// returning everything popped in order
fn run_single_consumer(capacity: usize, policy: OverflowPolicy) -> Vec<(usize, usize)> {
    let queue = Arc::new(LockFreeQueue::new(capacity).unwrap());
    let total = PRODUCERS * PER_PRODUCER;

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut received = Vec::with_capacity(total);
            while received.len() < total {
                match queue.pop() {
                    Some(item) => received.push(item),
                    None => thread::yield_now(),
                }
            }
            received
        })
    };

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for seq in 0..PER_PRODUCER {
                    let result = queue.push((producer, seq), &policy);
                    assert!(result.is_enqueued(), "({}, {}) was {:?}", producer, seq, result);
                }
            })
        })
        .collect();

    for handle in producers {
        handle.join().unwrap();
    }
    let received = consumer.join().unwrap();

    assert_eq!(queue.pop(), None);
    assert_eq!(queue.overrun_counter(), 0);
    received
}

/// Push from `PRODUCERS` threads while two threads pop; every item must be
/// taken exactly once
fn run_two_readers(capacity: usize) {
    let queue = Arc::new(LockFreeQueue::new(capacity).unwrap());
    let total = PRODUCERS * PER_PRODUCER;
    let taken = Arc::new(AtomicUsize::new(0));

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let taken = Arc::clone(&taken);
            thread::spawn(move || {
                let mut mine = Vec::new();
                while taken.load(Ordering::SeqCst) < total {
                    if let Some(item) = queue.pop() {
                        taken.fetch_add(1, Ordering::SeqCst);
                        mine.push(item);
                    } else {
                        thread::yield_now();
                    }
                }
                mine
            })
        })
        .collect();

    thread::scope(|scope| {
        for producer in 0..PRODUCERS {
            let queue = &queue;
            scope.spawn(move || {
                for seq in 0..PER_PRODUCER {
                    let _ = queue.push((producer, seq), &OverflowPolicy::Block);
                }
            });
        }
    });

    let mut seen = HashSet::new();
    for reader in readers {
        let mine = reader.join().unwrap();
        // each reader pops in commit order, so per-producer order holds within it
        let mut last = vec![None; PRODUCERS];
        for &(producer, seq) in &mine {
            assert!(last[producer].map_or(true, |prev| prev < seq));
            last[producer] = Some(seq);
        }
        for item in mine {
            assert!(seen.insert(item), "item {:?} popped twice", item);
        }
    }
    assert_eq!(seen.len(), total);
}

#[test]
fn test_multi_producer_single_consumer_preserves_order() {
    let received = run_single_consumer(64, OverflowPolicy::Block);
    assert_eq!(received.len(), PRODUCERS * PER_PRODUCER);
    assert_per_producer_order(&received);
}

#[test]
fn test_smallest_capacities_preserve_order() {
    for capacity in [1, 2] {
        let received = run_single_consumer(capacity, OverflowPolicy::Block);
        assert_eq!(received.len(), PRODUCERS * PER_PRODUCER, "capacity {}", capacity);
        assert_per_producer_order(&received);
    }
}

#[test]
fn test_single_slot_timeout_push_never_stalls() {
    // with a live reader every bounded push must land well inside its timeout
    let policy = OverflowPolicy::BlockWithTimeout(Duration::from_secs(2));
    let received = run_single_consumer(1, policy);
    assert_per_producer_order(&received);
}

#[test]
fn test_multiple_readers_take_each_item_once() {
    run_two_readers(32);
}

#[test]
fn test_multiple_readers_at_smallest_capacities() {
    run_two_readers(1);
    run_two_readers(2);
}

#[test]
fn test_len_never_exceeds_capacity() {
    const CAPACITY: usize = 8;
    let queue = Arc::new(LockFreeQueue::new(CAPACITY).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let observer = {
        let queue = Arc::clone(&queue);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut max_seen = 0;
            while !done.load(Ordering::SeqCst) {
                max_seen = max_seen.max(queue.len());
            }
            max_seen
        })
    };

    thread::scope(|scope| {
        for _ in 0..PRODUCERS {
            scope.spawn(|| {
                for i in 0..PER_PRODUCER {
                    let _ = queue.push(i, &OverflowPolicy::DropNewest);
                }
            });
        }
        scope.spawn(|| {
            for _ in 0..PER_PRODUCER {
                let _ = queue.pop();
            }
        });
    });

    done.store(true, Ordering::SeqCst);
    let max_seen = observer.join().unwrap();
    assert!(max_seen <= CAPACITY, "observed {} queued items", max_seen);

    let mut remaining = 0;
    while queue.pop().is_some() {
        remaining += 1;
    }
    assert!(remaining <= CAPACITY);
}

#[test]
fn test_terminate_under_load_delivers_everything() {
    let sink = MemoryAppender::new();
    let writer = AsyncLogWriter::builder()
        .capacity(8)
        .appender(sink.clone())
        .build()
        .unwrap();

    thread::scope(|scope| {
        for producer in 0..PRODUCERS {
            let writer = &writer;
            scope.spawn(move || {
                for seq in 0..PER_PRODUCER {
                    let record = LogRecord::new(LogLevel::Info, format!("{}:{}", producer, seq));
                    assert!(writer.post_log(record, OverflowPolicy::Block).is_enqueued());
                }
            });
        }
    });
    drop(writer);

    let items: Vec<(usize, usize)> = sink
        .messages()
        .iter()
        .map(|m| {
            let (p, s) = m.split_once(':').unwrap();
            (p.parse().unwrap(), s.parse().unwrap())
        })
        .collect();
    assert_eq!(items.len(), PRODUCERS * PER_PRODUCER);
    assert_per_producer_order(&items);
}

#[test]
fn test_drop_policy_accounts_for_every_post() {
    let sink = MemoryAppender::new();
    let mut writer = AsyncLogWriter::builder()
        .capacity(4)
        .appender(sink.clone())
        .build()
        .unwrap();

    thread::scope(|scope| {
        for producer in 0..PRODUCERS {
            let writer = &writer;
            scope.spawn(move || {
                for seq in 0..PER_PRODUCER {
                    let record = LogRecord::new(LogLevel::Debug, format!("{}:{}", producer, seq));
                    let _ = writer.post_log(record, OverflowPolicy::DropNewest);
                }
            });
        }
    });

    assert!(writer.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));
    assert_eq!(writer.state(), WriterState::Stopped);

    let delivered = sink.len() as u64;
    assert_eq!(delivered + writer.overrun_counter(), (PRODUCERS * PER_PRODUCER) as u64);
    assert_eq!(writer.metrics().dropped_count(), writer.overrun_counter());
    assert_eq!(writer.metrics().delivered_count(), delivered);
}

#[test]
fn test_repeated_create_and_destroy() {
    for round in 0..100 {
        let sink = MemoryAppender::new();
        let writer = AsyncLogWriter::builder()
            .capacity(2)
            .appender(sink.clone())
            .build()
            .unwrap();
        let _ = writer.post_log(
            LogRecord::new(LogLevel::Info, round.to_string()),
            OverflowPolicy::Block,
        );
        drop(writer);
        assert_eq!(sink.messages(), vec![round.to_string()]);
    }
}
