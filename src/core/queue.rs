//! Bounded multi-producer lock-free queue
//!
//! Writers publish in three steps:
//!
//! 1. claim index `i` by advancing `write_claim`, after checking that
//!    `write_claim - read_claim < capacity`
//! 2. wait for the slot of `i` to be vacated by the previous lap's
//!    reader, then store the message
//! 3. advance `write_commit` from `i` to `i + 1`, retrying until every lower
//!    index has committed
//!
//! Readers only claim indices below `write_commit`, so a message is never
//! observed before it is fully stored, and messages come out in commit
//! order. A writer stalled in step 2 holds back the commits of the writers
//! behind it; `write_commit` never lags `write_claim` by more than the
//! number of pushes in flight.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::{Backoff, CachePadded};

use super::error::Result;
use super::overflow_policy::{OverflowPolicy, PushResult};
use super::ring::RingBuffer;

pub struct LockFreeQueue<T> {
    ring: RingBuffer<T>,
    /// Bound on queued messages; the ring may have more slots than this
    capacity: u64,
    /// Next index handed to a writer
    write_claim: CachePadded<AtomicU64>,
    /// Every index below this one holds a fully stored message
    write_commit: CachePadded<AtomicU64>,
    /// Next index handed to a reader
    read_claim: CachePadded<AtomicU64>,
    /// Messages discarded because the queue was full
    overruns: CachePadded<AtomicU64>,
}

impl<T> LockFreeQueue<T> {
    /// Create a queue holding at most `capacity` messages.
    ///
    /// Fails with `InvalidConfiguration` when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        let ring = RingBuffer::new(capacity)?;
        Ok(Self {
            capacity: capacity as u64,
            ring,
            write_claim: CachePadded::new(AtomicU64::new(0)),
            write_commit: CachePadded::new(AtomicU64::new(0)),
            read_claim: CachePadded::new(AtomicU64::new(0)),
            overruns: CachePadded::new(AtomicU64::new(0)),
        })
    }

    /// Push `item` according to `policy`.
    ///
    /// Under `Block` this only returns once the item is stored. The
    /// dropping policies discard `item` itself when the queue is full; queued
    /// messages are never overwritten.
    pub fn push(&self, item: T, policy: &OverflowPolicy) -> PushResult {
        match policy {
            OverflowPolicy::Block => self.push_waiting(item, None),
            OverflowPolicy::BlockWithTimeout(timeout) => self.push_waiting(item, Some(*timeout)),
            OverflowPolicy::DropNewest | OverflowPolicy::AlertAndDrop => {
                match self.try_push(item) {
                    Ok(()) => PushResult::Enqueued,
                    Err(_dropped) => {
                        self.overruns.fetch_add(1, Ordering::Relaxed);
                        PushResult::Dropped
                    }
                }
            }
        }
    }

    /// Single non-blocking attempt. Hands `item` back when the queue is full
    /// without counting an overrun.
    pub fn try_push(&self, item: T) -> std::result::Result<(), T> {
        match self.try_claim() {
            Some(index) => {
                self.publish(index, item);
                Ok(())
            }
            None => Err(item),
        }
    }

    fn push_waiting(&self, item: T, timeout: Option<Duration>) -> PushResult {
        if let Some(index) = self.try_claim() {
            self.publish(index, item);
            return PushResult::Enqueued;
        }

        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let backoff = Backoff::new();
        loop {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                self.overruns.fetch_add(1, Ordering::Relaxed);
                return PushResult::Dropped;
            }

            backoff.snooze();

            if let Some(index) = self.try_claim() {
                self.publish(index, item);
                return PushResult::EnqueuedAfterWait;
            }
        }
    }

    /// Reserve the next write index, or `None` if the queue is full.
    fn try_claim(&self) -> Option<u64> {
        let backoff = Backoff::new();
        loop {
            // read_claim first: write_claim loaded afterwards can only be larger
            let read = self.read_claim.load(Ordering::Acquire);
            let claim = self.write_claim.load(Ordering::Relaxed);

            if claim.wrapping_sub(read) >= self.capacity {
                if self.read_claim.load(Ordering::Acquire) == read {
                    return None;
                }
                continue;
            }

            if self
                .write_claim
                .compare_exchange_weak(claim, claim + 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return Some(claim);
            }
            backoff.spin();
        }
    }

    fn publish(&self, index: u64, item: T) {
        let slot = self.ring.slot(index);

        let backoff = Backoff::new();
        while !slot.is_free_for(index) {
            backoff.snooze();
        }
        // SAFETY: we own the claim for `index` and its slot has been vacated.
        unsafe { slot.put(index, item) };

        let backoff = Backoff::new();
        while self
            .write_commit
            .compare_exchange_weak(index, index + 1, Ordering::Release, Ordering::Relaxed)
            .is_err()
        {
            backoff.snooze();
        }
    }

    /// Take the oldest committed message, or `None` right away if there is none.
    pub fn pop(&self) -> Option<T> {
        let backoff = Backoff::new();
        loop {
            let read = self.read_claim.load(Ordering::Relaxed);
            let committed = self.write_commit.load(Ordering::Acquire);
            if read >= committed {
                return None;
            }

            if self
                .read_claim
                .compare_exchange_weak(read, read + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                let slot = self.ring.slot(read);
                while !slot.is_filled_for(read) {
                    backoff.snooze();
                }
                // SAFETY: we own the read claim for `read` and it is committed.
                return unsafe { slot.take(read, self.ring.slot_count()) };
            }
            backoff.spin();
        }
    }

    /// Number of committed messages not yet claimed by a reader.
    ///
    /// Writes still in flight are not counted. The value may be stale by the
    /// time it is used.
    pub fn len(&self) -> usize {
        let read = self.read_claim.load(Ordering::Acquire);
        let committed = self.write_commit.load(Ordering::Acquire);
        committed.saturating_sub(read).min(self.capacity) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Messages dropped because the queue was full
    pub fn overrun_counter(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub fn reset_overrun_counter(&self) {
        self.overruns.store(0, Ordering::Relaxed);
    }
}

impl<T> fmt::Debug for LockFreeQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeQueue")
            .field("capacity", &self.capacity)
            .field("write_claim", &self.write_claim.load(Ordering::Relaxed))
            .field("write_commit", &self.write_commit.load(Ordering::Relaxed))
            .field("read_claim", &self.read_claim.load(Ordering::Relaxed))
            .field("overruns", &self.overrun_counter())
            .finish()
    }
}
