//! Fixed-capacity slot storage backing [`LockFreeQueue`](super::queue::LockFreeQueue)
//!
//! The store does no coordination of its own. Each slot carries a stamp
//! telling which logical index it is ready for, and the queue decides when
//! it is allowed to touch a slot.
//!
//! # Slot stamps
//!
//! For a ring of `N` slots, slot `k` starts with stamp `k`. For logical
//! index `i` mapping to that slot:
//!
//! - stamp `i`: empty, may be written for `i`
//! - stamp `i + 1`: holds the message written for `i`
//! - stamp `i + N`: emptied by the reader of `i`, free for index `i + N`
//!
//! "filled for `i`" and "free for `i + N`" must differ, so the ring always
//! has at least two slots. A queue bounded at one message still only ever
//! uses one of them at a time.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

use super::error::{LoggerError, Result};

pub(crate) struct Slot<T> {
    stamp: AtomicU64,
    value: UnsafeCell<Option<T>>,
}

impl<T> Slot<T> {
    fn new(stamp: u64) -> Self {
        Self {
            stamp: AtomicU64::new(stamp),
            value: UnsafeCell::new(None),
        }
    }

    /// The reader of the previous lap has moved its value out.
    #[inline]
    pub(crate) fn is_free_for(&self, index: u64) -> bool {
        self.stamp.load(Ordering::Acquire) == index
    }

    /// The writer of `index` has finished storing.
    #[inline]
    pub(crate) fn is_filled_for(&self, index: u64) -> bool {
        self.stamp.load(Ordering::Acquire) == index.wrapping_add(1)
    }

    /// Store the message claimed for `index`.
    ///
    /// # Safety
    ///
    /// The caller must hold the write claim for `index` and have observed
    /// `is_free_for(index)`.
    #[inline]
    pub(crate) unsafe fn put(&self, index: u64, value: T) {
        *self.value.get() = Some(value);
        self.stamp.store(index.wrapping_add(1), Ordering::Release);
    }

    /// Move the message for `index` out and free the slot for the next lap.
    ///
    /// # Safety
    ///
    /// The caller must hold the read claim for `index` and have observed
    /// `is_filled_for(index)`.
    #[inline]
    pub(crate) unsafe fn take(&self, index: u64, capacity: u64) -> Option<T> {
        let value = (*self.value.get()).take();
        self.stamp.store(index.wrapping_add(capacity), Ordering::Release);
        value
    }
}

/// Fewest slots for which the stamps above stay distinct
const MIN_SLOTS: usize = 2;

pub(crate) struct RingBuffer<T> {
    slots: Box<[Slot<T>]>,
}

// SAFETY: a slot's value is only accessed by the single thread holding the
// claim for its current index, and stamps hand it over with release/acquire.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    pub(crate) fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(LoggerError::config(
                "RingBuffer",
                "capacity must be greater than zero",
            ));
        }

        let slot_count = capacity.max(MIN_SLOTS) as u64;
        let slots = (0..slot_count).map(Slot::new).collect::<Vec<_>>();
        Ok(Self {
            slots: slots.into_boxed_slice(),
        })
    }

    /// Physical slots; may exceed the capacity requested in `new`
    #[inline]
    pub(crate) fn slot_count(&self) -> u64 {
        self.slots.len() as u64
    }

    /// Physical slot for a logical index
    #[inline]
    pub(crate) fn slot(&self, index: u64) -> &Slot<T> {
        &self.slots[(index % self.slot_count()) as usize]
    }
}
