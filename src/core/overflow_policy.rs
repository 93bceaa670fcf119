//! Overflow policies for the bounded log queue
//!
//! When the queue is full, the policy passed with each post decides whether
//! the producer waits for the writer thread or the new message is dropped.
//! Dropping always discards the newest message; the oldest queued entry is
//! never overwritten, so the committed order seen by the writer is never
//! disturbed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Policy for handling a full queue
///
/// # Example
///
/// ```
/// use async_log_writer::OverflowPolicy;
/// use std::time::Duration;
///
/// // Default behavior: alert and drop
/// let policy = OverflowPolicy::default();
///
/// // Block with timeout
/// let policy = OverflowPolicy::BlockWithTimeout(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Wait until the writer frees a slot. Never drops.
    ///
    /// Producers see added latency instead of data loss.
    Block,

    /// Wait for a free slot, then drop the new message if the timeout expires.
    BlockWithTimeout(Duration),

    /// Drop the new message and count it in the overrun counter.
    DropNewest,

    /// Like `DropNewest`, but the writer also alerts via stderr and the
    /// overflow callback.
    AlertAndDrop,
}

impl OverflowPolicy {
    /// Whether this policy may ever discard a message
    pub fn may_drop(&self) -> bool {
        !matches!(self, OverflowPolicy::Block)
    }
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::AlertAndDrop
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Block => write!(f, "Block"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
            OverflowPolicy::AlertAndDrop => write!(f, "AlertAndDrop"),
        }
    }
}

/// Outcome of a push or post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum PushResult {
    /// Stored on the first attempt
    Enqueued,
    /// Stored after waiting for the consumer to free a slot
    EnqueuedAfterWait,
    /// The queue was full and the message was discarded
    Dropped,
    /// The writer is shutting down and no longer accepts messages
    Closed,
}

impl PushResult {
    pub fn is_enqueued(&self) -> bool {
        matches!(self, PushResult::Enqueued | PushResult::EnqueuedAfterWait)
    }
}

/// Callback type for overflow notifications
///
/// Called when messages are dropped under `AlertAndDrop`.
/// The parameter is the total count of dropped messages so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_policy_default() {
        assert_eq!(OverflowPolicy::default(), OverflowPolicy::AlertAndDrop);
    }

    #[test]
    fn test_overflow_policy_display() {
        assert_eq!(OverflowPolicy::DropNewest.to_string(), "DropNewest");
        assert_eq!(OverflowPolicy::Block.to_string(), "Block");
        assert_eq!(
            OverflowPolicy::BlockWithTimeout(Duration::from_millis(100)).to_string(),
            "BlockWithTimeout(100ms)"
        );
        assert_eq!(OverflowPolicy::AlertAndDrop.to_string(), "AlertAndDrop");
    }

    #[test]
    fn test_only_block_never_drops() {
        assert!(!OverflowPolicy::Block.may_drop());
        assert!(OverflowPolicy::DropNewest.may_drop());
        assert!(OverflowPolicy::AlertAndDrop.may_drop());
        assert!(OverflowPolicy::BlockWithTimeout(Duration::from_secs(1)).may_drop());
    }

    #[test]
    fn test_push_result_is_enqueued() {
        assert!(PushResult::Enqueued.is_enqueued());
        assert!(PushResult::EnqueuedAfterWait.is_enqueued());
        assert!(!PushResult::Dropped.is_enqueued());
        assert!(!PushResult::Closed.is_enqueued());
    }

    #[test]
    fn test_policy_serde() {
        let json = serde_json::to_string(&OverflowPolicy::DropNewest).unwrap();
        assert_eq!(json, "\"DropNewest\"");
        let parsed: OverflowPolicy = serde_json::from_str("\"Block\"").unwrap();
        assert_eq!(parsed, OverflowPolicy::Block);
    }
}
