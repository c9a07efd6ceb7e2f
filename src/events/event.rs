//! # Runtime events emitted by the pipeline and the supervisor.
//!
//! [`EventKind`] classifies events across three categories:
//! - **Message lifecycle**: published, consumed, operation outcomes,
//!   deadline extensions, acknowledgement
//! - **Fault reporting**: a tracked task panicked
//! - **Shutdown phases**: requested, drained, grace exceeded, stopped
//!
//! [`Event`] carries metadata (message name, operation, reason, retryable
//! classification, extension count) attached through builder methods.
//!
//! ## Ordering
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically; use it to restore order when events are observed through
//! buffered sinks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::error::Op;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Message lifecycle ===
    /// A message entered the work queue.
    ///
    /// Sets: `message`, `at`, `seq`.
    MessagePublished,

    /// A message was dequeued and handed to a handler.
    ///
    /// Sets: `message`, `at`, `seq`.
    MessageConsumed,

    /// A primary operation completed successfully.
    ///
    /// Sets: `message`, `op`, `at`, `seq`.
    OperationSucceeded,

    /// A primary operation failed; contained within the handler.
    ///
    /// Sets: `message`, `op`, `reason`, `retryable`, `at`, `seq`.
    OperationFailed,

    /// The acknowledgement deadline was extended for an in-flight message.
    ///
    /// Sets: `message`, `count` (total extensions so far), `at`, `seq`.
    DeadlineExtended,

    /// Terminal acknowledgement of a message.
    ///
    /// Sets: `message`, `at`, `seq`.
    MessageAcked,

    // === Fault reporting ===
    /// A tracked task panicked; the panic is reported as a process fault.
    ///
    /// Sets: `task`, `reason`, `at`, `seq`.
    TaskPanicked,

    // === Shutdown phases ===
    /// Shutdown requested (OS signal or fault).
    ///
    /// Sets: `reason` (signal name or fault description), `at`, `seq`.
    ShutdownRequested,

    /// All outstanding tasks unwound within the grace period.
    ///
    /// Sets: `at`, `seq`.
    AllStoppedWithin,

    /// Grace period exceeded; some tasks did not unwind in time.
    ///
    /// Sets: `at`, `seq`.
    GraceExceeded,

    /// External connections were released during shutdown.
    ///
    /// Sets: `at`, `seq`.
    ConnectionsClosed,

    /// The runtime reached its terminal state.
    ///
    /// Sets: `at`, `seq`.
    Stopped,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Instance name of the message, if applicable.
    pub message: Option<Arc<str>>,
    /// Name of the tracked task, for fault events.
    pub task: Option<Arc<str>>,
    /// Originating operation for operation outcomes.
    pub op: Option<Op>,
    /// Human-readable reason (errors, signal names).
    pub reason: Option<Arc<str>>,
    /// Whether a failed operation may be retried.
    pub retryable: Option<bool>,
    /// Deadline-extension total for heartbeat events.
    pub count: Option<u32>,
}

impl Event {
    /// Creates an event of the given kind with the current timestamp and
    /// the next global sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            message: None,
            task: None,
            op: None,
            reason: None,
            retryable: None,
            count: None,
        }
    }

    /// Attaches the message's instance name.
    #[inline]
    pub fn with_message(mut self, name: impl Into<Arc<str>>) -> Self {
        self.message = Some(name.into());
        self
    }

    /// Attaches a tracked-task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches the originating operation.
    #[inline]
    pub fn with_op(mut self, op: Op) -> Self {
        self.op = Some(op);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the retryable classification of a failure.
    #[inline]
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    /// Attaches a deadline-extension total.
    #[inline]
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::now(EventKind::MessagePublished);
        let b = Event::now(EventKind::MessageConsumed);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builder_attaches_metadata() {
        let ev = Event::now(EventKind::OperationFailed)
            .with_message("cattle-1a2b")
            .with_op(Op::Remediate)
            .with_reason("could not restart")
            .with_retryable(true);

        assert_eq!(ev.kind, EventKind::OperationFailed);
        assert_eq!(ev.message.as_deref(), Some("cattle-1a2b"));
        assert_eq!(ev.op, Some(Op::Remediate));
        assert_eq!(ev.reason.as_deref(), Some("could not restart"));
        assert_eq!(ev.retryable, Some(true));
        assert!(ev.count.is_none());
    }
}
