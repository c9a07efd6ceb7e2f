//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//!
//! ## Output format
//! ```text
//! [published] msg=cattle-1a2b
//! [consumed] msg=cattle-1a2b
//! [op-ok] msg=cattle-1a2b op=persist
//! [op-failed] msg=cattle-1a2b op=remediate retryable=true err="remediate retryable: ..."
//! [extended] msg=cattle-1a2b count=3
//! [acked] msg=cattle-1a2b
//! [shutdown-requested] cause="SIGTERM"
//! [all-stopped-within-grace]
//! [stopped]
//! ```
//!
//! Not intended for production use. Implement a custom [`Subscribe`] for
//! structured logging or metrics collection.

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Simple stdout logging subscriber.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::MessagePublished => {
                println!("[published] msg={:?}", e.message);
            }
            EventKind::MessageConsumed => {
                println!("[consumed] msg={:?}", e.message);
            }
            EventKind::OperationSucceeded => {
                println!("[op-ok] msg={:?} op={:?}", e.message, e.op);
            }
            EventKind::OperationFailed => {
                println!(
                    "[op-failed] msg={:?} op={:?} retryable={:?} err={:?}",
                    e.message, e.op, e.retryable, e.reason
                );
            }
            EventKind::DeadlineExtended => {
                println!("[extended] msg={:?} count={:?}", e.message, e.count);
            }
            EventKind::MessageAcked => {
                println!("[acked] msg={:?}", e.message);
            }
            EventKind::TaskPanicked => {
                println!("[task-panicked] task={:?} err={:?}", e.task, e.reason);
            }
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested] cause={:?}", e.reason);
            }
            EventKind::AllStoppedWithin => {
                println!("[all-stopped-within-grace]");
            }
            EventKind::GraceExceeded => {
                println!("[grace-exceeded]");
            }
            EventKind::ConnectionsClosed => {
                println!("[connections-closed]");
            }
            EventKind::Stopped => {
                println!("[stopped]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
