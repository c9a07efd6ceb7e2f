//! # Work queue: ordered, unbounded hand-off between producer and consumer.
//!
//! [`channel`] returns a cloneable producer handle ([`Queue`]) and a single
//! consumer end ([`QueueConsumer`]). `push` never blocks; `pop` suspends
//! until an item arrives or the queue is closed. Items are delivered in
//! submission order, each to exactly one `pop` call.
//!
//! End-of-stream is an explicit state, not a reserved message: after
//! [`Queue::close`] (or once every producer handle is dropped), `pop`
//! drains what is buffered and then returns `None`.
//!
//! The queue is in-memory only; anything still buffered at shutdown is lost.

use tokio::sync::mpsc;

use crate::message::MessageRef;

/// Creates a connected producer/consumer pair.
pub fn channel() -> (Queue, QueueConsumer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Queue { tx }, QueueConsumer { rx })
}

/// Producer side of the work queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Queue {
    tx: mpsc::UnboundedSender<MessageRef>,
}

impl Queue {
    /// Enqueues a message. Returns false if the consumer end is gone.
    pub fn push(&self, msg: MessageRef) -> bool {
        self.tx.send(msg).is_ok()
    }

    /// Signals end-of-stream by dropping this producer handle.
    ///
    /// The consumer observes closure once every clone has been dropped.
    pub fn close(self) {
        drop(self);
    }
}

/// Consumer side of the work queue.
#[derive(Debug)]
pub struct QueueConsumer {
    rx: mpsc::UnboundedReceiver<MessageRef>,
}

impl QueueConsumer {
    /// Dequeues the next message in FIFO order.
    ///
    /// Suspends while the queue is empty; returns `None` once the queue is
    /// closed and drained.
    pub async fn pop(&mut self) -> Option<MessageRef> {
        self.rx.recv().await
    }
}
