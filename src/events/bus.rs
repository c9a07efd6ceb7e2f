//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. Publishers
//! (the publisher pump, consumer loop, handlers, supervisor) fire events
//! without blocking; the supervisor's listener forwards them to the
//! subscriber set.
//!
//! ## Rules
//! - `publish()` never blocks and never fails; with no receiver the event
//!   is dropped.
//! - Capacity is a ring buffer of recent events; a lagging receiver
//!   observes `RecvError::Lagged(n)` and skips the `n` oldest items.
//! - No persistence and no delivery guarantee. The sink is best-effort.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus with the given ring-buffer capacity (clamped to >= 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers. Fire-and-forget.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates an independent receiver observing subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
