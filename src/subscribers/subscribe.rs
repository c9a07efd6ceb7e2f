//! # Core subscriber trait.
//!
//! [`Subscribe`] is the extension point for plugging event sinks (logging,
//! metrics, audit) into the runtime. Each subscriber is driven by a
//! dedicated worker fed from a bounded queue owned by the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet), so a slow
//! subscriber never blocks the pipeline or its peers.

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations may be
/// slow (I/O, batching) but should prefer async waits over blocking the
/// runtime.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for overflow warnings).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    ///
    /// On overflow, events for this subscriber are dropped with a warning.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
