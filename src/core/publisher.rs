//! # Publisher pump: source to queue.
//!
//! Pulls messages from a [`Source`] and pushes them onto the work queue in
//! arrival order. End-of-stream closes the queue so the consumer can drain
//! and stop; cancellation just stops the pump.

use tokio_util::sync::CancellationToken;

use crate::error::MessageError;
use crate::events::{Bus, Event, EventKind};
use crate::queue::Queue;
use crate::source::Source;

/// Pump from an inbound message source into the work queue.
pub struct Publisher {
    pub source: Box<dyn Source>,
    pub queue: Queue,
    pub bus: Bus,
}

impl Publisher {
    /// Runs until the source ends or the token is cancelled.
    pub async fn run(mut self, token: CancellationToken) -> Result<(), MessageError> {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                next = self.source.next() => {
                    let Some(msg) = next else { break };
                    if !self.queue.push(msg.clone()) {
                        break;
                    }
                    self.bus.publish(
                        Event::now(EventKind::MessagePublished)
                            .with_message(msg.instance_name()),
                    );
                }
            }
        }
        self.queue.close();
        Ok(())
    }
}
