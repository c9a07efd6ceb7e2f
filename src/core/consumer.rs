//! # Consumer loop: queue to handler dispatch.
//!
//! Pops messages in FIFO order and spawns one [`MessageHandler`] per
//! message through the registry, never waiting for a handler to finish, so
//! a slow message cannot delay dispatch of the next one.
//!
//! The loop ends when the queue is closed and drained, or when its token is
//! cancelled; on cancellation, whatever is still buffered is dropped with
//! no redelivery.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::config::Config;
use crate::core::handler::MessageHandler;
use crate::core::registry::Registry;
use crate::error::MessageError;
use crate::events::{Bus, Event, EventKind};
use crate::queue::QueueConsumer;

/// Dispatch loop from the work queue to per-message handlers.
pub struct Consumer {
    pub queue: QueueConsumer,
    pub bus: Bus,
    pub backend: Arc<dyn Backend>,
    pub registry: Arc<Registry>,
    pub cfg: Config,
}

impl Consumer {
    /// Runs until end-of-stream or cancellation.
    pub async fn run(mut self, token: CancellationToken) -> Result<(), MessageError> {
        loop {
            tokio::select! {
                // Cancellation wins over a ready queue item: nothing is
                // dequeued once shutdown has begun.
                biased;
                _ = token.cancelled() => break,
                next = self.queue.pop() => {
                    let Some(msg) = next else { break };
                    self.bus.publish(
                        Event::now(EventKind::MessageConsumed)
                            .with_message(msg.instance_name()),
                    );
                    let handler = MessageHandler::new(
                        msg.clone(),
                        self.bus.clone(),
                        Arc::clone(&self.backend),
                        &self.cfg,
                    );
                    self.registry
                        .spawn(format!("handler:{}", msg.id()), move |tok| handler.run(tok))
                        .await;
                }
            }
        }
        Ok(())
    }
}
