//! # SubscriberSet: non-blocking fan-out over multiple subscribers.
//!
//! Distributes each [`Event`] to every subscriber **without awaiting** its
//! processing: one bounded queue and one worker task per subscriber.
//!
//! Guarantees per-subscriber FIFO and panic isolation (a panicking
//! subscriber is reported and its worker keeps going). Does not guarantee
//! ordering across subscribers or delivery under overflow: when a
//! subscriber's queue is full, events for it are dropped with a warning.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::Event;

use super::Subscribe;

/// Per-subscriber queue with metadata.
struct Channel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
pub struct SubscriberSet {
    channels: Vec<Channel>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Creates the set and spawns one worker per subscriber.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));

            let worker = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        eprintln!("[msgvisor] subscriber '{}' panicked: {panic:?}", sub.name());
                    }
                }
            });

            channels.push(Channel { name, sender: tx });
            workers.push(worker);
        }

        Self { channels, workers }
    }

    /// Fans one event out to all subscribers without blocking.
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for channel in &self.channels {
            if let Err(err) = channel.sender.try_send(Arc::clone(&ev)) {
                let why = match err {
                    mpsc::error::TrySendError::Full(_) => "queue full",
                    mpsc::error::TrySendError::Closed(_) => "worker closed",
                };
                eprintln!(
                    "[msgvisor] subscriber '{}' dropped event: {why}",
                    channel.name
                );
            }
        }
    }

    /// Flush: close all queues and wait for workers to drain them.
    pub async fn shutdown(self) {
        drop(self.channels);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}
