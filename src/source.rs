//! # Message sources.
//!
//! [`Source`] is the inbound seam: an opaque generator of message records
//! arriving over time, ending with `None` at end-of-stream. The runtime does
//! not interpret messages beyond their identity fields.
//!
//! Two implementations ship with the crate: [`SyntheticSource`] emits
//! randomly named messages at random intervals forever (the long-running
//! service case), and [`StaticSource`] replays a fixed batch (finite
//! producers, demos, tests).

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::message::{Message, MessageRef};

/// Inbound message-arrival interface.
#[async_trait]
pub trait Source: Send + 'static {
    /// Returns the next message, or `None` at end-of-stream.
    async fn next(&mut self) -> Option<MessageRef>;
}

/// Endless source of randomly named messages.
///
/// Instance names follow the `cattle-<4 alphanumerics>` convention; the
/// inter-arrival delay is uniform in `[0, every]`.
pub struct SyntheticSource {
    every: Duration,
}

impl SyntheticSource {
    pub fn new(every: Duration) -> Self {
        Self { every }
    }

    fn draw(&self) -> (String, Duration) {
        const CHOICES: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::rng();
        let suffix: String = (0..4)
            .map(|_| CHOICES[rng.random_range(0..CHOICES.len())] as char)
            .collect();
        let delay = self.every.mul_f64(rng.random::<f64>());
        (format!("cattle-{suffix}"), delay)
    }
}

#[async_trait]
impl Source for SyntheticSource {
    async fn next(&mut self) -> Option<MessageRef> {
        let (name, delay) = self.draw();
        tokio::time::sleep(delay).await;
        Some(Message::arc(name))
    }
}

/// Finite source replaying a fixed batch of messages, then ending.
pub struct StaticSource {
    pending: VecDeque<MessageRef>,
}

impl StaticSource {
    pub fn new(messages: impl IntoIterator<Item = MessageRef>) -> Self {
        Self {
            pending: messages.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Source for StaticSource {
    async fn next(&mut self) -> Option<MessageRef> {
        self.pending.pop_front()
    }
}
