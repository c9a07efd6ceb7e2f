//! # Backend seam for the two primary operations.
//!
//! [`Backend`] abstracts the persistence and remediation services a handler
//! calls into. The contract is success/failure only: operations may take
//! unbounded time, and a failed remediation is reported with the
//! distinguished retryable kind while any other failure is generic.
//!
//! [`SimBackend`] is the built-in stand-in used by the service binary: each
//! call sleeps a uniform random latency and fails at a configured rate.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::config::Config;
use crate::error::{MessageError, Op};
use crate::message::Message;

/// External persistence/remediation services, invoked per message.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Saves the message to the backing store.
    async fn persist(&self, msg: &Message) -> Result<(), MessageError>;

    /// Restarts the resource the message refers to.
    ///
    /// A failure here is the retryable kind: the restart did not happen yet
    /// but may on a later attempt.
    async fn remediate(&self, msg: &Message) -> Result<(), MessageError>;
}

/// Simulated backend with random latency and random failures.
#[derive(Clone, Debug)]
pub struct SimBackend {
    latency: Duration,
    failure_rate: f64,
}

impl SimBackend {
    /// Creates a simulator with the given latency bound and failure rate
    /// (clamped to `[0, 1]`).
    pub fn new(latency: Duration, failure_rate: f64) -> Self {
        Self {
            latency,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    /// Creates a simulator from the runtime configuration.
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.op_latency, cfg.failure_rate_clamped())
    }

    /// Draws a latency and a pass/fail verdict for one operation.
    ///
    /// The rng handle must not be held across an await point.
    fn roll(&self) -> (Duration, bool) {
        let mut rng = rand::rng();
        let latency = self.latency.mul_f64(rng.random::<f64>());
        let failed = rng.random::<f64>() < self.failure_rate;
        (latency, failed)
    }
}

#[async_trait]
impl Backend for SimBackend {
    async fn persist(&self, msg: &Message) -> Result<(), MessageError> {
        let (latency, failed) = self.roll();
        tokio::time::sleep(latency).await;
        if failed {
            return Err(MessageError::Generic {
                op: Op::Persist,
                error: format!("could not save {msg}"),
            });
        }
        Ok(())
    }

    async fn remediate(&self, msg: &Message) -> Result<(), MessageError> {
        let (latency, failed) = self.roll();
        tokio::time::sleep(latency).await;
        if failed {
            return Err(MessageError::Retryable {
                op: Op::Remediate,
                error: format!("could not restart {}", msg.hostname()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[tokio::test]
    async fn test_zero_failure_rate_always_succeeds() {
        let backend = SimBackend::new(Duration::ZERO, 0.0);
        let msg = Message::new("cattle-0000");
        for _ in 0..20 {
            assert!(backend.persist(&msg).await.is_ok());
            assert!(backend.remediate(&msg).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_full_failure_rate_classifies_by_operation() {
        let backend = SimBackend::new(Duration::ZERO, 1.0);
        let msg = Message::new("cattle-0000");

        let persist = backend.persist(&msg).await.unwrap_err();
        assert!(!persist.is_retryable());
        assert_eq!(persist.op(), Some(Op::Persist));

        let remediate = backend.remediate(&msg).await.unwrap_err();
        assert!(remediate.is_retryable());
        assert_eq!(remediate.op(), Some(Op::Remediate));
    }

    #[test]
    fn test_failure_rate_is_clamped() {
        let backend = SimBackend::new(Duration::ZERO, 7.0);
        assert_eq!(backend.failure_rate, 1.0);
    }
}
