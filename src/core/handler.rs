//! # MessageHandler: per-message supervisor.
//!
//! Drives one message from dequeue to terminal acknowledgement:
//! - spawns the heartbeat and the finalizer as children, both watching the
//!   same completion gate,
//! - runs the two primary operations concurrently and waits for **both**
//!   regardless of failure,
//! - classifies and reports failures locally,
//! - sets the gate, which stops the heartbeat and releases the finalizer.
//!
//! ## Flow
//! ```text
//! run(token)
//!   ├─► Gate::new()                       (fresh, unset, per message)
//!   ├─► spawn heartbeat(msg, gate)        (child token, handle retained)
//!   ├─► spawn finalize(msg, gate)         (child token, handle retained)
//!   ├─► join!(persist, remediate)         (both awaited, failures isolated)
//!   │       │
//!   │       ▼
//!   │   record() per op: success → flag set + OperationSucceeded
//!   │                    failure → OperationFailed (retryable | generic)
//!   ├─► gate.set()                        (idempotent)
//!   └─► join heartbeat, join finalizer    (ack happens in the finalizer)
//! ```
//!
//! ## Rules
//! - An operation failure never escapes `run`; the handler reports it and
//!   completes the message anyway.
//! - Cancellation unwinds the primaries at their next suspension point,
//!   propagates to both children through the token tree, and leaves the
//!   gate unset and the message un-acknowledged.
//! - A child panic is the only path to [`MessageError::OrchestrationFault`].

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::config::Config;
use crate::error::{MessageError, Op};
use crate::events::{Bus, Event, EventKind};
use crate::gate::Gate;
use crate::message::MessageRef;

/// Supervises the full processing lifecycle of a single message.
pub struct MessageHandler {
    /// The message being driven to acknowledgement.
    pub msg: MessageRef,
    /// Event bus for outcome reporting.
    pub bus: Bus,
    /// Persistence/remediation services.
    pub backend: Arc<dyn Backend>,
    /// Interval between deadline extensions.
    pub heartbeat_every: Duration,
    /// Upper bound of the finalizer's finishing delay.
    pub ack_delay: Duration,
}

impl MessageHandler {
    /// Creates a handler for one message.
    pub fn new(msg: MessageRef, bus: Bus, backend: Arc<dyn Backend>, cfg: &Config) -> Self {
        Self {
            msg,
            bus,
            backend,
            heartbeat_every: cfg.heartbeat_every,
            ack_delay: cfg.ack_delay,
        }
    }

    /// Runs the handler until the message is acknowledged or the token is
    /// cancelled.
    ///
    /// Returns `Ok(())` on every expected path, including operation
    /// failures; `Err(MessageError::Canceled)` when cancelled before
    /// completion; `Err(MessageError::OrchestrationFault)` only on a defect
    /// in the supervision machinery itself.
    pub async fn run(self, token: CancellationToken) -> Result<(), MessageError> {
        let gate = Gate::new();

        let heartbeat = tokio::spawn(heartbeat(
            self.msg.clone(),
            gate.clone(),
            self.bus.clone(),
            self.heartbeat_every,
            token.child_token(),
        ));
        let finalizer = tokio::spawn(finalize(
            self.msg.clone(),
            gate.clone(),
            self.bus.clone(),
            self.ack_delay,
            token.child_token(),
        ));

        let primaries = async {
            tokio::join!(
                self.backend.persist(&self.msg),
                self.backend.remediate(&self.msg),
            )
        };

        let outcomes = tokio::select! {
            outcomes = primaries => Some(outcomes),
            _ = token.cancelled() => None,
        };

        match outcomes {
            Some((persist, remediate)) => {
                self.record(Op::Persist, persist);
                self.record(Op::Remediate, remediate);
                gate.set();
                join_child(heartbeat).await?;
                join_child(finalizer).await?;
                Ok(())
            }
            None => {
                // The children share this handler's token lineage and
                // unwind on their own; the gate stays unset.
                join_child(heartbeat).await?;
                join_child(finalizer).await?;
                Err(MessageError::Canceled)
            }
        }
    }

    /// Records one operation outcome: flag + event on success, classified
    /// event on failure. Failures stop here.
    fn record(&self, op: Op, outcome: Result<(), MessageError>) {
        match outcome {
            Ok(()) => {
                match op {
                    Op::Persist => self.msg.mark_persisted(),
                    Op::Remediate => self.msg.mark_restarted(),
                }
                self.bus.publish(
                    Event::now(EventKind::OperationSucceeded)
                        .with_message(self.msg.instance_name())
                        .with_op(op),
                );
            }
            Err(MessageError::Canceled) => {}
            Err(err) => {
                self.bus.publish(
                    Event::now(EventKind::OperationFailed)
                        .with_message(self.msg.instance_name())
                        .with_op(op)
                        .with_reason(err.as_message())
                        .with_retryable(err.is_retryable()),
                );
            }
        }
    }
}

/// Periodically extends the acknowledgement deadline until the gate is set.
///
/// The gate is checked before each increment, so the counter never grows
/// after completion; an extension already being emitted when the gate sets
/// may still land, which is an accepted race.
async fn heartbeat(
    msg: MessageRef,
    gate: Gate,
    bus: Bus,
    every: Duration,
    token: CancellationToken,
) {
    loop {
        if gate.is_set() || token.is_cancelled() {
            break;
        }
        let count = msg.extend_deadline();
        bus.publish(
            Event::now(EventKind::DeadlineExtended)
                .with_message(msg.instance_name())
                .with_count(count),
        );
        tokio::select! {
            _ = gate.done() => break,
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(every) => {}
        }
    }
}

/// Waits for the gate, then performs the finishing delay and acknowledges.
///
/// Runs once per message. If cancelled before the gate is set, the message
/// is never acknowledged.
async fn finalize(msg: MessageRef, gate: Gate, bus: Bus, delay: Duration, token: CancellationToken) {
    tokio::select! {
        _ = gate.done() => {}
        _ = token.cancelled() => return,
    }

    let wait = {
        let mut rng = rand::rng();
        delay.mul_f64(rng.random::<f64>())
    };
    tokio::select! {
        _ = tokio::time::sleep(wait) => {}
        _ = token.cancelled() => return,
    }

    msg.mark_acknowledged();
    bus.publish(Event::now(EventKind::MessageAcked).with_message(msg.instance_name()));
}

/// Joins a child task, mapping a panic to an orchestration fault.
async fn join_child(handle: JoinHandle<()>) -> Result<(), MessageError> {
    match handle.await {
        Ok(()) => Ok(()),
        Err(err) if err.is_cancelled() => Ok(()),
        Err(err) => Err(MessageError::OrchestrationFault {
            error: format!("child task panicked: {err}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use async_trait::async_trait;
    use tokio::sync::broadcast::error::TryRecvError;

    /// Backend whose behavior is fixed per operation.
    struct ScriptedBackend {
        persist: Script,
        remediate: Script,
    }

    #[derive(Clone, Copy)]
    enum Script {
        Ok,
        OkAfter(Duration),
        FailGeneric,
        FailRetryable,
        Hang,
    }

    impl Script {
        async fn play(self, op: Op) -> Result<(), MessageError> {
            match self {
                Script::Ok => Ok(()),
                Script::OkAfter(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(())
                }
                Script::FailGeneric => Err(MessageError::Generic {
                    op,
                    error: "scripted failure".into(),
                }),
                Script::FailRetryable => Err(MessageError::Retryable {
                    op,
                    error: "scripted failure".into(),
                }),
                Script::Hang => {
                    futures::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        async fn persist(&self, _msg: &crate::message::Message) -> Result<(), MessageError> {
            self.persist.play(Op::Persist).await
        }

        async fn remediate(&self, _msg: &crate::message::Message) -> Result<(), MessageError> {
            self.remediate.play(Op::Remediate).await
        }
    }

    fn test_config() -> Config {
        Config {
            heartbeat_every: Duration::from_secs(2),
            ack_delay: Duration::from_millis(100),
            ..Config::default()
        }
    }

    fn handler_for(msg: &MessageRef, bus: &Bus, persist: Script, remediate: Script) -> MessageHandler {
        MessageHandler::new(
            msg.clone(),
            bus.clone(),
            Arc::new(ScriptedBackend { persist, remediate }),
            &test_config(),
        )
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(ev) => events.push(ev),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_operations_ok_reaches_acknowledged() {
        let bus = Bus::new(1024);
        let mut rx = bus.subscribe();
        let msg = Message::arc("cattle-1a2b");

        handler_for(&msg, &bus, Script::Ok, Script::Ok)
            .run(CancellationToken::new())
            .await
            .expect("handler never fails on operation outcomes");

        assert!(msg.is_persisted());
        assert!(msg.is_restarted());
        assert!(msg.is_acknowledged());

        let events = drain(&mut rx);
        let ok_ops = events
            .iter()
            .filter(|e| e.kind == EventKind::OperationSucceeded)
            .count();
        assert_eq!(ok_ops, 2);

        // The ack comes strictly after both operation outcomes.
        let last_op_seq = events
            .iter()
            .filter(|e| e.kind == EventKind::OperationSucceeded)
            .map(|e| e.seq)
            .max()
            .unwrap();
        let ack_seq = events
            .iter()
            .find(|e| e.kind == EventKind::MessageAcked)
            .map(|e| e.seq)
            .unwrap();
        assert!(ack_seq > last_op_seq);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_failure_does_not_block_completion() {
        let bus = Bus::new(1024);
        let mut rx = bus.subscribe();
        let msg = Message::arc("cattle-1a2b");

        handler_for(&msg, &bus, Script::FailGeneric, Script::Ok)
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert!(!msg.is_persisted());
        assert!(msg.is_restarted());
        assert!(msg.is_acknowledged());

        let events = drain(&mut rx);
        let failed: Vec<_> = events
            .iter()
            .filter(|e| e.kind == EventKind::OperationFailed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].op, Some(Op::Persist));
        assert_eq!(failed[0].retryable, Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_remediate_failure_still_acknowledges() {
        let bus = Bus::new(1024);
        let mut rx = bus.subscribe();
        let msg = Message::arc("cattle-1a2b");

        handler_for(&msg, &bus, Script::Ok, Script::FailRetryable)
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert!(msg.is_persisted());
        assert!(!msg.is_restarted());
        assert!(msg.is_acknowledged());

        let events = drain(&mut rx);
        let failed: Vec<_> = events
            .iter()
            .filter(|e| e.kind == EventKind::OperationFailed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].op, Some(Op::Remediate));
        assert_eq!(failed[0].retryable, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_extends_until_completion_then_stops() {
        let bus = Bus::new(1024);
        let msg = Message::arc("cattle-1a2b");

        handler_for(
            &msg,
            &bus,
            Script::OkAfter(Duration::from_secs(5)),
            Script::Ok,
        )
        .run(CancellationToken::new())
        .await
        .unwrap();

        // Extensions at t=0s, 2s, 4s while the slow persist runs.
        let count = msg.extended_count();
        assert!(
            (2..=4).contains(&count),
            "unexpected extension count {count}"
        );

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(msg.extended_count(), count);
        assert!(msg.is_acknowledged());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_children_without_ack() {
        let bus = Bus::new(1024);
        let msg = Message::arc("cattle-1a2b");
        let token = CancellationToken::new();

        let handler = handler_for(&msg, &bus, Script::Hang, Script::Hang);
        let running = tokio::spawn(handler.run(token.clone()));

        // Let a few heartbeats land, then cancel mid-processing.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(msg.extended_count() >= 2);
        token.cancel();

        let res = running.await.expect("handler task must not panic");
        assert!(matches!(res, Err(MessageError::Canceled)));
        assert!(!msg.is_acknowledged());

        let count = msg.extended_count();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(msg.extended_count(), count);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_operations_are_not_reported_as_failures() {
        let bus = Bus::new(1024);
        let mut rx = bus.subscribe();
        let msg = Message::arc("cattle-1a2b");
        let token = CancellationToken::new();

        let handler = handler_for(&msg, &bus, Script::Hang, Script::Hang);
        let running = tokio::spawn(handler.run(token.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        let _ = running.await.unwrap();

        let events = drain(&mut rx);
        assert!(
            events
                .iter()
                .all(|e| e.kind != EventKind::OperationFailed && e.kind != EventKind::MessageAcked)
        );
    }
}
