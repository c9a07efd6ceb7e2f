//! # Supervisor: runtime orchestration and graceful shutdown.
//!
//! The [`Supervisor`] owns the event bus, the subscriber set and the global
//! configuration. It wires the pipeline (publisher pump, work queue,
//! consumer loop) into a [`Registry`] of outstanding tasks and then acts as
//! the shutdown coordinator.
//!
//! ## High-level architecture
//! ```text
//! Source ──► Publisher ──► Queue ──► Consumer ──► MessageHandler (1 per msg)
//!                                                   ├─ heartbeat
//!                                                   ├─ finalizer
//!                                                   └─ persist ∥ remediate
//!
//! every spawned task ──► Registry (name → {JoinHandle, CancellationToken})
//!
//! Shutdown path (signal or fault):
//!   ShutdownRequested event
//!     └─► runtime_token.cancel()        → propagates to every child token
//!     └─► Registry::cancel_all()        → join all within Config::grace
//!           ├─ Ok        → AllStoppedWithin
//!           └─ timeout   → GraceExceeded (stuck task names)
//!     └─► ConnectionsClosed, Stopped    → flush subscribers, state Stopped
//! ```
//!
//! ## Lifecycle
//! `Running → ShuttingDown → Stopped`, strictly in that order. The
//! transition into `ShuttingDown` fires at most once; a second signal or
//! fault while already shutting down has no further effect. Once the
//! transition begins the registry refuses new spawns, so no work starts
//! behind the coordinator's back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::config::Config;
use crate::core::consumer::Consumer;
use crate::core::publisher::Publisher;
use crate::core::registry::{Fault, Registry};
use crate::core::shutdown;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::queue;
use crate::source::Source;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Lifecycle states of the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    ShuttingDown,
    Stopped,
}

/// Bound on draining the event listener after the final event; flushing the
/// sink stays best-effort even when a stuck task keeps the bus alive.
const FLUSH_BOUND: Duration = Duration::from_secs(1);

/// What moved the coordinator out of `Running`.
enum Trigger {
    /// OS termination signal, by name.
    Signal(&'static str),
    /// Fault escalated from a tracked task.
    Fault(Fault),
    /// Signal listeners could not be registered.
    SignalError(std::io::Error),
    /// Every tracked task finished on its own.
    Idle,
}

/// Coordinates the pipeline tasks, event delivery and graceful shutdown.
pub struct Supervisor {
    /// Global runtime configuration.
    pub cfg: Config,
    /// Event bus shared with all pipeline tasks.
    pub bus: Bus,
    subs: Arc<SubscriberSet>,
    state: AtomicU8,
}

impl Supervisor {
    /// Creates a supervisor with the given config and subscribers.
    pub fn new(cfg: Config, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(subscribers));
        Self {
            cfg,
            bus,
            subs,
            state: AtomicU8::new(State::Running as u8),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        match self.state.load(Ordering::Acquire) {
            0 => State::Running,
            1 => State::ShuttingDown,
            _ => State::Stopped,
        }
    }

    /// Runs the pipeline until the source ends and all handlers finish, an
    /// OS termination signal arrives, or a fault surfaces from any task.
    ///
    /// On signal or fault, every outstanding task is cancelled and awaited
    /// within [`Config::grace`]; exceeding the grace returns
    /// [`RuntimeError::GraceExceeded`] naming the stuck tasks.
    pub async fn run(
        self,
        source: Box<dyn Source>,
        backend: Arc<dyn Backend>,
    ) -> Result<(), RuntimeError> {
        let token = CancellationToken::new();
        let (fault_tx, mut fault_rx) = mpsc::unbounded_channel();
        let registry = Registry::new(self.bus.clone(), token.clone(), fault_tx);
        let listener = self.subscriber_listener();

        let (queue_tx, queue_rx) = queue::channel();

        // The consumer goes first: it stays alive until the queue closes,
        // so the registry cannot look idle while work is still possible.
        let consumer = Consumer {
            queue: queue_rx,
            bus: self.bus.clone(),
            backend,
            registry: Arc::clone(&registry),
            cfg: self.cfg.clone(),
        };
        registry.spawn("consumer", move |tok| consumer.run(tok)).await;

        let publisher = Publisher {
            source,
            queue: queue_tx,
            bus: self.bus.clone(),
        };
        registry.spawn("publisher", move |tok| publisher.run(tok)).await;

        let trigger = tokio::select! {
            res = shutdown::wait_for_shutdown_signal() => match res {
                Ok(name) => Trigger::Signal(name),
                Err(err) => Trigger::SignalError(err),
            },
            Some(fault) = fault_rx.recv() => Trigger::Fault(fault),
            _ = registry.wait_idle() => Trigger::Idle,
        };

        let result = match trigger {
            Trigger::Idle => Ok(()),
            Trigger::Signal(name) => {
                self.begin_shutdown(name);
                token.cancel();
                self.wait_all_with_grace(&registry).await
            }
            Trigger::Fault(fault) => {
                self.begin_shutdown(&format!("fault in {}: {}", fault.task, fault.error));
                token.cancel();
                self.wait_all_with_grace(&registry).await
            }
            Trigger::SignalError(err) => {
                self.begin_shutdown("signal registration failed");
                token.cancel();
                let _ = self.wait_all_with_grace(&registry).await;
                Err(RuntimeError::SignalRegistration { source: err })
            }
        };

        // The registry carries a bus clone; releasing it lets the listener
        // observe the bus closing once the pipeline tasks are gone.
        drop(registry);
        self.finish(listener).await;
        result
    }

    /// Moves `Running → ShuttingDown` and announces it. Returns false, with
    /// no other effect, when the transition already happened.
    fn begin_shutdown(&self, cause: &str) -> bool {
        let moved = self
            .state
            .compare_exchange(
                State::Running as u8,
                State::ShuttingDown as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if moved {
            self.bus
                .publish(Event::now(EventKind::ShutdownRequested).with_reason(cause));
        }
        moved
    }

    /// Cancels every outstanding task and waits for all of them to unwind
    /// within the configured grace period.
    async fn wait_all_with_grace(&self, registry: &Arc<Registry>) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        let mut handles = registry.cancel_all().await;

        let done = async {
            for (_, handle) in handles.iter_mut() {
                let _ = handle.await;
            }
        };
        match time::timeout(grace, done).await {
            Ok(()) => {
                self.bus.publish(Event::now(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                self.bus.publish(Event::now(EventKind::GraceExceeded));
                let stuck = handles
                    .iter()
                    .filter(|(_, handle)| !handle.is_finished())
                    .map(|(name, _)| name.clone())
                    .collect();
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Terminal bookkeeping: announce the last phases, drain the event
    /// listener, flush the subscriber queues and mark the runtime stopped.
    async fn finish(self, listener: JoinHandle<()>) {
        let Supervisor {
            bus, subs, state, ..
        } = self;

        bus.publish(Event::now(EventKind::ConnectionsClosed));
        bus.publish(Event::now(EventKind::Stopped));

        // Dropping the bus lets the listener observe a closed channel once
        // the remaining publishers (if any) are gone.
        drop(bus);
        let _ = time::timeout(FLUSH_BOUND, listener).await;
        if let Ok(set) = Arc::try_unwrap(subs) {
            set.shutdown().await;
        }

        state.store(State::Stopped as u8, Ordering::Release);
    }

    /// Forwards bus events to the subscriber set (fire-and-forget).
    fn subscriber_listener(&self) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let subs = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => subs.emit(&ev),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MessageError;
    use crate::message::{Message, MessageRef};
    use crate::source::StaticSource;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Subscriber that records every event it sees.
    struct Collect {
        events: Arc<Mutex<Vec<Event>>>,
    }

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, event: &Event) {
            self.events.lock().unwrap().push(event.clone());
        }

        fn name(&self) -> &'static str {
            "collect"
        }
    }

    /// Backend that succeeds instantly.
    struct InstantBackend;

    #[async_trait]
    impl Backend for InstantBackend {
        async fn persist(&self, _msg: &Message) -> Result<(), MessageError> {
            Ok(())
        }

        async fn remediate(&self, _msg: &Message) -> Result<(), MessageError> {
            Ok(())
        }
    }

    /// Backend that panics while persisting one target message and hangs
    /// for every other, keeping the rest of the fleet in flight.
    struct FaultingBackend {
        target: &'static str,
    }

    #[async_trait]
    impl Backend for FaultingBackend {
        async fn persist(&self, msg: &Message) -> Result<(), MessageError> {
            if msg.instance_name() == self.target {
                tokio::time::sleep(Duration::from_millis(100)).await;
                panic!("injected defect");
            }
            futures::future::pending().await
        }

        async fn remediate(&self, _msg: &Message) -> Result<(), MessageError> {
            futures::future::pending().await
        }
    }

    fn test_config() -> Config {
        Config {
            grace: Duration::from_secs(5),
            heartbeat_every: Duration::from_secs(2),
            ack_delay: Duration::from_millis(50),
            bus_capacity: 4096,
            ..Config::default()
        }
    }

    fn batch(n: usize) -> Vec<MessageRef> {
        (1..=n)
            .map(|i| Message::arc(format!("cattle-{i:04}")))
            .collect()
    }

    fn kinds(events: &[Event]) -> Vec<EventKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_finite_stream_acknowledges_every_message() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sup = Supervisor::new(
            test_config(),
            vec![Arc::new(Collect {
                events: events.clone(),
            }) as _],
        );
        assert_eq!(sup.state(), State::Running);

        let msgs = batch(5);
        sup.run(
            Box::new(StaticSource::new(msgs.clone())),
            Arc::new(InstantBackend),
        )
        .await
        .unwrap();

        for msg in &msgs {
            assert!(msg.is_acknowledged(), "{msg} was not acknowledged");
            assert!(msg.is_persisted());
            assert!(msg.is_restarted());
        }

        let events = events.lock().unwrap();
        // Dispatch order matches enqueue order.
        let consumed: Vec<String> = events
            .iter()
            .filter(|e| e.kind == EventKind::MessageConsumed)
            .map(|e| e.message.as_deref().unwrap().to_string())
            .collect();
        let expected: Vec<String> = msgs.iter().map(|m| m.instance_name().to_string()).collect();
        assert_eq!(consumed, expected);

        // Natural completion: no shutdown request, but a terminal Stopped.
        let ks = kinds(&events);
        assert!(!ks.contains(&EventKind::ShutdownRequested));
        assert_eq!(ks.last(), Some(&EventKind::Stopped));
        assert_eq!(
            events
                .iter()
                .filter(|e| e.kind == EventKind::MessageAcked)
                .count(),
            5
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_cancels_the_outstanding_fleet() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sup = Supervisor::new(
            test_config(),
            vec![Arc::new(Collect {
                events: events.clone(),
            }) as _],
        );

        let msgs = batch(5);
        sup.run(
            Box::new(StaticSource::new(msgs.clone())),
            Arc::new(FaultingBackend {
                target: "cattle-0003",
            }),
        )
        .await
        .unwrap();

        // Nothing reached acknowledgement.
        for msg in &msgs {
            assert!(!msg.is_acknowledged(), "{msg} should not be acknowledged");
        }

        let events = events.lock().unwrap();
        let shutdown_seq = events
            .iter()
            .find(|e| e.kind == EventKind::ShutdownRequested)
            .map(|e| e.seq)
            .expect("fault must request shutdown");
        let cause = events
            .iter()
            .find(|e| e.kind == EventKind::ShutdownRequested)
            .and_then(|e| e.reason.clone())
            .unwrap();
        assert!(cause.contains("panic"), "unexpected cause {cause}");

        // No message is dequeued once the transition has begun.
        assert!(
            events
                .iter()
                .filter(|e| e.kind == EventKind::MessageConsumed)
                .all(|e| e.seq < shutdown_seq)
        );

        // Phases run in order: requested, drained, released, stopped.
        let ks = kinds(&events);
        let phase_positions: Vec<usize> = [
            EventKind::ShutdownRequested,
            EventKind::AllStoppedWithin,
            EventKind::ConnectionsClosed,
            EventKind::Stopped,
        ]
        .iter()
        .map(|k| ks.iter().position(|x| x == k).expect("missing phase"))
        .collect();
        assert!(phase_positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_task_exceeds_grace() {
        let sup = Supervisor::new(test_config(), Vec::new());
        let token = CancellationToken::new();
        let (fault_tx, _fault_rx) = mpsc::unbounded_channel();
        let registry = Registry::new(sup.bus.clone(), token.clone(), fault_tx);

        // Ignores its token entirely, so cancellation never lands.
        registry
            .spawn("stubborn", |_tok| async {
                futures::future::pending().await
            })
            .await;

        let err = sup.wait_all_with_grace(&registry).await.unwrap_err();
        match err {
            RuntimeError::GraceExceeded { stuck, .. } => {
                assert_eq!(stuck, vec!["stubborn".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_transition_is_idempotent() {
        let sup = Supervisor::new(test_config(), Vec::new());
        let mut rx = sup.bus.subscribe();

        assert!(sup.begin_shutdown("SIGTERM"));
        assert_eq!(sup.state(), State::ShuttingDown);
        assert!(!sup.begin_shutdown("SIGINT"));
        assert!(!sup.begin_shutdown("SIGTERM"));

        let first = rx.try_recv().expect("one announcement expected");
        assert_eq!(first.kind, EventKind::ShutdownRequested);
        assert_eq!(first.reason.as_deref(), Some("SIGTERM"));
        assert!(rx.try_recv().is_err(), "no second announcement");
    }
}
