//! # msgvisor
//!
//! **msgvisor** is a per-message task supervisor over an in-process work
//! queue: a publisher pumps messages from an inbound source onto the queue,
//! a consumer dispatches each one to an independent handler, and every
//! handler fans out concurrent sub-operations while keeping the message's
//! acknowledgement deadline extended. The whole process shuts down cleanly
//! on an OS signal or an unhandled fault, cancelling every outstanding task
//! and waiting for it to unwind.
//!
//! ## Architecture
//! ```text
//!  Source ──► Publisher ──► Queue (FIFO, unbounded) ──► Consumer
//!                                                          │ spawn per message
//!                                                          ▼
//!                                    ┌──────────────────────────────────┐
//!                                    │ MessageHandler                   │
//!                                    │  ├─ heartbeat  (until gate set)  │
//!                                    │  ├─ finalizer  (gate → ack)      │
//!                                    │  └─ persist ∥ remediate          │
//!                                    └──────────────────────────────────┘
//!
//!  every task ──► Registry ──► Supervisor (signals, faults, drain)
//!  every step ──► Bus ──► SubscriberSet ──► Subscribe impls
//! ```
//!
//! ## Guarantees
//! - Messages are dispatched to handlers in enqueue order.
//! - One failing operation never cancels its sibling or another message.
//! - A message is acknowledged only after its completion gate is set.
//! - Cancellation is cooperative and propagates through the task tree.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use msgvisor::{Config, LogWriter, SimBackend, Subscribe, Supervisor, SyntheticSource};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::default();
//!
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
//!     let supervisor = Supervisor::new(cfg.clone(), subs);
//!
//!     let source = SyntheticSource::new(Duration::from_secs(1));
//!     let backend = Arc::new(SimBackend::from_config(&cfg));
//!
//!     supervisor.run(Box::new(source), backend).await?;
//!     Ok(())
//! }
//! ```

mod backend;
mod config;
mod core;
mod error;
mod events;
mod gate;
mod message;
mod queue;
mod source;
mod subscribers;

// ---- Public re-exports ----

pub use backend::{Backend, SimBackend};
pub use config::Config;
pub use core::{State, Supervisor};
pub use error::{MessageError, Op, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use gate::Gate;
pub use message::{Message, MessageRef};
pub use source::{Source, StaticSource, SyntheticSource};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
