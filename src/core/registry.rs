//! # Registry: the process-wide set of outstanding tasks.
//!
//! Every spawned unit of work except the shutdown routine itself goes
//! through the registry, so the supervisor can target each one for
//! cancellation and await it during shutdown. A silently dropped handle
//! would be unreachable from the shutdown path, so none exist.
//!
//! ## Rules
//! - The registry owns the task handles (JoinHandle + CancellationToken).
//! - Each entry removes itself on completion of its task.
//! - A task finishing with an error (other than cancellation) or a panic
//!   is routed to the supervisor's fault channel.
//! - Once closed, spawn requests are refused; [`Registry::cancel_all`]
//!   closes, cancels every entry and hands the handles back for joining.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{Notify, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::MessageError;
use crate::events::{Bus, Event, EventKind};

/// A fault escalated from a tracked task. Fatal: triggers shutdown.
#[derive(Debug)]
pub struct Fault {
    /// Registry name of the task that faulted.
    pub task: String,
    /// Description of the fault.
    pub error: String,
}

/// Handle to one tracked task.
struct Handle {
    /// Join handle for the tracking wrapper around the task.
    join: JoinHandle<()>,
    /// Individual cancellation token for this task.
    cancel: CancellationToken,
}

/// Owned set of outstanding tasks.
pub struct Registry {
    tasks: RwLock<HashMap<String, Handle>>,
    bus: Bus,
    faults: mpsc::UnboundedSender<Fault>,
    runtime_token: CancellationToken,
    closed: AtomicBool,
    active: AtomicUsize,
    idle: Notify,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new(
        bus: Bus,
        runtime_token: CancellationToken,
        faults: mpsc::UnboundedSender<Fault>,
    ) -> Arc<Self> {
        Arc::new(Self {
            tasks: RwLock::new(HashMap::new()),
            bus,
            faults,
            runtime_token,
            closed: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            idle: Notify::new(),
        })
    }

    /// Spawns a tracked task under a child of the runtime token.
    ///
    /// Names must be unique among live entries. Returns false without
    /// spawning once the registry is closed.
    ///
    /// The task's outcome is collected by a wrapper: `Ok` and `Canceled`
    /// are graceful; any other error is escalated to the fault channel; a
    /// panic is reported as [`EventKind::TaskPanicked`] and escalated too.
    pub async fn spawn<F, Fut>(self: &Arc<Self>, name: impl Into<String>, f: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), MessageError>> + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let name = name.into();
        let cancel = self.runtime_token.child_token();
        self.active.fetch_add(1, Ordering::AcqRel);

        // Holding the write lock across both spawns keeps the wrapper's
        // self-removal ordered after the insert, however fast the task is.
        let mut tasks = self.tasks.write().await;
        let work = tokio::spawn(f(cancel.clone()));

        let me = Arc::clone(self);
        let task = name.clone();
        let join = tokio::spawn(async move {
            match work.await {
                Ok(Ok(())) | Ok(Err(MessageError::Canceled)) => {}
                Ok(Err(err)) => {
                    let _ = me.faults.send(Fault {
                        task: task.clone(),
                        error: err.to_string(),
                    });
                }
                Err(err) if err.is_cancelled() => {}
                Err(err) => {
                    me.bus.publish(
                        Event::now(EventKind::TaskPanicked)
                            .with_task(task.as_str())
                            .with_reason(err.to_string()),
                    );
                    let _ = me.faults.send(Fault {
                        task: task.clone(),
                        error: format!("panic: {err}"),
                    });
                }
            }
            me.finish(&task).await;
        });

        tasks.insert(name, Handle { join, cancel });
        true
    }

    /// Removes a completed entry and signals idleness on the last one out.
    async fn finish(&self, name: &str) {
        self.tasks.write().await.remove(name);
        if self.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Refuses further spawns.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Waits until no tracked task remains.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.active.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Closes the registry, cancels every outstanding task and hands back
    /// the named join handles for the caller to await.
    pub async fn cancel_all(&self) -> Vec<(String, JoinHandle<()>)> {
        self.close();
        let handles: Vec<(String, Handle)> = self.tasks.write().await.drain().collect();
        for (_, handle) in &handles {
            handle.cancel.cancel();
        }
        handles
            .into_iter()
            .map(|(name, handle)| (name, handle.join))
            .collect()
    }
}
