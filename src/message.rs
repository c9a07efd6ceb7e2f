//! # Pub/sub message entity.
//!
//! A [`Message`] is one unit of work flowing through the pipeline: an
//! immutable identity (id, instance name, derived hostname) plus lifecycle
//! flags that record what has happened to it so far.
//!
//! ## Flag semantics
//! - `restarted`, `persisted`, `acknowledged` transition `false -> true`
//!   exactly once and never reset.
//! - `extended_count` only ever increments.
//!
//! Messages are shared as [`MessageRef`] (`Arc<Message>`). One handler drives
//! a message's lifecycle; its heartbeat and finalizer children are the only
//! other writers, and each touches a disjoint field, so plain atomic flags
//! are sufficient.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use uuid::Uuid;

/// Shared handle to a message.
pub type MessageRef = Arc<Message>;

/// One unit of work with identity and lifecycle flags.
pub struct Message {
    id: Uuid,
    instance_name: Arc<str>,
    hostname: String,

    restarted: AtomicBool,
    persisted: AtomicBool,
    acknowledged: AtomicBool,
    extended_count: AtomicU32,
}

impl Message {
    /// Creates a message for the given instance name.
    ///
    /// The id is assigned here and never reused; the hostname is derived
    /// once from the instance name and immutable afterwards.
    pub fn new(instance_name: impl Into<Arc<str>>) -> Self {
        let instance_name = instance_name.into();
        let hostname = format!("{instance_name}.example.net");
        Self {
            id: Uuid::new_v4(),
            instance_name,
            hostname,
            restarted: AtomicBool::new(false),
            persisted: AtomicBool::new(false),
            acknowledged: AtomicBool::new(false),
            extended_count: AtomicU32::new(0),
        }
    }

    /// Creates the message and returns it as a shared handle.
    pub fn arc(instance_name: impl Into<Arc<str>>) -> MessageRef {
        Arc::new(Self::new(instance_name))
    }

    /// Globally unique message id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Display/grouping name of the owning resource.
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Qualified descriptor derived from the instance name.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Records a successful remediation.
    pub fn mark_restarted(&self) {
        self.restarted.store(true, Ordering::Release);
    }

    /// Records a successful persist.
    pub fn mark_persisted(&self) {
        self.persisted.store(true, Ordering::Release);
    }

    /// Records the terminal acknowledgement.
    pub fn mark_acknowledged(&self) {
        self.acknowledged.store(true, Ordering::Release);
    }

    /// Increments the deadline-extension counter, returning the new value.
    pub fn extend_deadline(&self) -> u32 {
        self.extended_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_restarted(&self) -> bool {
        self.restarted.load(Ordering::Acquire)
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted.load(Ordering::Acquire)
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged.load(Ordering::Acquire)
    }

    pub fn extended_count(&self) -> u32 {
        self.extended_count.load(Ordering::Acquire)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.instance_name)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("instance_name", &self.instance_name)
            .field("restarted", &self.is_restarted())
            .field("persisted", &self.is_persisted())
            .field("acknowledged", &self.is_acknowledged())
            .field("extended_count", &self.extended_count())
            .finish()
    }
}
