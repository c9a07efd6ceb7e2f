//! # Global runtime configuration.
//!
//! [`Config`] centralizes the tunables of the runtime: shutdown grace,
//! heartbeat cadence, simulated latency bounds and the failure rate of the
//! simulated backend.
//!
//! All fields are public for flexibility; prefer the helper accessors to
//! avoid sprinkling clamping logic across the codebase.

use std::time::Duration;

/// Global configuration for the msgvisor runtime.
///
/// ## Field semantics
/// - `grace`: maximum wait for tasks to unwind during shutdown
/// - `heartbeat_every`: interval between deadline extensions per message
/// - `ack_delay`: upper bound of the finalizer's finishing delay
/// - `op_latency`: upper bound of simulated persist/remediate latency
/// - `failure_rate`: probability in `[0, 1]` that a simulated operation fails
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by the bus)
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for outstanding tasks during shutdown.
    pub grace: Duration,

    /// Interval between acknowledgement-deadline extensions.
    ///
    /// Kept below the deadline the extension buys, so an in-flight message
    /// never expires between heartbeats.
    pub heartbeat_every: Duration,

    /// Upper bound of the random finishing delay before acknowledgement.
    pub ack_delay: Duration,

    /// Upper bound of the random latency of simulated backend operations.
    pub op_latency: Duration,

    /// Probability that a simulated backend operation fails.
    pub failure_rate: f64,

    /// Capacity of the event bus broadcast ring buffer.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the failure rate clamped to `[0.0, 1.0]`.
    #[inline]
    pub fn failure_rate_clamped(&self) -> f64 {
        self.failure_rate.clamp(0.0, 1.0)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 10s`
    /// - `heartbeat_every = 2s`
    /// - `ack_delay = 1s`
    /// - `op_latency = 1s`
    /// - `failure_rate = 0.2`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            heartbeat_every: Duration::from_secs(2),
            ack_delay: Duration::from_secs(1),
            op_latency: Duration::from_secs(1),
            failure_rate: 0.2,
            bus_capacity: 1024,
        }
    }
}
