//! Error types used by the msgvisor runtime and message processing.
//!
//! Two enums cover the error surface:
//!
//! - [`MessageError`] - outcomes of per-message work: operation failures
//!   (retryable or generic), orchestration faults, and cooperative
//!   cancellation.
//! - [`RuntimeError`] - failures of the runtime itself, such as a shutdown
//!   drain exceeding its grace period.
//!
//! Both provide `as_label`/`as_message` helpers for logs and metrics.
//! Operation failures are handled locally by the message handler and never
//! propagate; only [`MessageError::OrchestrationFault`] is fatal and reaches
//! the supervisor. [`MessageError::Canceled`] is a graceful exit, not a
//! failure.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Which primary operation produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Save the message to the backing store.
    Persist,
    /// Restart the owning resource.
    Remediate,
}

impl Op {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Op::Persist => "persist",
            Op::Remediate => "remediate",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// # Errors produced while processing one message.
///
/// Operation failures carry the originating [`Op`] so the handler can report
/// them with the right classification.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum MessageError {
    /// Operation did not succeed yet and may be retried later.
    ///
    /// Distinguished from [`MessageError::Generic`] for reporting; both are
    /// contained within the handler that spawned the operation.
    #[error("{op} not yet successful, may retry: {error}")]
    Retryable {
        /// The operation that failed.
        op: Op,
        /// The underlying error message.
        error: String,
    },

    /// Operation failed with no retry hint.
    #[error("{op} failed: {error}")]
    Generic {
        /// The operation that failed.
        op: Op,
        /// The underlying error message.
        error: String,
    },

    /// Defect in the supervision logic itself. Fatal: initiates shutdown.
    #[error("orchestration fault: {error}")]
    OrchestrationFault {
        /// Description of the defect.
        error: String,
    },

    /// Task observed cancellation and unwound. Not a failure.
    #[error("context cancelled")]
    Canceled,
}

impl MessageError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            MessageError::Retryable { .. } => "op_retryable",
            MessageError::Generic { .. } => "op_failed",
            MessageError::OrchestrationFault { .. } => "orchestration_fault",
            MessageError::Canceled => "canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            MessageError::Retryable { op, error } => format!("{op} retryable: {error}"),
            MessageError::Generic { op, error } => format!("{op} error: {error}"),
            MessageError::OrchestrationFault { error } => format!("fault: {error}"),
            MessageError::Canceled => "context cancelled".to_string(),
        }
    }

    /// True for the distinguished "may retry" failure kind.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MessageError::Retryable { .. })
    }

    /// True for defects that must take the whole process down.
    pub fn is_fault(&self) -> bool {
        matches!(self, MessageError::OrchestrationFault { .. })
    }

    /// The originating operation, if this is an operation failure.
    pub fn op(&self) -> Option<Op> {
        match self {
            MessageError::Retryable { op, .. } | MessageError::Generic { op, .. } => Some(*op),
            _ => None,
        }
    }
}

/// # Errors produced by the msgvisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some tasks remained stuck.
    #[error("shutdown grace {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of tasks that did not unwind in time.
        stuck: Vec<String>,
    },

    /// OS signal listeners could not be registered.
    #[error("signal registration failed: {source}")]
    SignalRegistration {
        #[from]
        source: std::io::Error,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::SignalRegistration { .. } => "runtime_signal_registration",
        }
    }
}
