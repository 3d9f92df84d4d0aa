//! Error types for kernel manager operations.

use std::time::Duration;

use thiserror::Error;
use vcad_worker_protocol::{CorrelationId, ProtocolError};

/// Errors surfaced to callers of a [`KernelManager`](crate::KernelManager).
#[derive(Error, Debug)]
pub enum KernelError {
    /// The worker executed the call and reported an error.
    #[error("{function_name} failed: {message}")]
    Worker {
        /// Function that was called.
        function_name: String,
        /// Error text posted by the worker.
        message: String,
    },

    /// No reply arrived within the configured call timeout.
    #[error("{function_name} ({uid}) timed out after {after:?}")]
    Timeout {
        /// Function that was called.
        function_name: String,
        /// Correlation id of the abandoned call.
        uid: CorrelationId,
        /// Configured timeout.
        after: Duration,
    },

    /// `call` was issued before a worker was bound.
    #[error("no worker bound to this manager")]
    NotBound,

    /// `set_worker` was called on a manager that already has one.
    #[error("a worker is already bound to this manager")]
    AlreadyBound,

    /// `set_worker` was called outside a tokio runtime.
    #[error("no async runtime available to drive the message router")]
    NoRuntime,

    /// The worker channel closed before the call settled.
    #[error("worker channel closed")]
    TransportClosed,

    /// A reply named a uid with no pending call (fatal policy only).
    #[error("reply for unknown call {0}")]
    UnmatchedReply(CorrelationId),

    /// Encoding or classification of a channel message failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Inputs or results could not be (de)serialized.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Result type for kernel manager operations.
pub type Result<T> = std::result::Result<T, KernelError>;
