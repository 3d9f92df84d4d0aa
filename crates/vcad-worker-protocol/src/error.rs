//! Error types for the worker wire protocol.

use thiserror::Error;

use crate::id::CorrelationId;

/// Errors raised while encoding or classifying channel messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The message is neither a known sentinel nor a correlated reply.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A reply names a call but does not carry exactly one of `result` and
    /// `error`.
    #[error("malformed reply for {uid}: {reason}")]
    MalformedReply {
        /// Call the reply was addressed to.
        uid: CorrelationId,
        /// What is wrong with it.
        reason: String,
    },

    /// The other end of the channel has gone away.
    #[error("channel closed")]
    ChannelClosed,

    /// JSON encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
