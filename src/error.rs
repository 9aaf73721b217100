//! Error types for botwire-client.

use thiserror::Error;

/// Main error type for all botwire operations.
#[derive(Debug, Error)]
pub enum BotwireError {
    /// Connect-time failure (resolution, refused, timed out). The handle
    /// is never created.
    #[error("failed to connect to controller: {0}")]
    Connect(#[source] std::io::Error),

    /// I/O error on an established connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error (malformed payload).
    #[error("MsgPack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// The controller explicitly reported a command failure.
    #[error("controller error: {0}")]
    Remote(String),

    /// The connection closed while the operation was in flight.
    #[error("disconnected")]
    Disconnected,

    /// An event subscriber handler faulted.
    #[error("event handler error: {0}")]
    Handler(String),

    /// Protocol violation (invalid frame, bad flags, oversized payload).
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using BotwireError.
pub type Result<T> = std::result::Result<T, BotwireError>;
