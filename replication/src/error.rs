//! Error types for replication.

use std::io;

use thiserror::Error;
use wire::{EncodeError, FrameId, NetworkId};

/// Result type for replication operations.
pub type ReplicationResult<T> = Result<T, ReplicationError>;

/// Errors that end the current tick for a connection.
///
/// None of these are retried here; reconnect policy belongs to the transport.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReplicationError {
    /// The transport refused a message.
    #[error("failed to send {frame_id}")]
    Send {
        frame_id: FrameId,
        #[source]
        source: io::Error,
    },

    /// A message could not be encoded.
    #[error("failed to encode {frame_id}")]
    Encode {
        frame_id: FrameId,
        #[source]
        source: EncodeError,
    },

    /// One object's state alone exceeds the maximum message size.
    #[error("state for {network_id} needs {bits} bits, message limit is {max_bits}")]
    StateTooLarge {
        network_id: NetworkId,
        bits: usize,
        max_bits: usize,
    },

    /// A state was added before any frame was started.
    #[error("state added before start_frame")]
    FrameNotStarted,
}
