//! Error types for message encoding and decoding.

use std::fmt;

use bitstream::BitError;
use thiserror::Error;

/// Result type for decode operations.
pub type WireResult<T> = Result<T, DecodeError>;

/// Errors raised while decoding a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The message is empty.
    #[error("empty message")]
    Empty,

    /// Bit-level read failure.
    #[error("bitstream error: {0}")]
    Bitstream(#[from] BitError),

    /// Protocol version this decoder does not understand.
    #[error("unsupported wire version: {found}")]
    UnsupportedVersion { found: u8 },

    /// Message kind nibble is not a known kind.
    #[error("unknown message kind: {kind}")]
    UnknownKind { kind: u8 },

    /// A valid kind, but not the one requested.
    #[error("expected {expected:?} message, found {found:?}")]
    UnexpectedKind {
        expected: crate::MessageKind,
        found: crate::MessageKind,
    },

    /// A count or size exceeded the configured limits.
    #[error("{kind} limit exceeded: {actual} > {limit}")]
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },

    /// More than a byte of padding after the last field.
    #[error("{remaining_bits} trailing bits after message body")]
    TrailingBits { remaining_bits: usize },
}

/// Errors raised while encoding a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum EncodeError {
    /// Bit-level write failure.
    #[error("bitstream error: {0}")]
    Bitstream(#[from] BitError),

    /// A count does not fit its field.
    #[error("{kind} count {actual} does not fit the wire field")]
    CountOverflow { kind: LimitKind, actual: usize },
}

/// Decoder limits that can be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    MessageBytes,
    FramesPerMessage,
    StatesPerFrame,
    AcksPerHeader,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MessageBytes => "message bytes",
            Self::FramesPerMessage => "frames per message",
            Self::StatesPerFrame => "states per frame",
            Self::AcksPerHeader => "acks per header",
        };
        f.write_str(name)
    }
}
