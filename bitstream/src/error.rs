//! Error types for bit-level operations.

use thiserror::Error;

/// Result type for bit-level operations.
pub type BitResult<T> = Result<T, BitError>;

/// Errors raised by [`BitWriter`](crate::BitWriter) and [`BitReader`](crate::BitReader).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BitError {
    /// More than 64 bits requested in a single call.
    #[error("invalid bit count {bits}, at most {max_bits} allowed")]
    InvalidBitCount { bits: u8, max_bits: u8 },

    /// The value has set bits above the requested width.
    #[error("value {value} does not fit in {bits} bits")]
    ValueOutOfRange { value: u64, bits: u8 },

    /// The input ended before the requested bits.
    #[error("unexpected end of input: requested {requested} bits, {available} available")]
    UnexpectedEof { requested: usize, available: usize },

    /// A varint ran past the width of its target type.
    #[error("varint longer than {max_groups} groups")]
    InvalidVarint { max_groups: u8 },
}
