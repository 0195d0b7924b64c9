//! Error types for zone configuration.

use thiserror::Error;

/// Result type for zone operations.
pub type ZoneResult<T> = Result<T, ZoneError>;

/// Errors raised while building a [`ZoneGrid`](crate::ZoneGrid).
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ZoneError {
    /// A cell dimension is negative, NaN, or infinite.
    #[error("invalid cell size {size} on axis {axis}")]
    InvalidCellSize { axis: char, size: f64 },

    /// Every axis has size zero, so there is nothing to partition.
    #[error("zone grid has no partitioned axis")]
    AllAxesFlat,
}
