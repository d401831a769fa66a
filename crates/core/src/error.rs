//! Error type shared by grids and the cloud manager.

use crate::core_types::CompoundId;
use thiserror::Error;

/// Errors reported by compound cloud operations.
///
/// Failed compare-and-swap attempts are not errors; they surface as
/// `success = false` from [`CompoundGrid::take`](crate::grid::CompoundGrid::take).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompoundGridError {
    /// Channel index out of range, or the slot has no compound bound to it.
    #[error("channel {channel} is not a bound channel of this grid")]
    InvalidChannel { channel: usize },

    /// Programming error in the arguments or configuration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A single reposition tried to move more than one sub-square on an axis.
    #[error("reposition by ({dx}, {dy}) sub-squares; at most one step per axis is supported")]
    UnsupportedJump { dx: i64, dy: i64 },

    /// Local cell coordinates outside the grid.
    #[error("cell ({x}, {y}) is outside the {size}x{size} grid")]
    CoordinateOutOfRange { x: usize, y: usize, size: usize },

    /// No grid managed by the cloud manager simulates this compound.
    #[error("{0} is not simulated by any grid")]
    UnknownCompound(CompoundId),

    /// The dedicated solver thread pool could not be created.
    #[error("failed to build solver thread pool: {0}")]
    ThreadPool(String),
}

impl CompoundGridError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Result alias used across the crate
pub type Result<T, E = CompoundGridError> = std::result::Result<T, E>;
