//! Uniform zone grid.

use glam::DVec3;

use crate::error::{ZoneError, ZoneResult};
use crate::key::ZoneKey;

const AXIS_NAMES: [char; 3] = ['x', 'y', 'z'];

/// Splits world space into uniform cells.
///
/// An axis with cell size `0` is flat: every position maps to `0` on it, so a
/// grid of `(32, 0, 32)` is a 2D grid over the x/z plane.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ZoneGrid {
    cell: DVec3,
}

impl ZoneGrid {
    pub fn new(cell: DVec3) -> ZoneResult<Self> {
        for (axis, size) in cell.to_array().into_iter().enumerate() {
            if !size.is_finite() || size < 0.0 {
                return Err(ZoneError::InvalidCellSize {
                    axis: AXIS_NAMES[axis],
                    size,
                });
            }
        }
        if cell.cmpeq(DVec3::ZERO).all() {
            return Err(ZoneError::AllAxesFlat);
        }
        Ok(Self { cell })
    }

    #[must_use]
    pub const fn cell_size(&self) -> DVec3 {
        self.cell
    }

    #[must_use]
    pub fn is_flat(&self, axis: usize) -> bool {
        self.cell[axis] == 0.0
    }

    /// Indices of the partitioned axes, in x, y, z order.
    pub fn active_axes(&self) -> impl Iterator<Item = usize> + '_ {
        (0..3).filter(move |axis| !self.is_flat(*axis))
    }

    /// Returns the zone containing `position`.
    #[must_use]
    pub fn zone_for(&self, position: DVec3) -> ZoneKey {
        let coord = |axis: usize| -> i32 {
            if self.is_flat(axis) {
                0
            } else {
                // `as` saturates for out-of-range floats.
                (position[axis] / self.cell[axis]).floor() as i32
            }
        };
        ZoneKey::new(coord(0), coord(1), coord(2))
    }

    /// Returns the minimum corner of `zone`.
    #[must_use]
    pub fn zone_origin(&self, zone: ZoneKey) -> DVec3 {
        DVec3::new(
            f64::from(zone.x) * self.cell.x,
            f64::from(zone.y) * self.cell.y,
            f64::from(zone.z) * self.cell.z,
        )
    }
}
