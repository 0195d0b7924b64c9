//! Center zone tracking and interest window transitions.

use std::collections::BTreeSet;

use glam::DVec3;

use crate::grid::ZoneGrid;
use crate::key::ZoneKey;

/// Follows a connection's center zone and the window of zones around it.
///
/// The window is every zone whose distance to the center is at most
/// `radius` on each partitioned axis; flat axes stay at `0`. Inside the window
/// each zone has a compact 1-based id, which only changes when the center
/// moves.
#[derive(Debug, Clone)]
pub struct ZoneCenterTracker {
    grid: ZoneGrid,
    radius: u32,
    center: Option<ZoneKey>,
}

impl ZoneCenterTracker {
    #[must_use]
    pub const fn new(grid: ZoneGrid, radius: u32) -> Self {
        Self {
            grid,
            radius,
            center: None,
        }
    }

    #[must_use]
    pub const fn grid(&self) -> &ZoneGrid {
        &self.grid
    }

    #[must_use]
    pub const fn radius(&self) -> u32 {
        self.radius
    }

    /// Current center zone, `None` until the first [`set_center`](Self::set_center).
    #[must_use]
    pub const fn center(&self) -> Option<ZoneKey> {
        self.center
    }

    /// Number of zones in the window.
    #[must_use]
    pub fn window_len(&self) -> usize {
        let side = 2 * self.radius as usize + 1;
        self.grid.active_axes().fold(1, |acc, _| acc * side)
    }

    /// Returns `true` if `zone` is inside the current window.
    #[must_use]
    pub fn contains(&self, zone: ZoneKey) -> bool {
        self.zone_id(zone).is_some()
    }

    /// Returns the 1-based id of `zone` inside the current window.
    #[must_use]
    pub fn zone_id(&self, zone: ZoneKey) -> Option<u32> {
        let center = self.center?;
        let side = 2 * i64::from(self.radius) + 1;
        let mut id = 0i64;
        let mut stride = 1i64;
        for axis in 0..3 {
            let delta = i64::from(zone.axis(axis)) - i64::from(center.axis(axis));
            if self.grid.is_flat(axis) {
                if delta != 0 {
                    return None;
                }
                continue;
            }
            let offset = delta + i64::from(self.radius);
            if !(0..side).contains(&offset) {
                return None;
            }
            id += offset * stride;
            stride *= side;
        }
        u32::try_from(id + 1).ok()
    }

    /// Zones inside the current window, in key order.
    #[must_use]
    pub fn zones(&self) -> Vec<ZoneKey> {
        self.center
            .map(|center| self.window(center).into_iter().collect())
            .unwrap_or_default()
    }

    /// Moves the center to the zone containing `position`.
    ///
    /// When the zone changes, zones that came into range are appended to
    /// `entered` and zones that fell out of range to `exited`, and `true` is
    /// returned. An unchanged zone is a no-op returning `false`.
    ///
    /// Call at most once per frame, after all state for the frame has been
    /// applied, so zone ids stay stable while the frame is processed.
    pub fn set_center(
        &mut self,
        position: DVec3,
        entered: &mut Vec<ZoneKey>,
        exited: &mut Vec<ZoneKey>,
    ) -> bool {
        let next = self.grid.zone_for(position);
        if self.center == Some(next) {
            return false;
        }

        let new_window = self.window(next);
        let old_window = self.center.map(|c| self.window(c)).unwrap_or_default();
        entered.extend(new_window.difference(&old_window).copied());
        exited.extend(old_window.difference(&new_window).copied());

        self.center = Some(next);
        true
    }

    fn window(&self, center: ZoneKey) -> BTreeSet<ZoneKey> {
        let r = i32::try_from(self.radius).unwrap_or(i32::MAX);
        let span = |axis: usize| {
            if self.grid.is_flat(axis) {
                0..=0
            } else {
                -r..=r
            }
        };
        let mut zones = BTreeSet::new();
        for dz in span(2) {
            for dy in span(1) {
                for dx in span(0) {
                    zones.insert(center.offset(dx, dy, dz));
                }
            }
        }
        zones
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_z_tracker(radius: u32) -> ZoneCenterTracker {
        let grid = ZoneGrid::new(DVec3::new(10.0, 10.0, 0.0)).unwrap();
        ZoneCenterTracker::new(grid, radius)
    }

    #[test]
    fn first_center_enters_whole_window() {
        let mut tracker = flat_z_tracker(1);
        let (mut entered, mut exited) = (Vec::new(), Vec::new());
        assert!(tracker.center().is_none());
        assert!(tracker.set_center(DVec3::new(5.0, 5.0, 0.0), &mut entered, &mut exited));
        assert_eq!(entered.len(), 9);
        assert!(exited.is_empty());
        assert_eq!(tracker.window_len(), 9);
    }

    #[test]
    fn same_zone_is_noop() {
        let mut tracker = flat_z_tracker(1);
        let (mut entered, mut exited) = (Vec::new(), Vec::new());
        tracker.set_center(DVec3::new(1.0, 1.0, 0.0), &mut entered, &mut exited);
        entered.clear();
        assert!(!tracker.set_center(DVec3::new(9.0, 9.0, 0.0), &mut entered, &mut exited));
        assert!(entered.is_empty());
        assert!(exited.is_empty());
    }

    #[test]
    fn step_along_x_swaps_edges() {
        let mut tracker = flat_z_tracker(1);
        let (mut entered, mut exited) = (Vec::new(), Vec::new());
        tracker.set_center(DVec3::new(5.0, 5.0, 0.0), &mut entered, &mut exited);
        entered.clear();

        assert!(tracker.set_center(DVec3::new(15.0, 5.0, 0.0), &mut entered, &mut exited));
        assert_eq!(tracker.center(), Some(ZoneKey::new(1, 0, 0)));
        assert_eq!(
            entered,
            vec![
                ZoneKey::new(2, -1, 0),
                ZoneKey::new(2, 0, 0),
                ZoneKey::new(2, 1, 0)
            ]
        );
        assert_eq!(
            exited,
            vec![
                ZoneKey::new(-1, -1, 0),
                ZoneKey::new(-1, 0, 0),
                ZoneKey::new(-1, 1, 0)
            ]
        );
    }

    #[test]
    fn zone_ids_cover_window_once() {
        let mut tracker = flat_z_tracker(2);
        let (mut entered, mut exited) = (Vec::new(), Vec::new());
        tracker.set_center(DVec3::new(-35.0, 12.0, 0.0), &mut entered, &mut exited);

        let mut ids: Vec<u32> = tracker
            .zones()
            .into_iter()
            .map(|zone| tracker.zone_id(zone).unwrap())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=25).collect::<Vec<_>>());
    }

    #[test]
    fn zone_id_outside_window() {
        let mut tracker = flat_z_tracker(1);
        assert_eq!(tracker.zone_id(ZoneKey::new(0, 0, 0)), None);
        let (mut entered, mut exited) = (Vec::new(), Vec::new());
        tracker.set_center(DVec3::ZERO, &mut entered, &mut exited);
        assert_eq!(tracker.zone_id(ZoneKey::new(0, 0, 0)), Some(5));
        assert_eq!(tracker.zone_id(ZoneKey::new(2, 0, 0)), None);
        assert_eq!(tracker.zone_id(ZoneKey::new(0, 0, 1)), None);
        assert!(tracker.contains(ZoneKey::new(-1, 1, 0)));
    }

    #[test]
    fn diagonal_jump_far_away_swaps_everything() {
        let mut tracker = flat_z_tracker(1);
        let (mut entered, mut exited) = (Vec::new(), Vec::new());
        tracker.set_center(DVec3::ZERO, &mut entered, &mut exited);
        entered.clear();
        tracker.set_center(DVec3::new(100.0, 100.0, 0.0), &mut entered, &mut exited);
        assert_eq!(entered.len(), 9);
        assert_eq!(exited.len(), 9);
    }
}
