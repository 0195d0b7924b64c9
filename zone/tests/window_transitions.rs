use std::collections::BTreeSet;

use proptest::prelude::*;
use zone::{DVec3, ZoneCenterTracker, ZoneGrid, ZoneKey};

fn tracker(radius: u32) -> ZoneCenterTracker {
    let grid = ZoneGrid::new(DVec3::new(16.0, 0.0, 16.0)).unwrap();
    ZoneCenterTracker::new(grid, radius)
}

proptest! {
    #[test]
    fn prop_window_follows_transitions(
        radius in 0u32..3,
        moves in prop::collection::vec((-200.0f64..200.0, -200.0f64..200.0), 1..32),
    ) {
        let mut tracker = tracker(radius);
        let mut known: BTreeSet<ZoneKey> = BTreeSet::new();

        for (x, z) in moves {
            let mut entered = Vec::new();
            let mut exited = Vec::new();
            let changed = tracker.set_center(DVec3::new(x, 0.0, z), &mut entered, &mut exited);
            if !changed {
                prop_assert!(entered.is_empty() && exited.is_empty());
            }
            for zone in &exited {
                prop_assert!(known.remove(zone), "exited zone {} was not in view", zone);
            }
            for zone in &entered {
                prop_assert!(known.insert(*zone), "entered zone {} already in view", zone);
            }
            let window: BTreeSet<ZoneKey> = tracker.zones().into_iter().collect();
            prop_assert_eq!(&known, &window);
            prop_assert_eq!(window.len(), tracker.window_len());
        }
    }
}

#[test]
fn radius_zero_window_is_center_only() {
    let mut tracker = tracker(0);
    let (mut entered, mut exited) = (Vec::new(), Vec::new());
    tracker.set_center(DVec3::new(20.0, 0.0, 20.0), &mut entered, &mut exited);
    assert_eq!(entered, vec![ZoneKey::new(1, 0, 1)]);
    assert_eq!(tracker.zone_id(ZoneKey::new(1, 0, 1)), Some(1));
}
