use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use glam::{DQuat, DVec3};
use proptest::prelude::*;
use replication::{ClientReplicator, ManualClock, ReplicationConfig};
use wire::{decode_message, ClientAck, FrameId, Limits, NetworkId};
use zone::{EntityId, FrameListener, StateBlock, ZoneGrid, ZoneKey};

#[derive(Debug, Clone)]
struct Tick {
    updated: Vec<u8>,
    removed: Vec<u8>,
    acks: Vec<u8>,
}

fn tick_strategy() -> impl Strategy<Value = Tick> {
    (
        prop::collection::vec(0u8..16, 0..10),
        prop::collection::vec(0u8..16, 0..4),
        prop::collection::vec(any::<u8>(), 0..3),
    )
        .prop_map(|(updated, removed, acks)| Tick {
            updated,
            removed,
            acks,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_network_ids_never_alias(ticks in prop::collection::vec(tick_strategy(), 1..40)) {
        let grid = ZoneGrid::new(DVec3::new(10.0, 10.0, 0.0)).unwrap();
        let config = ReplicationConfig::for_testing().with_max_outstanding_frames(8);
        let mut rep = ClientReplicator::with_clock(
            Vec::<Vec<u8>>::new(),
            grid,
            config,
            Arc::new(ManualClock::new(0)),
        );
        let zone = ZoneKey::new(0, 0, 0);

        // Last message each network id appeared in, and for which entity.
        let mut seen: HashMap<NetworkId, (EntityId, FrameId)> = HashMap::new();
        let mut versions: BTreeMap<EntityId, u64> = BTreeMap::new();
        let mut decoded = 0;

        for (index, step) in ticks.iter().enumerate() {
            let time = index as u64 + 1;
            for raw in &step.acks {
                let sent = rep.writer().current_id().raw();
                if sent > 0 {
                    let frame = FrameId::new(u64::from(*raw) % sent);
                    rep.post_response(ClientAck::received(frame, 0, 0));
                }
            }

            let mut block = StateBlock::new(time, zone);
            for raw in &step.updated {
                block = block.with_update(EntityId::new(u64::from(*raw)), DVec3::ONE, DQuat::IDENTITY);
            }
            for raw in &step.removed {
                block = block.with_removal(EntityId::new(u64::from(*raw)));
            }

            rep.begin_frame_block().unwrap();
            rep.begin_frame(time);
            rep.state_changed(&block);
            rep.end_frame(time).unwrap();
            rep.end_frame_block().unwrap();

            let mut entities = Vec::new();
            for object in rep.objects().iter() {
                prop_assert_eq!(rep.ids().entity(object.network_id()), Some(object.entity()));
                entities.push(object.entity());
                if let Some(previous) = versions.insert(object.entity(), object.version()) {
                    prop_assert!(previous <= object.version());
                }
            }
            let count = entities.len();
            entities.sort();
            entities.dedup();
            prop_assert_eq!(entities.len(), count);
            versions.retain(|entity, _| rep.objects().iter().any(|o| o.entity() == *entity));

            let settled = rep.writer().settled_before();
            for bytes in &rep.writer().sink()[decoded..] {
                let message = decode_message(bytes, &Limits::default()).unwrap();
                for state in message.states() {
                    let Some(entity) = state.entity_id else { continue };
                    if let Some((previous, last_frame)) = seen.get(&state.network_id) {
                        if *previous != entity {
                            prop_assert!(
                                *last_frame < settled,
                                "{} reused while {} unsettled",
                                state.network_id,
                                last_frame
                            );
                        }
                    }
                }
                for state in message.states() {
                    let entity = match state.entity_id {
                        Some(entity) => entity,
                        None => match seen.get(&state.network_id) {
                            Some((entity, _)) => *entity,
                            None => continue,
                        },
                    };
                    seen.insert(state.network_id, (entity, message.id));
                }
            }
            decoded = rep.writer().sink().len();
        }
    }
}
