use std::io;
use std::sync::Arc;
use std::thread;

use glam::{DQuat, DVec3};
use replication::{
    ClientReplicator, ManualClock, MessageSink, RemovalState, ReplicationConfig, ReplicationError,
};
use wire::{decode_message, ClientAck, FrameId, FrameMessage, Limits, NetworkId, ObjectState};
use zone::{EntityId, FrameListener, StateBlock, ZoneGrid, ZoneKey};

type Replicator = ClientReplicator<Vec<Vec<u8>>>;

fn grid() -> ZoneGrid {
    ZoneGrid::new(DVec3::new(10.0, 10.0, 0.0)).unwrap()
}

fn replicator(config: ReplicationConfig) -> Replicator {
    let _ = env_logger::builder().is_test(true).try_init();
    ClientReplicator::with_clock(Vec::new(), grid(), config, Arc::new(ManualClock::new(0)))
}

/// Runs one tick as a zone manager would and flushes it.
fn tick(replicator: &mut Replicator, time: u64, blocks: &[StateBlock]) {
    replicator.begin_frame_block().unwrap();
    replicator.begin_frame(time);
    for block in blocks {
        replicator.state_changed(block);
    }
    replicator.end_frame(time).unwrap();
    replicator.end_frame_block().unwrap();
}

fn messages(replicator: &Replicator) -> Vec<FrameMessage> {
    replicator
        .writer()
        .sink()
        .iter()
        .map(|bytes| decode_message(bytes, &Limits::default()).unwrap())
        .collect()
}

fn states_for(message: &FrameMessage, id: NetworkId) -> Vec<ObjectState> {
    message.states().filter(|s| s.network_id == id).copied().collect()
}

fn at(x: f64, y: f64) -> DVec3 {
    DVec3::new(x, y, 0.0)
}

fn ack(frame: u64) -> ClientAck {
    ClientAck::received(FrameId::new(frame), 0, 1_000_000)
}

const ORIGIN: ZoneKey = ZoneKey::new(0, 0, 0);

#[test]
fn untouched_object_is_marked_then_reaped() {
    let mut rep = replicator(ReplicationConfig::for_testing());
    let entity = EntityId::new(500);

    tick(
        &mut rep,
        10,
        &[StateBlock::new(10, ORIGIN).with_update(entity, at(1.0, 1.0), DQuat::IDENTITY)],
    );
    let id = NetworkId::new(1);
    let object = rep.objects().get(id).unwrap();
    assert_eq!(object.version(), 10);
    assert_eq!(object.removal_state(), RemovalState::Active);

    tick(&mut rep, 11, &[]);
    let object = rep.objects().get(id).unwrap();
    assert_eq!(object.removal_state(), RemovalState::MarkedRemoved);
    assert_eq!(object.version(), 11);
    assert_eq!(rep.last_stats().marked_removed, 1);

    tick(&mut rep, 12, &[]);
    assert_eq!(rep.object_count(), 0);
    assert_eq!(rep.last_stats().reaped, 1);
    assert_eq!(rep.ids().quarantined_len(), 1);

    let sent = messages(&rep);
    assert_eq!(sent.len(), 3);
    let created = states_for(&sent[0], id);
    assert_eq!(created[0].entity_id, Some(entity));
    assert!(!created[0].removed);
    for message in &sent[1..] {
        let removal = states_for(message, id);
        assert_eq!(removal.len(), 1);
        assert!(removal[0].removed);
        assert_eq!(removal[0].version, 11);
    }
}

#[test]
fn acked_version_becomes_baseline() {
    let mut rep = replicator(ReplicationConfig::for_testing().with_first_network_id(7));
    let entity = EntityId::new(9);

    tick(
        &mut rep,
        5,
        &[StateBlock::new(5, ORIGIN).with_update(entity, at(2.0, 2.0), DQuat::IDENTITY)],
    );
    let sent = messages(&rep);
    let first = &sent[0];
    assert_eq!(first.id, FrameId::new(0));
    assert_eq!(states_for(first, NetworkId::new(7))[0].version, 5);

    rep.post_response(ack(0));
    tick(
        &mut rep,
        20,
        &[StateBlock::new(20, ORIGIN).with_update(entity, at(3.0, 2.0), DQuat::IDENTITY)],
    );
    assert_eq!(rep.last_stats().baselines_committed, 1);

    let sent = messages(&rep);
    let second = &sent[1];
    assert_eq!(second.acked, vec![FrameId::new(0)]);
    let delta = states_for(second, NetworkId::new(7))[0];
    assert_eq!(delta.baseline_version, Some(5));
    assert_eq!(delta.version, 20);
    assert_eq!(delta.entity_id, None);
    assert_eq!(delta.position, Some(at(3.0, 2.0)));
    assert_eq!(delta.rotation, None);
}

#[test]
fn duplicate_ack_commits_once() {
    let mut rep = replicator(ReplicationConfig::for_testing());
    let entity = EntityId::new(1);
    let update = |time| {
        StateBlock::new(time, ORIGIN).with_update(entity, at(1.0, 1.0), DQuat::IDENTITY)
    };

    tick(&mut rep, 1, &[update(1)]);
    rep.post_response(ack(0));
    rep.post_response(ack(0));
    rep.post_response(ack(99));
    tick(&mut rep, 2, &[update(2)]);

    let stats = rep.last_stats();
    assert_eq!(stats.acks_processed, 3);
    assert_eq!(stats.baselines_committed, 1);
    assert_eq!(
        rep.objects().get(NetworkId::new(1)).unwrap().baseline_version(),
        Some(1)
    );
}

#[test]
fn moving_one_zone_reports_edges_for_one_frame() {
    let mut rep = replicator(ReplicationConfig::for_testing());
    let me = EntityId::new(1);
    rep.set_self(me, at(5.0, 5.0));

    tick(&mut rep, 1, &[]);
    assert!(rep.has_changed_zones());
    assert_eq!(rep.entered_zones().len(), 9);
    assert_eq!(rep.tracker().center(), Some(ORIGIN));

    rep.begin_frame(2);
    assert!(!rep.has_changed_zones());
    assert!(rep.entered_zones().is_empty());
    rep.state_changed(&StateBlock::new(2, ORIGIN).with_update(me, at(15.0, 5.0), DQuat::IDENTITY));
    rep.end_frame(2).unwrap();

    assert!(rep.has_changed_zones());
    let mut entered = rep.entered_zones().to_vec();
    let mut exited = rep.exited_zones().to_vec();
    entered.sort();
    exited.sort();
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

    rep.begin_frame(3);
    assert!(!rep.has_changed_zones());
    assert!(rep.entered_zones().is_empty());
    assert!(rep.exited_zones().is_empty());
    rep.state_changed(
        &StateBlock::new(3, ZoneKey::new(1, 0, 0)).with_update(me, at(16.0, 5.0), DQuat::IDENTITY),
    );
    rep.end_frame(3).unwrap();
    assert!(!rep.has_changed_zones());
}

#[test]
fn removal_of_unknown_entity_is_ignored() {
    let mut rep = replicator(ReplicationConfig::for_testing());
    tick(
        &mut rep,
        1,
        &[StateBlock::new(1, ORIGIN).with_removal(EntityId::new(77))],
    );
    assert_eq!(rep.object_count(), 0);
    assert!(rep.ids().is_empty());
}

#[test]
fn block_from_unknown_zone_is_still_applied() {
    let mut rep = replicator(ReplicationConfig::for_testing());
    rep.set_self(EntityId::new(1), at(0.0, 0.0));
    tick(&mut rep, 1, &[]);

    let far = ZoneKey::new(40, 40, 0);
    tick(
        &mut rep,
        2,
        &[StateBlock::new(2, far).with_update(EntityId::new(2), at(400.0, 400.0), DQuat::IDENTITY)],
    );
    let object = rep.objects().get(NetworkId::new(1)).unwrap();
    assert_eq!(object.snapshot().zone_id, 0);
    assert_eq!(object.last_zone(), Some(far));
}

#[test]
fn border_crossing_within_a_tick_keeps_object() {
    let mut rep = replicator(ReplicationConfig::for_testing());
    rep.set_self(EntityId::new(1), at(0.0, 0.0));
    tick(&mut rep, 1, &[]);

    let mover = EntityId::new(3);
    let east = ZoneKey::new(1, 0, 0);
    tick(
        &mut rep,
        2,
        &[StateBlock::new(2, ORIGIN).with_update(mover, at(9.0, 1.0), DQuat::IDENTITY)],
    );
    // The new zone reports first, the old zone's removal arrives after.
    tick(
        &mut rep,
        3,
        &[
            StateBlock::new(3, east).with_update(mover, at(11.0, 1.0), DQuat::IDENTITY),
            StateBlock::new(3, ORIGIN).with_removal(mover),
        ],
    );
    let object = rep.objects().get(NetworkId::new(1)).unwrap();
    assert_eq!(object.removal_state(), RemovalState::Active);
    assert_eq!(object.last_zone(), Some(east));
}

#[test]
fn reaped_id_is_reused_only_after_acks() {
    let mut rep = replicator(ReplicationConfig::for_testing());
    let first = EntityId::new(10);
    let second = EntityId::new(20);

    tick(
        &mut rep,
        1,
        &[StateBlock::new(1, ORIGIN).with_update(first, at(1.0, 1.0), DQuat::IDENTITY)],
    );
    tick(&mut rep, 2, &[]);
    tick(&mut rep, 3, &[]);
    assert_eq!(rep.object_count(), 0);

    tick(
        &mut rep,
        4,
        &[StateBlock::new(4, ORIGIN).with_update(second, at(1.0, 1.0), DQuat::IDENTITY)],
    );
    assert_eq!(rep.objects().get(NetworkId::new(2)).unwrap().entity(), second);

    for frame in 0..4 {
        rep.post_response(ack(frame));
    }
    tick(&mut rep, 5, &[]);
    assert_eq!(rep.last_stats().ids_released, 1);

    let third = EntityId::new(30);
    tick(
        &mut rep,
        6,
        &[StateBlock::new(6, ORIGIN).with_update(third, at(1.0, 1.0), DQuat::IDENTITY)],
    );
    assert_eq!(rep.objects().get(NetworkId::new(1)).unwrap().entity(), third);
}

#[test]
fn acks_posted_from_another_thread_are_drained() {
    let mut rep = replicator(ReplicationConfig::for_testing());
    let sender = rep.ack_sender();
    let handle = thread::spawn(move || {
        for frame in 0..50 {
            assert!(sender.post(ack(1_000 + frame)));
        }
    });
    handle.join().unwrap();

    tick(&mut rep, 1, &[]);
    assert_eq!(rep.last_stats().acks_processed, 50);
    assert_eq!(rep.last_stats().baselines_committed, 0);
    assert_eq!(rep.ping(), std::time::Duration::from_millis(1));
}

#[test]
fn large_frame_is_split_under_message_size() {
    let mut rep = replicator(ReplicationConfig::for_testing());
    rep.set_max_message_size(200);
    assert_eq!(rep.max_message_size(), 200);

    let mut block = StateBlock::new(1, ORIGIN);
    for raw in 0..40 {
        block = block.with_update(EntityId::new(raw), at(raw as f64 * 0.1, 1.0), DQuat::IDENTITY);
    }
    tick(&mut rep, 1, &[block]);

    let sent = messages(&rep);
    assert!(sent.len() > 1);
    for bytes in rep.writer().sink() {
        assert!(bytes.len() <= 200);
    }
    let mut ids: Vec<u32> = sent
        .iter()
        .flat_map(|m| m.states().map(|s| s.network_id.raw()))
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=40).collect::<Vec<_>>());
    assert!(sent.iter().all(|m| m.frames.len() == 1 && m.frames[0].time == 1));
}

#[test]
fn ticks_in_one_block_share_a_message() {
    let mut rep = replicator(ReplicationConfig::for_testing());
    rep.begin_frame_block().unwrap();
    for time in 1..=3 {
        rep.begin_frame(time);
        rep.end_frame(time).unwrap();
    }
    assert!(rep.writer().sink().is_empty());
    rep.end_frame_block().unwrap();

    let sent = messages(&rep);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].frames.len(), 3);
}

#[derive(Debug)]
struct ClosedSink;

impl MessageSink for ClosedSink {
    fn send(&mut self, _message: &[u8]) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn peer(&self) -> &str {
        "closed"
    }
}

#[test]
fn flush_failure_surfaces_from_end_frame_block() {
    let mut rep = ClientReplicator::with_clock(
        ClosedSink,
        grid(),
        ReplicationConfig::for_testing(),
        Arc::new(ManualClock::new(0)),
    );
    rep.begin_frame(1);
    rep.end_frame(1).unwrap();
    let err = rep.end_frame_block().unwrap_err();
    assert!(matches!(err, ReplicationError::Send { .. }));
}

#[test]
fn late_self_update_does_not_move_center_back() {
    let mut rep = replicator(ReplicationConfig::for_testing());
    let me = EntityId::new(1);
    let east = ZoneKey::new(1, 0, 0);
    rep.set_self(me, at(5.0, 5.0));

    tick(
        &mut rep,
        10,
        &[StateBlock::new(10, ORIGIN).with_update(me, at(5.0, 5.0), DQuat::IDENTITY)],
    );
    assert_eq!(rep.tracker().center(), Some(ORIGIN));

    // A block for tick 10 shows up after the tick 11 update.
    tick(
        &mut rep,
        11,
        &[
            StateBlock::new(11, east).with_update(me, at(15.0, 5.0), DQuat::IDENTITY),
            StateBlock::new(10, ORIGIN).with_update(me, at(5.0, 5.0), DQuat::IDENTITY),
        ],
    );
    let object = rep.objects().get(NetworkId::new(1)).unwrap();
    assert_eq!(object.version(), 11);
    assert_eq!(object.snapshot().position, at(15.0, 5.0));
    assert_eq!(rep.tracker().center(), Some(east));
    assert!(rep.has_changed_zones());
}

#[test]
fn ack_after_history_eviction_is_not_echoed() {
    let mut rep = replicator(ReplicationConfig::for_testing().with_history_capacity(2));
    let entity = EntityId::new(4);
    let id = NetworkId::new(1);
    let update = |time: u64| {
        StateBlock::new(time, ORIGIN).with_update(entity, at(time as f64, 1.0), DQuat::IDENTITY)
    };

    for time in 1..=4 {
        tick(&mut rep, time, &[update(time)]);
    }

    // Version 1 has left history by now.
    rep.post_response(ack(0));
    tick(&mut rep, 5, &[update(5)]);
    let stats = rep.last_stats();
    assert_eq!(stats.acks_processed, 1);
    assert_eq!(stats.baselines_committed, 0);
    assert_eq!(stats.acks_unconfirmed, 1);
    assert_eq!(rep.objects().get(id).unwrap().baseline_version(), None);

    let sent = messages(&rep);
    assert!(sent[4].acked.is_empty());
    let full = states_for(&sent[4], id);
    assert_eq!(full[0].baseline_version, None);
    assert_eq!(full[0].entity_id, Some(entity));

    // Version 4 is still held, so this one commits and is echoed.
    rep.post_response(ack(3));
    tick(&mut rep, 6, &[update(6)]);
    assert_eq!(rep.last_stats().baselines_committed, 1);
    assert_eq!(rep.last_stats().acks_unconfirmed, 0);

    let sent = messages(&rep);
    assert_eq!(sent[5].acked, vec![FrameId::new(3)]);
    let delta = states_for(&sent[5], id);
    assert_eq!(delta[0].baseline_version, Some(4));
    assert_eq!(delta[0].entity_id, None);
}
