//! Per-connection frame lifecycle.

use std::sync::Arc;
use std::time::Duration;

use glam::DVec3;
use log::{debug, trace, warn};
use wire::{ClientAck, FrameId};
use zone::{EntityId, FrameListener, StateBlock, ZoneCenterTracker, ZoneGrid, ZoneKey};

use crate::clock::{Clock, MonotonicClock};
use crate::config::ReplicationConfig;
use crate::coordinator::{AckSender, BaselineCoordinator};
use crate::error::{ReplicationError, ReplicationResult};
use crate::ids::IdentifierTable;
use crate::ping::PingEstimator;
use crate::projector::FrameProjector;
use crate::sink::MessageSink;
use crate::table::ObjectTable;
use crate::writer::FrameWriter;

/// What the last `end_frame` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub time: u64,
    pub acks_processed: usize,
    pub baselines_committed: usize,
    pub acks_unconfirmed: usize,
    pub states_emitted: usize,
    pub marked_removed: usize,
    pub reaped: usize,
    pub ids_released: usize,
}

/// Replicates the zones around one client's "self" entity to that client.
///
/// Driven by a zone manager through [`FrameListener`]. All methods except
/// [`post_response`](Self::post_response) and the [`AckSender`] belong to
/// the tick thread. Every `state_changed` call for a tick must happen before
/// `end_frame` for that tick; this is the caller's responsibility.
#[derive(Debug)]
pub struct ClientReplicator<S> {
    config: ReplicationConfig,
    tracker: ZoneCenterTracker,
    ids: IdentifierTable,
    objects: ObjectTable,
    writer: FrameWriter<S>,
    coordinator: BaselineCoordinator,
    projector: FrameProjector,
    self_entity: Option<EntityId>,
    self_position: DVec3,
    zones_changed: bool,
    entered: Vec<ZoneKey>,
    exited: Vec<ZoneKey>,
    last_stats: FrameStats,
}

impl<S: MessageSink> ClientReplicator<S> {
    pub fn new(sink: S, grid: ZoneGrid, config: ReplicationConfig) -> Self {
        Self::with_clock(sink, grid, config, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        sink: S,
        grid: ZoneGrid,
        config: ReplicationConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ping = PingEstimator::new(config.ping_window, config.ping_log_threshold());
        Self {
            tracker: ZoneCenterTracker::new(grid, config.zone_radius),
            ids: IdentifierTable::new(config.first_network_id),
            objects: ObjectTable::new(config.history_capacity),
            writer: FrameWriter::new(
                sink,
                clock.clone(),
                config.max_message_size,
                config.max_outstanding_frames,
            ),
            coordinator: BaselineCoordinator::new(clock, ping),
            projector: FrameProjector::new(),
            self_entity: None,
            self_position: DVec3::ZERO,
            zones_changed: false,
            entered: Vec::new(),
            exited: Vec::new(),
            last_stats: FrameStats::default(),
            config,
        }
    }

    /// Sets the entity whose position decides the visible zones. The center
    /// is recomputed at the next `end_frame`.
    pub fn set_self(&mut self, entity: EntityId, starting_position: DVec3) {
        self.self_entity = Some(entity);
        self.self_position = starting_position;
    }

    #[must_use]
    pub const fn self_entity(&self) -> Option<EntityId> {
        self.self_entity
    }

    pub fn set_max_message_size(&mut self, bytes: usize) {
        self.writer.set_max_message_size(bytes);
    }

    #[must_use]
    pub const fn max_message_size(&self) -> usize {
        self.writer.max_message_size()
    }

    /// Queues a client ack. Safe to call from any thread holding a shared
    /// reference; see [`ack_sender`](Self::ack_sender) for a handle that can
    /// be moved to the transport thread.
    pub fn post_response(&self, ack: ClientAck) {
        self.coordinator.post(ack);
    }

    #[must_use]
    pub fn ack_sender(&self) -> AckSender {
        self.coordinator.sender()
    }

    /// Smoothed round-trip time.
    #[must_use]
    pub fn ping(&self) -> Duration {
        self.coordinator.ping().estimate()
    }

    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub const fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    #[must_use]
    pub const fn ids(&self) -> &IdentifierTable {
        &self.ids
    }

    #[must_use]
    pub const fn tracker(&self) -> &ZoneCenterTracker {
        &self.tracker
    }

    #[must_use]
    pub const fn writer(&self) -> &FrameWriter<S> {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut FrameWriter<S> {
        &mut self.writer
    }

    #[must_use]
    pub fn pending_sent_frames(&self) -> usize {
        self.writer.pending_sent_frames()
    }

    #[must_use]
    pub const fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    #[must_use]
    pub const fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Id the next message will carry.
    #[must_use]
    pub const fn next_frame_id(&self) -> FrameId {
        self.writer.current_id()
    }

    pub fn into_sink(self) -> S {
        self.writer.into_sink()
    }

    fn apply_updates(&mut self, block: &StateBlock, zone_id: u32) {
        for entry in &block.updates {
            let Some(id) = self.ids.get_or_assign(entry.entity, true) else {
                warn!("no network id left for {}", entry.entity);
                continue;
            };
            let object = self.objects.get_or_create(id, entry.entity);
            if !object.update_state(
                block.time,
                block.zone,
                zone_id,
                entry.position,
                entry.rotation,
            ) {
                trace!("stale update for {} at {}", entry.entity, block.time);
                continue;
            }
            if self.self_entity == Some(entry.entity) {
                self.self_position = entry.position;
            }
        }
    }

    fn apply_removals(&mut self, block: &StateBlock) {
        for &entity in &block.removals {
            let Some(id) = self.ids.get_or_assign(entity, false) else {
                continue;
            };
            if let Some(object) = self.objects.get_mut(id) {
                object.mark_removed_from(block.time, block.zone);
            }
        }
    }
}

impl<S: MessageSink> FrameListener for ClientReplicator<S> {
    type Error = ReplicationError;

    fn has_changed_zones(&self) -> bool {
        self.zones_changed
    }

    fn entered_zones(&self) -> &[ZoneKey] {
        &self.entered
    }

    fn exited_zones(&self) -> &[ZoneKey] {
        &self.exited
    }

    fn begin_frame_block(&mut self) -> ReplicationResult<()> {
        Ok(())
    }

    fn end_frame_block(&mut self) -> ReplicationResult<()> {
        self.writer.flush()
    }

    fn begin_frame(&mut self, _time: u64) {
        if self.zones_changed {
            self.entered.clear();
            self.exited.clear();
            self.zones_changed = false;
        }
    }

    fn end_frame(&mut self, time: u64) -> ReplicationResult<()> {
        let acks = self.coordinator.drain(&mut self.writer, &mut self.objects);
        let ids_released = self.ids.release_settled(self.writer.settled_before());

        self.writer.start_frame(time, self.tracker.center())?;
        let projection =
            self.projector
                .project(time, &mut self.objects, &mut self.ids, &mut self.writer)?;

        // Zone ids must stay fixed while the tick's blocks are applied, so
        // the center only moves once everything has been written.
        if self.self_entity.is_some()
            && self
                .tracker
                .set_center(self.self_position, &mut self.entered, &mut self.exited)
        {
            debug!(
                "{} now centered on {:?}: {} zones entered, {} exited",
                self.writer.sink().peer(),
                self.tracker.center(),
                self.entered.len(),
                self.exited.len()
            );
            self.zones_changed = true;
        }

        self.last_stats = FrameStats {
            time,
            acks_processed: acks.acks_processed,
            baselines_committed: acks.baselines_committed,
            acks_unconfirmed: acks.unconfirmed,
            states_emitted: projection.states_emitted,
            marked_removed: projection.marked_removed,
            reaped: projection.reaped,
            ids_released,
        };
        Ok(())
    }

    fn state_changed(&mut self, block: &StateBlock) {
        let zone_id = match self.tracker.zone_id(block.zone) {
            Some(zone_id) => zone_id,
            None => {
                warn!(
                    "{}: no zone id for {} at time {}",
                    self.writer.sink().peer(),
                    block.zone,
                    block.time
                );
                0
            }
        };
        self.apply_updates(block, zone_id);
        self.apply_removals(block);
    }
}

