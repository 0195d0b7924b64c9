//! Server-side view of one replicated object.

use glam::{DQuat, DVec3};
use log::{trace, warn};
use wire::{NetworkId, ObjectState};
use zone::{EntityId, ZoneKey};

use crate::history::StateHistory;

/// Full state of an object at one version.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectSnapshot {
    pub version: u64,
    pub zone_id: u32,
    pub position: DVec3,
    pub rotation: DQuat,
    pub removed: bool,
}

impl Default for ObjectSnapshot {
    fn default() -> Self {
        Self {
            version: 0,
            zone_id: 0,
            position: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            removed: false,
        }
    }
}

/// Outcome of applying an acknowledged version to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineCommit {
    /// The baseline moved to the acknowledged version.
    Moved,
    /// The baseline already was at or past it.
    Covered,
    /// The version left history before the ack arrived.
    Missing,
}

impl BaselineCommit {
    /// Whether the server's baseline now includes the acknowledged version.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Moved | Self::Covered)
    }
}

/// Removal progress of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalState {
    Active,
    /// Removed; the client still has to be told.
    MarkedRemoved,
    /// The removal has been sent; the object can be reaped.
    FullyRemoved,
}

#[derive(Debug)]
pub struct ReplicatedObject {
    network_id: NetworkId,
    entity: EntityId,
    current: ObjectSnapshot,
    last_zone: Option<ZoneKey>,
    baseline: Option<ObjectSnapshot>,
    history: StateHistory<ObjectSnapshot>,
    removal: RemovalState,
    removal_sent_at: Option<u64>,
}

impl ReplicatedObject {
    #[must_use]
    pub fn new(network_id: NetworkId, entity: EntityId, history_capacity: usize) -> Self {
        Self {
            network_id,
            entity,
            current: ObjectSnapshot::default(),
            last_zone: None,
            baseline: None,
            history: StateHistory::new(history_capacity),
            removal: RemovalState::Active,
            removal_sent_at: None,
        }
    }

    #[must_use]
    pub const fn network_id(&self) -> NetworkId {
        self.network_id
    }

    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.current.version
    }

    #[must_use]
    pub const fn snapshot(&self) -> &ObjectSnapshot {
        &self.current
    }

    /// Zone that last refreshed or removed the object.
    #[must_use]
    pub const fn last_zone(&self) -> Option<ZoneKey> {
        self.last_zone
    }

    #[must_use]
    pub fn baseline_version(&self) -> Option<u64> {
        self.baseline.map(|base| base.version)
    }

    #[must_use]
    pub const fn removal_state(&self) -> RemovalState {
        self.removal
    }

    /// Applies an update from `zone` at `time`.
    ///
    /// Returns `false` if the update is older than the current version. An
    /// update revives a removed object; if the client was already told about
    /// the removal, the object starts over with no baseline.
    pub fn update_state(
        &mut self,
        time: u64,
        zone: ZoneKey,
        zone_id: u32,
        position: DVec3,
        rotation: DQuat,
    ) -> bool {
        if time < self.current.version {
            return false;
        }
        if self.removal != RemovalState::Active {
            if self.removal_sent_at.is_some() {
                trace!("{} reappeared after removal was sent", self.network_id);
                self.baseline = None;
                self.history.clear();
            }
            self.removal = RemovalState::Active;
            self.removal_sent_at = None;
        }
        self.current = ObjectSnapshot {
            version: time,
            zone_id,
            position,
            rotation,
            removed: false,
        };
        self.last_zone = Some(zone);
        true
    }

    /// Applies a removal reported by `zone` at `time`.
    ///
    /// Ignored if the object was refreshed at the same time by another zone,
    /// which happens when it crosses between two visible zones in one tick.
    pub fn mark_removed_from(&mut self, time: u64, zone: ZoneKey) -> bool {
        if self.current.version == time
            && !self.current.removed
            && self.last_zone.is_some_and(|last| last != zone)
        {
            return false;
        }
        if self.mark_removed(time) {
            self.last_zone = Some(zone);
            true
        } else {
            false
        }
    }

    /// Marks the object removed at `time` unless already removed or `time`
    /// is stale.
    pub fn mark_removed(&mut self, time: u64) -> bool {
        if self.removal != RemovalState::Active || time < self.current.version {
            return false;
        }
        self.current.version = time;
        self.current.removed = true;
        self.removal = RemovalState::MarkedRemoved;
        true
    }

    /// Marks the object removed if nothing refreshed it at `time`.
    pub fn expire(&mut self, time: u64) -> bool {
        self.removal == RemovalState::Active && self.current.version < time && self.mark_removed(time)
    }

    /// Moves a removal that was sent in an earlier frame to
    /// [`RemovalState::FullyRemoved`].
    pub fn advance_removal(&mut self, time: u64) {
        if self.removal == RemovalState::MarkedRemoved
            && self.removal_sent_at.is_some_and(|sent| sent < time)
        {
            self.removal = RemovalState::FullyRemoved;
        }
    }

    /// Builds the state to send for the frame at `time`, relative to the
    /// confirmed baseline, and remembers it for later acknowledgment.
    pub fn delta(&mut self, time: u64) -> ObjectState {
        let current = self.current;
        let state = match self.baseline {
            None => ObjectState {
                network_id: self.network_id,
                version: current.version,
                baseline_version: None,
                removed: current.removed,
                entity_id: Some(self.entity),
                zone_id: Some(current.zone_id),
                position: Some(current.position),
                rotation: Some(current.rotation),
            },
            Some(base) => ObjectState {
                network_id: self.network_id,
                version: current.version,
                baseline_version: Some(base.version),
                removed: current.removed,
                entity_id: None,
                zone_id: (current.zone_id != base.zone_id).then_some(current.zone_id),
                position: (current.position != base.position).then_some(current.position),
                rotation: (current.rotation != base.rotation).then_some(current.rotation),
            },
        };

        if self.history.last_version() != Some(current.version)
            && self.baseline_version() != Some(current.version)
        {
            if let Err(err) = self.history.insert(current.version, current) {
                warn!("{}: {err}", self.network_id);
            }
        }
        if current.removed && self.removal_sent_at.is_none() {
            self.removal_sent_at = Some(time);
        }
        state
    }

    /// Makes `version` the baseline if it is newer than the current one and
    /// still in history.
    pub fn commit_baseline(&mut self, version: u64) -> BaselineCommit {
        if self.baseline_version().is_some_and(|base| base >= version) {
            return BaselineCommit::Covered;
        }
        let Some(snapshot) = self.history.get(version).copied() else {
            return BaselineCommit::Missing;
        };
        self.baseline = Some(snapshot);
        self.history.drop_through(version);
        BaselineCommit::Moved
    }
}
