//! Per-zone, per-tick state batches.

use glam::{DQuat, DVec3};

use crate::key::ZoneKey;
use crate::types::EntityId;

/// One entity's position and rotation for a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateEntry {
    pub entity: EntityId,
    pub position: DVec3,
    pub rotation: DQuat,
}

impl StateEntry {
    #[must_use]
    pub const fn new(entity: EntityId, position: DVec3, rotation: DQuat) -> Self {
        Self {
            entity,
            position,
            rotation,
        }
    }
}

/// Everything that happened in one zone during one tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateBlock {
    pub time: u64,
    pub zone: ZoneKey,
    pub updates: Vec<StateEntry>,
    pub removals: Vec<EntityId>,
}

impl StateBlock {
    #[must_use]
    pub const fn new(time: u64, zone: ZoneKey) -> Self {
        Self {
            time,
            zone,
            updates: Vec::new(),
            removals: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_update(mut self, entity: EntityId, position: DVec3, rotation: DQuat) -> Self {
        self.updates.push(StateEntry::new(entity, position, rotation));
        self
    }

    #[must_use]
    pub fn with_removal(mut self, entity: EntityId) -> Self {
        self.removals.push(entity);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.removals.is_empty()
    }
}
