//! Compact network identifiers for stable entity ids.

use std::collections::{BTreeSet, HashMap, VecDeque};

use log::trace;
use wire::{FrameId, NetworkId};
use zone::EntityId;

/// Maps entity ids to the small per-connection ids used on the wire.
///
/// Allocation always picks the smallest unused id. Retired ids are held in
/// quarantine until every message that could still mention them has been
/// acknowledged or expired, then become reusable.
#[derive(Debug)]
pub struct IdentifierTable {
    next: u32,
    free: BTreeSet<u32>,
    by_entity: HashMap<EntityId, NetworkId>,
    by_network: HashMap<NetworkId, EntityId>,
    quarantine: VecDeque<(FrameId, NetworkId)>,
}

impl IdentifierTable {
    #[must_use]
    pub fn new(first_network_id: u32) -> Self {
        Self {
            next: first_network_id,
            free: BTreeSet::new(),
            by_entity: HashMap::new(),
            by_network: HashMap::new(),
            quarantine: VecDeque::new(),
        }
    }

    /// Returns the id for `entity`, allocating one if `create` is set.
    ///
    /// Returns `None` when the entity is unknown and `create` is false, or
    /// when the id space is exhausted.
    pub fn get_or_assign(&mut self, entity: EntityId, create: bool) -> Option<NetworkId> {
        if let Some(&id) = self.by_entity.get(&entity) {
            return Some(id);
        }
        if !create {
            return None;
        }
        let raw = match self.free.pop_first() {
            Some(raw) => raw,
            None => {
                let raw = self.next;
                self.next = self.next.checked_add(1)?;
                raw
            }
        };
        let id = NetworkId::new(raw);
        self.by_entity.insert(entity, id);
        self.by_network.insert(id, entity);
        trace!("assigned {id} to {entity}");
        Some(id)
    }

    #[must_use]
    pub fn entity(&self, id: NetworkId) -> Option<EntityId> {
        self.by_network.get(&id).copied()
    }

    /// Drops the mapping for `id` and quarantines it.
    ///
    /// `watermark` is the id of the last message that may reference it.
    pub fn retire(&mut self, id: NetworkId, watermark: FrameId) {
        let Some(entity) = self.by_network.remove(&id) else {
            return;
        };
        self.by_entity.remove(&entity);
        debug_assert!(self
            .quarantine
            .back()
            .map_or(true, |(last, _)| *last <= watermark));
        self.quarantine.push_back((watermark, id));
        trace!("retired {id} from {entity} until {watermark} settles");
    }

    /// Returns quarantined ids to the free list once every message before
    /// `settled_before` is settled. Returns how many were released.
    pub fn release_settled(&mut self, settled_before: FrameId) -> usize {
        let mut released = 0;
        while let Some(&(watermark, id)) = self.quarantine.front() {
            if watermark >= settled_before {
                break;
            }
            self.quarantine.pop_front();
            self.free.insert(id.raw());
            released += 1;
        }
        released
    }

    /// Number of ids currently mapped to an entity.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_entity.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }

    #[must_use]
    pub fn quarantined_len(&self) -> usize {
        self.quarantine.len()
    }
}
