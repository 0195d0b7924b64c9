//! Objects currently replicated to one connection.

use std::collections::btree_map::{self, BTreeMap};

use log::debug;
use wire::NetworkId;
use zone::EntityId;

use crate::object::{BaselineCommit, ReplicatedObject};
use crate::writer::SentFrame;

/// What committing one acknowledged message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCommit {
    /// Baselines that moved.
    pub moved: usize,
    /// Every carried object that still exists has a baseline at or past the
    /// acknowledged version.
    pub settled: bool,
}

/// Replicated objects keyed by network id.
#[derive(Debug)]
pub struct ObjectTable {
    objects: BTreeMap<NetworkId, ReplicatedObject>,
    history_capacity: usize,
}

impl ObjectTable {
    #[must_use]
    pub fn new(history_capacity: usize) -> Self {
        Self {
            objects: BTreeMap::new(),
            history_capacity,
        }
    }

    pub fn get_or_create(&mut self, id: NetworkId, entity: EntityId) -> &mut ReplicatedObject {
        let capacity = self.history_capacity;
        self.objects
            .entry(id)
            .or_insert_with(|| ReplicatedObject::new(id, entity, capacity))
    }

    #[must_use]
    pub fn get(&self, id: NetworkId) -> Option<&ReplicatedObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: NetworkId) -> Option<&mut ReplicatedObject> {
        self.objects.get_mut(&id)
    }

    pub fn remove(&mut self, id: NetworkId) -> Option<ReplicatedObject> {
        self.objects.remove(&id)
    }

    pub fn iter(&self) -> btree_map::Values<'_, NetworkId, ReplicatedObject> {
        self.objects.values()
    }

    pub fn iter_mut(&mut self) -> btree_map::ValuesMut<'_, NetworkId, ReplicatedObject> {
        self.objects.values_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Commits every `(id, version)` carried by an acknowledged message.
    pub fn commit(&mut self, sent: &SentFrame) -> TableCommit {
        let mut result = TableCommit {
            moved: 0,
            settled: true,
        };
        for &(id, version) in &sent.states {
            // A reaped object needs no baseline.
            let Some(object) = self.objects.get_mut(&id) else {
                continue;
            };
            match object.commit_baseline(version) {
                BaselineCommit::Moved => result.moved += 1,
                BaselineCommit::Covered => {}
                BaselineCommit::Missing => {
                    debug!("{id} v{version} left history before {} was acked", sent.id);
                    result.settled = false;
                }
            }
        }
        result
    }
}
