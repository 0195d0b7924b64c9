//! Bounded history of emitted object states.

use std::collections::VecDeque;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// Versions must be strictly increasing.
    #[error("version {new_version} is not after {last_version}")]
    OutOfOrder { last_version: u64, new_version: u64 },
}

/// Ring of states keyed by version, oldest first.
///
/// When full, inserting evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct StateHistory<T> {
    entries: VecDeque<(u64, T)>,
    capacity: usize,
}

impl<T> StateHistory<T> {
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn last_version(&self) -> Option<u64> {
        self.entries.back().map(|(version, _)| *version)
    }

    pub fn insert(&mut self, version: u64, value: T) -> Result<(), HistoryError> {
        if let Some(last) = self.last_version() {
            if version <= last {
                return Err(HistoryError::OutOfOrder {
                    last_version: last,
                    new_version: version,
                });
            }
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((version, value));
        Ok(())
    }

    #[must_use]
    pub fn get(&self, version: u64) -> Option<&T> {
        self.entries
            .binary_search_by_key(&version, |(v, _)| *v)
            .ok()
            .map(|idx| &self.entries[idx].1)
    }

    /// Drops every entry at or before `version`.
    pub fn drop_through(&mut self, version: u64) {
        while self
            .entries
            .front()
            .is_some_and(|(v, _)| *v <= version)
        {
            self.entries.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (u64, &T)> {
        self.entries.iter().map(|(version, value)| (*version, value))
    }
}
