//! Per-frame walk over replicated objects.

use log::debug;
use wire::NetworkId;

use crate::error::ReplicationResult;
use crate::ids::IdentifierTable;
use crate::object::RemovalState;
use crate::sink::MessageSink;
use crate::table::ObjectTable;
use crate::writer::FrameWriter;

/// Counts from one projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionSummary {
    pub states_emitted: usize,
    pub marked_removed: usize,
    pub reaped: usize,
}

/// Emits one state per tracked object and reaps finished removals.
///
/// Reaping happens after the walk so the table is never mutated while
/// iterating.
#[derive(Debug, Default)]
pub struct FrameProjector {
    reap: Vec<NetworkId>,
}

impl FrameProjector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes the frame at `time` into `writer`, which must have a frame
    /// started.
    pub fn project<S: MessageSink>(
        &mut self,
        time: u64,
        objects: &mut ObjectTable,
        ids: &mut IdentifierTable,
        writer: &mut FrameWriter<S>,
    ) -> ReplicationResult<ProjectionSummary> {
        let mut summary = ProjectionSummary::default();
        self.reap.clear();

        for object in objects.iter_mut() {
            if object.expire(time) {
                debug!(
                    "{} left the visible zones, marking removed",
                    object.entity()
                );
                summary.marked_removed += 1;
            }
            object.advance_removal(time);

            writer.add_state(object.delta(time))?;
            summary.states_emitted += 1;

            if object.removal_state() == RemovalState::FullyRemoved {
                self.reap.push(object.network_id());
            }
        }

        // Every delta so far sits in the current message or an earlier one.
        let watermark = writer.current_id();
        for id in self.reap.drain(..) {
            if let Some(object) = objects.remove(id) {
                debug!("reaped {} ({id})", object.entity());
            }
            ids.retire(id, watermark);
            summary.reaped += 1;
        }
        Ok(summary)
    }
}
