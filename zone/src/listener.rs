//! Per-connection frame listener interface.

use crate::block::StateBlock;
use crate::key::ZoneKey;

/// Receives zone state from a zone manager, one tick at a time.
///
/// A zone manager drives every listener through the same sequence:
///
/// ```text
/// begin_frame_block
///   begin_frame(t)  state_changed(block)*  end_frame(t)
///   ...
/// end_frame_block
/// ```
///
/// All `state_changed` calls for tick `t` must complete before
/// `end_frame(t)`. After `end_frame`, the manager reads
/// [`has_changed_zones`](Self::has_changed_zones) and the entered/exited
/// lists to adjust which zones it routes to this listener.
pub trait FrameListener {
    type Error;

    fn has_changed_zones(&self) -> bool;

    fn entered_zones(&self) -> &[ZoneKey];

    fn exited_zones(&self) -> &[ZoneKey];

    fn begin_frame_block(&mut self) -> Result<(), Self::Error>;

    /// Flushes anything still buffered for the block.
    fn end_frame_block(&mut self) -> Result<(), Self::Error>;

    fn begin_frame(&mut self, time: u64);

    fn end_frame(&mut self, time: u64) -> Result<(), Self::Error>;

    fn state_changed(&mut self, block: &StateBlock);
}
