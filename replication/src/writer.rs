//! Outbound message buffering.
//!
//! Frames are packed into messages up to the configured size. A frame that
//! does not fit is continued in the next message with its header repeated,
//! so every message can be applied on its own.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::{debug, trace};
use wire::{
    encode_message, frame_header_bits, message_header_bits, Frame, FrameId, FrameMessage,
    NetworkId, ObjectState,
};
use zone::ZoneKey;

use crate::clock::Clock;
use crate::error::{ReplicationError, ReplicationResult};
use crate::sink::MessageSink;

/// Most acknowledged ids echoed in one message header.
pub const MAX_ECHOED_ACKS: usize = 64;

/// What one sent message carried, kept until the client acknowledges it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub id: FrameId,
    pub sent_time: u64,
    pub states: Vec<(NetworkId, u64)>,
    /// Acknowledged ids this message echoed back to the client.
    pub acked: Vec<FrameId>,
}

#[derive(Debug)]
pub struct FrameWriter<S> {
    sink: S,
    clock: Arc<dyn Clock>,
    max_message_size: usize,
    max_outstanding: usize,
    next_id: FrameId,
    frames: Vec<Frame>,
    acked: Vec<FrameId>,
    carried: Vec<(NetworkId, u64)>,
    pending_bits: usize,
    sent: BTreeMap<FrameId, SentFrame>,
    echo: BTreeSet<FrameId>,
    messages_sent: u64,
    bytes_sent: u64,
}

impl<S: MessageSink> FrameWriter<S> {
    pub fn new(
        sink: S,
        clock: Arc<dyn Clock>,
        max_message_size: usize,
        max_outstanding: usize,
    ) -> Self {
        Self {
            sink,
            clock,
            max_message_size,
            max_outstanding: max_outstanding.max(1),
            next_id: FrameId::new(0),
            frames: Vec::new(),
            acked: Vec::new(),
            carried: Vec::new(),
            pending_bits: 0,
            sent: BTreeMap::new(),
            echo: BTreeSet::new(),
            messages_sent: 0,
            bytes_sent: 0,
        }
    }

    #[must_use]
    pub const fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Takes effect from the next state added.
    pub fn set_max_message_size(&mut self, bytes: usize) {
        self.max_message_size = bytes;
    }

    /// Id the message currently being built will be sent with.
    #[must_use]
    pub const fn current_id(&self) -> FrameId {
        self.next_id
    }

    /// Every message with an id below this is acknowledged or expired.
    #[must_use]
    pub fn settled_before(&self) -> FrameId {
        self.sent.keys().next().copied().unwrap_or(self.next_id)
    }

    #[must_use]
    pub fn pending_sent_frames(&self) -> usize {
        self.sent.len()
    }

    /// Acknowledged ids the next message will echo, oldest first.
    pub fn echoed_acks(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.echo.iter().copied()
    }

    #[must_use]
    pub fn has_buffered(&self) -> bool {
        !self.frames.is_empty()
    }

    #[must_use]
    pub const fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    #[must_use]
    pub const fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Starts a frame, sending the buffered message first if the frame
    /// header would not fit.
    pub fn start_frame(&mut self, time: u64, center: Option<ZoneKey>) -> ReplicationResult<()> {
        let header = frame_header_bits(time, center);
        if !self.frames.is_empty() && self.pending_bits + header > self.max_bits() {
            self.flush()?;
        }
        self.push_frame(time, center);
        Ok(())
    }

    /// Appends a state to the current frame, splitting the frame across
    /// messages when the size limit is reached.
    pub fn add_state(&mut self, state: ObjectState) -> ReplicationResult<()> {
        let Some(frame) = self.frames.last() else {
            return Err(ReplicationError::FrameNotStarted);
        };
        let (time, center) = (frame.time, frame.center);
        let bits = state.encoded_bits();

        if self.pending_bits + bits > self.max_bits() {
            let fresh = self.fresh_message_bits() + frame_header_bits(time, center) + bits;
            if fresh > self.max_bits() {
                return Err(ReplicationError::StateTooLarge {
                    network_id: state.network_id,
                    bits: fresh,
                    max_bits: self.max_bits(),
                });
            }
            trace!("splitting frame at time {time} for {}", self.sink.peer());
            self.flush()?;
            self.push_frame(time, center);
        }

        self.pending_bits += bits;
        self.carried.push((state.network_id, state.version));
        if let Some(frame) = self.frames.last_mut() {
            frame.states.push(state);
        }
        Ok(())
    }

    /// Sends the buffered message, if any.
    pub fn flush(&mut self) -> ReplicationResult<()> {
        if self.frames.is_empty() {
            return Ok(());
        }
        let message = FrameMessage {
            id: self.next_id,
            sent_time: self.clock.now_nanos(),
            acked: std::mem::take(&mut self.acked),
            frames: std::mem::take(&mut self.frames),
        };
        let carried = std::mem::take(&mut self.carried);
        self.pending_bits = 0;

        let bytes = encode_message(&message).map_err(|source| ReplicationError::Encode {
            frame_id: message.id,
            source,
        })?;
        self.sink
            .send(&bytes)
            .map_err(|source| ReplicationError::Send {
                frame_id: message.id,
                source,
            })?;

        trace!(
            "sent {} to {}: {} frames, {} states, {} bytes",
            message.id,
            self.sink.peer(),
            message.frames.len(),
            carried.len(),
            bytes.len()
        );
        self.messages_sent += 1;
        self.bytes_sent += bytes.len() as u64;
        self.next_id = self.next_id.next();

        self.sent.insert(
            message.id,
            SentFrame {
                id: message.id,
                sent_time: message.sent_time,
                states: carried,
                acked: message.acked,
            },
        );
        while self.sent.len() > self.max_outstanding {
            if let Some((id, _)) = self.sent.pop_first() {
                debug!("{id} to {} expired unacknowledged", self.sink.peer());
            }
        }
        Ok(())
    }

    /// Consumes the record for an acknowledged message.
    ///
    /// Returns `None` for unknown, expired or already acknowledged ids. The
    /// id is not echoed until [`echo_ack`](Self::echo_ack) is called for it.
    pub fn ack_sent_state(&mut self, id: FrameId) -> Option<SentFrame> {
        let sent = self.sent.remove(&id)?;
        // The client has seen these echoes now.
        for echoed in &sent.acked {
            self.echo.remove(echoed);
        }
        Some(sent)
    }

    /// Echoes `id` in the headers of following messages. Only call this once
    /// every baseline the acknowledged message could move is in place.
    pub fn echo_ack(&mut self, id: FrameId) {
        self.echo.insert(id);
        while self.echo.len() > MAX_ECHOED_ACKS {
            self.echo.pop_first();
        }
    }

    fn max_bits(&self) -> usize {
        self.max_message_size.saturating_mul(8)
    }

    fn fresh_message_bits(&self) -> usize {
        let acked: Vec<FrameId> = self.echo.iter().copied().collect();
        message_header_bits(self.next_id, u64::MAX, &acked)
    }

    fn push_frame(&mut self, time: u64, center: Option<ZoneKey>) {
        if self.frames.is_empty() {
            self.acked = self.echo.iter().copied().collect();
            self.pending_bits = message_header_bits(self.next_id, u64::MAX, &self.acked);
        }
        self.pending_bits += frame_header_bits(time, center);
        self.frames.push(Frame {
            time,
            center,
            states: Vec::new(),
        });
    }
}
