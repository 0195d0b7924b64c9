//! Server-to-client frame messages.

use bitstream::{BitReader, BitWriter};
use zone::ZoneKey;

use crate::error::{DecodeError, EncodeError, LimitKind, WireResult};
use crate::header::{expect_kind, write_header, MessageKind};
use crate::limits::Limits;
use crate::state::ObjectState;
use crate::types::FrameId;
use crate::COUNT_FIELD_BITS;

/// One tick's worth of object states.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub time: u64,
    pub center: Option<ZoneKey>,
    pub states: Vec<ObjectState>,
}

/// One transmitted message: an id to acknowledge, the echoed acks, and the
/// frames it carries.
///
/// A frame that does not fit continues in the next message under a repeated
/// frame header, so the same `time` may appear in consecutive messages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameMessage {
    pub id: FrameId,
    /// Sender clock in nanoseconds, echoed back in the client's ack.
    pub sent_time: u64,
    pub acked: Vec<FrameId>,
    pub frames: Vec<Frame>,
}

impl FrameMessage {
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.frames.iter().map(|frame| frame.states.len()).sum()
    }

    pub fn states(&self) -> impl Iterator<Item = &ObjectState> {
        self.frames.iter().flat_map(|frame| frame.states.iter())
    }
}

/// Upper bound, in bits, of the message header for `id` and `acked`,
/// including the frame count field.
#[must_use]
pub fn message_header_bits(id: FrameId, sent_time: u64, acked: &[FrameId]) -> usize {
    8 + var_bits(id.raw())
        + var_bits(sent_time)
        + var_bits(acked.len() as u64)
        + acked.iter().map(|ack| var_bits(ack.raw())).sum::<usize>()
        + COUNT_FIELD_BITS
}

/// Upper bound, in bits, of one frame header including its state count field.
#[must_use]
pub fn frame_header_bits(time: u64, center: Option<ZoneKey>) -> usize {
    let center_bits = center.map_or(0, |key| {
        zigzag_bits(key.x) + zigzag_bits(key.y) + zigzag_bits(key.z)
    });
    var_bits(time) + 1 + center_bits + COUNT_FIELD_BITS
}

pub fn encode_message(message: &FrameMessage) -> Result<Vec<u8>, EncodeError> {
    let mut writer = BitWriter::with_capacity(256);
    write_header(&mut writer, MessageKind::Frames)?;
    writer.write_varu64(message.id.raw());
    writer.write_varu64(message.sent_time);

    writer.write_varu32(count(message.acked.len(), LimitKind::AcksPerHeader)?);
    for ack in &message.acked {
        writer.write_varu64(ack.raw());
    }

    writer.write_varu32(count(message.frames.len(), LimitKind::FramesPerMessage)?);
    for frame in &message.frames {
        writer.write_varu64(frame.time);
        writer.write_bit(frame.center.is_some());
        if let Some(center) = frame.center {
            writer.write_vars32(center.x);
            writer.write_vars32(center.y);
            writer.write_vars32(center.z);
        }
        writer.write_varu32(count(frame.states.len(), LimitKind::StatesPerFrame)?);
        for state in &frame.states {
            state.write(&mut writer);
        }
    }
    Ok(writer.finish())
}

pub fn decode_message(bytes: &[u8], limits: &Limits) -> WireResult<FrameMessage> {
    Limits::check(limits.max_message_bytes, bytes.len(), LimitKind::MessageBytes)?;
    let mut reader = BitReader::new(bytes);
    expect_kind(&mut reader, MessageKind::Frames)?;
    let id = FrameId::new(reader.read_varu64()?);
    let sent_time = reader.read_varu64()?;

    let ack_count = reader.read_varu32()? as usize;
    Limits::check(limits.max_acks_per_header, ack_count, LimitKind::AcksPerHeader)?;
    let mut acked = Vec::with_capacity(ack_count);
    for _ in 0..ack_count {
        acked.push(FrameId::new(reader.read_varu64()?));
    }

    let frame_count = reader.read_varu32()? as usize;
    Limits::check(
        limits.max_frames_per_message,
        frame_count,
        LimitKind::FramesPerMessage,
    )?;
    let mut frames = Vec::with_capacity(frame_count);
    for _ in 0..frame_count {
        let time = reader.read_varu64()?;
        let center = if reader.read_bit()? {
            Some(ZoneKey::new(
                reader.read_vars32()?,
                reader.read_vars32()?,
                reader.read_vars32()?,
            ))
        } else {
            None
        };
        let state_count = reader.read_varu32()? as usize;
        Limits::check(
            limits.max_states_per_frame,
            state_count,
            LimitKind::StatesPerFrame,
        )?;
        let mut states = Vec::with_capacity(state_count);
        for _ in 0..state_count {
            states.push(ObjectState::read(&mut reader)?);
        }
        frames.push(Frame {
            time,
            center,
            states,
        });
    }

    if reader.bits_remaining() >= 8 {
        return Err(DecodeError::TrailingBits {
            remaining_bits: reader.bits_remaining(),
        });
    }
    Ok(FrameMessage {
        id,
        sent_time,
        acked,
        frames,
    })
}

fn count(len: usize, kind: LimitKind) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::CountOverflow { kind, actual: len })
}

fn var_bits(value: u64) -> usize {
    let significant = (u64::BITS - value.leading_zeros()) as usize;
    significant.div_ceil(7).max(1) * 8
}

fn zigzag_bits(value: i32) -> usize {
    var_bits(u64::from(((value << 1) ^ (value >> 31)) as u32))
}
