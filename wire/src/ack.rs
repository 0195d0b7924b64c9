//! Client-to-server acknowledgments.

use std::time::Duration;

use bitstream::{BitReader, BitWriter};

use crate::error::{DecodeError, EncodeError, WireResult};
use crate::header::{expect_kind, write_header, MessageKind};
use crate::types::FrameId;

/// A client's confirmation that it received message `frame_id`.
///
/// `sent_time` travels on the wire; `received_time` is stamped by the
/// receiving side with the same clock, so the difference is a round trip.
/// Both are nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAck {
    pub frame_id: FrameId,
    pub sent_time: u64,
    pub received_time: u64,
}

impl ClientAck {
    #[must_use]
    pub const fn received(frame_id: FrameId, sent_time: u64, received_time: u64) -> Self {
        Self {
            frame_id,
            sent_time,
            received_time,
        }
    }

    /// Elapsed time between send and receipt; zero if the clocks disagree.
    #[must_use]
    pub const fn round_trip(&self) -> Duration {
        Duration::from_nanos(self.received_time.saturating_sub(self.sent_time))
    }
}

pub fn encode_ack(frame_id: FrameId, sent_time: u64) -> Result<Vec<u8>, EncodeError> {
    let mut writer = BitWriter::with_capacity(12);
    write_header(&mut writer, MessageKind::Ack)?;
    writer.write_varu64(frame_id.raw());
    writer.write_varu64(sent_time);
    Ok(writer.finish())
}

/// Decodes an ack and stamps it with `received_time`.
pub fn decode_ack(bytes: &[u8], received_time: u64) -> WireResult<ClientAck> {
    let mut reader = BitReader::new(bytes);
    expect_kind(&mut reader, MessageKind::Ack)?;
    let frame_id = FrameId::new(reader.read_varu64()?);
    let sent_time = reader.read_varu64()?;
    if reader.bits_remaining() >= 8 {
        return Err(DecodeError::TrailingBits {
            remaining_bits: reader.bits_remaining(),
        });
    }
    Ok(ClientAck::received(frame_id, sent_time, received_time))
}
