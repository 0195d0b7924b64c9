//! Leading version/kind byte.

use bitstream::{BitReader, BitWriter};

use crate::error::{DecodeError, EncodeError, WireResult};

/// Current wire format version, stored in the high nibble of the first byte.
pub const VERSION: u8 = 1;

/// Message kinds, stored in the low nibble of the first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    /// Server to client: frames of object state.
    Frames = 1,
    /// Client to server: acknowledgment of one message.
    Ack = 2,
}

impl MessageKind {
    fn parse(raw: u8) -> WireResult<Self> {
        match raw {
            1 => Ok(Self::Frames),
            2 => Ok(Self::Ack),
            kind => Err(DecodeError::UnknownKind { kind }),
        }
    }
}

pub(crate) fn write_header(writer: &mut BitWriter, kind: MessageKind) -> Result<(), EncodeError> {
    writer.write_bits(u64::from(VERSION), 4)?;
    writer.write_bits(kind as u64, 4)?;
    Ok(())
}

pub(crate) fn read_header(reader: &mut BitReader<'_>) -> WireResult<MessageKind> {
    if reader.is_empty() {
        return Err(DecodeError::Empty);
    }
    let version = reader.read_bits(4)? as u8;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion { found: version });
    }
    MessageKind::parse(reader.read_bits(4)? as u8)
}

pub(crate) fn expect_kind(reader: &mut BitReader<'_>, expected: MessageKind) -> WireResult<()> {
    let found = read_header(reader)?;
    if found != expected {
        return Err(DecodeError::UnexpectedKind { expected, found });
    }
    Ok(())
}

/// Reads only the leading byte, to route a received message.
pub fn peek_kind(bytes: &[u8]) -> WireResult<MessageKind> {
    read_header(&mut BitReader::new(bytes))
}
