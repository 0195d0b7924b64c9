//! Bounded bit reader.

use crate::error::{BitError, BitResult};
use crate::VARINT_GROUP_BITS;

const VARU32_MAX_GROUPS: u8 = 5;
const VARU64_MAX_GROUPS: u8 = 10;

/// Reads bit-packed fields from a byte slice.
///
/// Reads never panic on malformed input; running out of bits is an error.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Number of unread bits, including trailing padding.
    #[must_use]
    pub const fn bits_remaining(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.bit_pos)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bits_remaining() == 0
    }

    #[must_use]
    pub const fn bit_position(&self) -> usize {
        self.bit_pos
    }

    pub fn read_bit(&mut self) -> BitResult<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Reads `bits` bits, most significant first.
    pub fn read_bits(&mut self, bits: u8) -> BitResult<u64> {
        if bits > 64 {
            return Err(BitError::InvalidBitCount { bits, max_bits: 64 });
        }
        let wanted = usize::from(bits);
        if wanted > self.bits_remaining() {
            return Err(BitError::UnexpectedEof {
                requested: wanted,
                available: self.bits_remaining(),
            });
        }

        let mut value = 0u64;
        let mut remaining = wanted;
        while remaining > 0 {
            let byte = self.data[self.bit_pos / 8];
            let used = self.bit_pos % 8;
            let avail = 8 - used;
            let take = avail.min(remaining);
            let chunk = (byte >> (avail - take)) & ((1u16 << take) - 1) as u8;
            value = (value << take) | u64::from(chunk);
            self.bit_pos += take;
            remaining -= take;
        }
        Ok(value)
    }

    pub fn read_varu32(&mut self) -> BitResult<u32> {
        let value = self.read_var(VARU32_MAX_GROUPS)?;
        u32::try_from(value).map_err(|_| BitError::InvalidVarint {
            max_groups: VARU32_MAX_GROUPS,
        })
    }

    pub fn read_varu64(&mut self) -> BitResult<u64> {
        self.read_var(VARU64_MAX_GROUPS)
    }

    /// Reads a zigzag-encoded signed varint.
    pub fn read_vars32(&mut self) -> BitResult<i32> {
        let raw = self.read_varu32()?;
        Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
    }

    pub fn read_f64(&mut self) -> BitResult<f64> {
        Ok(f64::from_bits(self.read_bits(64)?))
    }

    fn read_var(&mut self, max_groups: u8) -> BitResult<u64> {
        let mut value = 0u64;
        for group in 0..max_groups {
            let more = self.read_bit()?;
            let bits = self.read_bits(VARINT_GROUP_BITS)?;
            let shift = u32::from(group) * u32::from(VARINT_GROUP_BITS);
            let shifted = bits
                .checked_shl(shift)
                .filter(|v| v >> shift == bits)
                .ok_or(BitError::InvalidVarint { max_groups })?;
            value |= shifted;
            if !more {
                return Ok(value);
            }
        }
        Err(BitError::InvalidVarint { max_groups })
    }
}
