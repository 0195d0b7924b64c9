//! Growable bit writer.

use crate::error::{BitError, BitResult};
use crate::VARINT_GROUP_BITS;

/// Appends bit-packed fields into an owned buffer.
///
/// The final partial byte is zero padded by [`finish`](Self::finish).
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty writer with room for `bytes` bytes.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            bit_len: 0,
        }
    }

    /// Number of bits written so far.
    #[must_use]
    pub const fn bits_written(&self) -> usize {
        self.bit_len
    }

    /// Number of bytes [`finish`](Self::finish) would return.
    #[must_use]
    pub const fn bytes_written(&self) -> usize {
        self.bit_len.div_ceil(8)
    }

    /// Discards everything written, keeping the allocation.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.bit_len = 0;
    }

    pub fn write_bit(&mut self, value: bool) {
        self.push_bits(u64::from(value), 1);
    }

    /// Writes the low `bits` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u64, bits: u8) -> BitResult<()> {
        if bits > 64 {
            return Err(BitError::InvalidBitCount { bits, max_bits: 64 });
        }
        if bits < 64 && value >> bits != 0 {
            return Err(BitError::ValueOutOfRange { value, bits });
        }
        self.push_bits(value, bits);
        Ok(())
    }

    /// Writes an unsigned varint: 7-bit groups, least significant group
    /// first, each preceded by a continuation bit.
    pub fn write_varu64(&mut self, mut value: u64) {
        loop {
            let group = value & ((1 << VARINT_GROUP_BITS) - 1);
            value >>= VARINT_GROUP_BITS;
            let more = value != 0;
            self.write_bit(more);
            self.push_bits(group, VARINT_GROUP_BITS);
            if !more {
                break;
            }
        }
    }

    pub fn write_varu32(&mut self, value: u32) {
        self.write_varu64(u64::from(value));
    }

    /// Writes a zigzag-encoded signed varint.
    pub fn write_vars32(&mut self, value: i32) {
        let zigzag = ((value << 1) ^ (value >> 31)) as u32;
        self.write_varu32(zigzag);
    }

    /// Writes the raw IEEE-754 bits of `value`.
    pub fn write_f64(&mut self, value: f64) {
        self.push_bits(value.to_bits(), 64);
    }

    /// Returns the packed bytes, zero padding the last partial byte.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }

    /// Appends the packed bytes to `buf`.
    pub fn finish_into(mut self, buf: &mut Vec<u8>) {
        buf.append(&mut self.bytes);
    }

    fn push_bits(&mut self, value: u64, bits: u8) {
        let mut remaining = usize::from(bits);
        while remaining > 0 {
            let used = self.bit_len % 8;
            if used == 0 {
                self.bytes.push(0);
            }
            let free = 8 - used;
            let take = free.min(remaining);
            let shift = remaining - take;
            let chunk = ((value >> shift) & ((1u64 << take) - 1)) as u8;
            if let Some(last) = self.bytes.last_mut() {
                *last |= chunk << (free - take);
            }
            self.bit_len += take;
            remaining -= take;
        }
    }
}
