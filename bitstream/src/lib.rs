//! Bounded bit packing primitives for zonecast frame messages.
//!
//! [`BitWriter`] appends into a growable buffer; [`BitReader`] walks a
//! borrowed slice. Bits are packed most significant first.
//!
//! # Design Principles
//!
//! - **No unsafe code**
//! - **Bounded reads** - Every read is checked against the remaining input.
//! - **No domain knowledge** - Nothing here knows about zones, objects, or frames.
//!
//! # Example
//!
//! ```
//! use bitstream::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! writer.write_bit(true);
//! writer.write_varu32(300);
//! let bytes = writer.finish();
//!
//! let mut reader = BitReader::new(&bytes);
//! assert!(reader.read_bit().unwrap());
//! assert_eq!(reader.read_varu32().unwrap(), 300);
//! ```

mod error;
mod reader;
mod writer;

pub use error::{BitError, BitResult};
pub use reader::BitReader;
pub use writer::BitWriter;

/// Bits in one varint group, excluding the continuation bit.
pub(crate) const VARINT_GROUP_BITS: u8 = 7;
