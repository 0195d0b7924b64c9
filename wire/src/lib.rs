//! Message layout for zonecast server-to-client frames and client acks.
//!
//! A [`FrameMessage`] carries one or more frames (one per simulation tick),
//! each a list of [`ObjectState`] deltas, plus the header of acknowledgments
//! the server is echoing back. A [`ClientAck`] is the client's reply naming
//! one received message.
//!
//! # Design Principles
//!
//! - **Bounded decoding** - Every count is checked against [`Limits`] before
//!   anything is allocated for it.
//! - **Size is known before sending** - Encoders expose bit counts so callers
//!   can keep messages under a target size.
//! - **No policy** - What goes into a frame is decided by the replication layer.
//!
//! # Layout
//!
//! ```text
//! message  := version:4 kind:4 body
//! frames   := id:varu64 sent_time:varu64 ack_count:varu32 ack_id:varu64* frame_count:varu32 frame*
//! frame    := time:varu64 has_center:1 [x y z:vars32] state_count:varu32 state*
//! state    := net_id:varu32 version:varu64 removed:1
//!             has_baseline:1 [varu64] has_entity:1 [varu64] has_zone:1 [varu32]
//!             has_position:1 [f64 x3] has_rotation:1 [f64 x4]
//! ack      := frame_id:varu64 sent_time:varu64
//! ```

mod ack;
mod error;
mod header;
mod limits;
mod message;
mod state;
mod types;

pub use ack::{decode_ack, encode_ack, ClientAck};
pub use error::{DecodeError, EncodeError, LimitKind, WireResult};
pub use header::{peek_kind, MessageKind, VERSION};
pub use limits::Limits;
pub use message::{
    decode_message, encode_message, frame_header_bits, message_header_bits, Frame, FrameMessage,
};
pub use state::ObjectState;
pub use types::{FrameId, NetworkId};

/// Worst-case size of a `varu32` count field, in bits.
pub const COUNT_FIELD_BITS: usize = 5 * 8;
