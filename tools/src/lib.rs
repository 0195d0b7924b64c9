//! Inspection and decoding tools for zonecast messages.
//!
//! - Decode a server message or client ack into JSON
//! - Break a message down by frame with sizes and state counts
//!
//! Both work on raw bytes as written by `demo-sim` or captured from a
//! transport.

use serde::Serialize;
use wire::{
    decode_ack, decode_message, frame_header_bits, peek_kind, DecodeError, Frame, FrameMessage,
    Limits, MessageKind, ObjectState,
};
use zone::ZoneKey;

/// Size breakdown of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectReport {
    Frames(MessageReport),
    Ack { frame_id: u64, sent_time: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReport {
    pub id: u64,
    pub sent_time: u64,
    pub byte_len: usize,
    pub echoed_acks: usize,
    pub frames: Vec<FrameReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameReport {
    pub time: u64,
    pub center: Option<ZoneKey>,
    pub states: usize,
    pub full_states: usize,
    pub removed: usize,
    /// Upper bound on the frame's encoded size.
    pub bits: usize,
}

impl FrameReport {
    fn from_frame(frame: &Frame) -> Self {
        Self {
            time: frame.time,
            center: frame.center,
            states: frame.states.len(),
            full_states: frame.states.iter().filter(|s| s.is_full()).count(),
            removed: frame.states.iter().filter(|s| s.removed).count(),
            bits: frame_header_bits(frame.time, frame.center)
                + frame
                    .states
                    .iter()
                    .map(ObjectState::encoded_bits)
                    .sum::<usize>(),
        }
    }
}

pub fn inspect_message(bytes: &[u8], limits: &Limits) -> Result<InspectReport, DecodeError> {
    match peek_kind(bytes)? {
        MessageKind::Ack => {
            let ack = decode_ack(bytes, 0)?;
            Ok(InspectReport::Ack {
                frame_id: ack.frame_id.raw(),
                sent_time: ack.sent_time,
            })
        }
        MessageKind::Frames => {
            let message = decode_message(bytes, limits)?;
            Ok(InspectReport::Frames(MessageReport {
                id: message.id.raw(),
                sent_time: message.sent_time,
                byte_len: bytes.len(),
                echoed_acks: message.acked.len(),
                frames: message.frames.iter().map(FrameReport::from_frame).collect(),
            }))
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum MessageView {
    Frames {
        id: u64,
        sent_time: u64,
        acked: Vec<u64>,
        frames: Vec<FrameView>,
    },
    Ack {
        frame_id: u64,
        sent_time: u64,
    },
}

#[derive(Serialize)]
struct FrameView {
    time: u64,
    center: Option<[i32; 3]>,
    states: Vec<StateView>,
}

#[derive(Serialize)]
struct StateView {
    network_id: u32,
    version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    baseline_version: Option<u64>,
    removed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    zone_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rotation: Option<[f64; 4]>,
}

impl From<&ObjectState> for StateView {
    fn from(state: &ObjectState) -> Self {
        Self {
            network_id: state.network_id.raw(),
            version: state.version,
            baseline_version: state.baseline_version,
            removed: state.removed,
            entity_id: state.entity_id.map(|e| e.raw()),
            zone_id: state.zone_id,
            position: state.position.map(|p| p.to_array()),
            rotation: state.rotation.map(|r| r.to_array()),
        }
    }
}

fn message_view(message: &FrameMessage) -> MessageView {
    MessageView::Frames {
        id: message.id.raw(),
        sent_time: message.sent_time,
        acked: message.acked.iter().map(|id| id.raw()).collect(),
        frames: message
            .frames
            .iter()
            .map(|frame| FrameView {
                time: frame.time,
                center: frame.center.map(|c| [c.x, c.y, c.z]),
                states: frame.states.iter().map(StateView::from).collect(),
            })
            .collect(),
    }
}

/// Decodes any zonecast message into JSON.
pub fn decode_message_json(bytes: &[u8], limits: &Limits) -> anyhow::Result<serde_json::Value> {
    let view = match peek_kind(bytes)? {
        MessageKind::Frames => message_view(&decode_message(bytes, limits)?),
        MessageKind::Ack => {
            let ack = decode_ack(bytes, 0)?;
            MessageView::Ack {
                frame_id: ack.frame_id.raw(),
                sent_time: ack.sent_time,
            }
        }
    };
    Ok(serde_json::to_value(view)?)
}

/// One line per frame and state, for terminals.
#[must_use]
pub fn format_decode_pretty(value: &serde_json::Value) -> String {
    let mut out = String::new();
    let kind = value["kind"].as_str().unwrap_or("unknown");
    if kind == "ack" {
        out.push_str(&format!(
            "ack frame#{} sent_time={}\n",
            value["frame_id"], value["sent_time"]
        ));
        return out;
    }
    out.push_str(&format!(
        "frame#{} sent_time={} acked={}\n",
        value["id"], value["sent_time"], value["acked"]
    ));
    for frame in value["frames"].as_array().into_iter().flatten() {
        out.push_str(&format!(
            "  time {} center {}\n",
            frame["time"], frame["center"]
        ));
        for state in frame["states"].as_array().into_iter().flatten() {
            let base = state
                .get("baseline_version")
                .map_or_else(|| "full".to_string(), |v| format!("base {v}"));
            let removed = if state["removed"].as_bool() == Some(true) {
                " removed"
            } else {
                ""
            };
            out.push_str(&format!(
                "    net#{} v{} ({base}){removed}\n",
                state["network_id"], state["version"]
            ));
        }
    }
    out
}
