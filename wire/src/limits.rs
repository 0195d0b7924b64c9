//! Configurable limits for bounded decoding.

/// Bounds enforced while decoding messages.
///
/// These protect the decoder from hostile or corrupt input; they do not
/// control how large the server makes its messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub max_message_bytes: usize,
    pub max_frames_per_message: usize,
    pub max_states_per_frame: usize,
    pub max_acks_per_header: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_message_bytes: 64 * 1024,
            max_frames_per_message: 256,
            max_states_per_frame: 4096,
            max_acks_per_header: 1024,
        }
    }
}

impl Limits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_message_bytes: 4096,
            max_frames_per_message: 16,
            max_states_per_frame: 128,
            max_acks_per_header: 64,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_message_bytes: usize::MAX,
            max_frames_per_message: usize::MAX,
            max_states_per_frame: usize::MAX,
            max_acks_per_header: usize::MAX,
        }
    }

    pub(crate) fn check(
        limit: usize,
        actual: usize,
        kind: crate::LimitKind,
    ) -> crate::WireResult<()> {
        if actual > limit {
            return Err(crate::DecodeError::LimitsExceeded {
                kind,
                limit,
                actual,
            });
        }
        Ok(())
    }
}
