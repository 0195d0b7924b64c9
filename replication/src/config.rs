//! Per-connection replication settings.

use std::time::Duration;

/// Settings for one [`ClientReplicator`](crate::ClientReplicator).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReplicationConfig {
    /// Zones around the center zone, per partitioned axis, that are in view.
    pub zone_radius: u32,
    /// Lowest network id handed out.
    pub first_network_id: u32,
    /// Target upper bound for one message, in bytes. Defaults to a typical
    /// path MTU; frames larger than this are split across messages.
    pub max_message_size: usize,
    /// Samples after which the ping average turns into a moving average.
    pub ping_window: u32,
    /// Ping changes larger than this are logged.
    pub ping_log_threshold_ms: u64,
    /// Sent states kept per object while waiting for acknowledgment.
    pub history_capacity: usize,
    /// Unacknowledged messages remembered before the oldest expires.
    pub max_outstanding_frames: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            zone_radius: 1,
            first_network_id: 1,
            max_message_size: 1500,
            ping_window: 100,
            ping_log_threshold_ms: 10,
            history_capacity: 32,
            max_outstanding_frames: 256,
        }
    }
}

impl ReplicationConfig {
    /// Creates a configuration with small buffers for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            history_capacity: 8,
            max_outstanding_frames: 32,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_zone_radius(mut self, radius: u32) -> Self {
        self.zone_radius = radius;
        self
    }

    #[must_use]
    pub const fn with_first_network_id(mut self, id: u32) -> Self {
        self.first_network_id = id;
        self
    }

    #[must_use]
    pub const fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    #[must_use]
    pub const fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn with_max_outstanding_frames(mut self, frames: usize) -> Self {
        self.max_outstanding_frames = frames;
        self
    }

    #[must_use]
    pub const fn ping_log_threshold(&self) -> Duration {
        Duration::from_millis(self.ping_log_threshold_ms)
    }
}
