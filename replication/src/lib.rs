//! Server-side replication of a zoned world to one client.
//!
//! A [`ClientReplicator`] receives per-zone state from a zone manager through
//! [`zone::FrameListener`], decides which objects the client can see, and
//! writes per-tick frames of deltas through a [`MessageSink`].
//!
//! # Acknowledgment model
//!
//! Every sent message is remembered as a [`SentFrame`]. When the client acks
//! a message, each object it carried moves its baseline to the acked
//! version, and later deltas are computed against that baseline. Once every
//! object the message carried has a baseline at or past the acked version
//! (or is gone), the ack id is echoed in following message headers until one
//! of those is acked too, so both ends agree on the baseline without a
//! reliable channel. An ack that arrives after its version left history is
//! never echoed. Lost, late and repeated acks only delay this.
//!
//! # Threading
//!
//! Acks may be posted from any thread through an [`AckSender`]. Everything
//! else is driven by the tick thread.

mod clock;
mod config;
mod coordinator;
mod error;
mod history;
mod ids;
mod object;
mod ping;
mod projector;
mod replicator;
mod sink;
mod table;
mod writer;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::ReplicationConfig;
pub use coordinator::{AckSender, AckSummary, BaselineCoordinator};
pub use error::{ReplicationError, ReplicationResult};
pub use history::{HistoryError, StateHistory};
pub use ids::IdentifierTable;
pub use object::{BaselineCommit, ObjectSnapshot, RemovalState, ReplicatedObject};
pub use ping::PingEstimator;
pub use projector::{FrameProjector, ProjectionSummary};
pub use replicator::{ClientReplicator, FrameStats};
pub use sink::MessageSink;
pub use table::{ObjectTable, TableCommit};
pub use writer::{FrameWriter, SentFrame, MAX_ECHOED_ACKS};

