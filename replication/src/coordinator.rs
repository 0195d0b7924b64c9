//! Acknowledgment intake and baseline commits.
//!
//! Acks arrive on the transport thread and are queued; the tick thread
//! drains the queue at the end of each frame. Committing an ack moves the
//! baseline of every object the acknowledged message carried. The server
//! never sends a separate confirmation: the next deltas are computed
//! against the new baseline and the message header echoes the ack id, which
//! tells the client it may drop older versions of those objects. An ack
//! whose versions already left history is consumed but never echoed, since
//! the server still diffs against something older.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::trace;
use wire::{decode_ack, ClientAck, WireResult};

use crate::clock::Clock;
use crate::ping::PingEstimator;
use crate::sink::MessageSink;
use crate::table::ObjectTable;
use crate::writer::FrameWriter;

/// Cloneable handle for posting acks from any thread.
#[derive(Debug, Clone)]
pub struct AckSender {
    sender: Sender<ClientAck>,
    clock: Arc<dyn Clock>,
}

impl AckSender {
    /// Queues an ack for the next frame. Returns `false` if the replicator
    /// has been dropped.
    pub fn post(&self, ack: ClientAck) -> bool {
        self.sender.send(ack).is_ok()
    }

    /// Decodes an ack, stamps it with the current time and queues it.
    pub fn post_bytes(&self, bytes: &[u8]) -> WireResult<bool> {
        let ack = decode_ack(bytes, self.clock.now_nanos())?;
        Ok(self.post(ack))
    }

    #[must_use]
    pub fn now_nanos(&self) -> u64 {
        self.clock.now_nanos()
    }
}

/// Counts from one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AckSummary {
    pub acks_processed: usize,
    pub baselines_committed: usize,
    /// Acks consumed without an echo because a version left history first.
    pub unconfirmed: usize,
}

#[derive(Debug)]
pub struct BaselineCoordinator {
    sender: AckSender,
    receiver: Receiver<ClientAck>,
    ping: PingEstimator,
}

impl BaselineCoordinator {
    pub fn new(clock: Arc<dyn Clock>, ping: PingEstimator) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender: AckSender { sender, clock },
            receiver,
            ping,
        }
    }

    #[must_use]
    pub fn sender(&self) -> AckSender {
        self.sender.clone()
    }

    pub fn post(&self, ack: ClientAck) {
        // The receiver lives in `self`, so this cannot fail.
        let _ = self.sender.post(ack);
    }

    #[must_use]
    pub fn ping(&self) -> &PingEstimator {
        &self.ping
    }

    /// Acks waiting for the next drain.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Processes every ack queued so far.
    ///
    /// Acks posted while draining wait for the next call. Unknown and
    /// repeated ids are skipped. An acknowledged id is echoed only when the
    /// baselines of all objects it carried are at or past its versions.
    pub fn drain<S: MessageSink>(
        &mut self,
        writer: &mut FrameWriter<S>,
        objects: &mut ObjectTable,
    ) -> AckSummary {
        let mut summary = AckSummary::default();
        let queued = self.receiver.len();
        for ack in self.receiver.try_iter().take(queued) {
            summary.acks_processed += 1;
            self.ping.record(ack.round_trip());
            let Some(sent) = writer.ack_sent_state(ack.frame_id) else {
                trace!("ignoring ack for {}", ack.frame_id);
                continue;
            };
            let commit = objects.commit(&sent);
            summary.baselines_committed += commit.moved;
            if commit.settled {
                writer.echo_ack(sent.id);
            } else {
                summary.unconfirmed += 1;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use glam::{DQuat, DVec3};
    use wire::{encode_ack, FrameId, NetworkId};
    use zone::{EntityId, ZoneKey};

    use super::*;
    use crate::clock::ManualClock;

    struct Fixture {
        clock: Arc<ManualClock>,
        coordinator: BaselineCoordinator,
        writer: FrameWriter<Vec<Vec<u8>>>,
        objects: ObjectTable,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(0));
        let coordinator = BaselineCoordinator::new(
            clock.clone(),
            PingEstimator::new(100, Duration::from_millis(10)),
        );
        let writer = FrameWriter::new(Vec::new(), clock.clone(), 1500, 16);
        Fixture {
            clock,
            coordinator,
            writer,
            objects: ObjectTable::new(8),
        }
    }

    fn send_object(fx: &mut Fixture, time: u64) {
        let id = NetworkId::new(1);
        let object = fx.objects.get_or_create(id, EntityId::new(1));
        object.update_state(time, ZoneKey::default(), 1, DVec3::ZERO, DQuat::IDENTITY);
        fx.writer.start_frame(time, None).unwrap();
        fx.writer.add_state(object.delta(time)).unwrap();
        fx.writer.flush().unwrap();
    }

    #[test]
    fn drain_commits_and_ignores_duplicates() {
        let mut fx = fixture();
        send_object(&mut fx, 5);

        let ack = ClientAck::received(FrameId::new(0), 0, 2_000_000);
        fx.coordinator.post(ack);
        fx.coordinator.post(ack);
        let summary = fx.coordinator.drain(&mut fx.writer, &mut fx.objects);
        assert_eq!(summary.acks_processed, 2);
        assert_eq!(summary.baselines_committed, 1);
        assert_eq!(
            fx.objects.get(NetworkId::new(1)).unwrap().baseline_version(),
            Some(5)
        );
        assert_eq!(fx.coordinator.ping().estimate(), Duration::from_millis(2));
    }

    #[test]
    fn post_bytes_stamps_with_clock() {
        let mut fx = fixture();
        send_object(&mut fx, 1);
        fx.clock.set(30_000_000);

        let sender = fx.coordinator.sender();
        let bytes = encode_ack(FrameId::new(0), 10_000_000).unwrap();
        assert!(sender.post_bytes(&bytes).unwrap());
        assert_eq!(fx.coordinator.pending(), 1);

        fx.coordinator.drain(&mut fx.writer, &mut fx.objects);
        assert_eq!(fx.coordinator.ping().estimate(), Duration::from_millis(20));
        assert_eq!(fx.coordinator.pending(), 0);
    }

    #[test]
    fn post_bytes_rejects_garbage() {
        let fx = fixture();
        assert!(fx.coordinator.sender().post_bytes(&[0xff]).is_err());
    }

    #[test]
    fn post_after_drop_reports_disconnect() {
        let fx = fixture();
        let sender = fx.coordinator.sender();
        drop(fx);
        assert!(!sender.post(ClientAck::received(FrameId::new(0), 0, 0)));
    }

    #[test]
    fn ack_is_echoed_once_committed() {
        let mut fx = fixture();
        send_object(&mut fx, 5);

        fx.coordinator.post(ClientAck::received(FrameId::new(0), 0, 0));
        let summary = fx.coordinator.drain(&mut fx.writer, &mut fx.objects);
        assert_eq!(summary.unconfirmed, 0);
        assert_eq!(fx.writer.echoed_acks().collect::<Vec<_>>(), vec![FrameId::new(0)]);
    }

    #[test]
    fn ack_of_evicted_version_is_not_echoed() {
        let mut fx = fixture();
        fx.objects = ObjectTable::new(2);
        for time in 1..=4 {
            send_object(&mut fx, time);
        }

        fx.coordinator.post(ClientAck::received(FrameId::new(0), 0, 0));
        let summary = fx.coordinator.drain(&mut fx.writer, &mut fx.objects);
        assert_eq!(summary.acks_processed, 1);
        assert_eq!(summary.baselines_committed, 0);
        assert_eq!(summary.unconfirmed, 1);
        assert_eq!(fx.writer.echoed_acks().count(), 0);
        assert_eq!(fx.writer.pending_sent_frames(), 3);

        // A later ack for a version still in history settles normally.
        fx.coordinator.post(ClientAck::received(FrameId::new(3), 0, 0));
        let summary = fx.coordinator.drain(&mut fx.writer, &mut fx.objects);
        assert_eq!(summary.baselines_committed, 1);
        assert_eq!(fx.writer.echoed_acks().collect::<Vec<_>>(), vec![FrameId::new(3)]);
        assert_eq!(
            fx.objects.get(NetworkId::new(1)).unwrap().baseline_version(),
            Some(4)
        );
    }
}
