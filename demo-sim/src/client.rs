//! Simulated remote client on its own thread.
//!
//! Receives messages over a channel, loses some of them, and answers the
//! rest with acks that are delayed, duplicated and reordered before being
//! posted back through an [`AckSender`]. Older versions of an object are
//! dropped once the server echoes an ack for a message that carried it.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use glam::{DQuat, DVec3};
use log::{trace, warn};
use replication::AckSender;
use tools::decode_message_json;
use wire::{decode_message, encode_ack, FrameId, Limits, NetworkId, ObjectState};

use crate::Rng;

const MAX_UNECHOED: usize = 1024;

pub enum Event {
    Message(Vec<u8>),
    EndOfTick,
}

#[derive(Debug, Clone, Copy)]
pub struct Link {
    pub loss_percent: u32,
    pub duplicate_percent: u32,
    pub ack_delay_ticks: u32,
}

#[derive(Debug, Default)]
pub struct ClientReport {
    pub messages_received: u64,
    pub messages_lost: u64,
    pub acks_posted: u64,
    pub baseline_misses: u64,
    pub versions_pruned: u64,
    pub removals_seen: u64,
    pub objects_seen: usize,
}

#[derive(Debug, Clone, Copy)]
struct View {
    position: DVec3,
    rotation: DQuat,
    zone_id: u32,
}

pub struct Client {
    link: Link,
    rng: Rng,
    out_dir: PathBuf,
    acks: AckSender,
    events: Receiver<Event>,
    done: Sender<()>,
    // Versions the client holds per object.
    views: HashMap<NetworkId, BTreeMap<u64, View>>,
    // What each received message carried, until its ack is echoed.
    received: BTreeMap<FrameId, Vec<(NetworkId, u64)>>,
    delayed: Vec<(u32, Vec<u8>)>,
    report: ClientReport,
}

impl Client {
    pub fn new(
        link: Link,
        seed: u64,
        out_dir: PathBuf,
        acks: AckSender,
        events: Receiver<Event>,
        done: Sender<()>,
    ) -> Self {
        Self {
            link,
            rng: Rng::new(seed ^ 0x9e37_79b9_7f4a_7c15),
            out_dir,
            acks,
            events,
            done,
            views: HashMap::new(),
            received: BTreeMap::new(),
            delayed: Vec::new(),
            report: ClientReport::default(),
        }
    }

    pub fn run(mut self) -> Result<ClientReport> {
        let limits = Limits::default();
        let events = self.events.clone();
        for event in &events {
            match event {
                Event::Message(bytes) => {
                    if self.rng.percent(self.link.loss_percent) {
                        self.report.messages_lost += 1;
                        continue;
                    }
                    self.receive(&bytes, &limits)?;
                }
                Event::EndOfTick => {
                    self.release_acks()?;
                    if self.done.send(()).is_err() {
                        break;
                    }
                }
            }
        }
        self.report.objects_seen = self.views.len();
        Ok(self.report)
    }

    fn receive(&mut self, bytes: &[u8], limits: &Limits) -> Result<()> {
        let message = decode_message(bytes, limits).context("decode message")?;
        let _ = decode_message_json(bytes, limits).context("tools decode")?;
        let path = self
            .out_dir
            .join(format!("message_{:06}.bin", message.id.raw()));
        fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        self.report.messages_received += 1;

        for &echoed in &message.acked {
            self.release(echoed);
        }
        for state in message.states() {
            self.apply(state);
        }
        self.received.insert(
            message.id,
            message
                .states()
                .map(|state| (state.network_id, state.version))
                .collect(),
        );
        while self.received.len() > MAX_UNECHOED {
            self.received.pop_first();
        }

        let ack = encode_ack(message.id, message.sent_time).context("encode ack")?;
        self.delayed.push((self.link.ack_delay_ticks, ack.clone()));
        if self.rng.percent(self.link.duplicate_percent) {
            self.delayed.push((self.link.ack_delay_ticks + 1, ack));
        }
        Ok(())
    }

    /// The server's baseline for every object `echoed` carried is now at
    /// least the carried version, so anything older can go.
    fn release(&mut self, echoed: FrameId) {
        let Some(carried) = self.received.remove(&echoed) else {
            return;
        };
        for (id, version) in carried {
            let Some(history) = self.views.get_mut(&id) else {
                continue;
            };
            let kept = history.split_off(&version);
            self.report.versions_pruned += history.len() as u64;
            *history = kept;
        }
    }

    fn apply(&mut self, state: &ObjectState) {
        let history = self.views.entry(state.network_id).or_default();
        let base = match state.baseline_version {
            None => {
                history.clear();
                None
            }
            Some(version) => match history.get(&version) {
                Some(view) => Some(*view),
                None => {
                    warn!(
                        "{} delta against unknown version {version}",
                        state.network_id
                    );
                    self.report.baseline_misses += 1;
                    return;
                }
            },
        };
        let fallback = View {
            position: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            zone_id: 0,
        };
        let base = base.unwrap_or(fallback);
        history.insert(
            state.version,
            View {
                position: state.position.unwrap_or(base.position),
                rotation: state.rotation.unwrap_or(base.rotation),
                zone_id: state.zone_id.unwrap_or(base.zone_id),
            },
        );
        if state.removed {
            self.report.removals_seen += 1;
        }
        trace!("{} now at v{}", state.network_id, state.version);
    }

    fn release_acks(&mut self) -> Result<()> {
        let mut ready = Vec::new();
        self.delayed.retain_mut(|(ticks, ack)| {
            if *ticks == 0 {
                ready.push(std::mem::take(ack));
                false
            } else {
                *ticks -= 1;
                true
            }
        });
        // Reorder what goes out together.
        for i in (1..ready.len()).rev() {
            let j = self.rng.below(i as u32 + 1) as usize;
            ready.swap(i, j);
        }
        for ack in ready {
            if self.acks.post_bytes(&ack).context("post ack")? {
                self.report.acks_posted += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crossbeam_channel::unbounded;
    use replication::{BaselineCoordinator, ManualClock, PingEstimator};
    use zone::EntityId;

    use super::*;

    fn client() -> (Client, BaselineCoordinator) {
        let coordinator = BaselineCoordinator::new(
            Arc::new(ManualClock::new(0)),
            PingEstimator::new(10, Duration::from_millis(10)),
        );
        let (_events_tx, events) = unbounded();
        let (done, _done_rx) = unbounded();
        let link = Link {
            loss_percent: 0,
            duplicate_percent: 0,
            ack_delay_ticks: 0,
        };
        let client = Client::new(
            link,
            1,
            std::env::temp_dir(),
            coordinator.sender(),
            events,
            done,
        );
        (client, coordinator)
    }

    fn state(version: u64, baseline_version: Option<u64>, x: f64) -> ObjectState {
        ObjectState {
            network_id: NetworkId::new(1),
            version,
            baseline_version,
            removed: false,
            entity_id: baseline_version.is_none().then(|| EntityId::new(9)),
            zone_id: Some(1),
            position: Some(DVec3::new(x, 0.0, 0.0)),
            rotation: None,
        }
    }

    #[test]
    fn echo_drops_versions_older_than_the_echoed_one() {
        let (mut client, _coordinator) = client();
        client.apply(&state(1, None, 1.0));
        client.apply(&state(2, Some(1), 2.0));
        client.apply(&state(3, Some(1), 3.0));
        client
            .received
            .insert(FrameId::new(1), vec![(NetworkId::new(1), 2)]);

        client.release(FrameId::new(1));
        let held: Vec<u64> = client.views[&NetworkId::new(1)].keys().copied().collect();
        assert_eq!(held, vec![2, 3]);
        assert_eq!(client.report.versions_pruned, 1);
        assert!(client.received.is_empty());

        // A delta against the dropped version is a desync.
        client.apply(&state(4, Some(1), 4.0));
        assert_eq!(client.report.baseline_misses, 1);
        client.apply(&state(4, Some(2), 4.0));
        assert_eq!(client.report.baseline_misses, 1);
    }

    #[test]
    fn unknown_echo_is_ignored() {
        let (mut client, _coordinator) = client();
        client.apply(&state(1, None, 1.0));
        client.release(FrameId::new(7));
        assert_eq!(client.views[&NetworkId::new(1)].len(), 1);
        assert_eq!(client.report.versions_pruned, 0);
    }
}
