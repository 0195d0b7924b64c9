mod client;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, unbounded, Sender};
use glam::{DQuat, DVec3};
use log::info;
use replication::{ClientReplicator, ManualClock, MessageSink, ReplicationConfig};
use serde::Serialize;
use zone::{EntityId, FrameListener, StateBlock, ZoneGrid, ZoneKey};

use crate::client::{Client, Event, Link};

#[derive(Parser)]
#[command(
    name = "demo-sim",
    version,
    about = "Deterministic zone replication capture generator"
)]
struct Cli {
    /// Number of wandering entities besides the player.
    #[arg(long, default_value_t = 64)]
    entities: u32,
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 300)]
    ticks: u32,
    /// RNG seed for deterministic results.
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Edge length of a square zone.
    #[arg(long, default_value_t = 32.0)]
    zone_size: f64,
    /// Half the world's width, in zones.
    #[arg(long, default_value_t = 4)]
    world_zones: i32,
    /// Ticks between frame block flushes.
    #[arg(long, default_value_t = 1)]
    ticks_per_block: u32,
    /// Simulated tick length in milliseconds.
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,
    /// Percent of server messages the client never sees.
    #[arg(long, default_value_t = 5)]
    loss_percent: u32,
    /// Percent of acks the client sends twice.
    #[arg(long, default_value_t = 5)]
    duplicate_percent: u32,
    /// Ticks the client holds each ack before sending it.
    #[arg(long, default_value_t = 2)]
    ack_delay_ticks: u32,
    /// Percent chance per tick that an entity despawns and respawns elsewhere.
    #[arg(long, default_value_t = 1)]
    churn_percent: u32,
    /// Replication settings as JSON; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Zone radius around the player.
    #[arg(long)]
    radius: Option<u32>,
    /// Maximum message size in bytes.
    #[arg(long)]
    max_message_size: Option<usize>,
    /// Output directory for captures.
    #[arg(long, default_value = "captures")]
    out_dir: PathBuf,
    /// Fail if p95 message size exceeds this value.
    #[arg(long)]
    max_p95_bytes: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("create output dir {}", cli.out_dir.display()))?;

    let grid = ZoneGrid::new(DVec3::new(cli.zone_size, cli.zone_size, 0.0))
        .context("zone grid")?;
    let clock = Arc::new(ManualClock::new(0));
    let (message_tx, message_rx) = unbounded::<Vec<u8>>();
    let (event_tx, event_rx) = unbounded::<Event>();
    let (done_tx, done_rx) = bounded::<()>(1);

    let sink = Forwarder {
        messages: message_tx,
    };
    let mut replicator = ClientReplicator::with_clock(sink, grid, config, clock.clone());

    let link = Link {
        loss_percent: cli.loss_percent,
        duplicate_percent: cli.duplicate_percent,
        ack_delay_ticks: cli.ack_delay_ticks,
    };
    let client = Client::new(
        link,
        cli.seed,
        cli.out_dir.clone(),
        replicator.ack_sender(),
        event_rx,
        done_tx,
    );
    let client = thread::spawn(move || client.run());

    let mut world = World::new(&cli, grid);
    let mut visible: BTreeSet<ZoneKey> = BTreeSet::new();
    let mut summary = Summary::new(&cli);
    replicator.set_self(world.player.id, world.player.position);

    let tick_nanos = cli.tick_ms.saturating_mul(1_000_000);
    let per_block = cli.ticks_per_block.max(1);
    for tick in 1..=u64::from(cli.ticks) {
        clock.advance(tick_nanos);
        let first_in_block = (tick - 1) % u64::from(per_block) == 0;
        let last_in_block = tick % u64::from(per_block) == 0 || tick == u64::from(cli.ticks);

        if first_in_block {
            replicator.begin_frame_block()?;
        }
        replicator.begin_frame(tick);
        let removed = world.step();
        for block in world.blocks(tick, &visible, &removed) {
            replicator.state_changed(&block);
        }
        replicator.end_frame(tick)?;
        if replicator.has_changed_zones() {
            for zone in replicator.exited_zones() {
                visible.remove(zone);
            }
            visible.extend(replicator.entered_zones().iter().copied());
        }
        summary.record(&replicator.last_stats());
        if last_in_block {
            replicator.end_frame_block()?;
        }

        let mut delivered = true;
        for bytes in message_rx.try_iter() {
            summary.push_message(bytes.len() as u64);
            delivered &= event_tx.send(Event::Message(bytes)).is_ok();
        }
        delivered &= event_tx.send(Event::EndOfTick).is_ok();
        if !delivered || done_rx.recv().is_err() {
            // The client only stops early on error; surface it.
            client
                .join()
                .map_err(|_| anyhow::anyhow!("client thread panicked"))??;
            anyhow::bail!("client stopped at tick {tick}");
        }
    }

    drop(event_tx);
    let report = client
        .join()
        .map_err(|_| anyhow::anyhow!("client thread panicked"))??;

    summary.finalize(&replicator, &report);
    info!(
        "{} messages, {} bytes, p95 {} bytes, ping {:.1} ms",
        summary.messages, summary.bytes_total, summary.p95_message_bytes, summary.ping_ms
    );
    summary.assert_budgets(cli.max_p95_bytes)?;
    write_summary_json(&cli.out_dir, &summary)?;
    Ok(())
}

fn load_config(cli: &Cli) -> Result<ReplicationConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            serde_json::from_str(&contents).context("parse config json")?
        }
        None => ReplicationConfig::default(),
    };
    if let Some(radius) = cli.radius {
        config.zone_radius = radius;
    }
    if let Some(bytes) = cli.max_message_size {
        config.max_message_size = bytes;
    }
    Ok(config)
}

fn write_summary_json(out_dir: &Path, summary: &Summary) -> Result<()> {
    let path = out_dir.join("summary.json");
    let contents = serde_json::to_string_pretty(summary).context("serialize summary")?;
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Hands messages to the main loop, which forwards them to the client.
#[derive(Debug)]
struct Forwarder {
    messages: Sender<Vec<u8>>,
}

impl MessageSink for Forwarder {
    fn send(&mut self, message: &[u8]) -> std::io::Result<()> {
        MessageSink::send(&mut self.messages, message)
    }

    fn peer(&self) -> &str {
        "demo-client"
    }
}

#[derive(Debug, Clone, Copy)]
struct Walker {
    id: EntityId,
    position: DVec3,
    velocity: DVec3,
    yaw: f64,
}

struct World {
    grid: ZoneGrid,
    rng: Rng,
    extent: f64,
    churn_percent: u32,
    next_id: u64,
    player: Walker,
    walkers: Vec<Walker>,
}

impl World {
    fn new(cli: &Cli, grid: ZoneGrid) -> Self {
        let mut rng = Rng::new(cli.seed);
        let extent = cli.zone_size * f64::from(cli.world_zones.max(1));
        let player = Walker {
            id: EntityId::new(0),
            position: DVec3::ZERO,
            velocity: DVec3::new(1.5, 0.7, 0.0),
            yaw: 0.0,
        };
        let walkers = (1..=u64::from(cli.entities))
            .map(|raw| Self::spawn(&mut rng, extent, raw))
            .collect();
        Self {
            grid,
            rng,
            extent,
            churn_percent: cli.churn_percent,
            next_id: u64::from(cli.entities) + 1,
            player,
            walkers,
        }
    }

    fn spawn(rng: &mut Rng, extent: f64, raw: u64) -> Walker {
        Walker {
            id: EntityId::new(raw),
            position: DVec3::new(rng.range_f64(-extent, extent), rng.range_f64(-extent, extent), 0.0),
            velocity: DVec3::new(rng.range_f64(-2.0, 2.0), rng.range_f64(-2.0, 2.0), 0.0),
            yaw: rng.range_f64(0.0, std::f64::consts::TAU),
        }
    }

    /// Moves everything one tick; returns despawned walkers with the zone
    /// they were last in.
    fn step(&mut self) -> Vec<(EntityId, ZoneKey)> {
        let extent = self.extent;
        advance(&mut self.player, extent);

        let mut removed = Vec::new();
        for index in 0..self.walkers.len() {
            if self.rng.percent(self.churn_percent) {
                let old = self.walkers[index];
                removed.push((old.id, self.grid.zone_for(old.position)));
                self.walkers[index] = Self::spawn(&mut self.rng, extent, self.next_id);
                self.next_id += 1;
                continue;
            }
            let walker = &mut self.walkers[index];
            if self.rng.percent(5) {
                walker.velocity.x = self.rng.range_f64(-2.0, 2.0);
                walker.velocity.y = self.rng.range_f64(-2.0, 2.0);
            }
            walker.yaw = (walker.yaw + self.rng.range_f64(0.0, 0.1)) % std::f64::consts::TAU;
            advance(walker, extent);
        }
        removed
    }

    /// One block per visible zone, as a zone manager would route them.
    fn blocks(
        &self,
        tick: u64,
        visible: &BTreeSet<ZoneKey>,
        removed: &[(EntityId, ZoneKey)],
    ) -> Vec<StateBlock> {
        let mut blocks: Vec<StateBlock> = visible
            .iter()
            .map(|zone| StateBlock::new(tick, *zone))
            .collect();
        let slot = |zone: ZoneKey| visible.iter().position(|z| *z == zone);

        for walker in std::iter::once(&self.player).chain(&self.walkers) {
            if let Some(index) = slot(self.grid.zone_for(walker.position)) {
                blocks[index].updates.push(zone::StateEntry::new(
                    walker.id,
                    walker.position,
                    DQuat::from_rotation_z(walker.yaw),
                ));
            }
        }
        for (id, zone) in removed {
            if let Some(index) = slot(*zone) {
                blocks[index].removals.push(*id);
            }
        }
        blocks.retain(|block| !block.is_empty());
        blocks
    }
}

fn advance(walker: &mut Walker, extent: f64) {
    walker.position += walker.velocity;
    for axis in 0..2 {
        if walker.position[axis].abs() > extent {
            walker.position[axis] = walker.position[axis].clamp(-extent, extent);
            walker.velocity[axis] = -walker.velocity[axis];
        }
    }
}

pub(crate) struct Rng {
    state: u64,
}

impl Rng {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub(crate) fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.state >> 32) as u32
    }

    pub(crate) fn below(&mut self, bound: u32) -> u32 {
        self.next_u32() % bound.max(1)
    }

    pub(crate) fn percent(&mut self, percent: u32) -> bool {
        self.below(100) < percent
    }

    fn range_f64(&mut self, min: f64, max: f64) -> f64 {
        min + (max - min) * (f64::from(self.next_u32()) / f64::from(u32::MAX))
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    entities: u32,
    ticks: u32,
    seed: u64,
    loss_percent: u32,
    max_message_size: usize,
    messages: u64,
    bytes_total: u64,
    avg_message_bytes: u64,
    p95_message_bytes: u64,
    max_message_bytes: u64,
    acks_processed: u64,
    acks_posted: u64,
    baselines_committed: u64,
    acks_unconfirmed: u64,
    states_emitted: u64,
    marked_removed: u64,
    reaped: u64,
    messages_lost: u64,
    baseline_misses: u64,
    versions_pruned: u64,
    removals_seen: u64,
    objects_seen: usize,
    final_objects: usize,
    ping_ms: f64,
    #[serde(skip)]
    sizes: Vec<u64>,
}

impl Summary {
    fn new(cli: &Cli) -> Self {
        Self {
            entities: cli.entities,
            ticks: cli.ticks,
            seed: cli.seed,
            loss_percent: cli.loss_percent,
            max_message_size: 0,
            messages: 0,
            bytes_total: 0,
            avg_message_bytes: 0,
            p95_message_bytes: 0,
            max_message_bytes: 0,
            acks_processed: 0,
            acks_posted: 0,
            baselines_committed: 0,
            acks_unconfirmed: 0,
            states_emitted: 0,
            marked_removed: 0,
            reaped: 0,
            messages_lost: 0,
            baseline_misses: 0,
            versions_pruned: 0,
            removals_seen: 0,
            objects_seen: 0,
            final_objects: 0,
            ping_ms: 0.0,
            sizes: Vec::new(),
        }
    }

    fn record(&mut self, stats: &replication::FrameStats) {
        self.acks_processed += stats.acks_processed as u64;
        self.baselines_committed += stats.baselines_committed as u64;
        self.acks_unconfirmed += stats.acks_unconfirmed as u64;
        self.states_emitted += stats.states_emitted as u64;
        self.marked_removed += stats.marked_removed as u64;
        self.reaped += stats.reaped as u64;
    }

    fn push_message(&mut self, bytes: u64) {
        self.messages += 1;
        self.bytes_total += bytes;
        self.max_message_bytes = self.max_message_bytes.max(bytes);
        self.sizes.push(bytes);
    }

    fn finalize(&mut self, replicator: &ClientReplicator<Forwarder>, report: &client::ClientReport) {
        self.max_message_size = replicator.max_message_size();
        self.final_objects = replicator.object_count();
        self.ping_ms = replicator.ping().as_secs_f64() * 1000.0;
        self.acks_posted = report.acks_posted;
        self.messages_lost = report.messages_lost;
        self.baseline_misses = report.baseline_misses;
        self.versions_pruned = report.versions_pruned;
        self.removals_seen = report.removals_seen;
        self.objects_seen = report.objects_seen;

        if self.messages > 0 {
            self.avg_message_bytes = self.bytes_total / self.messages;
            self.sizes.sort_unstable();
            let idx = ((self.sizes.len() as f64) * 0.95).ceil() as usize;
            let idx = idx.saturating_sub(1).min(self.sizes.len() - 1);
            self.p95_message_bytes = self.sizes[idx];
        }
    }

    fn assert_budgets(&self, max_p95: Option<u64>) -> Result<()> {
        if self.baseline_misses > 0 {
            anyhow::bail!(
                "client saw {} deltas against versions it does not hold",
                self.baseline_misses
            );
        }
        if let Some(max_p95) = max_p95 {
            if self.p95_message_bytes > max_p95 {
                anyhow::bail!(
                    "p95 message bytes {} exceeds budget {}",
                    self.p95_message_bytes,
                    max_p95
                );
            }
        }
        Ok(())
    }
}
