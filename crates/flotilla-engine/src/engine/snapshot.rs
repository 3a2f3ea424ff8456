use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{FleetSide, VesselId};

use super::{battle::Battle, command::CommandSummary};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselSnapshot {
    pub id: VesselId,
    pub side: FleetSide,
    pub position: Vec2,
    pub heading: f32,
    pub hit_points: f32,
    pub max_hit_points: f32,
    pub command_confidence: f32,
    pub target: Option<VesselId>,
}

/// Read-only state of a match after one tick.
///
/// Destroyed vessels are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleSnapshot {
    pub tick: u64,
    pub vessels: Vec<VesselSnapshot>,
    /// Outstanding orders of `[alpha, beta]`.
    pub commands: [CommandSummary; 2],
}

impl BattleSnapshot {
    #[must_use]
    pub fn capture(battle: &Battle<'_>) -> Self {
        let roster = battle.roster();
        let vessels = roster
            .iter()
            .filter(|v| v.is_alive())
            .map(|v| VesselSnapshot {
                id: v.id(),
                side: v.side(),
                position: v.position(),
                heading: v.heading(),
                hit_points: v.hit_points(),
                max_hit_points: v.max_hit_points(),
                command_confidence: v.command_confidence(),
                target: battle.assignment(v.side()).target_of(v.id()),
            })
            .collect();
        Self {
            tick: battle.tick(),
            vessels,
            commands: FleetSide::ALL.map(|side| battle.admiral(side).command_summary(roster)),
        }
    }
}

/// Receives the battle after every tick.
///
/// Observers only get shared access; they cannot change the match.
pub trait BattleObserver {
    fn on_tick(&mut self, battle: &Battle<'_>);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl BattleObserver for NoopObserver {
    fn on_tick(&mut self, _battle: &Battle<'_>) {}
}

/// Collects a snapshot every `every` ticks.
#[derive(Debug, Clone)]
pub struct SnapshotRecorder {
    every: u64,
    snapshots: Vec<BattleSnapshot>,
}

impl SnapshotRecorder {
    #[must_use]
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            snapshots: vec![],
        }
    }

    #[must_use]
    pub fn snapshots(&self) -> &[BattleSnapshot] {
        &self.snapshots
    }

    #[must_use]
    pub fn into_snapshots(self) -> Vec<BattleSnapshot> {
        self.snapshots
    }
}

impl BattleObserver for SnapshotRecorder {
    fn on_tick(&mut self, battle: &Battle<'_>) {
        if battle.tick() % self.every == 0 || battle.end().is_some() {
            self.snapshots.push(battle.snapshot());
        }
    }
}

/// Centre of a snapshot's living vessels on one side.
#[must_use]
pub fn snapshot_centroid(snapshot: &BattleSnapshot, side: FleetSide) -> Option<Vec2> {
    let (sum, n) = snapshot
        .vessels
        .iter()
        .filter(|v| v.side == side)
        .fold((Vec2::ZERO, 0_u16), |(sum, n), v| (sum + v.position, n + 1));
    (n > 0).then(|| sum / f32::from(n))
}
