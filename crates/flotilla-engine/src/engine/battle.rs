use std::collections::BTreeMap;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{FleetSide, Roster, VesselId, VesselTemplate};

use super::{
    command::{Admiral, CommandParams, Directive, braking_thrust},
    pilot::{Observation, Pilot, VesselAction},
    snapshot::{BattleObserver, BattleSnapshot},
    targeting::{TacticalAssignment, TargetingEngine, TargetingParams},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleParams {
    /// Simulated ticks per second.
    pub tick_rate: u32,
    /// Ticks after which a match without elimination ends as a draw.
    pub tick_ceiling: u64,
    pub arena_radius: f32,
    /// Distance between the two fleets' spawn lines.
    pub spawn_separation: f32,
    /// Maximum random offset applied to each spawn position.
    pub spawn_jitter: f32,
}

impl Default for BattleParams {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            tick_ceiling: 3600,
            arena_radius: 1200.0,
            spawn_separation: 800.0,
            spawn_jitter: 20.0,
        }
    }
}

/// Every rule a match is played under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleRules {
    pub battle: BattleParams,
    pub targeting: TargetingParams,
    pub command: CommandParams,
}

impl BattleRules {
    /// Seconds simulated by one tick.
    #[must_use]
    pub fn dt(&self) -> f32 {
        #[expect(clippy::cast_precision_loss)]
        let rate = self.battle.tick_rate.max(1) as f32;
        1.0 / rate
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BattleEnd {
    #[display("{winner} eliminated the opposing fleet")]
    Eliminated { winner: FleetSide },
    #[display("both fleets destroyed")]
    MutualDestruction,
    #[display("tick ceiling reached")]
    TickCeiling,
}

impl BattleEnd {
    #[must_use]
    pub fn winner(self) -> Option<FleetSide> {
        match self {
            Self::Eliminated { winner } => Some(winner),
            Self::MutualDestruction | Self::TickCeiling => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VesselCombatStats {
    pub damage_dealt: f32,
    pub damage_taken: f32,
    pub kills: u32,
    /// Ticks on which the vessel fired.
    pub shots: u32,
    /// Ticks on which the vessel fired with its target in weapon range.
    pub hits: u32,
    pub survived_ticks: u64,
    pub destroyed_at: Option<u64>,
}

impl VesselCombatStats {
    #[must_use]
    pub fn accuracy(&self) -> f32 {
        if self.shots == 0 {
            0.0
        } else {
            #[expect(clippy::cast_precision_loss)]
            let ratio = self.hits as f32 / self.shots as f32;
            ratio
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselReport {
    pub id: VesselId,
    pub side: FleetSide,
    pub hit_points: f32,
    pub max_hit_points: f32,
    pub stats: VesselCombatStats,
}

/// Outcome and per-vessel metrics of one finished match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleReport {
    pub end: BattleEnd,
    pub ticks: u64,
    pub vessels: Vec<VesselReport>,
    /// Orders issued by `[alpha, beta]`.
    pub orders_issued: [u32; 2],
}

impl BattleReport {
    pub fn fleet(&self, side: FleetSide) -> impl Iterator<Item = &VesselReport> + '_ {
        self.vessels.iter().filter(move |v| v.side == side)
    }

    #[must_use]
    pub fn total_hit_points(&self, side: FleetSide) -> f32 {
        self.fleet(side).map(|v| v.max_hit_points).sum()
    }

    #[must_use]
    pub fn damage_dealt(&self, side: FleetSide) -> f32 {
        self.fleet(side).map(|v| v.stats.damage_dealt).sum()
    }

    /// Remaining hit points of a fleet as a fraction of its starting hit points.
    #[must_use]
    pub fn surviving_hp_fraction(&self, side: FleetSide) -> f32 {
        let total = self.total_hit_points(side);
        if total <= 0.0 {
            return 0.0;
        }
        let remaining: f32 = self.fleet(side).map(|v| v.hit_points).sum();
        (remaining / total).clamp(0.0, 1.0)
    }
}

/// One match between two fleets, each flown by its own pilot.
#[derive(Debug)]
pub struct Battle<'a> {
    rules: BattleRules,
    roster: Roster,
    pilots: [&'a dyn Pilot; 2],
    admirals: [Admiral; 2],
    targeting: TargetingEngine,
    assignments: [TacticalAssignment; 2],
    stats: Vec<VesselCombatStats>,
    // cumulative damage received per target, by shooter
    contributions: Vec<BTreeMap<VesselId, f32>>,
    orders_issued: [u32; 2],
    tick: u64,
    end: Option<BattleEnd>,
}

impl<'a> Battle<'a> {
    /// Spawns both fleets facing each other across the arena centre.
    ///
    /// Alpha vessels receive the lower identifiers. `rng` only perturbs spawn
    /// positions; the match itself is deterministic.
    pub fn new<R>(
        rules: BattleRules,
        fleets: [&[VesselTemplate]; 2],
        pilots: [&'a dyn Pilot; 2],
        rng: &mut R,
    ) -> Self
    where
        R: Rng + ?Sized,
    {
        const LINE_SPACING: f32 = 60.0;

        let params = &rules.battle;
        let mut roster = Roster::new();
        for side in FleetSide::ALL {
            let fleet = fleets[side.index()];
            let (x, heading) = match side {
                FleetSide::Alpha => (-params.spawn_separation / 2.0, 0.0),
                FleetSide::Beta => (params.spawn_separation / 2.0, std::f32::consts::PI),
            };
            #[expect(clippy::cast_precision_loss)]
            let centre = (fleet.len().saturating_sub(1)) as f32 / 2.0;
            for (i, template) in fleet.iter().enumerate() {
                let mut jitter = || {
                    if params.spawn_jitter > 0.0 {
                        rng.random_range(-params.spawn_jitter..=params.spawn_jitter)
                    } else {
                        0.0
                    }
                };
                #[expect(clippy::cast_precision_loss)]
                let y = (i as f32 - centre) * LINE_SPACING;
                let position = Vec2::new(x + jitter(), y + jitter());
                roster.spawn(
                    side,
                    template,
                    position,
                    heading,
                    rules.command.confidence_decay_rate,
                );
            }
        }

        let count = roster.len();
        Self {
            rules,
            roster,
            pilots,
            admirals: FleetSide::ALL.map(|side| Admiral::new(side, rules.command)),
            targeting: TargetingEngine::new(rules.targeting, rules.command.min_confidence),
            assignments: Default::default(),
            stats: vec![VesselCombatStats::default(); count],
            contributions: vec![BTreeMap::new(); count],
            orders_issued: [0; 2],
            tick: 0,
            end: None,
        }
    }

    #[must_use]
    pub fn rules(&self) -> &BattleRules {
        &self.rules
    }

    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    #[must_use]
    pub fn admiral(&self, side: FleetSide) -> &Admiral {
        &self.admirals[side.index()]
    }

    #[must_use]
    pub fn assignment(&self, side: FleetSide) -> &TacticalAssignment {
        &self.assignments[side.index()]
    }

    #[must_use]
    pub fn stats(&self, vessel: VesselId) -> Option<&VesselCombatStats> {
        self.stats.get(vessel.index())
    }

    #[must_use]
    pub fn end(&self) -> Option<BattleEnd> {
        self.end
    }

    #[must_use]
    pub fn snapshot(&self) -> BattleSnapshot {
        BattleSnapshot::capture(self)
    }

    /// Advances the match by one tick. Does nothing once the match has ended.
    pub fn step(&mut self) {
        if self.end.is_some() {
            return;
        }
        let dt = self.rules.dt();

        let intents = self.decide();
        self.command(&intents);
        self.move_vessels(&intents, dt);
        for side in FleetSide::ALL {
            let directives = self.admirals[side.index()].directives(&self.roster);
            self.assignments[side.index()] = self.targeting.assign(
                &self.roster,
                side,
                &directives,
                &self.assignments[side.index()],
            );
        }
        self.resolve_combat(&intents, dt);

        for (vessel, stats) in self.roster.iter().zip(&mut self.stats) {
            if vessel.is_alive() {
                stats.survived_ticks += 1;
            }
        }
        self.tick += 1;
        self.end = self.check_end();
    }

    /// Plays the match to its end and reports the outcome.
    pub fn run<O>(mut self, observer: &mut O) -> BattleReport
    where
        O: BattleObserver + ?Sized,
    {
        while self.end.is_none() {
            self.step();
            observer.on_tick(&self);
        }
        self.into_report()
    }

    fn decide(&self) -> Vec<(VesselId, VesselAction)> {
        let radius = self.rules.battle.arena_radius;
        self.roster
            .iter()
            .filter(|v| v.is_alive())
            .map(|vessel| {
                let side = vessel.side().index();
                let assigned = self.assignments[side].target_of(vessel.id());
                let observation = Observation::new(&self.roster, vessel, assigned, radius);
                (vessel.id(), self.pilots[side].act(&observation))
            })
            .collect()
    }

    fn command(&mut self, intents: &[(VesselId, VesselAction)]) {
        let interval = u64::from(self.rules.command.command_interval_ticks.max(1));
        if self.tick % interval != 0 {
            return;
        }
        for side in FleetSide::ALL {
            let admiral = &mut self.admirals[side.index()];
            let Some((kind, confidence)) = admiral.decide(&self.roster, intents) else {
                continue;
            };
            match admiral.issue_order(&mut self.roster, kind, confidence, self.tick) {
                Ok(Some(_)) => self.orders_issued[side.index()] += 1,
                Ok(None) => {}
                Err(err) => tracing::debug!(%side, %err, "order rejected"),
            }
        }
    }

    fn move_vessels(&mut self, intents: &[(VesselId, VesselAction)], dt: f32) {
        let directives = FleetSide::ALL.map(|side| self.admirals[side.index()].directives(&self.roster));
        let centroids = FleetSide::ALL.map(|side| self.roster.centroid(side));
        for (id, action) in intents {
            let Some(vessel) = self.roster.get_mut(*id) else {
                continue;
            };
            let side = vessel.side();
            let thrust = match directives[side.index()].get(id) {
                Some(Directive::Hold) => braking_thrust(vessel.velocity(), vessel.max_thrust()),
                Some(Directive::Disengage) => {
                    let away = centroids[side.opponent().index()]
                        .map_or(Vec2::ZERO, |enemy| (vessel.position() - enemy).normalize_or_zero());
                    away * vessel.max_thrust()
                }
                Some(Directive::Focus(_)) | None => action.thrust,
            };
            vessel.set_thrust(thrust);
        }
        let radius = self.rules.battle.arena_radius;
        for vessel in self.roster.iter_mut() {
            vessel.advance(dt);
            vessel.confine(radius);
        }
    }

    fn resolve_combat(&mut self, intents: &[(VesselId, VesselAction)], dt: f32) {
        // shots are resolved simultaneously: a vessel destroyed this tick still fires
        let mut incoming = BTreeMap::<VesselId, Vec<(VesselId, f32)>>::new();
        for (id, action) in intents {
            if !action.fire {
                continue;
            }
            let Some(vessel) = self.roster.living(*id) else {
                continue;
            };
            let stats = &mut self.stats[id.index()];
            stats.shots += 1;
            let target = self.assignments[vessel.side().index()]
                .target_of(*id)
                .and_then(|t| self.roster.living(t))
                .filter(|t| vessel.in_weapon_range(t));
            if let Some(target) = target {
                stats.hits += 1;
                incoming
                    .entry(target.id())
                    .or_default()
                    .push((*id, vessel.dps()));
            }
        }

        for (target, shooters) in incoming {
            let total: f32 = shooters.iter().map(|(_, dps)| dps).sum();
            if total <= 0.0 {
                continue;
            }
            let Some(vessel) = self.roster.get_mut(target) else {
                continue;
            };
            let armor = vessel.armor();
            let mitigated = if armor > 0.0 {
                total * total / (total + armor)
            } else {
                total
            };
            let applied = vessel.take_damage(mitigated * dt);
            let destroyed = !vessel.is_alive();

            self.stats[target.index()].damage_taken += applied;
            let contributions = &mut self.contributions[target.index()];
            for (shooter, dps) in &shooters {
                let share = applied * dps / total;
                self.stats[shooter.index()].damage_dealt += share;
                *contributions.entry(*shooter).or_default() += share;
            }
            if destroyed && applied > 0.0 {
                self.stats[target.index()].destroyed_at = Some(self.tick);
                let killer = contributions
                    .iter()
                    .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(a.0)))
                    .map(|(id, _)| *id);
                if let Some(killer) = killer {
                    self.stats[killer.index()].kills += 1;
                }
                tracing::trace!(%target, killer = ?killer, tick = self.tick, "vessel destroyed");
            }
        }
    }

    fn check_end(&self) -> Option<BattleEnd> {
        let alpha = self.roster.living_count(FleetSide::Alpha);
        let beta = self.roster.living_count(FleetSide::Beta);
        match (alpha, beta) {
            (0, 0) => Some(BattleEnd::MutualDestruction),
            (_, 0) => Some(BattleEnd::Eliminated {
                winner: FleetSide::Alpha,
            }),
            (0, _) => Some(BattleEnd::Eliminated {
                winner: FleetSide::Beta,
            }),
            _ if self.tick >= self.rules.battle.tick_ceiling => Some(BattleEnd::TickCeiling),
            _ => None,
        }
    }

    fn into_report(mut self) -> BattleReport {
        for admiral in &mut self.admirals {
            admiral.expire_all();
        }
        let end = self.end.unwrap_or(BattleEnd::TickCeiling);
        tracing::debug!(%end, ticks = self.tick, "battle finished");
        let vessels = self
            .roster
            .iter()
            .zip(&self.stats)
            .map(|(vessel, stats)| VesselReport {
                id: vessel.id(),
                side: vessel.side(),
                hit_points: vessel.hit_points(),
                max_hit_points: vessel.max_hit_points(),
                stats: *stats,
            })
            .collect();
        BattleReport {
            end,
            ticks: self.tick,
            vessels,
            orders_issued: self.orders_issued,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    use super::*;
    use crate::{NoopObserver, ScriptedPilot};

    /// Pilot that never moves or fires.
    #[derive(Debug)]
    struct Idle;

    impl Pilot for Idle {
        fn act(&self, _: &Observation) -> VesselAction {
            VesselAction::default()
        }
    }

    fn play(rules: BattleRules, pilots: [&dyn Pilot; 2], seed: u64) -> BattleReport {
        let mut rng = Pcg64Mcg::seed_from_u64(seed);
        Battle::new(
            rules,
            [&VesselTemplate::STANDARD_FLEET, &VesselTemplate::STANDARD_FLEET],
            pilots,
            &mut rng,
        )
        .run(&mut NoopObserver)
    }

    #[test]
    fn test_spawn_layout() {
        let mut rng = Pcg64Mcg::seed_from_u64(1);
        let battle = Battle::new(
            BattleRules::default(),
            [&VesselTemplate::STANDARD_FLEET, &[VesselTemplate::FIGHTER]],
            [&ScriptedPilot, &ScriptedPilot],
            &mut rng,
        );
        assert_eq!(battle.roster().len(), 6);
        assert_eq!(battle.roster().living_count(FleetSide::Alpha), 5);
        let beta = battle.roster().get(VesselId(5)).unwrap();
        assert_eq!(beta.side(), FleetSide::Beta);
        assert!(beta.position().x > 0.0);
        assert!(battle.roster().fleet(FleetSide::Alpha).all(|v| v.position().x < 0.0));
    }

    #[test]
    fn test_idle_fleets_time_out_as_draw() {
        let mut rules = BattleRules::default();
        rules.battle.tick_ceiling = 120;
        let report = play(rules, [&Idle, &Idle], 3);
        assert_eq!(report.end, BattleEnd::TickCeiling);
        assert_eq!(report.ticks, 120);
        assert!(report.end.winner().is_none());
        assert_eq!(report.damage_dealt(FleetSide::Alpha), 0.0);
        assert!((report.surviving_hp_fraction(FleetSide::Beta) - 1.0).abs() < 1e-6);
        assert!(report.vessels.iter().all(|v| v.stats.survived_ticks == 120));
    }

    #[test]
    fn test_aggressive_fleet_beats_idle_fleet() {
        let report = play(BattleRules::default(), [&ScriptedPilot, &Idle], 11);
        assert_eq!(
            report.end,
            BattleEnd::Eliminated {
                winner: FleetSide::Alpha
            }
        );
        assert!(report.ticks < BattleRules::default().battle.tick_ceiling);
        let kills: u32 = report.fleet(FleetSide::Alpha).map(|v| v.stats.kills).sum();
        assert_eq!(kills, 5);
        let dealt = report.damage_dealt(FleetSide::Alpha);
        let taken: f32 = report.fleet(FleetSide::Beta).map(|v| v.stats.damage_taken).sum();
        assert!((dealt - taken).abs() < 1e-2);
        assert!((taken - report.total_hit_points(FleetSide::Beta)).abs() < 1e-2);
        assert!(report.fleet(FleetSide::Beta).all(|v| v.stats.destroyed_at.is_some()));
        assert!(report.orders_issued[0] > 0);
    }

    #[test]
    fn test_engager_cap_holds_every_tick() {
        let rules = BattleRules::default();
        let mut rng = Pcg64Mcg::seed_from_u64(5);
        let mut battle = Battle::new(
            rules,
            [&VesselTemplate::STANDARD_FLEET, &VesselTemplate::STANDARD_FLEET],
            [&ScriptedPilot, &ScriptedPilot],
            &mut rng,
        );
        while battle.end().is_none() {
            battle.step();
            for side in FleetSide::ALL {
                for (_, engagement) in battle.assignment(side).engagements() {
                    assert!(engagement.engagers().len() <= rules.targeting.escalated_cap());
                }
            }
        }
    }

    #[test]
    fn test_same_seed_same_outcome() {
        let a = play(BattleRules::default(), [&ScriptedPilot, &ScriptedPilot], 42);
        let b = play(BattleRules::default(), [&ScriptedPilot, &ScriptedPilot], 42);
        assert_eq!(a, b);
    }
}
