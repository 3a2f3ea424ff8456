//! Tactical targeting: which friendly vessels engage which enemy.
//!
//! The engine rebuilds a [`TacticalAssignment`] for one fleet from scratch every
//! tick. It works in passes over the living roster:
//!
//! 1. **Fallback** - vessels whose command confidence is below the minimum ignore the
//!    assignment and engage the nearest living enemy on their own
//! 2. **Focus** - vessels under a live focus-fire order engage the ordered target
//! 3. **Carry-over** - vessels keep last tick's target while it lives, so engagers do
//!    not churn between ticks
//! 4. **Fill** - the rest engage the nearest enemy that still has room
//! 5. **Escalation** - an engaged target whose combined engager DPS is below
//!    `armor * escalation_threshold` receives up to `escalation_bonus` more engagers
//!
//! Passes 2-4 never put more than `max_engagers` on one target; only escalation may
//! go beyond it, and never past `max_engagers + escalation_bonus`. Every tie is
//! resolved by proximity, then by engagement count, then by the lower [`VesselId`].

use std::collections::{BTreeMap, BTreeSet};

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use crate::{FleetSide, Roster, Vessel, VesselId};

use super::command::Directive;

/// Upper bound on engagers per target, whatever the configuration says.
pub const MAX_ENGAGER_CAPACITY: usize = 8;

pub type Engagers = ArrayVec<VesselId, MAX_ENGAGER_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingParams {
    /// Engager cap for a target that is not escalated.
    pub max_engagers: usize,
    /// Extra engagers an escalated target may receive.
    pub escalation_bonus: usize,
    /// Ratio of combined engager DPS to target armor below which a target escalates.
    pub escalation_threshold: f32,
}

impl Default for TargetingParams {
    fn default() -> Self {
        Self {
            max_engagers: 3,
            escalation_bonus: 2,
            escalation_threshold: 0.67,
        }
    }
}

impl TargetingParams {
    #[must_use]
    pub fn escalated_cap(&self) -> usize {
        (self.max_engagers + self.escalation_bonus).min(MAX_ENGAGER_CAPACITY)
    }
}

/// Engagers currently assigned to one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Engagement {
    engagers: Engagers,
    escalated: bool,
}

impl Engagement {
    #[must_use]
    pub fn engagers(&self) -> &[VesselId] {
        &self.engagers
    }

    #[must_use]
    pub fn is_escalated(&self) -> bool {
        self.escalated
    }
}

/// Mapping from enemy target to the friendly vessels engaging it.
///
/// Both directions are kept as identifier lookups: target to engagers, and engager
/// to target. Vessels on autonomous fallback are tracked separately and never count
/// as engagers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TacticalAssignment {
    engagements: BTreeMap<VesselId, Engagement>,
    targets: BTreeMap<VesselId, VesselId>,
    autonomous: BTreeMap<VesselId, VesselId>,
}

impl TacticalAssignment {
    /// Builds an assignment from explicit `(target, engagers)` pairs.
    ///
    /// Engagers beyond [`MAX_ENGAGER_CAPACITY`] are dropped.
    #[must_use]
    pub fn with_engagements<'a, I>(engagements: I) -> Self
    where
        I: IntoIterator<Item = (VesselId, &'a [VesselId])>,
    {
        let mut assignment = Self::default();
        for (target, engagers) in engagements {
            for engager in engagers {
                assignment.engage(target, *engager, MAX_ENGAGER_CAPACITY);
            }
        }
        assignment
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.engagements.is_empty() && self.autonomous.is_empty()
    }

    #[must_use]
    pub fn engagement(&self, target: VesselId) -> Option<&Engagement> {
        self.engagements.get(&target)
    }

    /// Engagers assigned to `target`, in assignment order.
    #[must_use]
    pub fn engagers(&self, target: VesselId) -> &[VesselId] {
        self.engagements
            .get(&target)
            .map_or(&[], |e| e.engagers.as_slice())
    }

    pub fn engagements(&self) -> impl Iterator<Item = (VesselId, &Engagement)> + '_ {
        self.engagements.iter().map(|(t, e)| (*t, e))
    }

    /// Target the vessel will fire on this tick, whether assigned or autonomous.
    #[must_use]
    pub fn target_of(&self, vessel: VesselId) -> Option<VesselId> {
        self.targets
            .get(&vessel)
            .or_else(|| self.autonomous.get(&vessel))
            .copied()
    }

    #[must_use]
    pub fn is_autonomous(&self, vessel: VesselId) -> bool {
        self.autonomous.contains_key(&vessel)
    }

    pub fn autonomous(&self) -> impl Iterator<Item = (VesselId, VesselId)> + '_ {
        self.autonomous.iter().map(|(v, t)| (*v, *t))
    }

    fn assigned_target(&self, vessel: VesselId) -> Option<VesselId> {
        self.targets.get(&vessel).copied()
    }

    fn engage(&mut self, target: VesselId, vessel: VesselId, cap: usize) -> bool {
        let engagement = self.engagements.entry(target).or_default();
        if engagement.engagers.len() >= cap.min(MAX_ENGAGER_CAPACITY)
            || engagement.engagers.contains(&vessel)
        {
            return false;
        }
        engagement.engagers.push(vessel);
        self.targets.insert(vessel, target);
        true
    }

    fn release(&mut self, vessel: VesselId) {
        let Some(target) = self.targets.remove(&vessel) else {
            return;
        };
        if let Some(engagement) = self.engagements.get_mut(&target) {
            engagement.engagers.retain(|id| *id != vessel);
            if engagement.engagers.is_empty() {
                self.engagements.remove(&target);
            }
        }
    }
}

/// Computes tactical assignments for one fleet at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetingEngine {
    params: TargetingParams,
    min_confidence: f32,
}

impl TargetingEngine {
    #[must_use]
    pub fn new(params: TargetingParams, min_confidence: f32) -> Self {
        Self {
            params,
            min_confidence,
        }
    }

    #[must_use]
    pub fn params(&self) -> &TargetingParams {
        &self.params
    }

    /// Builds the assignment for `side` from the roster, the fleet's standing
    /// directives, and last tick's assignment.
    ///
    /// Reads nothing besides its arguments; identical inputs give identical output.
    #[must_use]
    pub fn assign(
        &self,
        roster: &Roster,
        side: FleetSide,
        directives: &BTreeMap<VesselId, Directive>,
        previous: &TacticalAssignment,
    ) -> TacticalAssignment {
        let mut next = TacticalAssignment::default();
        let enemies = roster.fleet(side.opponent()).collect::<Vec<_>>();
        if enemies.is_empty() {
            return next;
        }
        let is_enemy = |id: VesselId| roster.living(id).is_some_and(|v| v.side() != side);
        let max = self.params.max_engagers;

        let mut commanded = vec![];
        for vessel in roster.fleet(side) {
            if vessel.command_confidence() < self.min_confidence {
                if let Some(enemy) = roster.nearest_enemy(vessel) {
                    next.autonomous.insert(vessel.id(), enemy.id());
                }
                continue;
            }
            if !matches!(directives.get(&vessel.id()), Some(Directive::Disengage)) {
                commanded.push(vessel);
            }
        }

        for vessel in &commanded {
            if let Some(Directive::Focus(target)) = directives.get(&vessel.id()) {
                if is_enemy(*target) {
                    next.engage(*target, vessel.id(), max);
                }
            }
        }

        for vessel in &commanded {
            if next.assigned_target(vessel.id()).is_some() {
                continue;
            }
            if let Some(target) = previous.assigned_target(vessel.id()) {
                if is_enemy(target) {
                    next.engage(target, vessel.id(), max);
                }
            }
        }

        for vessel in &commanded {
            if next.assigned_target(vessel.id()).is_some() {
                continue;
            }
            let choice = enemies
                .iter()
                .filter(|e| next.engagers(e.id()).len() < max)
                .min_by(|a, b| {
                    vessel
                        .distance_to(a)
                        .total_cmp(&vessel.distance_to(b))
                        .then(a.id().cmp(&b.id()))
                });
            if let Some(enemy) = choice {
                next.engage(enemy.id(), vessel.id(), max);
            }
        }

        self.escalate(roster, &enemies, &commanded, directives, &mut next);
        next
    }

    fn escalate(
        &self,
        roster: &Roster,
        enemies: &[&Vessel],
        commanded: &[&Vessel],
        directives: &BTreeMap<VesselId, Directive>,
        next: &mut TacticalAssignment,
    ) {
        let cap = self.params.escalated_cap();
        let mut moved = BTreeSet::new();

        for target in enemies {
            // armor <= 0 is trivially defeatable
            if target.armor() <= 0.0 {
                continue;
            }
            let engaged = next.engagers(target.id());
            if engaged.is_empty() {
                continue;
            }
            let combined_dps = engaged
                .iter()
                .filter_map(|id| roster.get(*id))
                .map(Vessel::dps)
                .sum::<f32>();
            if combined_dps >= target.armor() * self.params.escalation_threshold {
                continue;
            }

            let room = cap
                .saturating_sub(engaged.len())
                .min(self.params.escalation_bonus);
            let mut candidates = commanded
                .iter()
                .filter(|v| !moved.contains(&v.id()))
                .filter_map(|v| {
                    let current = next.assigned_target(v.id());
                    if current == Some(target.id()) {
                        return None;
                    }
                    if let (Some(current), Some(Directive::Focus(ordered))) =
                        (current, directives.get(&v.id()))
                    {
                        if current == *ordered {
                            return None;
                        }
                    }
                    let commitment = match current {
                        Some(current) => {
                            if next.engagement(current).is_some_and(Engagement::is_escalated) {
                                return None;
                            }
                            next.engagers(current).len()
                        }
                        None => 0,
                    };
                    Some((v.distance_to(target), commitment, v.id()))
                })
                .collect::<Vec<_>>();
            candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

            let mut added = false;
            for (_, _, vessel) in candidates.into_iter().take(room) {
                next.release(vessel);
                if next.engage(target.id(), vessel, cap) {
                    moved.insert(vessel);
                    added = true;
                }
            }
            // escalated only once it actually received extra engagers
            if added && let Some(engagement) = next.engagements.get_mut(&target.id()) {
                engagement.escalated = true;
            }
        }
    }
}
