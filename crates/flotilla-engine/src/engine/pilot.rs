use std::fmt::Debug;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{FleetSide, Roster, Vessel, VesselId};

/// What a pilot sees of one vessel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VesselView {
    pub id: VesselId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub hull_fraction: f32,
    pub armor: f32,
    pub dps: f32,
    pub max_thrust: f32,
    pub weapon_range: f32,
}

impl VesselView {
    #[must_use]
    pub fn of(vessel: &Vessel) -> Self {
        Self {
            id: vessel.id(),
            position: vessel.position(),
            velocity: vessel.velocity(),
            hull_fraction: vessel.hull_fraction(),
            armor: vessel.armor(),
            dps: vessel.dps(),
            max_thrust: vessel.max_thrust(),
            weapon_range: vessel.weapon_range(),
        }
    }
}

/// Per-vessel input to a [`Pilot`].
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub own: VesselView,
    pub side: FleetSide,
    pub command_confidence: f32,
    /// Living allies, excluding the observing vessel, in identifier order.
    pub allies: Vec<VesselView>,
    /// Living enemies in identifier order.
    pub enemies: Vec<VesselView>,
    /// Target assigned by the targeting engine on the previous tick.
    pub assigned_target: Option<VesselId>,
    pub arena_radius: f32,
}

impl Observation {
    #[must_use]
    pub fn new(
        roster: &Roster,
        vessel: &Vessel,
        assigned_target: Option<VesselId>,
        arena_radius: f32,
    ) -> Self {
        let side = vessel.side();
        Self {
            own: VesselView::of(vessel),
            side,
            command_confidence: vessel.command_confidence(),
            allies: roster
                .fleet(side)
                .filter(|v| v.id() != vessel.id())
                .map(VesselView::of)
                .collect(),
            enemies: roster.fleet(side.opponent()).map(VesselView::of).collect(),
            assigned_target,
            arena_radius,
        }
    }

    #[must_use]
    pub fn enemy(&self, id: VesselId) -> Option<&VesselView> {
        self.enemies.iter().find(|e| e.id == id)
    }

    /// Nearest enemy; equal distances resolve to the lower identifier.
    #[must_use]
    pub fn nearest_enemy(&self) -> Option<&VesselView> {
        self.enemies.iter().min_by(|a, b| {
            self.own
                .position
                .distance(a.position)
                .total_cmp(&self.own.position.distance(b.position))
                .then(a.id.cmp(&b.id))
        })
    }
}

/// Per-tick decision of one vessel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VesselAction {
    /// Requested acceleration; clamped to the vessel's maximum thrust.
    pub thrust: Vec2,
    pub fire: bool,
    pub target_preference: Option<VesselId>,
}

/// Evaluation hook mapping what a vessel observes to what it does.
///
/// A pilot is shared by every vessel of one fleet and must be stateless between
/// calls; the battle owns all match state.
pub trait Pilot: Debug + Send + Sync {
    fn act(&self, observation: &Observation) -> VesselAction;
}

/// Pilot that charges its assigned target, or the nearest enemy, and always fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptedPilot;

impl Pilot for ScriptedPilot {
    fn act(&self, observation: &Observation) -> VesselAction {
        let target = observation
            .assigned_target
            .and_then(|id| observation.enemy(id))
            .or_else(|| observation.nearest_enemy());
        let Some(target) = target else {
            return VesselAction::default();
        };
        let offset = target.position - observation.own.position;
        // stop closing in once comfortably inside weapon range
        let thrust = if offset.length() > observation.own.weapon_range * 0.8 {
            offset.normalize_or_zero() * observation.own.max_thrust
        } else {
            -observation.own.velocity
        };
        VesselAction {
            thrust,
            fire: true,
            target_preference: Some(target.id),
        }
    }
}
