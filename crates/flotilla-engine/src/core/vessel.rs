use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Identifier of a vessel within one match.
///
/// Identifiers are dense indices into the match [`Roster`](crate::Roster) and
/// order deterministically; lower identifiers win every targeting tie-break.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[display("V{_0}")]
#[serde(transparent)]
pub struct VesselId(pub u16);

impl VesselId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Fleet affiliation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum FleetSide {
    #[display("alpha")]
    Alpha,
    #[display("beta")]
    Beta,
}

impl FleetSide {
    pub const ALL: [Self; 2] = [Self::Alpha, Self::Beta];

    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Alpha => Self::Beta,
            Self::Beta => Self::Alpha,
        }
    }

    /// Index of this side in `[alpha, beta]` arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Alpha => 0,
            Self::Beta => 1,
        }
    }
}

/// Stat template a vessel is created from at match start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VesselTemplate {
    pub hit_points: f32,
    pub armor: f32,
    /// Damage per second delivered to the current target while in weapon range.
    pub dps: f32,
    pub max_thrust: f32,
    pub max_speed: f32,
    pub weapon_range: f32,
}

impl VesselTemplate {
    pub const INTERCEPTOR: Self = Self {
        hit_points: 120.0,
        armor: 5.0,
        dps: 14.0,
        max_thrust: 90.0,
        max_speed: 140.0,
        weapon_range: 260.0,
    };

    pub const FIGHTER: Self = Self {
        hit_points: 180.0,
        armor: 12.0,
        dps: 18.0,
        max_thrust: 70.0,
        max_speed: 110.0,
        weapon_range: 300.0,
    };

    pub const DREADNOUGHT: Self = Self {
        hit_points: 480.0,
        armor: 40.0,
        dps: 30.0,
        max_thrust: 35.0,
        max_speed: 60.0,
        weapon_range: 380.0,
    };

    /// Standard five-ship fleet fielded by both sides of a training match.
    pub const STANDARD_FLEET: [Self; 5] = [
        Self::INTERCEPTOR,
        Self::INTERCEPTOR,
        Self::FIGHTER,
        Self::FIGHTER,
        Self::DREADNOUGHT,
    ];
}

/// One combatant: kinematic truth plus command confidence.
///
/// `command_confidence` lies in `[0, 1]`. It only ever rises when a fresh order is
/// applied through [`Vessel::apply_order_confidence`]; between orders it decays
/// linearly in [`Vessel::advance`] and never drops below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    id: VesselId,
    side: FleetSide,
    position: Vec2,
    velocity: Vec2,
    acceleration: Vec2,
    heading: f32,
    hit_points: f32,
    max_hit_points: f32,
    armor: f32,
    dps: f32,
    max_thrust: f32,
    max_speed: f32,
    weapon_range: f32,
    command_confidence: f32,
    confidence_decay_rate: f32,
}

impl Vessel {
    #[must_use]
    pub fn new(
        id: VesselId,
        side: FleetSide,
        template: &VesselTemplate,
        position: Vec2,
        heading: f32,
        confidence_decay_rate: f32,
    ) -> Self {
        Self {
            id,
            side,
            position,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            heading,
            hit_points: template.hit_points,
            max_hit_points: template.hit_points,
            armor: template.armor,
            dps: template.dps,
            max_thrust: template.max_thrust,
            max_speed: template.max_speed,
            weapon_range: template.weapon_range,
            command_confidence: 1.0,
            confidence_decay_rate: confidence_decay_rate.max(0.0),
        }
    }

    #[must_use]
    pub fn id(&self) -> VesselId {
        self.id
    }

    #[must_use]
    pub fn side(&self) -> FleetSide {
        self.side
    }

    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    #[must_use]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    #[must_use]
    pub fn heading(&self) -> f32 {
        self.heading
    }

    #[must_use]
    pub fn hit_points(&self) -> f32 {
        self.hit_points
    }

    #[must_use]
    pub fn max_hit_points(&self) -> f32 {
        self.max_hit_points
    }

    /// Remaining hit points as a fraction of the template value.
    #[must_use]
    pub fn hull_fraction(&self) -> f32 {
        if self.max_hit_points > 0.0 {
            (self.hit_points / self.max_hit_points).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn armor(&self) -> f32 {
        self.armor
    }

    #[must_use]
    pub fn dps(&self) -> f32 {
        self.dps
    }

    #[must_use]
    pub fn max_thrust(&self) -> f32 {
        self.max_thrust
    }

    #[must_use]
    pub fn weapon_range(&self) -> f32 {
        self.weapon_range
    }

    #[must_use]
    pub fn command_confidence(&self) -> f32 {
        self.command_confidence
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.hit_points > 0.0
    }

    #[must_use]
    pub fn distance_to(&self, other: &Vessel) -> f32 {
        self.position.distance(other.position)
    }

    #[must_use]
    pub fn in_weapon_range(&self, target: &Vessel) -> bool {
        self.distance_to(target) <= self.weapon_range
    }

    /// Sets the acceleration input for the next [`Vessel::advance`].
    ///
    /// The magnitude is clamped to the vessel's maximum thrust.
    pub fn set_thrust(&mut self, acceleration: Vec2) {
        self.acceleration = if acceleration.is_finite() {
            acceleration.clamp_length_max(self.max_thrust)
        } else {
            Vec2::ZERO
        };
    }

    /// Integrates position and velocity over `dt` seconds and decays command confidence.
    pub fn advance(&mut self, dt: f32) {
        if !self.is_alive() {
            return;
        }
        self.velocity = (self.velocity + self.acceleration * dt).clamp_length_max(self.max_speed);
        self.position += self.velocity * dt;
        if self.velocity.length_squared() > f32::EPSILON {
            self.heading = self.velocity.y.atan2(self.velocity.x);
        }
        self.command_confidence =
            (self.command_confidence - self.confidence_decay_rate * dt).max(0.0);
    }

    /// Replaces command confidence with that of a freshly issued order.
    ///
    /// The value is replaced, not accumulated.
    pub fn apply_order_confidence(&mut self, confidence: f32) {
        self.command_confidence = confidence.clamp(0.0, 1.0);
    }

    /// Keeps the vessel inside a circular arena centred on the origin.
    pub fn confine(&mut self, arena_radius: f32) {
        if self.position.length() > arena_radius {
            self.position = self.position.normalize_or_zero() * arena_radius;
            self.velocity = Vec2::ZERO;
        }
    }

    /// Applies damage and returns the hit points actually removed.
    pub fn take_damage(&mut self, amount: f32) -> f32 {
        if !self.is_alive() || amount <= 0.0 {
            return 0.0;
        }
        let applied = amount.min(self.hit_points);
        self.hit_points -= applied;
        if self.hit_points <= 0.0 {
            self.hit_points = 0.0;
            self.velocity = Vec2::ZERO;
            self.acceleration = Vec2::ZERO;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vessel() -> Vessel {
        Vessel::new(
            VesselId(0),
            FleetSide::Alpha,
            &VesselTemplate::FIGHTER,
            Vec2::ZERO,
            0.0,
            0.1,
        )
    }

    #[test]
    fn test_confidence_decays_linearly_and_floors_at_zero() {
        let mut v = vessel();
        v.advance(2.0);
        assert!((v.command_confidence() - 0.8).abs() < 1e-6);
        v.advance(100.0);
        assert_eq!(v.command_confidence(), 0.0);
    }

    #[test]
    fn test_confidence_non_increasing_between_orders() {
        let mut v = vessel();
        v.apply_order_confidence(0.9);
        let mut last = v.command_confidence();
        for _ in 0..1000 {
            v.advance(1.0 / 60.0);
            let now = v.command_confidence();
            assert!(now <= last);
            assert!(now >= 0.0);
            last = now;
        }
    }

    #[test]
    fn test_new_order_replaces_confidence() {
        let mut v = vessel();
        v.apply_order_confidence(0.2);
        v.apply_order_confidence(0.8);
        assert!((v.command_confidence() - 0.8).abs() < f32::EPSILON);
        v.apply_order_confidence(1.7);
        assert!((v.command_confidence() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_thrust_is_clamped_and_integrated() {
        let mut v = vessel();
        v.set_thrust(Vec2::new(1000.0, 0.0));
        v.advance(1.0);
        assert!((v.velocity().x - VesselTemplate::FIGHTER.max_thrust).abs() < 1e-3);
        assert!(v.position().x > 0.0);
        assert!(v.heading().abs() < 1e-6);
    }

    #[test]
    fn test_speed_is_capped() {
        let mut v = vessel();
        v.set_thrust(Vec2::new(0.0, 1000.0));
        for _ in 0..600 {
            v.advance(1.0 / 60.0);
        }
        assert!(v.velocity().length() <= VesselTemplate::FIGHTER.max_speed + 1e-3);
    }

    #[test]
    fn test_damage_destroys_at_zero() {
        let mut v = vessel();
        let applied = v.take_damage(1000.0);
        assert_eq!(applied, VesselTemplate::FIGHTER.hit_points);
        assert!(!v.is_alive());
        assert_eq!(v.take_damage(10.0), 0.0);
    }

    #[test]
    fn test_confine_clamps_to_arena() {
        let mut v = Vessel::new(
            VesselId(1),
            FleetSide::Beta,
            &VesselTemplate::INTERCEPTOR,
            Vec2::new(2000.0, 0.0),
            0.0,
            0.1,
        );
        v.confine(1200.0);
        assert!((v.position().length() - 1200.0).abs() < 1e-3);
    }
}
