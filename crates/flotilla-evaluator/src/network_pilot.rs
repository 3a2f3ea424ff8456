//! Genome-driven pilot.
//!
//! A genome's parameters are the weights and biases of a small feed-forward network
//! with `tanh` activations:
//!
//! ```text
//! 10 inputs → 6 hidden → 4 outputs
//! ```
//!
//! Inputs are normalized features of what the vessel observes:
//!
//! | # | Feature |
//! |---|---------|
//! | 0, 1 | Offset to the engaged target, divided by the arena radius |
//! | 2, 3 | Own velocity, divided by 100 |
//! | 4 | Own hull fraction |
//! | 5 | Target hull fraction |
//! | 6 | Target distance over own weapon range, capped at 2 |
//! | 7 | Living allies / 4 |
//! | 8 | Living enemies / 5 |
//! | 9 | Command confidence |
//!
//! Outputs are read as:
//!
//! | # | Action |
//! |---|--------|
//! | 0 | Thrust toward (positive) or away from (negative) the target |
//! | 1 | Lateral thrust |
//! | 2 | Fire when positive |
//! | 3 | Prefer the weakest enemy when positive, else the engaged target |
//!
//! The "engaged target" is the target assigned on the previous tick, or the nearest
//! enemy when none is assigned.

use flotilla_engine::{Observation, Pilot, VesselAction, VesselView};
use glam::Vec2;

pub const INPUT_COUNT: usize = 10;
pub const HIDDEN_COUNT: usize = 6;
pub const OUTPUT_COUNT: usize = 4;

/// Number of genome parameters a [`NetworkPilot`] consumes.
pub const PARAMETER_COUNT: usize =
    INPUT_COUNT * HIDDEN_COUNT + HIDDEN_COUNT + HIDDEN_COUNT * OUTPUT_COUNT + OUTPUT_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("expected {expected} network parameters, got {actual}")]
pub struct ParameterCountError {
    pub expected: usize,
    pub actual: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkPilot {
    parameters: Vec<f32>,
}

impl NetworkPilot {
    pub fn from_parameters(parameters: &[f32]) -> Result<Self, ParameterCountError> {
        if parameters.len() != PARAMETER_COUNT {
            return Err(ParameterCountError {
                expected: PARAMETER_COUNT,
                actual: parameters.len(),
            });
        }
        Ok(Self {
            parameters: parameters.to_vec(),
        })
    }

    #[must_use]
    pub fn parameters(&self) -> &[f32] {
        &self.parameters
    }

    /// Runs the network forward.
    #[must_use]
    pub fn forward(&self, inputs: &[f32; INPUT_COUNT]) -> [f32; OUTPUT_COUNT] {
        let (hidden_weights, rest) = self.parameters.split_at(INPUT_COUNT * HIDDEN_COUNT);
        let (hidden_biases, rest) = rest.split_at(HIDDEN_COUNT);
        let (output_weights, output_biases) = rest.split_at(HIDDEN_COUNT * OUTPUT_COUNT);

        let hidden: [f32; HIDDEN_COUNT] = std::array::from_fn(|h| {
            let row = &hidden_weights[h * INPUT_COUNT..(h + 1) * INPUT_COUNT];
            let sum: f32 = row.iter().zip(inputs).map(|(w, x)| w * x).sum();
            (sum + hidden_biases[h]).tanh()
        });
        std::array::from_fn(|o| {
            let row = &output_weights[o * HIDDEN_COUNT..(o + 1) * HIDDEN_COUNT];
            let sum: f32 = row.iter().zip(&hidden).map(|(w, x)| w * x).sum();
            (sum + output_biases[o]).tanh()
        })
    }
}

fn engaged_target(observation: &Observation) -> Option<&VesselView> {
    observation
        .assigned_target
        .and_then(|id| observation.enemy(id))
        .or_else(|| observation.nearest_enemy())
}

fn weakest_enemy(observation: &Observation) -> Option<&VesselView> {
    observation.enemies.iter().min_by(|a, b| {
        a.hull_fraction
            .total_cmp(&b.hull_fraction)
            .then(a.id.cmp(&b.id))
    })
}

#[expect(clippy::cast_precision_loss)]
fn features(observation: &Observation, target: &VesselView) -> [f32; INPUT_COUNT] {
    let own = &observation.own;
    let offset = target.position - own.position;
    let radius = observation.arena_radius.max(1.0);
    let range = own.weapon_range.max(1.0);
    [
        offset.x / radius,
        offset.y / radius,
        own.velocity.x / 100.0,
        own.velocity.y / 100.0,
        own.hull_fraction,
        target.hull_fraction,
        (offset.length() / range).min(2.0),
        observation.allies.len() as f32 / 4.0,
        observation.enemies.len() as f32 / 5.0,
        observation.command_confidence,
    ]
}

impl Pilot for NetworkPilot {
    fn act(&self, observation: &Observation) -> VesselAction {
        let Some(target) = engaged_target(observation) else {
            return VesselAction::default();
        };
        let outputs = self.forward(&features(observation, target));

        let forward = (target.position - observation.own.position).normalize_or_zero();
        let thrust = (forward * outputs[0] + forward.perp() * outputs[1])
            .clamp_length_max(1.0)
            * observation.own.max_thrust;
        let preferred = if outputs[3] > 0.0 {
            weakest_enemy(observation).unwrap_or(target)
        } else {
            target
        };
        VesselAction {
            thrust: if thrust.is_finite() { thrust } else { Vec2::ZERO },
            fire: outputs[2] > 0.0,
            target_preference: Some(preferred.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use flotilla_engine::{FleetSide, Roster, VesselId, VesselTemplate};

    use super::*;

    fn observation() -> Observation {
        let mut roster = Roster::new();
        let me = roster.spawn(FleetSide::Alpha, &VesselTemplate::FIGHTER, Vec2::ZERO, 0.0, 0.1);
        roster.spawn(
            FleetSide::Beta,
            &VesselTemplate::FIGHTER,
            Vec2::new(200.0, 0.0),
            0.0,
            0.1,
        );
        let weak = roster.spawn(
            FleetSide::Beta,
            &VesselTemplate::FIGHTER,
            Vec2::new(500.0, 0.0),
            0.0,
            0.1,
        );
        roster.get_mut(weak).unwrap().take_damage(100.0);
        Observation::new(&roster, roster.get(me).unwrap(), None, 1200.0)
    }

    /// Parameters with zero weights and the given output biases.
    fn biased(outputs: [f32; OUTPUT_COUNT]) -> NetworkPilot {
        let mut parameters = vec![0.0; PARAMETER_COUNT];
        parameters[PARAMETER_COUNT - OUTPUT_COUNT..].copy_from_slice(&outputs);
        NetworkPilot::from_parameters(&parameters).unwrap()
    }

    #[test]
    fn test_parameter_count() {
        assert_eq!(PARAMETER_COUNT, 94);
        assert_eq!(
            NetworkPilot::from_parameters(&[0.0; 3]),
            Err(ParameterCountError {
                expected: 94,
                actual: 3
            })
        );
    }

    #[test]
    fn test_outputs_drive_action() {
        let observation = observation();

        let charge = biased([2.0, 0.0, 1.0, -1.0]).act(&observation);
        assert!(charge.fire);
        assert!(charge.thrust.x > 0.0);
        assert!(charge.thrust.length() <= VesselTemplate::FIGHTER.max_thrust + 1e-3);
        assert_eq!(charge.target_preference, Some(VesselId(1)));

        let flee = biased([-2.0, 0.0, -1.0, 1.0]).act(&observation);
        assert!(!flee.fire);
        assert!(flee.thrust.x < 0.0);
        assert_eq!(flee.target_preference, Some(VesselId(2)));
    }

    #[test]
    fn test_no_enemies_means_no_action() {
        let mut roster = Roster::new();
        let me = roster.spawn(FleetSide::Beta, &VesselTemplate::FIGHTER, Vec2::ZERO, 0.0, 0.1);
        let observation = Observation::new(&roster, roster.get(me).unwrap(), None, 1200.0);
        assert_eq!(
            biased([1.0; OUTPUT_COUNT]).act(&observation),
            VesselAction::default()
        );
    }
}
