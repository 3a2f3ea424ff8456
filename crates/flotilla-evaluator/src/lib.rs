//! Genome-facing side of a match: how parameters fly a fleet and how a match is scored.
//!
//! - [`network_pilot`] - Fixed-topology feed-forward network that turns opaque genome
//!   parameters into a [`Pilot`](flotilla_engine::Pilot)
//! - [`battle_scorer`] - Fitness of one fleet from a finished
//!   [`BattleReport`](flotilla_engine::BattleReport), including draws scored from
//!   partial combat metrics
//! - [`mvp`] - Most valuable vessel of a match
//!
//! # Architecture
//!
//! ```text
//! Genome parameters
//!     ↓ NetworkPilot::from_parameters
//! Battle (flotilla-engine)
//!     ↓ BattleReport
//! BattleScorer → per-fleet fitness delta
//! identify_mvp → MVP vessel
//! ```
//!
//! # Example
//!
//! ```
//! use flotilla_engine::{Battle, BattleRules, FleetSide, NoopObserver, VesselTemplate};
//! use flotilla_evaluator::{
//!     battle_scorer::{BattleScorer as _, DefaultBattleScorer},
//!     network_pilot::{NetworkPilot, PARAMETER_COUNT},
//! };
//! use rand::SeedableRng as _;
//!
//! let alpha = NetworkPilot::from_parameters(&[0.1; PARAMETER_COUNT]).unwrap();
//! let beta = NetworkPilot::from_parameters(&[-0.1; PARAMETER_COUNT]).unwrap();
//! let mut rules = BattleRules::default();
//! rules.battle.tick_ceiling = 300;
//! let mut rng = rand::rngs::StdRng::seed_from_u64(1);
//! let report = Battle::new(
//!     rules,
//!     [&VesselTemplate::STANDARD_FLEET, &VesselTemplate::STANDARD_FLEET],
//!     [&alpha, &beta],
//!     &mut rng,
//! )
//! .run(&mut NoopObserver);
//! let fitness = DefaultBattleScorer.score(&report, FleetSide::Alpha);
//! assert!(fitness >= 0.0);
//! ```

pub mod battle_scorer;
pub mod mvp;
pub mod network_pilot;
