//! Per-tick match systems.
//!
//! - [`TargetingEngine`] - Engager assignment with escalation and overkill prevention
//! - [`Admiral`] - Fleet orders, their confidence, and their lifecycle
//! - [`Pilot`] - Evaluation hook mapping an [`Observation`] to a [`VesselAction`]
//! - [`Battle`] - Fixed-rate tick loop driving all of the above until one fleet is
//!   eliminated or the tick ceiling is reached
//! - [`BattleSnapshot`] - Read-only per-tick view for renderers and replays
//!
//! # Example
//!
//! ```
//! use flotilla_engine::{Battle, BattleRules, NoopObserver, ScriptedPilot, VesselTemplate};
//! use rand::SeedableRng as _;
//!
//! let rules = BattleRules::default();
//! let pilot = ScriptedPilot;
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let battle = Battle::new(
//!     rules,
//!     [&VesselTemplate::STANDARD_FLEET, &VesselTemplate::STANDARD_FLEET],
//!     [&pilot, &pilot],
//!     &mut rng,
//! );
//! let report = battle.run(&mut NoopObserver);
//! assert!(report.ticks <= rules.battle.tick_ceiling);
//! ```

pub use self::{battle::*, command::*, pilot::*, snapshot::*, targeting::*};

mod battle;
mod command;
mod pilot;
mod snapshot;
mod targeting;
