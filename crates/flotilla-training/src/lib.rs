//! Training system that evolves fleet pilots through simulated battles.
//!
//! Each genome is the parameter vector of a small feed-forward network that flies
//! one fleet. Genomes are paired into 5v5 battles, scored from the outcome, ranked
//! with a prestige bias and bred into the next generation.
//!
//! # How Training Works
//!
//! 1. **Population** - Create genomes with random parameters
//! 2. **Evaluation** - Play every match of the generation in parallel
//!    ([`evaluator`]); each result is submitted to the ledger as it finishes
//! 3. **Flush** - Force every queued result into the store at the generation boundary
//! 4. **Selection** - Rank genomes by prestige-biased fitness and cut the elite set
//!    ([`selection`])
//! 5. **Reproduction** - Keep the elites and breed the rest ([`evolution`])
//! 6. **Repeat** - Until the configured generations are done or the best genome
//!    reaches the fitness threshold
//!
//! # Architecture
//!
//! ```text
//! TrainingSession
//!     ↓ owns
//! Population (genomes)
//!     ↓ flown by
//! NetworkPilot (flotilla-evaluator)
//!     ↓ in
//! Battle (flotilla-engine)
//!     ↓ scored by
//! BattleScorer → SkirmishResult → Ledger (flotilla-ledger)
//!     ↓ ranked by
//! MeritocraticSelector
//!     ↓ bred by
//! Breeder
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use flotilla_ledger::MemoryStore;
//! use flotilla_training::{config::TrainingConfig, session::TrainingSession};
//!
//! let config = TrainingConfig {
//!     population_size: 20,
//!     generations: 10,
//!     ..TrainingConfig::default()
//! };
//! let mut session = TrainingSession::new(config, MemoryStore::new())?;
//! let summary = session.run(|report, _| {
//!     println!("generation {}: {:?}", report.generation, report.fitness);
//! })?;
//! println!("champion: {:?}", summary.champion.map(|g| g.id()));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Design Principles
//!
//! ## Explicit Session State
//!
//! All training progress lives in a [`TrainingSession`](session::TrainingSession)
//! owned by the caller. The evaluator and the selector receive what they need by
//! reference; nothing is global.
//!
//! ## Anti-Stagnation
//!
//! Prestige (accumulated victories) raises a genome's selection fitness by a fixed
//! share per victory, but never beyond a multiple of its raw fitness. A lineage that
//! stops winning loses its rank within a few generations.
//!
//! # Current Limitations
//!
//! - **Fixed network topology**: only weights and biases evolve
//! - **Symmetric fleets**: both sides always field the same ships
//! - **Single objective**: fitness is one hand-weighted scalar
//! - **Expensive**: every generation plays `population × rounds` full battles

pub mod config;
pub mod evaluator;
pub mod evolution;
pub mod genome;
pub mod selection;
pub mod session;
pub mod weights;
