use flotilla_engine::{
    BattleParams, BattleRules, CommandParams, MAX_ENGAGER_CAPACITY, TargetingParams,
};
use flotilla_ledger::LedgerParams;
use serde::{Deserialize, Serialize};

use crate::{evaluator::PairingScheme, evolution::EvolutionParams, selection::SelectionParams};

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
#[display("invalid `{field}`: {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    #[error(not(source))]
    pub reason: String,
}

/// Every setting of a training run.
///
/// Each section falls back to its defaults when absent, so a partial JSON file only
/// needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub targeting: TargetingParams,
    pub command: CommandParams,
    pub battle: BattleParams,
    pub selection: SelectionParams,
    pub evolution: EvolutionParams,
    pub ledger: LedgerParams,
    pub population_size: usize,
    pub generations: u32,
    /// Concurrent matches; 0 uses the host's available parallelism.
    pub workers: usize,
    pub pairing: PairingScheme,
    pub seed: u64,
    /// Stops training once the best raw fitness reaches this value.
    pub fitness_threshold: Option<f32>,
    /// Generations between elite snapshots; 0 disables periodic snapshots.
    pub snapshot_interval: u32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            targeting: TargetingParams::default(),
            command: CommandParams::default(),
            battle: BattleParams::default(),
            selection: SelectionParams::default(),
            evolution: EvolutionParams::default(),
            ledger: LedgerParams::default(),
            population_size: 50,
            generations: 100,
            workers: 0,
            pairing: PairingScheme::default(),
            seed: 0,
            fitness_threshold: None,
            snapshot_interval: 5,
        }
    }
}

impl TrainingConfig {
    #[must_use]
    pub fn battle_rules(&self) -> BattleRules {
        BattleRules {
            battle: self.battle,
            targeting: self.targeting,
            command: self.command,
        }
    }

    /// Worker count with 0 resolved to the host's parallelism.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism().map_or(1, std::num::NonZero::get)
        }
    }

    /// Whether the elite of `generation` should be snapshotted.
    #[must_use]
    pub fn snapshot_due(&self, generation: u32) -> bool {
        self.snapshot_interval > 0 && (generation + 1) % self.snapshot_interval == 0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let TargetingParams {
            max_engagers,
            escalation_bonus,
            escalation_threshold,
        } = self.targeting;
        check(max_engagers > 0, "targeting.max_engagers", "must be positive")?;
        check(
            max_engagers.saturating_add(escalation_bonus) <= MAX_ENGAGER_CAPACITY,
            "targeting.escalation_bonus",
            &format!("max_engagers + escalation_bonus must not exceed {MAX_ENGAGER_CAPACITY}"),
        )?;
        check(
            escalation_threshold >= 0.0,
            "targeting.escalation_threshold",
            "must be non-negative",
        )?;

        let command = &self.command;
        check(
            (0.0..=1.0).contains(&command.min_confidence),
            "command.min_confidence",
            "must be in [0, 1]",
        )?;
        check(
            command.confidence_decay_rate >= 0.0,
            "command.confidence_decay_rate",
            "must be non-negative",
        )?;
        check(
            command.command_interval_ticks > 0,
            "command.command_interval_ticks",
            "must be positive",
        )?;

        let battle = &self.battle;
        check(battle.tick_rate > 0, "battle.tick_rate", "must be positive")?;
        check(battle.tick_ceiling > 0, "battle.tick_ceiling", "must be positive")?;
        check(battle.arena_radius > 0.0, "battle.arena_radius", "must be positive")?;
        check(
            battle.spawn_separation >= 0.0 && battle.spawn_separation / 2.0 < battle.arena_radius,
            "battle.spawn_separation",
            "fleets must spawn inside the arena",
        )?;

        let selection = &self.selection;
        check(
            selection.elite_fraction > 0.0 && selection.elite_fraction <= 1.0,
            "selection.elite_fraction",
            "must be in (0, 1]",
        )?;
        check(
            selection.prestige_bonus_per_victory >= 0.0,
            "selection.prestige_bonus_per_victory",
            "must be non-negative",
        )?;
        check(
            selection.prestige_cap_multiplier >= 1.0,
            "selection.prestige_cap_multiplier",
            "must be at least 1",
        )?;

        let evolution = &self.evolution;
        check(
            evolution.tournament_size > 0,
            "evolution.tournament_size",
            "must be positive",
        )?;
        check(
            (0.0..=1.0).contains(&evolution.mutation_rate),
            "evolution.mutation_rate",
            "must be in [0, 1]",
        )?;
        check(
            evolution.mutation_sigma >= 0.0,
            "evolution.mutation_sigma",
            "must be non-negative",
        )?;
        check(
            evolution.blx_alpha >= 0.0,
            "evolution.blx_alpha",
            "must be non-negative",
        )?;
        check(
            evolution.max_weight > 0.0,
            "evolution.max_weight",
            "must be positive",
        )?;

        let ledger = &self.ledger;
        check(ledger.batch_size > 0, "ledger.batch_size", "must be positive")?;
        check(
            ledger.queue_capacity >= ledger.batch_size,
            "ledger.queue_capacity",
            "must hold at least one batch",
        )?;
        check(
            ledger.max_commit_attempts > 0,
            "ledger.max_commit_attempts",
            "must be positive",
        )?;

        check(
            self.population_size >= 2,
            "population_size",
            "at least two genomes are needed to play a match",
        )?;
        check(
            self.pairing != PairingScheme::Rotation { rounds: 0 },
            "pairing.rounds",
            "must be positive",
        )?;
        check(
            self.fitness_threshold.is_none_or(|t| !t.is_nan()),
            "fitness_threshold",
            "must be a number",
        )?;
        Ok(())
    }
}

fn check(ok: bool, field: &'static str, reason: &str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError {
            field,
            reason: reason.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrainingConfig::default();
        config.validate().unwrap();
        assert_eq!(config.targeting.max_engagers, 3);
        assert_eq!(config.targeting.escalation_bonus, 2);
        assert_eq!(config.targeting.escalation_threshold, 0.67);
        assert_eq!(config.command.confidence_decay_rate, 0.1);
        assert_eq!(config.command.min_confidence, 0.3);
        assert_eq!(config.selection.elite_fraction, 0.2);
        assert_eq!(config.selection.prestige_bonus_per_victory, 0.1);
        assert_eq!(config.selection.prestige_cap_multiplier, 2.0);
        assert_eq!(config.ledger.batch_size, 10);
        assert_eq!(config.battle.tick_rate, 60);
        assert_eq!(config.battle.tick_ceiling, 3600);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: TrainingConfig = serde_json::from_str(
            r#"{
                "population_size": 12,
                "targeting": { "max_engagers": 4 },
                "pairing": { "kind": "round_robin" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.population_size, 12);
        assert_eq!(config.targeting.max_engagers, 4);
        assert_eq!(config.targeting.escalation_bonus, 2);
        assert_eq!(config.pairing, PairingScheme::RoundRobin);
        assert_eq!(config.ledger, LedgerParams::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_impossible_values() {
        let cases: Vec<(&str, Box<dyn Fn(&mut TrainingConfig)>)> = vec![
            (
                "targeting.escalation_bonus",
                Box::new(|c| c.targeting.escalation_bonus = 6),
            ),
            (
                "selection.elite_fraction",
                Box::new(|c| c.selection.elite_fraction = 0.0),
            ),
            (
                "selection.elite_fraction",
                Box::new(|c| c.selection.elite_fraction = 1.5),
            ),
            ("ledger.batch_size", Box::new(|c| c.ledger.batch_size = 0)),
            (
                "ledger.queue_capacity",
                Box::new(|c| c.ledger.queue_capacity = 5),
            ),
            (
                "command.min_confidence",
                Box::new(|c| c.command.min_confidence = 1.2),
            ),
            (
                "command.min_confidence",
                Box::new(|c| c.command.min_confidence = f32::NAN),
            ),
            ("population_size", Box::new(|c| c.population_size = 1)),
            (
                "pairing.rounds",
                Box::new(|c| c.pairing = PairingScheme::Rotation { rounds: 0 }),
            ),
        ];
        for (field, mutate) in cases {
            let mut config = TrainingConfig::default();
            mutate(&mut config);
            let err = config.validate().unwrap_err();
            assert_eq!(err.field, field);
        }
    }

    #[test]
    fn test_snapshot_due() {
        let config = TrainingConfig::default();
        assert!(!config.snapshot_due(0));
        assert!(config.snapshot_due(4));
        assert!(config.snapshot_due(9));
        let never = TrainingConfig {
            snapshot_interval: 0,
            ..config
        };
        assert!(!never.snapshot_due(4));
    }
}
