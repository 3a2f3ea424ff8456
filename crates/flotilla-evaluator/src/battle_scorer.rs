//! Match scoring: fitness deltas for training.
//!
//! A finished match yields one fitness delta per fleet, and so per genome:
//!
//! ```text
//! fitness = 0.5 × damage_dealt / enemy_total_hp
//!         + 0.3 × surviving_hp_fraction
//!         + 0.2 × victory
//!
//! where:
//!   victory = 1 for the winner, 0.5 for both sides of a draw, 0 for the loser
//! ```
//!
//! Every term lies in `[0, 1]`, so a delta is never negative. A match stopped at the
//! tick ceiling is a draw and is still scored from what happened before the ceiling:
//! damage dealt and hit points kept.
//!
//! The weights were chosen by hand and are not tuned; [`BattleScorer`] is the seam for
//! alternative objectives.

use std::fmt;

use flotilla_engine::{BattleReport, FleetSide};

/// Computes the fitness delta of one fleet from a finished match.
pub trait BattleScorer: fmt::Debug + Send + Sync {
    fn score(&self, report: &BattleReport, side: FleetSide) -> f32;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBattleScorer;

impl DefaultBattleScorer {
    pub const DAMAGE_WEIGHT: f32 = 0.5;
    pub const SURVIVAL_WEIGHT: f32 = 0.3;
    pub const VICTORY_WEIGHT: f32 = 0.2;
}

/// Victory term: 1 for a win, 0.5 for a draw, 0 for a loss.
#[must_use]
pub fn victory_credit(report: &BattleReport, side: FleetSide) -> f32 {
    match report.end.winner() {
        Some(winner) if winner == side => 1.0,
        Some(_) => 0.0,
        None => 0.5,
    }
}

impl BattleScorer for DefaultBattleScorer {
    fn score(&self, report: &BattleReport, side: FleetSide) -> f32 {
        let enemy_hp = report.total_hit_points(side.opponent());
        let damage = if enemy_hp > 0.0 {
            (report.damage_dealt(side) / enemy_hp).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self::DAMAGE_WEIGHT * damage
            + Self::SURVIVAL_WEIGHT * report.surviving_hp_fraction(side)
            + Self::VICTORY_WEIGHT * victory_credit(report, side)
    }
}
