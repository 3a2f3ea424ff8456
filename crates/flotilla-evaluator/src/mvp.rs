//! Most valuable vessel of a match.
//!
//! ```text
//! mvp_score = 0.4 × damage_dealt / max(total_damage, 1)
//!           + 0.2 × accuracy
//!           + 0.2 × survived
//!           + 0.2 × kills / max_kills
//! ```
//!
//! `survived` is 1 for a vessel alive at match end. Both fleets compete for the title;
//! equal scores go to the lower vessel identifier.

use flotilla_engine::{BattleReport, VesselId, VesselReport};

#[must_use]
pub fn mvp_score(report: &BattleReport, vessel: &VesselReport) -> f32 {
    let total_damage: f32 = report.vessels.iter().map(|v| v.stats.damage_dealt).sum();
    let max_kills = report
        .vessels
        .iter()
        .map(|v| v.stats.kills)
        .max()
        .unwrap_or(0);

    let damage = vessel.stats.damage_dealt / total_damage.max(1.0);
    let survived = if vessel.hit_points > 0.0 { 1.0 } else { 0.0 };
    #[expect(clippy::cast_precision_loss)]
    let kills = if max_kills > 0 {
        vessel.stats.kills as f32 / max_kills as f32
    } else {
        0.0
    };
    0.4 * damage + 0.2 * vessel.stats.accuracy() + 0.2 * survived + 0.2 * kills
}

/// Identifies the MVP; `None` only for a report without vessels.
#[must_use]
pub fn identify_mvp(report: &BattleReport) -> Option<VesselId> {
    report
        .vessels
        .iter()
        .map(|v| (v.id, mvp_score(report, v)))
        .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use flotilla_engine::{BattleEnd, FleetSide, VesselCombatStats};

    use super::*;

    fn finished(vessels: Vec<VesselReport>) -> BattleReport {
        BattleReport {
            end: BattleEnd::TickCeiling,
            ticks: 100,
            vessels,
            orders_issued: [0, 0],
        }
    }

    fn vessel(id: u16, hit_points: f32, stats: VesselCombatStats) -> VesselReport {
        VesselReport {
            id: VesselId(id),
            side: if id < 5 {
                FleetSide::Alpha
            } else {
                FleetSide::Beta
            },
            hit_points,
            max_hit_points: 100.0,
            stats,
        }
    }

    #[test]
    fn test_damage_and_kills_decide() {
        let ace = VesselCombatStats {
            damage_dealt: 300.0,
            kills: 2,
            shots: 10,
            hits: 8,
            ..VesselCombatStats::default()
        };
        let wingman = VesselCombatStats {
            damage_dealt: 100.0,
            kills: 1,
            shots: 10,
            hits: 10,
            ..VesselCombatStats::default()
        };
        let report = finished(vec![
            vessel(0, 40.0, wingman),
            vessel(1, 10.0, ace),
            vessel(5, 0.0, VesselCombatStats::default()),
        ]);
        assert_eq!(identify_mvp(&report), Some(VesselId(1)));
    }

    #[test]
    fn test_tie_goes_to_lower_id() {
        let report = finished(vec![
            vessel(6, 100.0, VesselCombatStats::default()),
            vessel(2, 100.0, VesselCombatStats::default()),
        ]);
        assert_eq!(identify_mvp(&report), Some(VesselId(2)));
        assert_eq!(identify_mvp(&finished(vec![])), None);
    }
}
