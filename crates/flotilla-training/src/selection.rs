//! Meritocratic selection: prestige-biased ranking with guaranteed elite survival.
//!
//! # Algorithm
//!
//! ```text
//! biased = max(raw, 0) × min(1 + prestige_bonus_per_victory × victories, prestige_cap_multiplier)
//! ```
//!
//! 1. Every genome gets a prestige-biased fitness. The bonus is capped, so a genome's
//!    biased fitness never exceeds `prestige_cap_multiplier` (2.0) times its raw fitness
//!    and an old lineage cannot dominate on reputation alone.
//! 2. Genomes are ranked by biased fitness, descending. Ties fall back to raw fitness,
//!    then to the lower genome identifier, so the ranking is deterministic.
//! 3. The top `ceil(elite_fraction × population)` genomes form the elite set and are
//!    carried into the next generation unmodified.
//! 4. The whole ranking is handed to the [`Breeder`](crate::evolution::Breeder) as the
//!    parent pool; how parents are drawn from it is the breeder's concern.
//!
//! Selection is a pure function of the population.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::genome::Genome;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionParams {
    /// Share of the population carried forward unmodified, rounded up.
    pub elite_fraction: f32,
    pub prestige_bonus_per_victory: f32,
    /// Upper bound of the prestige multiplier.
    pub prestige_cap_multiplier: f32,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            elite_fraction: 0.20,
            prestige_bonus_per_victory: 0.10,
            prestige_cap_multiplier: 2.0,
        }
    }
}

/// A genome with the fitness it was ranked by.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedGenome {
    pub genome: Genome,
    pub biased_fitness: f32,
}

/// Outcome of one selection round.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    elite_count: usize,
    ranked: Vec<RankedGenome>,
}

impl Selection {
    /// Genomes guaranteed to survive, best first.
    #[must_use]
    pub fn elites(&self) -> &[RankedGenome] {
        &self.ranked[..self.elite_count]
    }

    /// The whole population ranked by biased fitness, elites included.
    #[must_use]
    pub fn ranked(&self) -> &[RankedGenome] {
        &self.ranked
    }

    #[must_use]
    pub fn best(&self) -> Option<&RankedGenome> {
        self.ranked.first()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MeritocraticSelector {
    params: SelectionParams,
}

impl MeritocraticSelector {
    #[must_use]
    pub fn new(params: SelectionParams) -> Self {
        Self { params }
    }

    #[must_use]
    pub fn params(&self) -> &SelectionParams {
        &self.params
    }

    /// Prestige-biased fitness of one genome.
    #[must_use]
    pub fn biased_fitness(&self, genome: &Genome) -> f32 {
        #[expect(clippy::cast_precision_loss)]
        let victories = genome.prestige() as f32;
        let multiplier = (1.0 + self.params.prestige_bonus_per_victory * victories)
            .min(self.params.prestige_cap_multiplier);
        genome.fitness().max(0.0) * multiplier
    }

    /// Size of the elite set for a population of `population_size`.
    ///
    /// ```
    /// # use flotilla_training::selection::{MeritocraticSelector, SelectionParams};
    /// let selector = MeritocraticSelector::new(SelectionParams::default());
    /// assert_eq!(selector.elite_count(50), 10);
    /// assert_eq!(selector.elite_count(7), 2);
    /// assert_eq!(selector.elite_count(0), 0);
    /// ```
    #[must_use]
    pub fn elite_count(&self, population_size: usize) -> usize {
        #[expect(clippy::cast_precision_loss)]
        let exact = f64::from(self.params.elite_fraction) * population_size as f64;
        // absorbs the f32 representation error of the fraction
        let exact = exact - exact * f64::from(f32::EPSILON);
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = exact.ceil().max(0.0) as usize;
        count.min(population_size)
    }

    #[must_use]
    pub fn select(&self, population: &[Genome]) -> Selection {
        let mut ranked = population
            .iter()
            .map(|genome| RankedGenome {
                biased_fitness: self.biased_fitness(genome),
                genome: genome.clone(),
            })
            .collect::<Vec<_>>();
        ranked.sort_by(rank_order);
        Selection {
            elite_count: self.elite_count(ranked.len()),
            ranked,
        }
    }
}

fn rank_order(a: &RankedGenome, b: &RankedGenome) -> Ordering {
    b.biased_fitness
        .total_cmp(&a.biased_fitness)
        .then_with(|| b.genome.fitness().total_cmp(&a.genome.fitness()))
        .then_with(|| a.genome.id().cmp(&b.genome.id()))
}

#[cfg(test)]
mod tests {
    use flotilla_ledger::GenomeId;

    use super::*;

    fn genome(id: u64, fitness: f32, prestige: u32) -> Genome {
        Genome::restore(GenomeId(id), 0, vec![], fitness, prestige)
    }

    #[test]
    fn test_fifty_genomes_keep_ten_elites() {
        let population = (0..50)
            .map(|i| genome(i, f32::from(u8::try_from(i).unwrap()) / 50.0, 0))
            .collect::<Vec<_>>();
        let selection = MeritocraticSelector::default().select(&population);
        assert_eq!(selection.elites().len(), 10);
        assert_eq!(selection.ranked().len(), 50);

        let elite_ids = selection
            .elites()
            .iter()
            .map(|r| r.genome.id().0)
            .collect::<Vec<_>>();
        assert_eq!(elite_ids, (40..50).rev().collect::<Vec<_>>());
        for (elite, original) in selection.elites().iter().zip(population.iter().rev()) {
            assert_eq!(&elite.genome, original);
        }
    }

    #[test]
    fn test_elite_count_rounds_up() {
        let selector = MeritocraticSelector::default();
        for n in 1..200_usize {
            let expected = (n * 20).div_ceil(100);
            assert_eq!(selector.elite_count(n), expected, "population {n}");
        }
        let third = MeritocraticSelector::new(SelectionParams {
            elite_fraction: 1.0 / 3.0,
            ..SelectionParams::default()
        });
        assert_eq!(third.elite_count(9), 3);
        assert_eq!(third.elite_count(10), 4);
    }

    #[test]
    fn test_prestige_bias_is_capped() {
        let selector = MeritocraticSelector::default();
        for victories in [0, 1, 5, 10, 11, 1000] {
            for raw in [0.0, 0.01, 0.4, 1.3] {
                let biased = selector.biased_fitness(&genome(0, raw, victories));
                assert!(biased <= 2.0 * raw + f32::EPSILON, "{victories} {raw}");
                assert!(biased >= raw);
            }
        }
        assert!((selector.biased_fitness(&genome(0, 0.5, 3)) - 0.65).abs() < 1e-6);
        assert_eq!(selector.biased_fitness(&genome(0, 0.5, 40)), 1.0);
    }

    #[test]
    fn test_prestige_reorders_ranking() {
        let population = [genome(0, 0.60, 0), genome(1, 0.50, 4)];
        let selection = MeritocraticSelector::default().select(&population);
        assert_eq!(selection.ranked()[0].genome.id(), GenomeId(1));
        assert!((selection.ranked()[0].biased_fitness - 0.70).abs() < 1e-6);
    }

    #[test]
    fn test_ties_break_by_raw_then_id() {
        // 0.5 × 1.2 == 0.6 × 1.0
        let population = [
            genome(7, 0.5, 2),
            genome(3, 0.6, 0),
            genome(5, 0.6, 0),
            genome(1, 0.0, 0),
            genome(0, 0.0, 9),
        ];
        let selection = MeritocraticSelector::default().select(&population);
        let order = selection
            .ranked()
            .iter()
            .map(|r| r.genome.id().0)
            .collect::<Vec<_>>();
        assert_eq!(order, vec![3, 5, 7, 0, 1]);
    }

    #[test]
    fn test_empty_population() {
        let selection = MeritocraticSelector::default().select(&[]);
        assert!(selection.elites().is_empty());
        assert!(selection.best().is_none());
    }
}
