//! Genetic operators that turn a [`Selection`] into the next population.
//!
//! The [`Breeder`] trait is the seam between selection and genome evolution: it
//! receives the elite set and the ranked parent pool and returns a full population.
//! [`TournamentBreeder`] is the default implementation:
//!
//! 1. **Elites** - copied unmodified, identifiers and prestige included
//! 2. **Tournament Selection** - pick `tournament_size` genomes from the ranked pool
//!    and keep the one with the highest biased fitness
//! 3. **Crossover (BLX-α)** - blend two parents' parameters
//! 4. **Mutation** - add Gaussian noise to a share of the parameters
//!
//! Children start with zero fitness and zero prestige, and belong to the generation
//! being bred.
//!
//! # Current Limitations
//!
//! - **Fixed topology**: parameters are evolved for a fixed network shape; the number
//!   of neurons and connections never changes
//! - **No adaptive parameters**: mutation strength and selection pressure stay
//!   constant over the whole run

use std::fmt;

use rand::{RngCore, seq::IndexedRandom};
use serde::{Deserialize, Serialize};

use crate::{
    genome::{Genome, GenomeIdAllocator},
    selection::{RankedGenome, Selection},
    weights,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionParams {
    /// Genomes drawn per tournament; larger means stronger selection pressure.
    pub tournament_size: usize,
    /// BLX-α range expansion factor.
    pub blx_alpha: f32,
    /// Probability of mutating each parameter.
    pub mutation_rate: f32,
    /// Standard deviation of the Gaussian mutation noise.
    pub mutation_sigma: f32,
    /// Parameters are kept within `[-max_weight, max_weight]`.
    pub max_weight: f32,
}

impl Default for EvolutionParams {
    fn default() -> Self {
        Self {
            tournament_size: 3,
            blx_alpha: 0.5,
            mutation_rate: 0.1,
            mutation_sigma: 0.3,
            max_weight: 2.0,
        }
    }
}

/// Builds the next generation from a selection.
pub trait Breeder: fmt::Debug + Send + Sync {
    /// Returns exactly `population_size` genomes, the elites first.
    fn breed(
        &self,
        selection: &Selection,
        population_size: usize,
        generation: u32,
        ids: &GenomeIdAllocator,
        rng: &mut dyn RngCore,
    ) -> Vec<Genome>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TournamentBreeder {
    params: EvolutionParams,
}

impl TournamentBreeder {
    #[must_use]
    pub fn new(params: EvolutionParams) -> Self {
        Self { params }
    }

    #[must_use]
    pub fn params(&self) -> &EvolutionParams {
        &self.params
    }
}

impl Breeder for TournamentBreeder {
    fn breed(
        &self,
        selection: &Selection,
        population_size: usize,
        generation: u32,
        ids: &GenomeIdAllocator,
        rng: &mut dyn RngCore,
    ) -> Vec<Genome> {
        let mut next = selection
            .elites()
            .iter()
            .take(population_size)
            .map(|ranked| ranked.genome.clone())
            .collect::<Vec<_>>();
        let pool = selection.ranked();
        if pool.is_empty() {
            return next;
        }

        while next.len() < population_size {
            let p1 = tournament_select(pool, self.params.tournament_size, rng);
            let p2 = tournament_select(pool, self.params.tournament_size, rng);
            let mut child = weights::blx_alpha(
                p1.genome.parameters(),
                p2.genome.parameters(),
                self.params.blx_alpha,
                self.params.max_weight,
                rng,
            );
            weights::mutate(
                &mut child,
                self.params.mutation_sigma,
                self.params.max_weight,
                self.params.mutation_rate,
                rng,
            );
            next.push(Genome::new(ids.allocate(), generation, child));
        }
        next
    }
}

/// Draws `tournament_size` genomes and returns the one with the highest biased fitness.
///
/// Ties go to the better-ranked genome.
fn tournament_select<'a>(
    pool: &'a [RankedGenome],
    tournament_size: usize,
    rng: &mut dyn RngCore,
) -> &'a RankedGenome {
    assert!(!pool.is_empty());
    pool.choose_multiple(rng, tournament_size.max(1))
        .max_by(|a, b| {
            a.biased_fitness
                .total_cmp(&b.biased_fitness)
                .then_with(|| a.genome.fitness().total_cmp(&b.genome.fitness()))
                .then_with(|| b.genome.id().cmp(&a.genome.id()))
        })
        .unwrap_or(&pool[0])
}

#[cfg(test)]
mod tests {
    use flotilla_ledger::GenomeId;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    use super::*;
    use crate::selection::MeritocraticSelector;

    fn population(n: u64) -> Vec<Genome> {
        (0..n)
            .map(|i| {
                #[expect(clippy::cast_precision_loss)]
                let fitness = i as f32 / 10.0;
                Genome::restore(GenomeId(i), 0, vec![0.1; 6], fitness, 0)
            })
            .collect()
    }

    #[test]
    fn test_breed_keeps_elites_and_size() {
        let population = population(10);
        let selection = MeritocraticSelector::default().select(&population);
        let ids = GenomeIdAllocator::starting_after(GenomeId(9));
        let mut rng = Pcg64Mcg::seed_from_u64(5);
        let next = TournamentBreeder::default().breed(&selection, 10, 1, &ids, &mut rng);

        assert_eq!(next.len(), 10);
        assert_eq!(next[0], population[9]);
        assert_eq!(next[1], population[8]);
        for child in &next[2..] {
            assert!(child.id().0 >= 10);
            assert_eq!(child.generation(), 1);
            assert_eq!(child.fitness(), 0.0);
            assert_eq!(child.parameters().len(), 6);
            assert!(child.parameters().iter().all(|p| p.abs() <= 2.0));
        }
    }

    #[test]
    fn test_tournament_of_whole_pool_picks_best() {
        let population = population(6);
        let selection = MeritocraticSelector::default().select(&population);
        let mut rng = Pcg64Mcg::seed_from_u64(6);
        for _ in 0..20 {
            let winner = tournament_select(selection.ranked(), 6, &mut rng);
            assert_eq!(winner.genome.id(), GenomeId(5));
        }
    }

    #[test]
    fn test_breed_from_empty_selection() {
        let selection = MeritocraticSelector::default().select(&[]);
        let mut rng = Pcg64Mcg::seed_from_u64(7);
        let next = TournamentBreeder::default().breed(
            &selection,
            4,
            1,
            &GenomeIdAllocator::new(),
            &mut rng,
        );
        assert!(next.is_empty());
    }
}
