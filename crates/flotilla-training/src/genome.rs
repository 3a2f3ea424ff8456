use std::sync::atomic::{AtomicU64, Ordering};

use flotilla_ledger::GenomeId;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::weights;

/// One evolvable controller: a network parameter vector with its record.
///
/// Fitness is the mean fitness delta over the matches of the generation the genome
/// was last evaluated in. Prestige counts victories over the genome's whole life.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    id: GenomeId,
    generation: u32,
    parameters: Vec<f32>,
    fitness: f32,
    prestige: u32,
}

impl Genome {
    #[must_use]
    pub fn new(id: GenomeId, generation: u32, parameters: Vec<f32>) -> Self {
        Self {
            id,
            generation,
            parameters,
            fitness: 0.0,
            prestige: 0,
        }
    }

    /// Creates a genome with parameters uniform in `[-max_weight, max_weight]`.
    pub fn random<R>(
        id: GenomeId,
        generation: u32,
        rng: &mut R,
        max_weight: f32,
        parameter_count: usize,
    ) -> Self
    where
        R: Rng + ?Sized,
    {
        Self::new(
            id,
            generation,
            weights::random(rng, max_weight, parameter_count),
        )
    }

    #[must_use]
    pub fn id(&self) -> GenomeId {
        self.id
    }

    /// Generation the genome was born in. Elites keep it when carried forward.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[must_use]
    pub fn parameters(&self) -> &[f32] {
        &self.parameters
    }

    #[must_use]
    pub fn fitness(&self) -> f32 {
        self.fitness
    }

    #[must_use]
    pub fn prestige(&self) -> u32 {
        self.prestige
    }

    /// Replaces the fitness with the result of a new evaluation.
    ///
    /// Fitness is never negative; NaN is recorded as zero.
    pub fn set_fitness(&mut self, fitness: f32) {
        self.fitness = if fitness.is_nan() {
            0.0
        } else {
            fitness.max(0.0)
        };
    }

    pub fn add_victories(&mut self, victories: u32) {
        self.prestige = self.prestige.saturating_add(victories);
    }

    /// Builds a genome from an exported record, keeping its fitness and prestige.
    #[must_use]
    pub fn restore(
        id: GenomeId,
        generation: u32,
        parameters: Vec<f32>,
        fitness: f32,
        prestige: u32,
    ) -> Self {
        let mut genome = Self::new(id, generation, parameters);
        genome.set_fitness(fitness);
        genome.prestige = prestige;
        genome
    }
}

/// Hands out genome identifiers, unique for one session.
#[derive(Debug, Default)]
pub struct GenomeIdAllocator {
    next: AtomicU64,
}

impl GenomeIdAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues after the given identifier.
    #[must_use]
    pub fn starting_after(last: GenomeId) -> Self {
        Self {
            next: AtomicU64::new(last.0 + 1),
        }
    }

    pub fn allocate(&self) -> GenomeId {
        GenomeId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
