use flotilla_evaluator::network_pilot::PARAMETER_COUNT;
use flotilla_ledger::{FlushSummary, Ledger, RunId, SkirmishStore};
use flotilla_stats::descriptive::DescriptiveStats;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use serde::Serialize;

use crate::{
    config::{ConfigError, TrainingConfig},
    evaluator::{EvaluationError, ParallelBattleEvaluator},
    evolution::{Breeder, TournamentBreeder},
    genome::{Genome, GenomeIdAllocator},
    selection::MeritocraticSelector,
};

/// What happened in one generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReport {
    pub generation: u32,
    pub matches: usize,
    pub draws: usize,
    /// Raw fitness of the evaluated population.
    pub fitness: Option<DescriptiveStats>,
    /// Genome with the best raw fitness, as evaluated.
    pub best: Option<Genome>,
    pub elites: usize,
    /// `None` when the end-of-generation flush failed.
    pub flush: Option<FlushSummary>,
    pub persistence_degraded: bool,
    /// Results still waiting for a commit after the flush.
    pub pending_results: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub run: RunId,
    pub generations: u32,
    /// Best genome over the whole run, by raw fitness.
    pub champion: Option<Genome>,
    pub threshold_reached: bool,
}

/// Training state of one run, owned by the caller.
///
/// A generation evaluates the current population in parallel, force-flushes the
/// ledger, ranks the population and breeds the next one. Selection and breeding only
/// start after every match of the generation has finished.
#[derive(Debug)]
pub struct TrainingSession<S> {
    config: TrainingConfig,
    evaluator: ParallelBattleEvaluator,
    selector: MeritocraticSelector,
    breeder: Box<dyn Breeder>,
    ledger: Ledger<S>,
    ids: GenomeIdAllocator,
    rng: Pcg64Mcg,
    population: Vec<Genome>,
    generation: u32,
    champion: Option<Genome>,
    threshold_reached: bool,
}

impl<S> TrainingSession<S>
where
    S: SkirmishStore,
{
    /// Validates `config` and creates a random initial population.
    pub fn new(config: TrainingConfig, store: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut rng = Pcg64Mcg::seed_from_u64(config.seed);
        let ids = GenomeIdAllocator::new();
        let population = (0..config.population_size)
            .map(|_| {
                Genome::random(
                    ids.allocate(),
                    0,
                    &mut rng,
                    config.evolution.max_weight,
                    PARAMETER_COUNT,
                )
            })
            .collect();
        let evaluator = ParallelBattleEvaluator::new(
            config.battle_rules(),
            config.pairing,
            config.effective_workers(),
            config.seed,
        );
        tracing::info!(
            run = %evaluator.run(),
            population = config.population_size,
            generations = config.generations,
            workers = evaluator.workers(),
            seed = config.seed,
            "training session created"
        );
        Ok(Self {
            selector: MeritocraticSelector::new(config.selection),
            breeder: Box::new(TournamentBreeder::new(config.evolution)),
            ledger: Ledger::new(store, config.ledger),
            evaluator,
            ids,
            rng,
            population,
            generation: 0,
            champion: None,
            threshold_reached: false,
            config,
        })
    }

    /// Replaces the default evolution collaborator.
    #[must_use]
    pub fn with_breeder<B>(mut self, breeder: B) -> Self
    where
        B: Breeder + 'static,
    {
        self.breeder = Box::new(breeder);
        self
    }

    /// Run the persisted match records of this session are filed under.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.evaluator.run()
    }

    #[must_use]
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Index of the next generation to evaluate.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[must_use]
    pub fn population(&self) -> &[Genome] {
        &self.population
    }

    #[must_use]
    pub fn champion(&self) -> Option<&Genome> {
        self.champion.as_ref()
    }

    #[must_use]
    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    #[must_use]
    pub fn into_ledger(self) -> Ledger<S> {
        self.ledger
    }

    /// Whether the configured generations are done or the fitness threshold was met.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.threshold_reached || self.generation >= self.config.generations
    }

    /// Evaluates the current population and breeds the next one.
    ///
    /// A failed ledger flush does not stop training: it is reported through
    /// [`GenerationReport::persistence_degraded`] and the results stay queued.
    pub fn run_generation(&mut self) -> Result<GenerationReport, EvaluationError> {
        let generation = self.generation;
        let outcome = self
            .evaluator
            .evaluate(&mut self.population, generation, &self.ledger)?;

        let flush = match self.ledger.flush() {
            Ok(summary) => Some(summary),
            Err(err) => {
                tracing::warn!(generation, %err, "generation results not persisted yet");
                None
            }
        };

        let fitness = DescriptiveStats::new(self.population.iter().map(Genome::fitness));
        let best = self
            .population
            .iter()
            .max_by(|a, b| {
                a.fitness()
                    .total_cmp(&b.fitness())
                    .then_with(|| b.id().cmp(&a.id()))
            })
            .cloned();
        if let Some(best) = &best {
            if self
                .champion
                .as_ref()
                .is_none_or(|champion| best.fitness() > champion.fitness())
            {
                self.champion = Some(best.clone());
            }
            if let Some(threshold) = self.config.fitness_threshold
                && best.fitness() >= threshold
            {
                tracing::info!(
                    generation,
                    fitness = best.fitness(),
                    threshold,
                    "fitness threshold reached"
                );
                self.threshold_reached = true;
            }
        }

        let selection = self.selector.select(&self.population);
        self.population = self.breeder.breed(
            &selection,
            self.config.population_size,
            generation + 1,
            &self.ids,
            &mut self.rng,
        );
        self.generation += 1;

        let report = GenerationReport {
            generation,
            matches: outcome.results.len(),
            draws: outcome.draws(),
            fitness,
            best,
            elites: selection.elites().len(),
            flush,
            persistence_degraded: self.ledger.is_degraded(),
            pending_results: self.ledger.pending(),
        };
        tracing::info!(
            generation,
            matches = report.matches,
            draws = report.draws,
            best_fitness = report.best.as_ref().map(Genome::fitness),
            mean_fitness = report.fitness.as_ref().map(|s| s.mean),
            elites = report.elites,
            degraded = report.persistence_degraded,
            "generation complete"
        );
        Ok(report)
    }

    /// Runs generations until [`is_finished`](Self::is_finished), calling
    /// `on_generation` after each one.
    pub fn run<F>(&mut self, mut on_generation: F) -> Result<TrainingSummary, EvaluationError>
    where
        F: FnMut(&GenerationReport, &Self),
    {
        while !self.is_finished() {
            let report = self.run_generation()?;
            on_generation(&report, self);
        }
        Ok(TrainingSummary {
            run: self.run_id(),
            generations: self.generation,
            champion: self.champion.clone(),
            threshold_reached: self.threshold_reached,
        })
    }
}
