//! Parallel battle evaluation of a population.
//!
//! One generation is a fixed list of matches derived from a [`PairingScheme`]. Worker
//! threads pull match indices from a shared cursor and play each match end to end;
//! the only state they share is the read-only population and the [`Ledger`] every
//! finished match is submitted to.
//!
//! Every match has its own random generator seeded from the session seed and the
//! match identifier, so a generation's results do not depend on the number of
//! workers or on the order matches happen to finish in.
//!
//! Once all workers have joined, each genome's fitness becomes the mean of its fitness
//! deltas and its prestige grows by its victories.

use std::{
    panic,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

use chrono::Utc;
use flotilla_engine::{Battle, BattleRules, FleetSide, NoopObserver, Pilot, VesselTemplate};
use flotilla_evaluator::{
    battle_scorer::{BattleScorer, DefaultBattleScorer},
    mvp,
    network_pilot::{NetworkPilot, ParameterCountError},
};
use flotilla_ledger::{
    FitnessDelta, GenomeId, Ledger, MatchId, MatchOutcome, RunId, SkirmishResult, SkirmishStore,
};
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};

use crate::genome::Genome;

/// How the genomes of a population are paired into matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PairingScheme {
    /// In round `r` (from 1), genome `i` meets genome `(i + r) mod n`.
    Rotation { rounds: usize },
    /// Every unordered pair meets once.
    RoundRobin,
}

impl Default for PairingScheme {
    fn default() -> Self {
        Self::Rotation { rounds: 2 }
    }
}

/// Population indices of the genomes flying each fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub alpha: usize,
    pub beta: usize,
}

impl PairingScheme {
    /// Lists the matches of one generation, in match index order.
    ///
    /// Sides alternate so that no genome always flies Alpha.
    #[must_use]
    pub fn pairings(self, population_size: usize) -> Vec<Pairing> {
        let n = population_size;
        if n < 2 {
            return vec![];
        }
        match self {
            Self::Rotation { rounds } => (1..=rounds)
                .filter(|r| r % n != 0)
                .flat_map(|r| {
                    (0..n).map(move |i| {
                        let j = (i + r) % n;
                        if r % 2 == 1 {
                            Pairing { alpha: i, beta: j }
                        } else {
                            Pairing { alpha: j, beta: i }
                        }
                    })
                })
                .collect(),
            Self::RoundRobin => (0..n)
                .flat_map(|i| {
                    (i + 1..n).map(move |j| {
                        if (i + j) % 2 == 0 {
                            Pairing { alpha: i, beta: j }
                        } else {
                            Pairing { alpha: j, beta: i }
                        }
                    })
                })
                .collect(),
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum EvaluationError {
    #[display("genome {genome} cannot be flown: {source}")]
    InvalidGenome {
        genome: GenomeId,
        source: ParameterCountError,
    },
}

/// Results of one evaluated generation, in match index order.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub generation: u32,
    pub results: Vec<SkirmishResult>,
}

impl GenerationOutcome {
    #[must_use]
    pub fn draws(&self) -> usize {
        self.results.iter().filter(|r| r.is_draw()).count()
    }

    #[must_use]
    pub fn total_ticks(&self) -> u64 {
        self.results.iter().map(|r| r.ticks).sum()
    }
}

/// Random generator of one match.
///
/// Depends on the generation and index only, so equally seeded runs replay the same
/// battles.
#[must_use]
pub fn match_rng(seed: u64, match_id: MatchId) -> Pcg64Mcg {
    let key = (u64::from(match_id.generation) << 32) | u64::from(match_id.index);
    Pcg64Mcg::seed_from_u64(seed ^ key.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

#[derive(Debug, Clone)]
pub struct ParallelBattleEvaluator<Sc = DefaultBattleScorer> {
    run: RunId,
    rules: BattleRules,
    fleet: Vec<VesselTemplate>,
    pairing: PairingScheme,
    workers: usize,
    seed: u64,
    scorer: Sc,
}

impl ParallelBattleEvaluator {
    /// Evaluator fielding the standard fleet and scoring with [`DefaultBattleScorer`].
    ///
    /// Its matches belong to a freshly generated run.
    #[must_use]
    pub fn new(rules: BattleRules, pairing: PairingScheme, workers: usize, seed: u64) -> Self {
        Self {
            run: RunId::generate(),
            rules,
            fleet: VesselTemplate::STANDARD_FLEET.to_vec(),
            pairing,
            workers: workers.max(1),
            seed,
            scorer: DefaultBattleScorer,
        }
    }
}

impl<Sc> ParallelBattleEvaluator<Sc>
where
    Sc: BattleScorer,
{
    #[must_use]
    pub fn with_scorer<T>(self, scorer: T) -> ParallelBattleEvaluator<T> {
        ParallelBattleEvaluator {
            run: self.run,
            rules: self.rules,
            fleet: self.fleet,
            pairing: self.pairing,
            workers: self.workers,
            seed: self.seed,
            scorer,
        }
    }

    /// Replaces the fleet both sides field.
    #[must_use]
    pub fn with_fleet(mut self, fleet: &[VesselTemplate]) -> Self {
        self.fleet = fleet.to_vec();
        self
    }

    /// Files the matches under `run` instead of a generated one.
    #[must_use]
    pub fn with_run(mut self, run: RunId) -> Self {
        self.run = run;
        self
    }

    /// Run every match id of this evaluator belongs to.
    #[must_use]
    pub fn run(&self) -> RunId {
        self.run
    }

    #[must_use]
    pub fn rules(&self) -> &BattleRules {
        &self.rules
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Plays every match of `generation`, submitting each result to `ledger`, then
    /// updates the fitness and prestige of `population`.
    ///
    /// Returns once every match has finished, either by elimination or at the tick
    /// ceiling.
    pub fn evaluate<S>(
        &self,
        population: &mut [Genome],
        generation: u32,
        ledger: &Ledger<S>,
    ) -> Result<GenerationOutcome, EvaluationError>
    where
        S: SkirmishStore,
    {
        let pilots = population
            .iter()
            .map(|genome| {
                NetworkPilot::from_parameters(genome.parameters()).map_err(|source| {
                    EvaluationError::InvalidGenome {
                        genome: genome.id(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let plan = self.pairing.pairings(population.len());
        assert!(u32::try_from(plan.len()).is_ok(), "too many matches");
        let workers = self.workers.min(plan.len()).max(1);
        let cursor = AtomicUsize::new(0);
        let genomes = &*population;

        let mut results = thread::scope(|s| {
            let handles = (0..workers)
                .map(|_| {
                    s.spawn(|| {
                        let mut finished = vec![];
                        loop {
                            let index = cursor.fetch_add(1, Ordering::Relaxed);
                            let Some(pairing) = plan.get(index) else {
                                break;
                            };
                            #[expect(clippy::cast_possible_truncation)]
                            let match_id = MatchId {
                                run: self.run,
                                generation,
                                index: index as u32,
                            };
                            let result = self.play_match(
                                match_id,
                                [&genomes[pairing.alpha], &genomes[pairing.beta]],
                                [&pilots[pairing.alpha], &pilots[pairing.beta]],
                            );
                            ledger.submit(result.clone());
                            finished.push(result);
                        }
                        finished
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap_or_else(|err| panic::resume_unwind(err)))
                .collect::<Vec<_>>()
        });
        results.sort_by_key(|r| r.match_id);

        let mut totals = vec![(0.0_f32, 0_u32, 0_u32); population.len()];
        for result in &results {
            let pairing = plan[result.match_id.index as usize];
            for (slot, index) in [pairing.alpha, pairing.beta].into_iter().enumerate() {
                let total = &mut totals[index];
                total.0 += result.fitness_deltas[slot].delta;
                total.1 += 1;
                if result.winner() == Some(result.participants[slot]) {
                    total.2 += 1;
                }
            }
        }
        for (genome, (sum, matches, victories)) in population.iter_mut().zip(totals) {
            #[expect(clippy::cast_precision_loss)]
            let mean = if matches > 0 {
                sum / matches as f32
            } else {
                0.0
            };
            genome.set_fitness(mean);
            genome.add_victories(victories);
        }

        let outcome = GenerationOutcome {
            generation,
            results,
        };
        tracing::info!(
            generation,
            matches = outcome.results.len(),
            draws = outcome.draws(),
            workers,
            "generation evaluated"
        );
        Ok(outcome)
    }

    /// Plays one match between two genomes flying `[alpha, beta]`.
    ///
    /// Fitness deltas are listed in the same order as the participants.
    pub fn play_match(
        &self,
        match_id: MatchId,
        genomes: [&Genome; 2],
        pilots: [&NetworkPilot; 2],
    ) -> SkirmishResult {
        let mut rng = match_rng(self.seed, match_id);
        let fleets = [self.fleet.as_slice(), self.fleet.as_slice()];
        let pilots: [&dyn Pilot; 2] = [pilots[0], pilots[1]];
        let report = Battle::new(self.rules, fleets, pilots, &mut rng).run(&mut NoopObserver);

        let participants = genomes.map(Genome::id);
        let outcome = match report.end.winner() {
            Some(side) => MatchOutcome::Victory {
                winner: participants[side.index()],
            },
            None => MatchOutcome::Draw,
        };
        let fitness_deltas = FleetSide::ALL
            .iter()
            .map(|&side| FitnessDelta {
                genome: participants[side.index()],
                delta: self.scorer.score(&report, side).max(0.0),
            })
            .collect();
        tracing::debug!(
            %match_id,
            alpha = %participants[0],
            beta = %participants[1],
            end = %report.end,
            ticks = report.ticks,
            "match finished"
        );
        SkirmishResult {
            match_id,
            generation: match_id.generation,
            participants,
            outcome,
            fitness_deltas,
            mvp_vessel: mvp::identify_mvp(&report),
            ticks: report.ticks,
            orders_issued: report.orders_issued,
            recorded_at: Utc::now(),
        }
    }
}
