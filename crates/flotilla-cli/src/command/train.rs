use std::{fs, path::PathBuf};

use anyhow::Context as _;
use flotilla_ledger::{MemoryStore, SkirmishStore, SqliteStore};
use flotilla_training::session::{GenerationReport, TrainingSession};

use crate::{schema::elite_model::EliteModel, util};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct TrainArg {
    /// Training configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of generations to run
    #[arg(long)]
    generations: Option<u32>,
    /// Genomes per generation
    #[arg(long)]
    population: Option<usize>,
    /// Concurrent matches (0 = available parallelism)
    #[arg(long)]
    workers: Option<usize>,
    /// SQLite database recording every match (kept in memory when absent)
    #[arg(long)]
    db: Option<PathBuf>,
    /// Directory receiving periodic elite snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
    /// Output file path for the final elite model
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
}

pub(crate) fn run(arg: &TrainArg) -> anyhow::Result<()> {
    let TrainArg {
        config,
        generations,
        population,
        workers,
        db,
        snapshot_dir,
        output,
        seed,
    } = arg;

    let mut config = util::read_training_config(config.as_deref())?;
    if let Some(generations) = generations {
        config.generations = *generations;
    }
    if let Some(population) = population {
        config.population_size = *population;
    }
    if let Some(workers) = workers {
        config.workers = *workers;
    }
    if let Some(seed) = seed {
        config.seed = *seed;
    }

    let store: Box<dyn SkirmishStore> = match db {
        Some(path) => Box::new(
            SqliteStore::open(path)
                .with_context(|| format!("Failed to open match database: {}", path.display()))?,
        ),
        None => Box::new(MemoryStore::new()),
    };
    if let Some(dir) = snapshot_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create snapshot directory: {}", dir.display()))?;
    }

    let mut session =
        TrainingSession::new(config, store).context("Invalid training configuration")?;
    let mut last_best = None;
    while !session.is_finished() {
        let report = session.run_generation()?;
        print_report(&report);
        if let Some(best) = &report.best {
            let model = EliteModel::from_genome(best, report.generation, session.run_id());
            if let Some(dir) = snapshot_dir
                && session.config().snapshot_due(report.generation)
            {
                let path = dir.join(format!("elite-g{:04}.json", report.generation));
                util::write_json(&model, Some(&path))?;
            }
            last_best = Some(model);
        }
    }

    let ledger = session.ledger();
    if ledger.pending() > 0 {
        match ledger.flush() {
            Ok(summary) => eprintln!("Committed {} late results", summary.committed),
            Err(err) => {
                tracing::warn!(%err, pending = ledger.pending(), "match history is incomplete");
            }
        }
    }
    eprintln!(
        "Training run {} completed after {} generations ({} matches recorded)",
        session.run_id(),
        session.generation(),
        ledger.committed()
    );

    let model = last_best.context("No generation was evaluated")?;
    util::write_json(&model, output.as_deref())?;

    eprintln!();
    eprintln!("Model saved successfully");
    if let Some(path) = output {
        eprintln!("  Path: {}", path.display());
    }
    eprintln!("  Genome: {}", model.genome_id);
    eprintln!("  Generation: {}", model.generation);
    eprintln!("  Fitness: {:.3}", model.fitness);
    eprintln!("  Prestige: {}", model.prestige);
    eprintln!("  Trained at: {}", model.trained_at);

    Ok(())
}

fn print_report(report: &GenerationReport) {
    eprintln!("Generation #{}:", report.generation);
    eprintln!("  Matches: {} (draws: {})", report.matches, report.draws);
    if let Some(stats) = &report.fitness {
        eprintln!("  Fitness Stats:");
        eprintln!("    Min:    {:.3}", stats.min);
        eprintln!("    Max:    {:.3}", stats.max);
        eprintln!("    Mean:   {:.3}", stats.mean);
        eprintln!("    Median: {:.3}", stats.median);
        eprintln!("    Stddev: {:.3}", stats.std_dev);
    }
    if let Some(best) = &report.best {
        eprintln!(
            "  Best: {} => {:.3} (prestige {})",
            best.id(),
            best.fitness(),
            best.prestige()
        );
    }
    eprintln!("  Elites kept: {}", report.elites);
    if report.persistence_degraded {
        eprintln!(
            "  Persistence degraded: {} results waiting for the store",
            report.pending_results
        );
    }
}
