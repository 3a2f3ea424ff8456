use std::path::PathBuf;

use anyhow::{Context as _, ensure};
use flotilla_engine::{Battle, Pilot, SnapshotRecorder, VesselTemplate};
use flotilla_evaluator::mvp;
use rand::SeedableRng as _;
use rand_pcg::Pcg64Mcg;

use crate::util::{self, JsonSink};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct ReplayArg {
    /// Elite model JSON files flying Alpha and Beta, in that order
    #[arg(long = "model", required = true)]
    models: Vec<PathBuf>,
    /// Training configuration JSON file supplying the battle rules
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seed for spawn positions
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Write a snapshot every N ticks
    #[arg(long, default_value_t = 1)]
    every: u64,
    /// Output file path (JSON lines)
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &ReplayArg) -> anyhow::Result<()> {
    let ReplayArg {
        models,
        config,
        seed,
        every,
        output,
    } = arg;
    ensure!(
        models.len() == 2,
        "Exactly two models are required, got {}",
        models.len()
    );
    ensure!(*every > 0, "Snapshot interval must be positive");

    let config = util::read_training_config(config.as_deref())?;
    config.validate().context("Invalid training configuration")?;
    let rules = config.battle_rules();
    let alpha = util::read_elite_model(&models[0])?;
    let beta = util::read_elite_model(&models[1])?;
    let alpha_pilot = alpha.to_pilot()?;
    let beta_pilot = beta.to_pilot()?;
    let pilots: [&dyn Pilot; 2] = [&alpha_pilot, &beta_pilot];

    let fleet = VesselTemplate::STANDARD_FLEET;
    let mut rng = Pcg64Mcg::seed_from_u64(*seed);
    let mut recorder = SnapshotRecorder::new(*every);
    let report = Battle::new(rules, [&fleet, &fleet], pilots, &mut rng).run(&mut recorder);

    let mut sink = JsonSink::create(output.as_deref())?;
    for snapshot in recorder.snapshots() {
        sink.record(snapshot)?;
    }
    sink.finish()?;

    eprintln!("Replay of {} vs {}", alpha.genome_id, beta.genome_id);
    eprintln!("  Result: {}", report.end);
    eprintln!("  Ticks: {}", report.ticks);
    eprintln!("  Snapshots: {}", recorder.snapshots().len());
    if let Some(mvp) = mvp::identify_mvp(&report) {
        eprintln!("  MVP: vessel {mvp}");
    }
    Ok(())
}
