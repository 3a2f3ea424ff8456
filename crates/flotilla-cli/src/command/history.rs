use std::path::PathBuf;

use anyhow::Context as _;
use flotilla_ledger::{AceEntry, GenerationSummary, RunId, RunSummary, SkirmishResult, SqliteReader};
use serde::Serialize;

use crate::util;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct HistoryArg {
    /// SQLite database written by `train`
    #[arg(long)]
    db: PathBuf,
    /// Training run to report on (the most recent run when absent)
    #[arg(long)]
    run: Option<RunId>,
    /// List every match of this generation
    #[arg(long)]
    generation: Option<u32>,
    /// Size of the victories leaderboard
    #[arg(long, default_value_t = 10)]
    top: usize,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct History {
    total_matches: u64,
    runs: Vec<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    run: Option<RunId>,
    generations: Vec<GenerationSummary>,
    aces: Vec<AceEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    matches: Option<Vec<SkirmishResult>>,
}

pub(crate) fn run(arg: &HistoryArg) -> anyhow::Result<()> {
    let HistoryArg {
        db,
        run,
        generation,
        top,
        output,
    } = arg;
    let reader = SqliteReader::open(db)
        .with_context(|| format!("Failed to open match database: {}", db.display()))?;
    let query_context = || format!("Failed to query match database: {}", db.display());

    let runs = reader.runs().with_context(query_context)?;
    let run = match run {
        Some(run) => {
            anyhow::ensure!(
                runs.iter().any(|summary| summary.run == *run),
                "Run {run} is not recorded in {}",
                db.display()
            );
            Some(*run)
        }
        None => reader.latest_run().with_context(query_context)?,
    };

    let mut history = History {
        total_matches: reader.count().with_context(query_context)?,
        runs,
        run,
        generations: vec![],
        aces: vec![],
        matches: None,
    };
    if let Some(run) = run {
        history.generations = reader.generation_summaries(run).with_context(query_context)?;
        history.aces = reader.top_genomes(run, *top).with_context(query_context)?;
        history.matches = generation
            .map(|generation| reader.generation(run, generation))
            .transpose()
            .with_context(query_context)?;
    }
    match run {
        Some(run) => eprintln!(
            "{} matches in {} runs; run {run} spans {} generations",
            history.total_matches,
            history.runs.len(),
            history.generations.len()
        ),
        None => eprintln!("No matches recorded in {}", db.display()),
    }
    util::write_json(&history, output.as_deref())
}
