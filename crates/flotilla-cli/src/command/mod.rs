use clap::{Parser, Subcommand};

use self::{history::HistoryArg, replay::ReplayArg, train::TrainArg};

mod history;
mod replay;
mod train;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Evolve fleet pilots through simulated battles
    Train(#[clap(flatten)] TrainArg),
    /// Query the recorded match history
    History(#[clap(flatten)] HistoryArg),
    /// Play one match between two exported models and dump per-tick snapshots
    Replay(#[clap(flatten)] ReplayArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Train(arg) => train::run(&arg)?,
        Mode::History(arg) => history::run(&arg)?,
        Mode::Replay(arg) => replay::run(&arg)?,
    }
    Ok(())
}
