use std::{
    fs::File,
    io::{self, BufReader, BufWriter, StdoutLock, Write},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use flotilla_training::config::TrainingConfig;
use serde::{Serialize, de::DeserializeOwned};

use crate::schema::elite_model::EliteModel;

/// JSON sink shared by the subcommands: a file when a path is given, stdout otherwise.
#[derive(Debug)]
pub enum JsonSink {
    Stdout(StdoutLock<'static>),
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl JsonSink {
    pub fn create(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::Stdout(io::stdout().lock()));
        };
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Self::File {
            writer: BufWriter::new(file),
            path: path.to_owned(),
        })
    }

    fn target(&self) -> String {
        match self {
            Self::Stdout(_) => "stdout".to_owned(),
            Self::File { path, .. } => path.display().to_string(),
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(writer) => writer,
            Self::File { writer, .. } => writer,
        }
    }

    /// Writes one pretty-printed JSON document followed by a newline.
    pub fn document<T>(&mut self, value: &T) -> anyhow::Result<()>
    where
        T: Serialize + ?Sized,
    {
        let writer = self.writer();
        let result = serde_json::to_writer_pretty(&mut *writer, value)
            .map_err(io::Error::from)
            .and_then(|()| writeln!(writer));
        result.with_context(|| format!("Failed to write JSON to {}", self.target()))
    }

    /// Writes one compact JSON record on its own line.
    pub fn record<T>(&mut self, value: &T) -> anyhow::Result<()>
    where
        T: Serialize + ?Sized,
    {
        let writer = self.writer();
        let result = serde_json::to_writer(&mut *writer, value)
            .map_err(io::Error::from)
            .and_then(|()| writeln!(writer));
        result.with_context(|| format!("Failed to write JSON record to {}", self.target()))
    }

    pub fn finish(mut self) -> anyhow::Result<()> {
        self.writer()
            .flush()
            .with_context(|| format!("Failed to flush output to {}", self.target()))
    }
}

/// Writes `value` as a single JSON document to `path`, or stdout when absent.
pub fn write_json<T>(value: &T, path: Option<&Path>) -> anyhow::Result<()>
where
    T: Serialize + ?Sized,
{
    let mut sink = JsonSink::create(path)?;
    sink.document(value)?;
    sink.finish()
}

fn read_json<T>(kind: &str, path: &Path) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let file = File::open(path)
        .with_context(|| format!("Failed to open {kind} file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {kind} file: {}", path.display()))
}

/// Training configuration from `path`, or the defaults when no file is given.
///
/// The result is not validated; callers apply their overrides first.
pub fn read_training_config(path: Option<&Path>) -> anyhow::Result<TrainingConfig> {
    match path {
        Some(path) => read_json("training config", path),
        None => Ok(TrainingConfig::default()),
    }
}

pub fn read_elite_model(path: &Path) -> anyhow::Result<EliteModel> {
    read_json("elite model", path)
}
