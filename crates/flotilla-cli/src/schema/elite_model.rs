use anyhow::Context as _;
use chrono::{DateTime, Utc};
use flotilla_evaluator::network_pilot::NetworkPilot;
use flotilla_ledger::{GenomeId, RunId};
use flotilla_training::genome::Genome;
use serde::{Deserialize, Serialize};

/// Exported genome, as written by `train` and read by `replay`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EliteModel {
    /// Training run that produced the genome; genome ids are only unique within it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunId>,
    /// Generation the genome was evaluated in.
    pub generation: u32,
    pub genome_id: GenomeId,
    pub fitness: f32,
    pub prestige: u32,
    pub parameters: Vec<f32>,
    pub trained_at: DateTime<Utc>,
}

impl EliteModel {
    pub fn from_genome(genome: &Genome, generation: u32, run: RunId) -> Self {
        Self {
            run: Some(run),
            generation,
            genome_id: genome.id(),
            fitness: genome.fitness(),
            prestige: genome.prestige(),
            parameters: genome.parameters().to_vec(),
            trained_at: Utc::now(),
        }
    }

    pub fn to_pilot(&self) -> anyhow::Result<NetworkPilot> {
        NetworkPilot::from_parameters(&self.parameters)
            .with_context(|| format!("Model of genome {} cannot be flown", self.genome_id))
    }
}
