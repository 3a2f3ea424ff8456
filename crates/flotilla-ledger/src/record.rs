use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use flotilla_engine::VesselId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a genome, unique across a training session.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[display("G{_0}")]
#[serde(transparent)]
pub struct GenomeId(pub u64);

/// Identifier of one training run.
///
/// Genome and match numbering restart with every run, so records of several runs
/// sharing one store are told apart by their run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Fresh time-ordered identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identifier of a match: its run, its generation, and its index within the
/// generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatchId {
    pub run: RunId,
    pub generation: u32,
    pub index: u32,
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/g{}-m{}", self.run, self.generation, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("invalid match id `{_0}`, expected `<run>/g<generation>-m<index>`")]
pub struct ParseMatchIdError(#[error(not(source))] pub String);

impl FromStr for MatchId {
    type Err = ParseMatchIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMatchIdError(s.to_owned());
        let (run, rest) = s.split_once('/').ok_or_else(err)?;
        let (generation, index) = rest
            .strip_prefix('g')
            .and_then(|rest| rest.split_once("-m"))
            .ok_or_else(err)?;
        Ok(Self {
            run: run.parse().map_err(|_| err())?,
            generation: generation.parse().map_err(|_| err())?,
            index: index.parse().map_err(|_| err())?,
        })
    }
}

impl Serialize for MatchId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MatchId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// How a match ended: exactly one winner, or a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchOutcome {
    #[display("victory for {winner}")]
    Victory { winner: GenomeId },
    #[display("draw")]
    Draw,
}

impl MatchOutcome {
    #[must_use]
    pub fn winner(self) -> Option<GenomeId> {
        match self {
            Self::Victory { winner } => Some(winner),
            Self::Draw => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessDelta {
    pub genome: GenomeId,
    pub delta: f32,
}

/// Immutable record of one completed match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkirmishResult {
    pub match_id: MatchId,
    pub generation: u32,
    /// Genomes flying `[alpha, beta]`.
    pub participants: [GenomeId; 2],
    pub outcome: MatchOutcome,
    pub fitness_deltas: Vec<FitnessDelta>,
    pub mvp_vessel: Option<VesselId>,
    pub ticks: u64,
    /// Fleet orders issued by `[alpha, beta]` during the match.
    pub orders_issued: [u32; 2],
    pub recorded_at: DateTime<Utc>,
}

impl SkirmishResult {
    #[must_use]
    pub fn winner(&self) -> Option<GenomeId> {
        self.outcome.winner()
    }

    #[must_use]
    pub fn is_draw(&self) -> bool {
        self.outcome == MatchOutcome::Draw
    }

    #[must_use]
    pub fn delta_of(&self, genome: GenomeId) -> Option<f32> {
        self.fitness_deltas
            .iter()
            .find(|d| d.genome == genome)
            .map(|d| d.delta)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const RUN: RunId =
        RunId(Uuid::from_u128(0x0191_a2b3_c4d5_7e6f_8a9b_0c1d_2e3f_4a5b));

    pub(crate) fn sample(generation: u32, index: u32) -> SkirmishResult {
        sample_in(RUN, generation, index)
    }

    pub(crate) fn sample_in(run: RunId, generation: u32, index: u32) -> SkirmishResult {
        let alpha = GenomeId(u64::from(index) * 2);
        let beta = GenomeId(u64::from(index) * 2 + 1);
        SkirmishResult {
            match_id: MatchId {
                run,
                generation,
                index,
            },
            generation,
            participants: [alpha, beta],
            outcome: if index % 3 == 0 {
                MatchOutcome::Draw
            } else {
                MatchOutcome::Victory { winner: alpha }
            },
            fitness_deltas: vec![
                FitnessDelta {
                    genome: alpha,
                    delta: 0.75,
                },
                FitnessDelta {
                    genome: beta,
                    delta: 0.125 + f32::from(u16::try_from(index % 7).unwrap()) / 3.0,
                },
            ],
            mvp_vessel: (index % 2 == 0).then_some(VesselId(3)),
            ticks: 1200 + u64::from(index),
            orders_issued: [index % 4, 1],
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_match_id_text_form() {
        let id = MatchId {
            run: RUN,
            generation: 12,
            index: 7,
        };
        let text = "0191a2b3-c4d5-7e6f-8a9b-0c1d2e3f4a5b/g12-m7";
        assert_eq!(id.to_string(), text);
        assert_eq!(text.parse::<MatchId>(), Ok(id));
        assert!("g12-m7".parse::<MatchId>().is_err());
        assert!("not-a-run/g12-m7".parse::<MatchId>().is_err());
        assert!("0191a2b3-c4d5-7e6f-8a9b-0c1d2e3f4a5b/g12-mx".parse::<MatchId>().is_err());
    }

    #[test]
    fn test_generated_runs_differ() {
        let a = RunId::generate();
        let b = RunId::generate();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<RunId>().unwrap(), a);
    }

    #[test]
    fn test_json_round_trip() {
        let result = sample(4, 5);
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("/g4-m5\""));
        let back: SkirmishResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
        assert_eq!(back.winner(), Some(GenomeId(10)));
        assert_eq!(back.delta_of(GenomeId(10)), Some(0.75));
    }
}
