//! Serializable records of finished runs.
//!
//! A snapshot is format only: the experiment loop fills it in, persistence
//! sinks write it out, analysis tooling reads it back. Nothing here mutates
//! after a run finishes.

use serde::{Deserialize, Serialize};

use super::ExperimentConfig;
use crate::search::Code;

/// Per-generation scalar summary. Appended once per generation, never
/// rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Best fitness in the generation.
    pub best: f32,
    /// Mean fitness over the population.
    pub mean: f32,
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The generation budget was exhausted.
    GenerationBudget,
    /// No best-ever improvement for the configured number of generations.
    Stagnation,
}

/// Full trajectory of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Run name, copied from the configuration.
    pub name: String,
    /// The resolved configuration that produced this trajectory.
    pub config: ExperimentConfig,
    /// One record per executed generation.
    pub generations: Vec<GenerationRecord>,
    /// Best code ever seen across all generations.
    pub best_code: Code,
    /// Fitness of `best_code`.
    pub best_fitness: f32,
    /// Best reference-stream score seen up to each generation, when a
    /// reference stream is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_best: Option<Vec<f32>>,
    pub stop: StopReason,
    pub elapsed_seconds: f64,
}

impl RunSnapshot {
    /// Best fitness over the whole trajectory as recorded per generation.
    pub fn best_per_generation(&self) -> impl Iterator<Item = f32> + '_ {
        self.generations.iter().map(|record| record.best)
    }
}

/// Terminal status of one run inside a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Finished,
    Failed { error: String },
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunStatus::Finished)
    }
}

/// Outcome of one run: written once by the harness, never mutated after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Position of the run in the sweep, starting at 0.
    pub index: usize,
    /// The resolved per-run configuration, kept as raw JSON so outcomes of
    /// runs whose configuration failed to parse are still recorded.
    pub config: serde_json::Value,
    #[serde(flatten)]
    pub status: RunStatus,
    /// Present only for finished runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<RunSnapshot>,
    pub elapsed_seconds: f64,
}

/// Aggregate over a whole sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSummary {
    pub outcomes: Vec<RunOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_seconds: f64,
}

impl SweepSummary {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> RunSnapshot {
        RunSnapshot {
            name: "unit".to_string(),
            config: ExperimentConfig::default(),
            generations: vec![
                GenerationRecord { best: 0.5, mean: 0.1 },
                GenerationRecord { best: 0.9, mean: 0.4 },
            ],
            best_code: vec![0.0, 1.0],
            best_fitness: 0.9,
            reference_best: None,
            stop: StopReason::GenerationBudget,
            elapsed_seconds: 0.25,
        }
    }

    #[test]
    fn test_snapshot_round_trip() {
        let json = serde_json::to_string(&snapshot()).unwrap();
        let back: RunSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.generations.len(), 2);
        assert_eq!(back.best_code, vec![0.0, 1.0]);
        assert_eq!(back.stop, StopReason::GenerationBudget);
    }

    #[test]
    fn test_outcome_status_tag() {
        let outcome = RunOutcome {
            index: 3,
            config: serde_json::to_value(ExperimentConfig::default()).unwrap(),
            status: RunStatus::Failed {
                error: "scoring failed".to_string(),
            },
            snapshot: None,
            elapsed_seconds: 0.0,
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "scoring failed");
        assert!(value.get("snapshot").is_none());
    }
}
