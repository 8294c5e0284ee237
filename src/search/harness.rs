//! Multi-run harness: expands a search grid against a base configuration and
//! executes the runs sequentially with per-run failure isolation.
//!
//! Every run gets its own seeded random stream, derived from the harness
//! seed and the run index unless the resolved configuration pins a seed
//! explicitly, so a crashed run cannot disturb any other run.

use std::path::PathBuf;
use std::time::Instant;

use log::{info, warn};
use serde_json::Value;

use crate::pipeline::{LogProgress, Pipeline, SnapshotSink};
use crate::schema::{
    ConfigError, ExperimentConfig, RunOutcome, RunSnapshot, RunStatus, SearchGrid, SweepError,
    SweepSummary,
};

use super::experiment::{Experiment, ExperimentError};

/// Builds the pipeline for one resolved run configuration.
pub type PipelineFactory = Box<dyn FnMut(&ExperimentConfig) -> Result<Pipeline, ConfigError>>;

/// Sequential sweep executor.
pub struct Harness {
    seed: u64,
    output_dir: Option<PathBuf>,
    snapshot_sink: Option<Box<dyn SnapshotSink>>,
    pipeline_factory: Option<PipelineFactory>,
    progress_every: usize,
}

impl Harness {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            output_dir: None,
            snapshot_sink: None,
            pipeline_factory: None,
            progress_every: 25,
        }
    }

    /// Persist finished-run snapshots into `output_dir` through the sink.
    /// Persistence errors are logged and do not change run status.
    pub fn with_snapshot_sink(mut self, sink: Box<dyn SnapshotSink>, output_dir: PathBuf) -> Self {
        self.snapshot_sink = Some(sink);
        self.output_dir = Some(output_dir);
        self
    }

    /// Use externally built collaborators instead of the built-in dispatch.
    pub fn with_pipeline_factory(mut self, factory: PipelineFactory) -> Self {
        self.pipeline_factory = Some(factory);
        self
    }

    /// Per-run progress logging cadence.
    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every;
        self
    }

    pub fn run(
        &mut self,
        base: &ExperimentConfig,
        grid: &SearchGrid,
    ) -> Result<SweepSummary, SweepError> {
        self.run_with_observer(base, grid, |_| {})
    }

    /// Run the whole sweep. Expansion errors abort before any run starts;
    /// a single run's failure is recorded and the sweep continues.
    pub fn run_with_observer(
        &mut self,
        base: &ExperimentConfig,
        grid: &SearchGrid,
        mut observer: impl FnMut(&RunOutcome),
    ) -> Result<SweepSummary, SweepError> {
        let resolved = grid.resolve(base)?;
        let total = resolved.len();
        let start = Instant::now();

        info!("sweep of {total} runs starting (seed {})", self.seed);

        let mut outcomes = Vec::with_capacity(total);
        for (index, mut run_map) in resolved.into_iter().enumerate() {
            // An explicit seed (from the base or a swept axis) wins; a
            // malformed one is left in place to fail that run's config.
            if matches!(run_map.get("seed"), None | Some(Value::Null)) {
                run_map.insert(
                    "seed".to_string(),
                    Value::from(derive_run_seed(self.seed, index as u64)),
                );
            }
            let config_value = Value::Object(run_map);

            let run_start = Instant::now();
            let (status, snapshot) = self.execute(&config_value);
            let elapsed = run_start.elapsed().as_secs_f64();

            match &status {
                RunStatus::Finished => {
                    info!("run {}/{total} finished in {elapsed:.2}s", index + 1);
                }
                RunStatus::Failed { error } => {
                    warn!("run {}/{total} failed after {elapsed:.2}s: {error}", index + 1);
                }
            }

            if let Some(snapshot) = &snapshot {
                self.persist(snapshot, index);
            }

            let outcome = RunOutcome {
                index,
                config: config_value,
                status,
                snapshot,
                elapsed_seconds: elapsed,
            };
            observer(&outcome);
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.status.is_finished()).count();
        let summary = SweepSummary {
            failed: outcomes.len() - succeeded,
            succeeded,
            outcomes,
            elapsed_seconds: start.elapsed().as_secs_f64(),
        };
        info!(
            "sweep done: {}/{} runs succeeded in {:.2}s",
            summary.succeeded,
            summary.len(),
            summary.elapsed_seconds
        );
        Ok(summary)
    }

    fn execute(&mut self, config_value: &Value) -> (RunStatus, Option<RunSnapshot>) {
        let config: ExperimentConfig = match serde_json::from_value(config_value.clone()) {
            Ok(config) => config,
            Err(error) => {
                return (
                    RunStatus::Failed {
                        error: format!("configuration rejected: {error}"),
                    },
                    None,
                );
            }
        };

        let mut experiment = match self.build_experiment(config) {
            Ok(experiment) => experiment,
            Err(error) => {
                return (
                    RunStatus::Failed {
                        error: error.to_string(),
                    },
                    None,
                );
            }
        };

        let mut progress = LogProgress {
            every: self.progress_every,
        };
        match experiment.run(&mut progress) {
            Ok(snapshot) => (RunStatus::Finished, Some(snapshot)),
            Err(error) => (
                RunStatus::Failed {
                    error: error.to_string(),
                },
                None,
            ),
        }
    }

    fn build_experiment(&mut self, config: ExperimentConfig) -> Result<Experiment, ExperimentError> {
        match &mut self.pipeline_factory {
            Some(factory) => {
                let pipeline = factory(&config)?;
                Ok(Experiment::new(config, pipeline))
            }
            None => Experiment::from_config(config),
        }
    }

    fn persist(&mut self, snapshot: &RunSnapshot, index: usize) {
        let (Some(sink), Some(dir)) = (self.snapshot_sink.as_mut(), self.output_dir.as_ref())
        else {
            return;
        };
        let dest = dir.join(format!("{}_{index:03}.json", snapshot.name));
        if let Err(error) = sink.persist(snapshot, &dest) {
            warn!("failed to persist snapshot for run {index}: {error}");
        }
    }
}

/// Deterministic per-run seed from the harness seed and run index
/// (splitmix64 mixing).
pub fn derive_run_seed(harness_seed: u64, index: u64) -> u64 {
    let mut z = harness_seed
        .wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
