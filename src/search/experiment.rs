//! One search run: generation → evaluation → optimization cycles over a
//! bound collaborator pipeline.
//!
//! The experiment is the error boundary: any collaborator failure flips the
//! run into the `Failed` state with the triggering error retained, while
//! progress-reporting failures are logged and never change the run status.

use std::time::Instant;

use log::{debug, warn};

use crate::pipeline::{
    DecodeError, InferenceError, NoiseReference, Pipeline, PipelineError, Progress, ProgressSink,
    ReferenceSource, ScoringError,
};
use crate::schema::{ConfigError, ExperimentConfig, GenerationRecord, RunSnapshot, StopReason};

use super::optimizer::{CodeRng, GeneticOptimizer};
use super::population::{Population, PopulationError};

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperimentState {
    Created,
    Initialized,
    Running,
    Finished,
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Population(#[from] PopulationError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Cannot {action} from state {state:?}")]
    InvalidState {
        action: &'static str,
        state: ExperimentState,
    },
}

impl From<DecodeError> for ExperimentError {
    fn from(error: DecodeError) -> Self {
        Self::Pipeline(error.into())
    }
}

impl From<InferenceError> for ExperimentError {
    fn from(error: InferenceError) -> Self {
        Self::Pipeline(error.into())
    }
}

impl From<ScoringError> for ExperimentError {
    fn from(error: ScoringError) -> Self {
        Self::Pipeline(error.into())
    }
}

/// A single configured search run.
pub struct Experiment {
    config: ExperimentConfig,
    pipeline: Pipeline,
    reference: Option<Box<dyn ReferenceSource>>,
    state: ExperimentState,
    population: Option<Population>,
    optimizer: Option<GeneticOptimizer>,
    history: Vec<GenerationRecord>,
    reference_best: Option<Vec<f32>>,
    generation: usize,
}

impl Experiment {
    /// Bind an externally built pipeline.
    pub fn new(config: ExperimentConfig, pipeline: Pipeline) -> Self {
        Self {
            config,
            pipeline,
            reference: None,
            state: ExperimentState::Created,
            population: None,
            optimizer: None,
            history: Vec::new(),
            reference_best: None,
            generation: 0,
        }
    }

    /// Bind the built-in collaborators selected by the configuration.
    pub fn from_config(config: ExperimentConfig) -> Result<Self, ExperimentError> {
        let pipeline = Pipeline::from_config(&config)?;
        Ok(Self::new(config, pipeline))
    }

    /// Inject an external reference stream, overriding the configured
    /// built-in one.
    pub fn with_reference(mut self, source: Box<dyn ReferenceSource>) -> Self {
        self.reference = Some(source);
        self
    }

    pub fn state(&self) -> ExperimentState {
        self.state
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Records for the generations executed so far.
    pub fn history(&self) -> &[GenerationRecord] {
        &self.history
    }

    /// Number of generations executed so far.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Validate the configuration, seed the random streams, and construct
    /// the population and optimizer.
    ///
    /// An absent seed is resolved from entropy here and written back into
    /// the configuration so the snapshot stays reproducible.
    pub fn init(&mut self) -> Result<(), ExperimentError> {
        if self.state != ExperimentState::Created {
            return Err(ExperimentError::InvalidState {
                action: "initialize",
                state: self.state,
            });
        }
        self.config.validate()?;

        let seed = self.config.seed.unwrap_or_else(rand::random);
        self.config.seed = Some(seed);

        // Independent child streams: population init, optimizer, reference.
        let mut root = CodeRng::new(seed);
        let mut init_rng = CodeRng::new(root.next_seed());
        let optimizer_rng = CodeRng::new(root.next_seed());
        let reference_seed = root.next_seed();

        let population = Population::random(
            self.config.code_dim,
            self.config.optimizer.pop_size,
            &mut init_rng,
            self.config.optimizer.random_distribution,
        )?;
        let optimizer = GeneticOptimizer::new(self.config.optimizer.clone(), optimizer_rng)?;

        if self.reference.is_none()
            && let Some(reference) = &self.config.reference
        {
            self.reference = Some(Box::new(NoiseReference::new(
                self.config.code_dim,
                reference,
                reference_seed,
            )));
        }

        self.history = Vec::with_capacity(self.config.num_generations);
        self.reference_best = self
            .reference
            .is_some()
            .then(|| Vec::with_capacity(self.config.num_generations));
        self.population = Some(population);
        self.optimizer = Some(optimizer);
        self.generation = 0;
        self.state = ExperimentState::Initialized;

        debug!(
            "experiment `{}` initialized: seed {seed}, {} codes of dim {}",
            self.config.name, self.config.optimizer.pop_size, self.config.code_dim
        );
        Ok(())
    }

    /// Run to completion and assemble the trajectory snapshot.
    pub fn run(&mut self, progress: &mut dyn ProgressSink) -> Result<RunSnapshot, ExperimentError> {
        let result = self.run_inner(progress);
        match &result {
            Ok(_) => self.state = ExperimentState::Finished,
            Err(ExperimentError::InvalidState { .. }) => {}
            Err(_) => self.state = ExperimentState::Failed,
        }
        result
    }

    fn run_inner(
        &mut self,
        progress: &mut dyn ProgressSink,
    ) -> Result<RunSnapshot, ExperimentError> {
        if self.state == ExperimentState::Created {
            self.init()?;
        }
        if self.state != ExperimentState::Initialized {
            return Err(ExperimentError::InvalidState {
                action: "run",
                state: self.state,
            });
        }
        let (Some(mut population), Some(mut optimizer)) =
            (self.population.take(), self.optimizer.take())
        else {
            return Err(ExperimentError::InvalidState {
                action: "run",
                state: self.state,
            });
        };

        self.state = ExperimentState::Running;
        let start = Instant::now();
        let total = self.config.num_generations;

        let mut best_code = None;
        let mut best_fitness = f32::NEG_INFINITY;
        let mut stagnation = 0usize;
        let mut stop = StopReason::GenerationBudget;

        for generation in 0..total {
            let stimuli = self.pipeline.decoder.decode(population.codes())?;
            let state = self.pipeline.subject.observe(&stimuli)?;
            let scores = self.pipeline.scorer.score(&state)?;
            population.set_fitness(&scores)?;

            let (generation_best_code, generation_best) = population.best()?;
            let mean = population.mean_fitness()?;
            if generation_best > best_fitness {
                best_fitness = generation_best;
                best_code = Some(generation_best_code.clone());
                stagnation = 0;
            } else {
                stagnation += 1;
            }
            self.history.push(GenerationRecord {
                best: generation_best,
                mean,
            });

            if let Some(source) = self.reference.as_mut() {
                let batch = source.next_batch()?;
                let reference_state = self.pipeline.subject.observe(&batch)?;
                let reference_scores = self.pipeline.scorer.score(&reference_state)?;
                let generation_reference = reference_scores
                    .iter()
                    .copied()
                    .fold(f32::NEG_INFINITY, f32::max);
                if let Some(track) = self.reference_best.as_mut() {
                    let running = track
                        .last()
                        .copied()
                        .unwrap_or(f32::NEG_INFINITY)
                        .max(generation_reference);
                    track.push(running);
                }
            }

            // Reporting must not affect algorithmic state even when it fails.
            let report = Progress {
                generation,
                total,
                best: best_fitness,
                mean,
            };
            if let Err(error) = progress.report(&report) {
                warn!("progress reporting failed at generation {generation}: {error}");
            }

            self.generation = generation + 1;

            if let Some(limit) = self.config.stagnation_limit
                && stagnation >= limit
            {
                stop = StopReason::Stagnation;
                break;
            }

            if generation + 1 < total {
                let next = optimizer.next_generation(&population)?;
                population.replace_codes(next)?;
            }
        }

        // The loop runs at least one generation, so a best code exists.
        let best_code = best_code.expect("at least one generation was evaluated");

        Ok(RunSnapshot {
            name: self.config.name.clone(),
            config: self.config.clone(),
            generations: self.history.clone(),
            best_code,
            best_fitness,
            reference_best: self.reference_best.clone(),
            stop,
            elapsed_seconds: start.elapsed().as_secs_f64(),
        })
    }
}
