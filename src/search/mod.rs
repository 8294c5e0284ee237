//! Evolutionary search over latent codes.
//!
//! # Overview
//!
//! The search system consists of:
//!
//! - **Population** (`population`): candidate codes paired with fitness
//! - **Optimizer** (`optimizer`): selection, recombination, and mutation
//! - **Experiment** (`experiment`): the generation loop for one run
//! - **Harness** (`harness`): sweeps over a parameter grid with per-run
//!   failure isolation
//!
//! # Example
//!
//! ```rust,no_run
//! use actmax::pipeline::NullProgress;
//! use actmax::schema::ExperimentConfig;
//! use actmax::search::Experiment;
//!
//! let config = ExperimentConfig {
//!     seed: Some(42),
//!     ..ExperimentConfig::default()
//! };
//!
//! let mut experiment = Experiment::from_config(config).unwrap();
//! let snapshot = experiment.run(&mut NullProgress).unwrap();
//!
//! println!("best fitness: {:.3}", snapshot.best_fitness);
//! ```
//!
//! Each generation the loop decodes the population into stimuli, observes
//! them through the subject, scores the subject state, and hands the fitness
//! vector to the optimizer to breed the next generation. Generations are
//! strictly sequential; batch evaluation within a generation may parallelize
//! inside the collaborators.

mod experiment;
mod harness;
mod optimizer;
mod population;

pub use experiment::{Experiment, ExperimentError, ExperimentState};
pub use harness::{Harness, PipelineFactory, derive_run_seed};
pub use optimizer::{CodeRng, GeneticOptimizer};
pub use population::{Code, Population, PopulationError};
