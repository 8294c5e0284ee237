//! actmax - Evolutionary search for stimuli that maximize unit responses in
//! a black-box scoring pipeline.
//!
//! The crate searches, by stochastic optimization, for latent codes whose
//! decoded stimuli drive selected units of a scoring subject as high as
//! possible. The subject is a black box: decoding, inference, and scoring
//! are collaborators behind narrow traits, and the engine only requires that
//! returned vectors stay index-aligned with the batch they came from.
//!
//! # Architecture
//!
//! The crate is split into three modules:
//!
//! - `schema`: configuration, sweep, and snapshot types
//! - `search`: population, genetic optimizer, experiment loop, sweep harness
//! - `pipeline`: collaborator traits, built-in variants, progress and
//!   persistence sinks
//!
//! # Example
//!
//! ```rust,no_run
//! use actmax::pipeline::NullProgress;
//! use actmax::schema::{ExperimentConfig, ScorerConfig};
//! use actmax::search::Experiment;
//!
//! // Search an 8-dimensional latent space for codes whose decoded stimulus
//! // matches a fixed target response.
//! let config = ExperimentConfig {
//!     code_dim: 8,
//!     num_generations: 75,
//!     seed: Some(42),
//!     scorer: ScorerConfig::TargetDistance {
//!         layer: "out".to_string(),
//!         target: vec![0.5; 8],
//!     },
//!     ..ExperimentConfig::default()
//! };
//!
//! let mut experiment = Experiment::from_config(config).unwrap();
//! let snapshot = experiment.run(&mut NullProgress).unwrap();
//!
//! println!("best fitness: {:.4}", snapshot.best_fitness);
//! println!("generations: {}", snapshot.generations.len());
//! ```

pub mod pipeline;
pub mod schema;
pub mod search;

// Re-export commonly used types
pub use schema::{ExperimentConfig, RunSnapshot, SearchGrid, SweepSummary};
pub use search::{Experiment, Harness};
