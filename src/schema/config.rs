//! Configuration types for single search runs.
//!
//! The experiment configuration is a flat mapping: optimizer keys live at the
//! top level so sweep axes can address them by name. Unknown keys are kept in
//! a passthrough map for collaborator use and are never interpreted here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Noise distribution family used for initial codes and mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NoiseDistribution {
    /// Standard normal.
    #[default]
    Normal,
    /// Uniform on [-1, 1).
    Uniform,
    /// Standard Gumbel (heavy right tail).
    Gumbel,
}

/// Genetic optimizer parameters, immutable for the lifetime of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Number of candidate codes per generation.
    #[serde(default = "default_pop_size")]
    pub pop_size: usize,
    /// Number of top-ranked codes eligible as parents.
    #[serde(default = "default_num_parents")]
    pub num_parents: usize,
    /// Probability that a single code element is perturbed.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f32,
    /// Scale applied to the noise draw when an element mutates.
    #[serde(default = "default_mutation_size")]
    pub mutation_size: f32,
    /// Softmax temperature for parent selection; 0 means uniform
    /// sampling among the top parents.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Distribution the noise is drawn from.
    #[serde(default)]
    pub random_distribution: NoiseDistribution,
    /// Number of top codes carried unmutated into the next generation.
    /// 0 disables elitism.
    #[serde(default = "default_elitism")]
    pub elitism: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            pop_size: default_pop_size(),
            num_parents: default_num_parents(),
            mutation_rate: default_mutation_rate(),
            mutation_size: default_mutation_size(),
            temperature: default_temperature(),
            random_distribution: NoiseDistribution::default(),
            elitism: default_elitism(),
        }
    }
}

fn default_pop_size() -> usize {
    50
}
fn default_num_parents() -> usize {
    2
}
fn default_mutation_rate() -> f32 {
    0.3
}
fn default_mutation_size() -> f32 {
    0.1
}
fn default_temperature() -> f32 {
    1.0
}
fn default_elitism() -> usize {
    1
}

impl OptimizerConfig {
    /// Validate parameter ranges. Called once at optimizer construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_parents == 0 {
            return Err(ConfigError::NoParents);
        }
        if self.pop_size < self.num_parents {
            return Err(ConfigError::PopulationSmallerThanParents {
                pop_size: self.pop_size,
                num_parents: self.num_parents,
            });
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ConfigError::MutationRateOutOfRange(self.mutation_rate));
        }
        if !self.mutation_size.is_finite() || self.mutation_size < 0.0 {
            return Err(ConfigError::InvalidMutationSize(self.mutation_size));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        if self.elitism >= self.pop_size {
            return Err(ConfigError::ElitismExceedsPopulation {
                elitism: self.elitism,
                pop_size: self.pop_size,
            });
        }
        Ok(())
    }
}

/// Decoder selection: maps latent codes to stimuli.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecoderConfig {
    /// Stimulus is the code itself.
    Identity,
    /// Element-wise tanh squashing, stimulus bounded to (-gain, gain).
    Tanh {
        #[serde(default = "default_gain")]
        gain: f32,
    },
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::Identity
    }
}

fn default_gain() -> f32 {
    1.0
}

/// Subject selection: runs inference over stimuli and exposes probe layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubjectConfig {
    /// Single probe layer `out` echoing each stimulus unchanged.
    Passthrough,
    /// Probe layer `rbf` with one unit per prototype; a unit responds
    /// most strongly when the stimulus is near its prototype.
    RadialBasis {
        prototypes: Vec<Vec<f32>>,
        #[serde(default = "default_sigma")]
        sigma: f32,
    },
}

impl Default for SubjectConfig {
    fn default() -> Self {
        Self::Passthrough
    }
}

fn default_sigma() -> f32 {
    1.0
}

/// Aggregation over the scored units of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    #[default]
    Mean,
    Max,
    Sum,
}

/// Scorer selection: reduces a subject state to one scalar per stimulus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScorerConfig {
    /// Aggregate activity of selected units in a probe layer.
    Activity {
        layer: String,
        /// Unit indices to score; all units when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        units: Option<Vec<usize>>,
        #[serde(default)]
        aggregate: Aggregate,
    },
    /// Negative mean squared error against a fixed target response.
    TargetDistance { layer: String, target: Vec<f32> },
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self::Activity {
            layer: "out".to_string(),
            units: None,
            aggregate: Aggregate::default(),
        }
    }
}

/// Optional secondary comparison stream: seeded noise stimuli scored through
/// the same subject and scorer, tracked as a parallel baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Stimuli per generation.
    #[serde(default = "default_reference_batch")]
    pub batch_size: usize,
    /// Noise amplitude.
    #[serde(default = "default_reference_amplitude")]
    pub amplitude: f32,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            batch_size: default_reference_batch(),
            amplitude: default_reference_amplitude(),
        }
    }
}

fn default_reference_batch() -> usize {
    10
}
fn default_reference_amplitude() -> f32 {
    1.0
}

/// Full configuration for one search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Run name, used for output naming.
    #[serde(default = "default_name")]
    pub name: String,
    /// Dimensionality of the latent codes.
    #[serde(default = "default_code_dim")]
    pub code_dim: usize,
    /// Generation budget.
    #[serde(default = "default_num_generations")]
    pub num_generations: usize,
    /// Run seed. Absent means entropy-seeded (single runs) or derived from
    /// the harness seed and run index (sweeps).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Early stop after this many generations without best-ever improvement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stagnation_limit: Option<usize>,
    /// Optimizer parameters, kept flat so sweep axes address them by name.
    #[serde(flatten)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub subject: SubjectConfig,
    #[serde(default)]
    pub scorer: ScorerConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceConfig>,
    /// Unrecognized keys, preserved for collaborator use.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            code_dim: default_code_dim(),
            num_generations: default_num_generations(),
            seed: None,
            stagnation_limit: None,
            optimizer: OptimizerConfig::default(),
            decoder: DecoderConfig::default(),
            subject: SubjectConfig::default(),
            scorer: ScorerConfig::default(),
            reference: None,
            extra: BTreeMap::new(),
        }
    }
}

fn default_name() -> String {
    "experiment".to_string()
}
fn default_code_dim() -> usize {
    64
}
fn default_num_generations() -> usize {
    100
}

impl ExperimentConfig {
    /// Validate the whole run configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.code_dim == 0 {
            return Err(ConfigError::InvalidCodeDim);
        }
        if self.num_generations == 0 {
            return Err(ConfigError::InvalidGenerationBudget);
        }
        if let Some(limit) = self.stagnation_limit
            && limit == 0
        {
            return Err(ConfigError::InvalidStagnationLimit);
        }
        if let Some(reference) = &self.reference
            && reference.batch_size == 0
        {
            return Err(ConfigError::InvalidReferenceBatch);
        }
        self.optimizer.validate()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Code dimensionality must be non-zero")]
    InvalidCodeDim,
    #[error("Generation budget must be non-zero")]
    InvalidGenerationBudget,
    #[error("Stagnation limit must be non-zero when set")]
    InvalidStagnationLimit,
    #[error("Reference batch size must be non-zero")]
    InvalidReferenceBatch,
    #[error("At least one parent is required")]
    NoParents,
    #[error("Population size {pop_size} is smaller than parent count {num_parents}")]
    PopulationSmallerThanParents { pop_size: usize, num_parents: usize },
    #[error("Mutation rate {0} is outside [0, 1]")]
    MutationRateOutOfRange(f32),
    #[error("Mutation size {0} must be finite and non-negative")]
    InvalidMutationSize(f32),
    #[error("Temperature {0} must be finite and non-negative")]
    InvalidTemperature(f32),
    #[error("Elitism {elitism} must be smaller than population size {pop_size}")]
    ElitismExceedsPopulation { elitism: usize, pop_size: usize },
    #[error("Population cannot be empty")]
    EmptyPopulation,
    #[error("Radial basis subject needs at least one prototype")]
    EmptyPrototypes,
    #[error("Prototypes must be non-empty and share one dimensionality")]
    RaggedPrototypes,
    #[error("Sigma {0} must be finite and positive")]
    InvalidSigma(f32),
    #[error("Scored unit list cannot be empty")]
    NoScoredUnits,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: ExperimentConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.optimizer.pop_size, 50);
        assert_eq!(config.optimizer.num_parents, 2);
        assert_eq!(config.optimizer.elitism, 1);
        assert_eq!(
            config.optimizer.random_distribution,
            NoiseDistribution::Normal
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flat_optimizer_keys() {
        let config: ExperimentConfig = serde_json::from_str(
            r#"{"pop_size": 20, "mutation_rate": 0.5, "temperature": 0.0}"#,
        )
        .unwrap();
        assert_eq!(config.optimizer.pop_size, 20);
        assert_eq!(config.optimizer.mutation_rate, 0.5);
        assert_eq!(config.optimizer.temperature, 0.0);
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let config: ExperimentConfig = serde_json::from_str(
            r#"{"pop_size": 10, "display_gif": true, "weights_root": "/tmp/w"}"#,
        )
        .unwrap();
        assert_eq!(config.extra.len(), 2);
        assert_eq!(config.extra["display_gif"], serde_json::json!(true));

        // Round trip keeps them untouched.
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["weights_root"], serde_json::json!("/tmp/w"));
    }

    #[test]
    fn test_rejects_more_parents_than_population() {
        let config = OptimizerConfig {
            pop_size: 2,
            num_parents: 5,
            ..OptimizerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PopulationSmallerThanParents { .. })
        ));
    }

    #[test]
    fn test_rejects_out_of_range_mutation_rate() {
        let config = OptimizerConfig {
            mutation_rate: 1.5,
            ..OptimizerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MutationRateOutOfRange(_))
        ));
    }

    #[test]
    fn test_rejects_zero_parents() {
        let config = OptimizerConfig {
            num_parents: 0,
            ..OptimizerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoParents)));
    }

    #[test]
    fn test_rejects_elitism_at_population_size() {
        let config = OptimizerConfig {
            pop_size: 4,
            elitism: 4,
            ..OptimizerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ElitismExceedsPopulation { .. })
        ));
    }

    #[test]
    fn test_distribution_names() {
        let distribution: NoiseDistribution = serde_json::from_str("\"gumbel\"").unwrap();
        assert_eq!(distribution, NoiseDistribution::Gumbel);
        assert!(serde_json::from_str::<NoiseDistribution>("\"laplace\"").is_err());
    }

    #[test]
    fn test_scorer_config_tagged() {
        let scorer: ScorerConfig = serde_json::from_str(
            r#"{"type": "activity", "layer": "rbf", "units": [0, 3], "aggregate": "max"}"#,
        )
        .unwrap();
        assert_eq!(
            scorer,
            ScorerConfig::Activity {
                layer: "rbf".to_string(),
                units: Some(vec![0, 3]),
                aggregate: Aggregate::Max,
            }
        );
    }
}
