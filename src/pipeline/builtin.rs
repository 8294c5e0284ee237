//! Built-in collaborator variants.
//!
//! A small closed set selected by the tagged configuration enums: enough to
//! run self-contained searches and tests without an external model. Real
//! deployments implement the traits in the parent module and inject their
//! own pipeline instead.

use rand::prelude::*;
use rand_distr::StandardNormal;
use rayon::prelude::*;

use crate::schema::{
    Aggregate, ConfigError, DecoderConfig, ExperimentConfig, ReferenceConfig, ScorerConfig,
    SubjectConfig,
};
use crate::search::Code;

use super::{
    DecodeError, Decoder, InferenceError, ReferenceSource, Scorer, ScoringError, Stimulus,
    Subject, SubjectState,
};

/// Bound decoder/subject/scorer trio for one experiment.
pub struct Pipeline {
    pub decoder: Box<dyn Decoder>,
    pub subject: Box<dyn Subject>,
    pub scorer: Box<dyn Scorer>,
}

impl Pipeline {
    /// Single dispatch point from configuration to the built-in variants.
    pub fn from_config(config: &ExperimentConfig) -> Result<Self, ConfigError> {
        let decoder: Box<dyn Decoder> = match &config.decoder {
            DecoderConfig::Identity => Box::new(IdentityDecoder::new(config.code_dim)),
            DecoderConfig::Tanh { gain } => Box::new(TanhDecoder::new(config.code_dim, *gain)),
        };

        let subject: Box<dyn Subject> = match &config.subject {
            SubjectConfig::Passthrough => Box::new(PassthroughSubject),
            SubjectConfig::RadialBasis { prototypes, sigma } => {
                Box::new(RadialBasisSubject::new(prototypes.clone(), *sigma)?)
            }
        };

        let scorer: Box<dyn Scorer> = match &config.scorer {
            ScorerConfig::Activity {
                layer,
                units,
                aggregate,
            } => Box::new(ActivityScorer::new(
                layer.clone(),
                units.clone(),
                *aggregate,
            )?),
            ScorerConfig::TargetDistance { layer, target } => {
                Box::new(TargetDistanceScorer::new(layer.clone(), target.clone()))
            }
        };

        Ok(Self {
            decoder,
            subject,
            scorer,
        })
    }
}

/// Stimulus is the code itself.
pub struct IdentityDecoder {
    dim: usize,
}

impl IdentityDecoder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Decoder for IdentityDecoder {
    fn decode(&mut self, codes: &[Code]) -> Result<Vec<Stimulus>, DecodeError> {
        check_code_shapes(codes, self.dim)?;
        Ok(codes.to_vec())
    }
}

/// Element-wise tanh squashing into (-gain, gain).
pub struct TanhDecoder {
    dim: usize,
    gain: f32,
}

impl TanhDecoder {
    pub fn new(dim: usize, gain: f32) -> Self {
        Self { dim, gain }
    }
}

impl Decoder for TanhDecoder {
    fn decode(&mut self, codes: &[Code]) -> Result<Vec<Stimulus>, DecodeError> {
        check_code_shapes(codes, self.dim)?;
        Ok(codes
            .iter()
            .map(|code| code.iter().map(|v| v.tanh() * self.gain).collect())
            .collect())
    }
}

fn check_code_shapes(codes: &[Code], dim: usize) -> Result<(), DecodeError> {
    for (i, code) in codes.iter().enumerate() {
        if code.len() != dim {
            return Err(DecodeError(format!(
                "code {i} has {} elements, expected {dim}",
                code.len()
            )));
        }
    }
    Ok(())
}

/// Single probe layer `out` echoing each stimulus unchanged.
pub struct PassthroughSubject;

impl Subject for PassthroughSubject {
    fn observe(&mut self, stimuli: &[Stimulus]) -> Result<SubjectState, InferenceError> {
        let mut state = SubjectState::new();
        state.insert("out", stimuli.to_vec());
        Ok(state)
    }
}

/// Probe layer `rbf` with one unit per prototype. A unit's response decays
/// with squared distance between the stimulus and its prototype.
pub struct RadialBasisSubject {
    prototypes: Vec<Vec<f32>>,
    sigma: f32,
}

impl RadialBasisSubject {
    pub fn new(prototypes: Vec<Vec<f32>>, sigma: f32) -> Result<Self, ConfigError> {
        if prototypes.is_empty() {
            return Err(ConfigError::EmptyPrototypes);
        }
        let dim = prototypes[0].len();
        if dim == 0 || prototypes.iter().any(|p| p.len() != dim) {
            return Err(ConfigError::RaggedPrototypes);
        }
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(ConfigError::InvalidSigma(sigma));
        }
        Ok(Self { prototypes, sigma })
    }

    fn respond(&self, stimulus: &Stimulus) -> Result<Vec<f32>, InferenceError> {
        let dim = self.prototypes[0].len();
        if stimulus.len() != dim {
            return Err(InferenceError(format!(
                "stimulus has {} elements, subject expects {dim}",
                stimulus.len()
            )));
        }
        let denom = 2.0 * self.sigma * self.sigma;
        Ok(self
            .prototypes
            .iter()
            .map(|prototype| {
                let sq_dist: f32 = prototype
                    .iter()
                    .zip(stimulus)
                    .map(|(p, s)| (p - s) * (p - s))
                    .sum();
                (-sq_dist / denom).exp()
            })
            .collect())
    }
}

impl Subject for RadialBasisSubject {
    fn observe(&mut self, stimuli: &[Stimulus]) -> Result<SubjectState, InferenceError> {
        // Batch rows are independent; index alignment is preserved by the
        // ordered collect.
        let subject = &*self;
        let responses: Vec<Vec<f32>> = stimuli
            .par_iter()
            .map(|stimulus| subject.respond(stimulus))
            .collect::<Result<_, _>>()?;

        let mut state = SubjectState::new();
        state.insert("rbf", responses);
        Ok(state)
    }
}

/// Aggregate activity of selected units in one probe layer.
pub struct ActivityScorer {
    layer: String,
    units: Option<Vec<usize>>,
    aggregate: Aggregate,
}

impl ActivityScorer {
    pub fn new(
        layer: String,
        units: Option<Vec<usize>>,
        aggregate: Aggregate,
    ) -> Result<Self, ConfigError> {
        if let Some(units) = &units
            && units.is_empty()
        {
            return Err(ConfigError::NoScoredUnits);
        }
        Ok(Self {
            layer,
            units,
            aggregate,
        })
    }
}

impl Scorer for ActivityScorer {
    fn score(&self, state: &SubjectState) -> Result<Vec<f32>, ScoringError> {
        let rows = state
            .layer(&self.layer)
            .ok_or_else(|| ScoringError(format!("probe layer `{}` was not recorded", self.layer)))?;

        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                let selected: Vec<f32> = match &self.units {
                    Some(units) => units
                        .iter()
                        .map(|&u| {
                            row.get(u).copied().ok_or_else(|| {
                                ScoringError(format!(
                                    "unit {u} out of range for layer `{}` ({} units)",
                                    self.layer,
                                    row.len()
                                ))
                            })
                        })
                        .collect::<Result<_, _>>()?,
                    None => row.clone(),
                };
                if selected.is_empty() {
                    return Err(ScoringError(format!(
                        "stimulus {i} produced no responses in layer `{}`",
                        self.layer
                    )));
                }
                Ok(match self.aggregate {
                    Aggregate::Mean => selected.iter().sum::<f32>() / selected.len() as f32,
                    Aggregate::Max => selected.iter().copied().fold(f32::NEG_INFINITY, f32::max),
                    Aggregate::Sum => selected.iter().sum(),
                })
            })
            .collect()
    }
}

/// Negative mean squared error against a fixed target response.
pub struct TargetDistanceScorer {
    layer: String,
    target: Vec<f32>,
}

impl TargetDistanceScorer {
    pub fn new(layer: String, target: Vec<f32>) -> Self {
        Self { layer, target }
    }
}

impl Scorer for TargetDistanceScorer {
    fn score(&self, state: &SubjectState) -> Result<Vec<f32>, ScoringError> {
        let rows = state
            .layer(&self.layer)
            .ok_or_else(|| ScoringError(format!("probe layer `{}` was not recorded", self.layer)))?;

        rows.iter()
            .map(|row| {
                if row.len() != self.target.len() {
                    return Err(ScoringError(format!(
                        "response has {} elements, target has {}",
                        row.len(),
                        self.target.len()
                    )));
                }
                let mse: f32 = row
                    .iter()
                    .zip(&self.target)
                    .map(|(r, t)| (r - t) * (r - t))
                    .sum::<f32>()
                    / self.target.len() as f32;
                Ok(-mse)
            })
            .collect()
    }
}

/// Seeded Gaussian-noise baseline stimuli.
pub struct NoiseReference {
    rng: StdRng,
    dim: usize,
    batch_size: usize,
    amplitude: f32,
}

impl NoiseReference {
    pub fn new(dim: usize, config: &ReferenceConfig, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            dim,
            batch_size: config.batch_size,
            amplitude: config.amplitude,
        }
    }
}

impl ReferenceSource for NoiseReference {
    fn next_batch(&mut self) -> Result<Vec<Stimulus>, InferenceError> {
        Ok((0..self.batch_size)
            .map(|_| {
                (0..self.dim)
                    .map(|_| {
                        let noise: f32 = self.rng.sample(StandardNormal);
                        noise * self.amplitude
                    })
                    .collect()
            })
            .collect())
    }
}
