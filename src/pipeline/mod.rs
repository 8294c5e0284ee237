//! Collaborator seams for the search loop.
//!
//! The engine never looks inside decoding, inference, or scoring; it only
//! requires the narrow contracts below and that every returned vector stays
//! index-aligned with the batch it was computed from. Implementations are
//! free to parallelize internally.
//!
//! The built-in variants live in [`builtin`] and are selected once, at
//! experiment construction, from the tagged configuration enums.

mod builtin;
mod sink;

pub use builtin::{
    ActivityScorer, IdentityDecoder, NoiseReference, PassthroughSubject, Pipeline,
    RadialBasisSubject, TanhDecoder, TargetDistanceScorer,
};
pub use sink::{
    JsonSnapshotSink, LogProgress, NullProgress, Progress, ProgressSink, SinkError, SnapshotSink,
};

use std::collections::BTreeMap;

use crate::search::Code;

/// A decoded artifact the subject can evaluate: a flat numeric buffer.
pub type Stimulus = Vec<f32>;

/// Named probe layers, one response row per stimulus in the observed batch.
#[derive(Debug, Clone, Default)]
pub struct SubjectState {
    layers: BTreeMap<String, Vec<Vec<f32>>>,
}

impl SubjectState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a probe layer. Rows must be index-aligned with the stimuli the
    /// subject observed.
    pub fn insert(&mut self, name: impl Into<String>, responses: Vec<Vec<f32>>) {
        self.layers.insert(name.into(), responses);
    }

    pub fn layer(&self, name: &str) -> Option<&[Vec<f32>]> {
        self.layers.get(name).map(Vec::as_slice)
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }
}

/// Maps latent codes to stimuli. Deterministic given a code and the
/// decoder's own fixed parameters.
pub trait Decoder {
    fn decode(&mut self, codes: &[Code]) -> Result<Vec<Stimulus>, DecodeError>;
}

/// Runs inference over a stimulus batch and exposes probe layers.
pub trait Subject {
    fn observe(&mut self, stimuli: &[Stimulus]) -> Result<SubjectState, InferenceError>;
}

/// Reduces a subject state to one scalar per stimulus, index-aligned.
pub trait Scorer {
    fn score(&self, state: &SubjectState) -> Result<Vec<f32>, ScoringError>;
}

/// Secondary comparison stream: produces baseline stimuli that are scored
/// through the same subject and scorer as the evolving codes.
pub trait ReferenceSource {
    fn next_batch(&mut self) -> Result<Vec<Stimulus>, InferenceError>;
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Decoding failed: {0}")]
pub struct DecodeError(pub String);

#[derive(Debug, Clone, thiserror::Error)]
#[error("Inference failed: {0}")]
pub struct InferenceError(pub String);

#[derive(Debug, Clone, thiserror::Error)]
#[error("Scoring failed: {0}")]
pub struct ScoringError(pub String);

/// Any collaborator failure, fatal to the run that hit it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}
