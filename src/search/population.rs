//! The evolving set of candidate codes and their fitness.

use crate::schema::{ConfigError, NoiseDistribution};

use super::optimizer::CodeRng;

/// Latent vector optimized by the search. Length is fixed per experiment.
pub type Code = Vec<f32>;

/// Ordered collection of codes paired index-wise with fitness.
///
/// Fitness is NaN until the current generation has been evaluated;
/// `codes.len() == fitness.len()` holds at every observable point.
#[derive(Debug, Clone)]
pub struct Population {
    codes: Vec<Code>,
    fitness: Vec<f32>,
    evaluated: bool,
}

impl Population {
    /// Fresh random population drawn from the given distribution.
    pub fn random(
        dim: usize,
        size: usize,
        rng: &mut CodeRng,
        distribution: NoiseDistribution,
    ) -> Result<Self, ConfigError> {
        if dim == 0 {
            return Err(ConfigError::InvalidCodeDim);
        }
        if size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        let codes = (0..size).map(|_| rng.random_code(dim, distribution)).collect();
        Ok(Self {
            codes,
            fitness: vec![f32::NAN; size],
            evaluated: false,
        })
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Code dimensionality.
    pub fn dim(&self) -> usize {
        self.codes[0].len()
    }

    pub fn codes(&self) -> &[Code] {
        &self.codes
    }

    pub fn fitness(&self) -> &[f32] {
        &self.fitness
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluated
    }

    /// Attach one fitness scalar per code. Fails fast on shape mismatch and
    /// on non-finite values; nothing is silently coerced.
    pub fn set_fitness(&mut self, values: &[f32]) -> Result<(), PopulationError> {
        if values.len() != self.codes.len() {
            return Err(PopulationError::ShapeMismatch {
                expected: self.codes.len(),
                actual: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(PopulationError::InvalidFitness {
                index,
                value: values[index],
            });
        }
        self.fitness.copy_from_slice(values);
        self.evaluated = true;
        Ok(())
    }

    /// Replace the codes with the next generation, resetting fitness.
    pub fn replace_codes(&mut self, codes: Vec<Code>) -> Result<(), PopulationError> {
        if codes.len() != self.codes.len() {
            return Err(PopulationError::ShapeMismatch {
                expected: self.codes.len(),
                actual: codes.len(),
            });
        }
        self.codes = codes;
        self.fitness.fill(f32::NAN);
        self.evaluated = false;
        Ok(())
    }

    /// Indices sorted by descending fitness; ties keep the original index
    /// order so results are deterministic under a fixed seed.
    pub fn rank(&self) -> Result<Vec<usize>, PopulationError> {
        if !self.evaluated {
            return Err(PopulationError::NotEvaluated);
        }
        let mut indices: Vec<usize> = (0..self.codes.len()).collect();
        // set_fitness guarantees finite values, so the total order exists.
        indices.sort_by(|&a, &b| self.fitness[b].partial_cmp(&self.fitness[a]).unwrap());
        Ok(indices)
    }

    /// Best code and fitness in the current generation.
    pub fn best(&self) -> Result<(&Code, f32), PopulationError> {
        let ranked = self.rank()?;
        let top = ranked[0];
        Ok((&self.codes[top], self.fitness[top]))
    }

    /// Mean fitness of the current generation.
    pub fn mean_fitness(&self) -> Result<f32, PopulationError> {
        if !self.evaluated {
            return Err(PopulationError::NotEvaluated);
        }
        Ok(self.fitness.iter().sum::<f32>() / self.fitness.len() as f32)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PopulationError {
    #[error("Expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("Fitness at index {index} is {value}; non-finite values are a caller bug")]
    InvalidFitness { index: usize, value: f32 },
    #[error("Fitness has not been evaluated for the current generation")]
    NotEvaluated,
}
