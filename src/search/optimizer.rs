//! Selection and mutation engine.
//!
//! Produces the next generation from the current population's codes and
//! fitness. The optimizer owns no mutable state besides its fixed parameters
//! and the random stream position, so a run is exactly reproducible from its
//! seed.

use rand::prelude::*;
use rand_distr::{Gumbel, StandardNormal};

use crate::schema::{ConfigError, NoiseDistribution, OptimizerConfig};

use super::population::{Code, Population, PopulationError};

/// Seeded random number generator for code operations.
pub struct CodeRng {
    rng: StdRng,
    gumbel: Gumbel<f32>,
}

impl CodeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            gumbel: Gumbel::new(0.0, 1.0).expect("unit Gumbel parameters are valid"),
        }
    }

    /// Create with a random seed.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            gumbel: Gumbel::new(0.0, 1.0).expect("unit Gumbel parameters are valid"),
        }
    }

    /// Generate the next u64 for seeding child streams.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }

    /// One draw from the configured distribution at unit scale.
    pub fn sample_noise(&mut self, distribution: NoiseDistribution) -> f32 {
        match distribution {
            NoiseDistribution::Normal => self.rng.sample(StandardNormal),
            NoiseDistribution::Uniform => self.rng.gen_range(-1.0..1.0),
            NoiseDistribution::Gumbel => self.rng.sample(self.gumbel),
        }
    }

    /// Fresh random code of the given dimensionality.
    pub fn random_code(&mut self, dim: usize, distribution: NoiseDistribution) -> Code {
        (0..dim).map(|_| self.sample_noise(distribution)).collect()
    }

    /// Bernoulli gate.
    fn coin(&mut self, rate: f32) -> bool {
        self.rng.r#gen::<f32>() < rate
    }

    /// Sample an index from cumulative weights.
    fn pick_cumulative(&mut self, cumulative: &[f32]) -> usize {
        let total = cumulative.last().copied().unwrap_or(1.0);
        let t = self.rng.r#gen::<f32>() * total;
        cumulative
            .iter()
            .position(|&c| t < c)
            .unwrap_or(cumulative.len() - 1)
    }
}

/// Genetic selection/mutation engine.
pub struct GeneticOptimizer {
    config: OptimizerConfig,
    rng: CodeRng,
}

impl GeneticOptimizer {
    /// Validates parameter ranges once; no runtime errors are expected after
    /// a successful construction.
    pub fn new(config: OptimizerConfig, rng: CodeRng) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Produce the next generation's codes, sized `pop_size`, fitness unset.
    ///
    /// Top `elitism` codes are carried over unmutated. Each remaining
    /// offspring copies every element from a parent sampled among the top
    /// `num_parents` with softmax-of-fitness weights, then passes each
    /// element through a Bernoulli mutation gate.
    pub fn next_generation(&mut self, population: &Population) -> Result<Vec<Code>, PopulationError> {
        let ranked = population.rank()?;
        let parents: Vec<usize> = ranked.iter().take(self.config.num_parents).copied().collect();

        let parent_fitness: Vec<f32> = parents
            .iter()
            .map(|&i| population.fitness()[i])
            .collect();
        let weights = selection_weights(&parent_fitness, self.config.temperature);
        let cumulative: Vec<f32> = weights
            .iter()
            .scan(0.0, |acc, w| {
                *acc += w;
                Some(*acc)
            })
            .collect();

        let codes = population.codes();
        let dim = population.dim();

        let mut next = Vec::with_capacity(self.config.pop_size);
        for &i in ranked.iter().take(self.config.elitism) {
            next.push(codes[i].clone());
        }

        while next.len() < self.config.pop_size {
            let mut child = Code::with_capacity(dim);
            for element in 0..dim {
                let parent = parents[self.rng.pick_cumulative(&cumulative)];
                child.push(codes[parent][element]);
            }
            for value in &mut child {
                if self.rng.coin(self.config.mutation_rate) {
                    *value += self.rng.sample_noise(self.config.random_distribution)
                        * self.config.mutation_size;
                }
            }
            next.push(child);
        }

        Ok(next)
    }
}

/// Softmax of `scores / temperature`, max-subtracted before exponentiation.
/// Zero temperature degenerates to uniform weights over the parents.
fn selection_weights(scores: &[f32], temperature: f32) -> Vec<f32> {
    if temperature == 0.0 {
        return vec![1.0 / scores.len() as f32; scores.len()];
    }
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores
        .iter()
        .map(|s| ((s - max) / temperature).exp())
        .collect();
    let total: f32 = exps.iter().sum();
    exps.iter().map(|e| e / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn evaluated_population(dim: usize, size: usize, seed: u64) -> Population {
        let mut rng = CodeRng::new(seed);
        let mut population =
            Population::random(dim, size, &mut rng, NoiseDistribution::Normal).unwrap();
        let fitness: Vec<f32> = (0..size).map(|i| i as f32).collect();
        population.set_fitness(&fitness).unwrap();
        population
    }

    fn optimizer(config: OptimizerConfig, seed: u64) -> GeneticOptimizer {
        GeneticOptimizer::new(config, CodeRng::new(seed)).unwrap()
    }

    #[test]
    fn test_output_sized_to_population() {
        let population = evaluated_population(6, 12, 1);
        let mut opt = optimizer(
            OptimizerConfig {
                pop_size: 12,
                num_parents: 3,
                ..OptimizerConfig::default()
            },
            2,
        );
        let next = opt.next_generation(&population).unwrap();
        assert_eq!(next.len(), 12);
        assert!(next.iter().all(|code| code.len() == 6));
    }

    #[test]
    fn test_same_seed_same_generation() {
        let population = evaluated_population(8, 10, 3);
        let config = OptimizerConfig {
            pop_size: 10,
            num_parents: 4,
            ..OptimizerConfig::default()
        };
        let mut a = optimizer(config.clone(), 99);
        let mut b = optimizer(config, 99);
        assert_eq!(
            a.next_generation(&population).unwrap(),
            b.next_generation(&population).unwrap()
        );
    }

    #[test]
    fn test_zero_mutation_copies_parent_elements() {
        let population = evaluated_population(5, 8, 4);
        let mut opt = optimizer(
            OptimizerConfig {
                pop_size: 8,
                num_parents: 3,
                mutation_rate: 0.0,
                elitism: 0,
                ..OptimizerConfig::default()
            },
            5,
        );

        let ranked = population.rank().unwrap();
        let parents = &ranked[..3];
        let next = opt.next_generation(&population).unwrap();

        for child in &next {
            for (element, value) in child.iter().enumerate() {
                assert!(
                    parents
                        .iter()
                        .any(|&p| population.codes()[p][element] == *value)
                );
            }
        }
    }

    #[test]
    fn test_single_parent_clones_before_mutation() {
        let population = evaluated_population(5, 6, 7);
        let mut opt = optimizer(
            OptimizerConfig {
                pop_size: 6,
                num_parents: 1,
                mutation_rate: 0.0,
                elitism: 0,
                ..OptimizerConfig::default()
            },
            8,
        );

        let (best, _) = population.best().unwrap();
        let next = opt.next_generation(&population).unwrap();
        for child in &next {
            assert_eq!(child, best);
        }
    }

    #[test]
    fn test_elites_are_carried_unmutated() {
        let population = evaluated_population(4, 10, 11);
        let mut opt = optimizer(
            OptimizerConfig {
                pop_size: 10,
                num_parents: 2,
                mutation_rate: 1.0,
                mutation_size: 5.0,
                elitism: 2,
                ..OptimizerConfig::default()
            },
            12,
        );

        let ranked = population.rank().unwrap();
        let next = opt.next_generation(&population).unwrap();
        assert_eq!(next[0], population.codes()[ranked[0]]);
        assert_eq!(next[1], population.codes()[ranked[1]]);
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let config = OptimizerConfig {
            pop_size: 2,
            num_parents: 4,
            ..OptimizerConfig::default()
        };
        assert!(GeneticOptimizer::new(config, CodeRng::new(0)).is_err());
    }

    #[test]
    fn test_unevaluated_population_rejected() {
        let mut rng = CodeRng::new(0);
        let population =
            Population::random(3, 5, &mut rng, NoiseDistribution::Normal).unwrap();
        let mut opt = optimizer(
            OptimizerConfig {
                pop_size: 5,
                ..OptimizerConfig::default()
            },
            1,
        );
        assert!(matches!(
            opt.next_generation(&population),
            Err(PopulationError::NotEvaluated)
        ));
    }

    #[test]
    fn test_selection_weights_sum_to_one() {
        let weights = selection_weights(&[1.0, 2.0, 3.0], 1.0);
        let total: f32 = weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(weights[2] > weights[1] && weights[1] > weights[0]);
    }

    #[test]
    fn test_selection_weights_stable_for_large_scores() {
        let weights = selection_weights(&[1.0e30, 1.0e30 - 1.0e24], 1.0);
        assert!(weights.iter().all(|w| w.is_finite()));
        let total: f32 = weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_temperature_is_uniform() {
        let weights = selection_weights(&[10.0, -3.0, 0.5, 0.5], 0.0);
        assert_eq!(weights, vec![0.25; 4]);
    }

    #[test]
    fn test_sharper_temperature_concentrates_on_best() {
        let soft = selection_weights(&[1.0, 2.0], 10.0);
        let sharp = selection_weights(&[1.0, 2.0], 0.1);
        assert!(sharp[1] > soft[1]);
        assert!(sharp[1] > 0.99);
    }

    proptest! {
        #[test]
        fn prop_generation_size_and_determinism(
            seed in any::<u64>(),
            pop_size in 2usize..24,
            dim in 1usize..12,
        ) {
            let num_parents = pop_size.min(3);
            let config = OptimizerConfig {
                pop_size,
                num_parents,
                ..OptimizerConfig::default()
            };

            let mut rng = CodeRng::new(seed);
            let mut population =
                Population::random(dim, pop_size, &mut rng, NoiseDistribution::Normal).unwrap();
            let fitness: Vec<f32> = (0..pop_size).map(|i| (i as f32).sin()).collect();
            population.set_fitness(&fitness).unwrap();

            let mut a = GeneticOptimizer::new(config.clone(), CodeRng::new(seed)).unwrap();
            let mut b = GeneticOptimizer::new(config, CodeRng::new(seed)).unwrap();

            let next_a = a.next_generation(&population).unwrap();
            let next_b = b.next_generation(&population).unwrap();

            prop_assert_eq!(next_a.len(), pop_size);
            prop_assert!(next_a.iter().all(|code| code.len() == dim));
            prop_assert_eq!(next_a, next_b);
        }
    }
}
