//! Benchmarks for the genetic optimizer step.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use actmax::schema::{NoiseDistribution, OptimizerConfig};
use actmax::search::{CodeRng, GeneticOptimizer, Population};

fn bench_next_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("next_generation");

    for pop_size in [20, 50, 100, 200] {
        let dim = 4096;
        let config = OptimizerConfig {
            pop_size,
            num_parents: 3,
            mutation_rate: 0.3,
            mutation_size: 0.3,
            ..OptimizerConfig::default()
        };

        let mut rng = CodeRng::new(42);
        let mut population =
            Population::random(dim, pop_size, &mut rng, NoiseDistribution::Normal).unwrap();
        let fitness: Vec<f32> = (0..pop_size).map(|i| (i as f32).sin()).collect();
        population.set_fitness(&fitness).unwrap();

        let mut optimizer = GeneticOptimizer::new(config, CodeRng::new(7)).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(pop_size),
            &pop_size,
            |b, _| {
                b.iter(|| {
                    let next = optimizer.next_generation(black_box(&population)).unwrap();
                    black_box(next)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_next_generation);
criterion_main!(benches);
