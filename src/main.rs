//! actmax CLI - Run searches and sweeps from JSON configuration.

use std::fs;
use std::path::PathBuf;

use actmax::pipeline::{JsonSnapshotSink, LogProgress, SnapshotSink};
use actmax::schema::{ExperimentConfig, SearchGrid};
use actmax::search::{Experiment, Harness};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [out_dir]", args[0]);
        eprintln!();
        eprintln!("Run an activation-maximization search from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to run configuration file");
        eprintln!("  out_dir      Directory for snapshots (default: out)");
        eprintln!();
        eprintln!("If <config>.sweep.json exists next to the configuration it is");
        eprintln!("read as a search grid and every expanded run is executed.");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let out_dir = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("out"));

    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: ExperimentConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    let sweep_path = config_path.with_extension("sweep.json");
    if sweep_path.exists() {
        run_sweep(config, &sweep_path, out_dir);
    } else {
        run_single(config, out_dir);
    }
}

fn run_single(config: ExperimentConfig, out_dir: PathBuf) {
    println!("actmax search");
    println!("=============");
    println!("Name: {}", config.name);
    println!(
        "Codes: {} of dim {}",
        config.optimizer.pop_size, config.code_dim
    );
    println!("Generations: {}", config.num_generations);
    println!();

    let mut experiment = Experiment::from_config(config).unwrap_or_else(|e| {
        eprintln!("Error building experiment: {}", e);
        std::process::exit(1);
    });

    let snapshot = experiment
        .run(&mut LogProgress::default())
        .unwrap_or_else(|e| {
            eprintln!("Run failed: {}", e);
            std::process::exit(1);
        });

    println!("Finished ({:?})", snapshot.stop);
    println!("  Generations: {}", snapshot.generations.len());
    println!("  Best fitness: {:.6}", snapshot.best_fitness);
    if let Some(reference) = &snapshot.reference_best
        && let Some(best) = reference.last()
    {
        println!("  Best reference score: {:.6}", best);
    }
    println!("  Time: {:.2}s", snapshot.elapsed_seconds);

    let dest = out_dir.join(format!("{}.json", snapshot.name));
    match JsonSnapshotSink.persist(&snapshot, &dest) {
        Ok(()) => println!("  Snapshot: {}", dest.display()),
        Err(e) => eprintln!("Error writing snapshot: {}", e),
    }
}

fn run_sweep(mut config: ExperimentConfig, sweep_path: &std::path::Path, out_dir: PathBuf) {
    let sweep_str = fs::read_to_string(sweep_path).unwrap_or_else(|e| {
        eprintln!("Error reading sweep file: {}", e);
        std::process::exit(1);
    });
    let grid: SearchGrid = serde_json::from_str(&sweep_str).unwrap_or_else(|e| {
        eprintln!("Error parsing sweep file: {}", e);
        std::process::exit(1);
    });

    let runs = grid.num_runs().unwrap_or_else(|e| {
        eprintln!("Invalid sweep: {}", e);
        std::process::exit(1);
    });

    println!("actmax sweep");
    println!("============");
    println!("Base: {}", config.name);
    println!("Runs: {}", runs);
    println!();

    // The base seed seeds the harness; each run derives its own seed from
    // it and the run index unless an axis sweeps seeds explicitly.
    let seed = config.seed.take().unwrap_or_else(rand::random);
    let mut harness = Harness::new(seed)
        .with_snapshot_sink(Box::new(JsonSnapshotSink), out_dir.clone());

    let summary = harness
        .run_with_observer(&config, &grid, |outcome| {
            let status = if outcome.status.is_finished() {
                "ok"
            } else {
                "FAILED"
            };
            let best = outcome
                .snapshot
                .as_ref()
                .map(|s| format!("{:.4}", s.best_fitness))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  run {:>3}/{}: {status:<6} best {best}  ({:.2}s)",
                outcome.index + 1,
                runs,
                outcome.elapsed_seconds
            );
        })
        .unwrap_or_else(|e| {
            eprintln!("Sweep failed: {}", e);
            std::process::exit(1);
        });

    println!();
    println!(
        "Done: {}/{} runs succeeded in {:.2}s",
        summary.succeeded,
        summary.len(),
        summary.elapsed_seconds
    );
    println!("Snapshots: {}", out_dir.display());

    if summary.succeeded == 0 {
        std::process::exit(1);
    }
}

fn print_example_config() {
    let config = ExperimentConfig::default();

    println!("Example configuration (config.json):");
    println!("{}", serde_json::to_string_pretty(&config).unwrap());
    println!();
    println!("Example sweep (config.sweep.json):");
    let grid = SearchGrid::single(
        "mutation_rate",
        vec![
            serde_json::json!(0.1),
            serde_json::json!(0.3),
            serde_json::json!(0.5),
        ],
    );
    println!("{}", serde_json::to_string_pretty(&grid).unwrap());
}
