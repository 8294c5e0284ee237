//! Progress reporting and snapshot persistence.
//!
//! Sinks are injected at construction rather than reached through globals;
//! the caller owns their lifecycle. A sink failure is logged by the caller
//! and never changes the run's status.

use std::fs;
use std::io::Write;
use std::path::Path;

use log::info;

use crate::schema::RunSnapshot;

/// Per-generation progress report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Generation just evaluated, starting at 0.
    pub generation: usize,
    /// Configured generation budget.
    pub total: usize,
    /// Best fitness seen so far across the whole run.
    pub best: f32,
    /// Mean fitness of the current generation.
    pub mean: f32,
}

/// Receives one report per generation. Implementations must tolerate being
/// a no-op.
pub trait ProgressSink {
    fn report(&mut self, progress: &Progress) -> Result<(), SinkError>;
}

/// Discards every report.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&mut self, _progress: &Progress) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Logs every n-th generation plus the last one.
pub struct LogProgress {
    pub every: usize,
}

impl Default for LogProgress {
    fn default() -> Self {
        Self { every: 10 }
    }
}

impl ProgressSink for LogProgress {
    fn report(&mut self, progress: &Progress) -> Result<(), SinkError> {
        let every = self.every.max(1);
        let generation = progress.generation + 1;
        if generation % every == 0 || generation == progress.total {
            info!(
                "generation {}/{} | best {:.4} | mean {:.4}",
                generation, progress.total, progress.best, progress.mean
            );
        }
        Ok(())
    }
}

/// Accepts finished-run snapshots together with a target location.
pub trait SnapshotSink {
    fn persist(&mut self, snapshot: &RunSnapshot, dest: &Path) -> Result<(), SinkError>;
}

/// Writes snapshots as pretty-printed JSON files.
pub struct JsonSnapshotSink;

impl SnapshotSink for JsonSnapshotSink {
    fn persist(&mut self, snapshot: &RunSnapshot, dest: &Path) -> Result<(), SinkError> {
        if let Some(parent) = dest.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(dest)?;
        serde_json::to_writer_pretty(&mut file, snapshot)?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ExperimentConfig, GenerationRecord, StopReason};

    fn snapshot() -> RunSnapshot {
        RunSnapshot {
            name: "sink".to_string(),
            config: ExperimentConfig::default(),
            generations: vec![GenerationRecord { best: 1.0, mean: 0.5 }],
            best_code: vec![0.1, 0.2],
            best_fitness: 1.0,
            reference_best: None,
            stop: StopReason::GenerationBudget,
            elapsed_seconds: 0.1,
        }
    }

    #[test]
    fn test_json_sink_writes_readable_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("runs").join("sink_000.json");

        JsonSnapshotSink.persist(&snapshot(), &dest).unwrap();

        let text = std::fs::read_to_string(&dest).unwrap();
        let back: RunSnapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(back.name, "sink");
        assert_eq!(back.generations.len(), 1);
    }

    #[test]
    fn test_progress_sinks_accept_reports() {
        let progress = Progress {
            generation: 9,
            total: 10,
            best: 2.0,
            mean: 1.0,
        };
        assert!(NullProgress.report(&progress).is_ok());
        assert!(LogProgress::default().report(&progress).is_ok());
    }
}
