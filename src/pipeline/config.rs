//! Explicit run configuration.
//!
//! Everything that used to be a toggled constant — sample size, debug
//! targets, timeout, batch size — is a field here, passed into the
//! orchestrator by the caller.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// The granularity at which parallelism and timeouts apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitGranularity {
    /// One unit per `.sql` file.
    File,
    /// One unit per first-level subdirectory (a crawled repository),
    /// with loose root files as single-file units.
    Repository,
}

/// Configuration for one parse run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Directory holding the crawled `.sql` corpus.
    pub input_dir: PathBuf,
    /// Directory that receives batches, the merged collection, and
    /// reports.
    pub output_dir: PathBuf,
    /// Processing-unit granularity.
    pub granularity: UnitGranularity,
    /// Keep roughly this percentage of units (1-100); `None` runs the
    /// full corpus.
    pub sample_percent: Option<u32>,
    /// Debug: process only this file.
    pub target_file: Option<PathBuf>,
    /// Debug: process only the statement with this unit-wide index.
    pub target_statement: Option<usize>,
    /// Per-unit wall-clock budget, in seconds. Zero disables the budget.
    pub timeout_secs: u64,
    /// Completed units per persisted batch.
    pub batch_size: usize,
    /// Worker threads in the pool.
    pub workers: usize,
}

impl RunConfig {
    /// A config with defaults suitable for interactive runs.
    pub fn new(input_dir: PathBuf, output_dir: PathBuf) -> Self {
        let workers = std::thread::available_parallelism().map_or(4, |n| n.get());
        RunConfig {
            input_dir,
            output_dir,
            granularity: UnitGranularity::File,
            sample_percent: None,
            target_file: None,
            target_statement: None,
            timeout_secs: 120,
            batch_size: 64,
            workers,
        }
    }

    /// The per-unit budget as a `Duration`; `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}
