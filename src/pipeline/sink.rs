//! Batched checkpoint sink and the final merge pass.
//!
//! Completed units append to one in-memory buffer; every `batch_size`
//! units the buffer is flushed to an append-only `parsed.batch-NNNNNN.json`
//! file. The merge pass concatenates all batches of a run with
//! duplicate-unit detection and writes the consolidated collection
//! without a sequence suffix.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::pipeline::unit::UnitResult;

const BATCH_PREFIX: &str = "parsed.batch-";
const MERGED_NAME: &str = "parsed.json";

/// The single writer all units' results funnel into.
#[derive(Debug)]
pub struct BatchSink {
    dir: PathBuf,
    batch_size: usize,
    seq: u64,
    pending: Vec<UnitResult>,
    written: Vec<PathBuf>,
}

impl BatchSink {
    /// Open a sink writing batches under `dir` (created if missing).
    pub fn new(dir: &Path, batch_size: usize) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(BatchSink {
            dir: dir.to_path_buf(),
            batch_size: batch_size.max(1),
            seq: 0,
            pending: Vec::new(),
            written: Vec::new(),
        })
    }

    /// Append one completed unit; flushes when the buffer fills.
    pub fn submit(&mut self, result: UnitResult) -> io::Result<()> {
        self.pending.push(result);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write the pending buffer as the next batch file, if non-empty.
    pub fn flush(&mut self) -> io::Result<Option<PathBuf>> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        self.seq += 1;
        let path = self.dir.join(format!("{BATCH_PREFIX}{:06}.json", self.seq));
        let body = serde_json::to_vec(&self.pending)?;
        std::fs::write(&path, body)?;
        info!(batch = %path.display(), units = self.pending.len(), "flushed batch");
        self.pending.clear();
        self.written.push(path.clone());
        Ok(Some(path))
    }

    /// Flush the tail and return every batch written by this sink.
    pub fn finish(mut self) -> io::Result<Vec<PathBuf>> {
        self.flush()?;
        Ok(self.written)
    }
}

/// Outcome of a merge pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Path of the consolidated collection.
    pub path: PathBuf,
    /// Units in the consolidated collection.
    pub units: usize,
    /// Duplicate unit results dropped during the merge.
    pub duplicates_dropped: usize,
}

/// Consolidate every batch under `dir` into one collection.
///
/// Batches are read in sequence order and concatenated, keeping the
/// first result for any duplicated unit id. No concurrency is involved.
pub fn merge_batches(dir: &Path) -> io::Result<MergeOutcome> {
    let mut batch_paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(BATCH_PREFIX) && n.ends_with(".json"))
        })
        .collect();
    batch_paths.sort();

    let mut merged: Vec<UnitResult> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut duplicates_dropped = 0usize;
    for path in &batch_paths {
        let body = std::fs::read(path)?;
        let units: Vec<UnitResult> = serde_json::from_slice(&body)?;
        for unit in units {
            if seen.insert(unit.unit_id.clone()) {
                merged.push(unit);
            } else {
                duplicates_dropped += 1;
            }
        }
    }

    let path = dir.join(MERGED_NAME);
    std::fs::write(&path, serde_json::to_vec(&merged)?)?;
    info!(merged = %path.display(), units = merged.len(), duplicates_dropped, "merged batches");
    Ok(MergeOutcome {
        path,
        units: merged.len(),
        duplicates_dropped,
    })
}
