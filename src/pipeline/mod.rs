//! Run orchestration: configuration, processing units, the bounded worker
//! pool, and the batched checkpoint sink.

mod config;
mod pool;
mod sink;
mod unit;

pub use config::{RunConfig, UnitGranularity};
pub use pool::{run_units, RunSummary};
pub use sink::{merge_batches, BatchSink, MergeOutcome};
pub use unit::{discover_units, parse_unit, Deadline, FailureCounts, SourceUnit, UnitResult};
