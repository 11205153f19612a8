//! Bounded worker pool over processing units.
//!
//! Workers pull units from a shared channel, parse each against its own
//! deadline, and send completed results to the single sink writer on the
//! coordinating thread. There is no ordering guarantee between units; the
//! sink serializes appends.

use crossbeam_channel::unbounded;
use tracing::{info, warn};

use crate::error::UnitError;
use crate::pipeline::config::RunConfig;
use crate::pipeline::sink::BatchSink;
use crate::pipeline::unit::{parse_unit, Deadline, FailureCounts, SourceUnit, UnitResult};

/// Aggregate outcome of one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Units handed to the pool.
    pub units_total: u64,
    /// Units that completed and reached the sink.
    pub units_ok: u64,
    /// Units that failed (timeouts included).
    pub units_failed: u64,
    /// Of the failed units, how many timed out.
    pub timeouts: u64,
    /// Tables contributed by completed units.
    pub tables: u64,
    /// Queries contributed by completed units.
    pub queries: u64,
    /// Failure tallies aggregated over completed units.
    pub failures: FailureCounts,
}

/// Run every unit through the pool, feeding completed results into `sink`.
///
/// A unit that exceeds its budget contributes nothing: its accumulator is
/// dropped with the worker's parse call, and only the failure is recorded
/// here.
pub fn run_units(units: Vec<SourceUnit>, config: &RunConfig, sink: &mut BatchSink) -> RunSummary {
    let mut summary = RunSummary {
        units_total: units.len() as u64,
        ..RunSummary::default()
    };

    let (work_tx, work_rx) = unbounded::<SourceUnit>();
    let (result_tx, result_rx) = unbounded::<Result<UnitResult, UnitError>>();
    for unit in units {
        // unbounded channel; send cannot fail while the receiver lives
        let _ = work_tx.send(unit);
    }
    drop(work_tx);

    let workers = config.workers.max(1);
    std::thread::scope(|scope| {
        for _ in 0..workers {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok(unit) = work_rx.recv() {
                    let deadline = Deadline::after(config.timeout());
                    let result = parse_unit(&unit, config, &deadline);
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        while let Ok(result) = result_rx.recv() {
            match result {
                Ok(unit_result) => {
                    summary.units_ok += 1;
                    summary.tables += unit_result.tables.len() as u64;
                    summary.queries += unit_result.queries.len() as u64;
                    summary.failures.merge(&unit_result.failures);
                    if let Err(e) = sink.submit(unit_result) {
                        warn!(error = %e, "sink write failed");
                    }
                }
                Err(e) => {
                    summary.units_failed += 1;
                    if matches!(e, UnitError::Timeout { .. }) {
                        summary.timeouts += 1;
                    }
                    warn!(error = %e, "unit failed");
                }
            }
        }
    });

    info!(
        total = summary.units_total,
        ok = summary.units_ok,
        failed = summary.units_failed,
        tables = summary.tables,
        queries = summary.queries,
        "run complete"
    );
    summary
}
