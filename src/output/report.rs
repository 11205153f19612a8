use std::fmt::Write;

use crate::pipeline::RunSummary;

/// Build a markdown report for one run: unit outcomes and failure
/// statistics by kind.
pub fn build_report(summary: &RunSummary) -> String {
    let mut report = String::new();

    writeln!(report, "# sqlsift Run Report").unwrap();
    writeln!(report).unwrap();

    writeln!(report, "## Units").unwrap();
    writeln!(report).unwrap();
    writeln!(report, "| Outcome | Count |").unwrap();
    writeln!(report, "|---------|-------|").unwrap();
    writeln!(report, "| total | {} |", summary.units_total).unwrap();
    writeln!(report, "| completed | {} |", summary.units_ok).unwrap();
    writeln!(report, "| failed | {} |", summary.units_failed).unwrap();
    writeln!(report, "| timed out | {} |", summary.timeouts).unwrap();
    writeln!(report).unwrap();
    writeln!(report, "Tables extracted: {}", summary.tables).unwrap();
    writeln!(report, "Queries extracted: {}", summary.queries).unwrap();
    writeln!(report).unwrap();

    let f = &summary.failures;
    writeln!(report, "## Failures by kind").unwrap();
    writeln!(report).unwrap();
    writeln!(report, "| Kind | Count |").unwrap();
    writeln!(report, "|------|-------|").unwrap();
    writeln!(report, "| tokenize | {} |", f.tokenize_failed).unwrap();
    writeln!(report, "| oversized statement | {} |", f.oversized).unwrap();
    writeln!(report, "| malformed ddl | {} |", f.schema_statement_failed).unwrap();
    writeln!(report, "| duplicate table | {} |", f.duplicate_tables).unwrap();
    writeln!(report, "| unknown alter/index target | {} |", f.unknown_targets).unwrap();
    writeln!(report, "| query tree | {} |", f.query_tree_failed).unwrap();
    writeln!(report, "| table check | {} |", f.table_check_failed).unwrap();
    writeln!(report, "| column check | {} |", f.column_check_failed).unwrap();
    writeln!(report, "| query check | {} |", f.query_check_failed).unwrap();

    report
}

/// Write the run report next to the run's batches.
pub fn write_report(dir: &std::path::Path, summary: &RunSummary) -> std::io::Result<()> {
    std::fs::write(dir.join("report.md"), build_report(summary))
}
