//! Rendering of parsed results: training text and the run report.

/// Markdown run report with per-kind failure statistics.
pub mod report;
/// Language-modeling CSV lines for parsed tables.
pub mod training;
