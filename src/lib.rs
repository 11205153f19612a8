//! Mine table schemas and query structure from raw SQL corpora.
#![warn(missing_docs)]

/// Error taxonomy shared by the parsing core.
pub mod error;
/// Rendering of parsed results: training text and run reports.
pub mod output;
/// Run orchestration: units, worker pool, and the batched sink.
pub mod pipeline;
/// Query-tree construction and the five clause extractors.
pub mod query;
/// Schema entities and the DDL interpreter.
pub mod schema;
/// Narrow typed facade over the external tokenizer.
pub mod token;
