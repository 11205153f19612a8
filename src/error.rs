//! Error taxonomy for the parsing core.
//!
//! Everything here is local-recoverable: a failed statement is skipped and
//! the enclosing file or unit keeps going. Only [`UnitError`] aborts a
//! processing unit, and never the overall run. Unresolved references and
//! clause-extraction misses are *states* on the entities, not errors.

use thiserror::Error;

/// The external tokenizer could not produce a token stream.
#[derive(Error, Debug)]
pub enum TokenizeError {
    /// The upstream tokenizer rejected the text outright.
    #[error("tokenizer error at line {line}, column {column}: {message}")]
    Upstream {
        /// Human-readable tokenizer message.
        message: String,
        /// 1-based line of the failure.
        line: u64,
        /// 1-based column of the failure.
        column: u64,
    },
}

/// Malformed DDL that the schema builder refuses to interpret.
///
/// The offending statement is skipped; the table model is unaffected
/// beyond it.
#[derive(Error, Debug)]
pub enum SchemaParseError {
    /// CREATE/ALTER TABLE without a recognizable table name.
    #[error("missing table name in {statement_kind} statement")]
    MissingTableName {
        /// Which DDL form was being parsed.
        statement_kind: &'static str,
    },

    /// CREATE TABLE without a parseable parenthesized column list.
    #[error("unparseable column list for table `{table}`")]
    UnparseableColumnList {
        /// Table the statement tried to define.
        table: String,
    },

    /// A constraint clause whose required parts could not be matched.
    #[error("malformed {constraint} clause on table `{table}`")]
    MalformedConstraint {
        /// Constraint kind, e.g. "FOREIGN KEY".
        constraint: &'static str,
        /// Table the clause belongs to.
        table: String,
    },

    /// CREATE INDEX without a target table or column list.
    #[error("malformed CREATE INDEX statement")]
    MalformedIndex,
}

/// The query-tree builder could not recognize the statement as a query.
#[derive(Error, Debug)]
pub enum QueryTreeError {
    /// No SELECT keyword anywhere in the statement.
    #[error("no SELECT scope found in statement")]
    NoRootSelect,

    /// The statement is empty after tokenization.
    #[error("empty statement")]
    EmptyStatement,
}

/// A processing unit failed as a whole.
#[derive(Error, Debug)]
pub enum UnitError {
    /// The unit exceeded its wall-clock budget. Its partial results are
    /// discarded; other units are unaffected.
    #[error("unit `{unit_id}` exceeded its {budget_secs}s time budget")]
    Timeout {
        /// Identifier of the timed-out unit.
        unit_id: String,
        /// The configured budget, in seconds.
        budget_secs: u64,
    },

    /// An I/O failure reading one of the unit's files.
    #[error("unit `{unit_id}`: {source}")]
    Io {
        /// Identifier of the failed unit.
        unit_id: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
