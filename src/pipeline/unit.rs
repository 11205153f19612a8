//! Processing units: discovery, the per-unit parse pipeline, and its
//! isolated result accumulator.
//!
//! A unit's results live in a private [`UnitResult`] until the unit
//! completes; a timed-out unit publishes nothing, so cancellation can
//! never leave partial state visible to other units.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::UnitError;
use crate::pipeline::config::{RunConfig, UnitGranularity};
use crate::query::{build_tree, extract_queries, Query};
use crate::schema::{apply_ddl, resolve_foreign_keys, SchemaDelta, SchemaScope, SoftFailure, Table};
use crate::token::{tokenize_script, SqlStatement, StatementKind};

/// One processing unit: a file or a repository's worth of files.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// Stable identifier, unique within a run.
    pub id: String,
    /// Member files in processing order.
    pub files: Vec<PathBuf>,
}

/// Per-unit failure tallies, kept on the unit result so downstream
/// statistics can reason about them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCounts {
    /// Fragments or files the tokenizer rejected.
    pub tokenize_failed: u64,
    /// Statements skipped for exceeding the size limit.
    pub oversized: u64,
    /// DDL statements rejected as malformed.
    pub schema_statement_failed: u64,
    /// Duplicate CREATE TABLE statements (first definition kept).
    pub duplicate_tables: u64,
    /// ALTER TABLE / CREATE INDEX statements against unknown tables.
    pub unknown_targets: u64,
    /// Query statements with no recognizable root scope.
    pub query_tree_failed: u64,
    /// Join conditions referencing tables absent from the FROM list.
    pub table_check_failed: u64,
    /// Join conditions referencing columns absent from a resolved table.
    pub column_check_failed: u64,
    /// Scopes where all five clause extractors came back empty.
    pub query_check_failed: u64,
}

impl FailureCounts {
    /// Fold another unit's tallies into this one.
    pub fn merge(&mut self, other: &FailureCounts) {
        self.tokenize_failed += other.tokenize_failed;
        self.oversized += other.oversized;
        self.schema_statement_failed += other.schema_statement_failed;
        self.duplicate_tables += other.duplicate_tables;
        self.unknown_targets += other.unknown_targets;
        self.query_tree_failed += other.query_tree_failed;
        self.table_check_failed += other.table_check_failed;
        self.column_check_failed += other.column_check_failed;
        self.query_check_failed += other.query_check_failed;
    }
}

/// Everything one completed unit contributes to the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitResult {
    /// The unit's identifier.
    pub unit_id: String,
    /// Files processed.
    pub files: u64,
    /// Statements seen across those files.
    pub statements: u64,
    /// Tables in definition order, unresolved foreign keys included.
    pub tables: Vec<Table>,
    /// One query per successfully parsed scope, tagged with statement
    /// index and scope id.
    pub queries: Vec<Query>,
    /// Failure tallies for this unit.
    pub failures: FailureCounts,
}

/// Wall-clock budget checked between statements.
///
/// Checks never land mid-entity, so an expired deadline leaves no
/// half-built table or query behind.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    end: Option<Instant>,
}

impl Deadline {
    /// A deadline `budget` from now; `None` never expires.
    pub fn after(budget: Option<Duration>) -> Self {
        Deadline {
            end: budget.map(|d| Instant::now() + d),
        }
    }

    /// An already-expired deadline, for tests.
    pub fn expired_now() -> Self {
        Deadline {
            end: Some(Instant::now()),
        }
    }

    /// True once the budget is spent.
    pub fn expired(&self) -> bool {
        self.end.is_some_and(|end| Instant::now() >= end)
    }
}

/// Enumerate processing units under the configured input directory.
pub fn discover_units(config: &RunConfig) -> std::io::Result<Vec<SourceUnit>> {
    if let Some(target) = &config.target_file {
        return Ok(vec![SourceUnit {
            id: unit_id_for(target, &config.input_dir),
            files: vec![target.clone()],
        }]);
    }

    let mut units = Vec::new();
    match config.granularity {
        UnitGranularity::File => {
            let mut files = Vec::new();
            collect_sql_files(&config.input_dir, &mut files)?;
            files.sort();
            for file in files {
                units.push(SourceUnit {
                    id: unit_id_for(&file, &config.input_dir),
                    files: vec![file],
                });
            }
        }
        UnitGranularity::Repository => {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(&config.input_dir)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .collect();
            entries.sort();
            for entry in entries {
                if entry.is_dir() {
                    let mut files = Vec::new();
                    collect_sql_files(&entry, &mut files)?;
                    files.sort();
                    if !files.is_empty() {
                        units.push(SourceUnit {
                            id: unit_id_for(&entry, &config.input_dir),
                            files,
                        });
                    }
                } else if entry.extension().is_some_and(|e| e == "sql") {
                    units.push(SourceUnit {
                        id: unit_id_for(&entry, &config.input_dir),
                        files: vec![entry],
                    });
                }
            }
        }
    }

    if let Some(percent) = config.sample_percent {
        let step = (100 / percent.clamp(1, 100)).max(1) as usize;
        units = units.into_iter().step_by(step).collect();
    }
    Ok(units)
}

fn collect_sql_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_sql_files(&path, out)?;
        } else if path.extension().is_some_and(|e| e == "sql") {
            out.push(path);
        }
    }
    Ok(())
}

fn unit_id_for(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Parse one unit: DDL stages in order, a foreign-key resolution pass,
/// then query extraction — all against a schema scope private to the
/// unit.
pub fn parse_unit(
    unit: &SourceUnit,
    config: &RunConfig,
    deadline: &Deadline,
) -> Result<UnitResult, UnitError> {
    let mut failures = FailureCounts::default();
    let mut statements: Vec<SqlStatement> = Vec::new();
    let mut files_read = 0u64;

    for file in &unit.files {
        if deadline.expired() {
            return Err(timeout(unit, config));
        }
        let text = match std::fs::read(file) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(file = %file.display(), error = %e, "unreadable file, skipping");
                failures.tokenize_failed += 1;
                continue;
            }
        };
        files_read += 1;
        let script = tokenize_script(&text);
        failures.tokenize_failed += script.unparsed_fragments as u64;
        statements.extend(script.statements);
    }

    if let Some(target) = config.target_statement {
        statements = statements
            .into_iter()
            .enumerate()
            .filter_map(|(i, s)| (i == target).then_some(s))
            .collect();
    }
    let total_statements = statements.len() as u64;

    // Stage order matters: later stages resolve identifiers against the
    // model built by earlier ones.
    let mut scope = SchemaScope::new();
    for kind in [
        StatementKind::CreateTable,
        StatementKind::AlterTable,
        StatementKind::CreateIndex,
    ] {
        for stmt in statements.iter().filter(|s| s.kind == kind) {
            if deadline.expired() {
                return Err(timeout(unit, config));
            }
            match apply_ddl(stmt, &mut scope) {
                Ok(SchemaDelta::Soft(soft)) => match soft {
                    SoftFailure::DuplicateTable(_) => failures.duplicate_tables += 1,
                    SoftFailure::UnknownAlterTarget(_) | SoftFailure::UnknownIndexTarget(_) => {
                        failures.unknown_targets += 1;
                    }
                    SoftFailure::Oversized => failures.oversized += 1,
                },
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "skipping malformed DDL statement");
                    failures.schema_statement_failed += 1;
                }
            }
        }
    }

    let resolved = resolve_foreign_keys(&mut scope);
    if resolved > 0 {
        debug!(unit = %unit.id, resolved, "forward foreign keys resolved");
    }

    let mut queries: Vec<Query> = Vec::new();
    let mut stats = crate::query::ExtractStats::default();
    for (index, stmt) in statements.iter().enumerate() {
        if stmt.kind != StatementKind::Query {
            continue;
        }
        if deadline.expired() {
            return Err(timeout(unit, config));
        }
        if stmt.is_oversized() {
            failures.oversized += 1;
            continue;
        }
        match build_tree(stmt) {
            Ok(tree) => {
                queries.extend(extract_queries(&tree, &scope, index, &mut stats));
            }
            Err(e) => {
                debug!(error = %e, "statement is not a recognizable query");
                failures.query_tree_failed += 1;
            }
        }
    }
    failures.table_check_failed = stats.table_check_failed;
    failures.column_check_failed = stats.column_check_failed;
    failures.query_check_failed = stats.nodes_failed;

    Ok(UnitResult {
        unit_id: unit.id.clone(),
        files: files_read,
        statements: total_statements,
        tables: scope.into_tables(),
        queries,
        failures,
    })
}

fn timeout(unit: &SourceUnit, config: &RunConfig) -> UnitError {
    UnitError::Timeout {
        unit_id: unit.id.clone(),
        budget_secs: config.timeout_secs,
    }
}
