//! DDL interpreter: CREATE TABLE, ALTER TABLE, and CREATE INDEX statements
//! applied to a [`SchemaScope`].
//!
//! Crawled DDL is messy — the builder is permissive about vendor noise
//! (COMMENT, ENGINE, CHECK, DATA_COMPRESSION) and strict only where
//! inventing structure would corrupt the model: a malformed constraint or a
//! missing table name skips the whole statement via [`SchemaParseError`].

use sqlparser::tokenizer::Token;
use tracing::debug;

use crate::error::SchemaParseError;
use crate::schema::model::{
    Column, ForeignKey, Index, Key, KeyKind, Resolution, SchemaScope, Table, TypeCategory,
};
use crate::token::names::{normalize_identifier, normalize_relation_name};
use crate::token::{is_kw, kw, read_name_chain, word_value, Keyword, SqlStatement, StatementKind};

/// What a successfully interpreted DDL statement did to the scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaDelta {
    /// A new table was defined.
    Created(String),
    /// An existing table was mutated in place.
    Altered(String),
    /// An index was added to the named table.
    Indexed(String),
    /// The statement was understood but could not be applied; the scope is
    /// unchanged. A recorded, non-error outcome.
    Soft(SoftFailure),
    /// The statement was not DDL; nothing happened.
    Skipped,
}

/// Non-fatal outcomes the schema builder records instead of erroring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftFailure {
    /// CREATE TABLE for a name that already exists; the first definition
    /// is kept.
    DuplicateTable(String),
    /// ALTER TABLE against a table never seen in this unit.
    UnknownAlterTarget(String),
    /// CREATE INDEX against a table never seen in this unit.
    UnknownIndexTarget(String),
    /// Statement exceeded the processing size limit.
    Oversized,
}

/// Apply one DDL statement to the scope.
///
/// Malformed DDL yields `Err`; the caller skips the statement and
/// continues. Duplicate tables and unknown ALTER/INDEX targets are soft
/// failures inside `Ok`.
pub fn apply_ddl(
    stmt: &SqlStatement,
    scope: &mut SchemaScope,
) -> Result<SchemaDelta, SchemaParseError> {
    if stmt.is_oversized() {
        return Ok(SchemaDelta::Soft(SoftFailure::Oversized));
    }
    match stmt.kind {
        StatementKind::CreateTable => apply_create_table(&stmt.tokens, scope),
        StatementKind::AlterTable => apply_alter_table(&stmt.tokens, scope),
        StatementKind::CreateIndex => apply_create_index(&stmt.tokens, scope),
        _ => Ok(SchemaDelta::Skipped),
    }
}

/// Second pass over a unit's completed scope: try to resolve foreign keys
/// whose targets appeared after them. Returns how many were resolved.
///
/// Cross-unit references are never attempted; what stays unresolved here
/// stays unresolved.
pub fn resolve_foreign_keys(scope: &mut SchemaScope) -> usize {
    let mut newly_resolved: Vec<(String, usize)> = Vec::new();
    for table in scope.iter() {
        for (i, fk) in table.foreign_keys.iter().enumerate() {
            if fk.resolution == Resolution::Unresolved
                && reference_resolution(scope, None, &fk.ref_table, &fk.ref_columns)
                    == Resolution::Resolved
            {
                newly_resolved.push((table.name.clone(), i));
            }
        }
    }
    let count = newly_resolved.len();
    for (table_name, fk_idx) in newly_resolved {
        if let Some(table) = scope.get_mut(&table_name) {
            table.foreign_keys[fk_idx].resolution = Resolution::Resolved;
        }
    }
    count
}

// === CREATE TABLE ===

fn apply_create_table(
    tokens: &[Token],
    scope: &mut SchemaScope,
) -> Result<SchemaDelta, SchemaParseError> {
    let table_kw = tokens
        .iter()
        .position(|t| is_kw(t, Keyword::TABLE))
        .ok_or(SchemaParseError::MissingTableName {
            statement_kind: "CREATE TABLE",
        })?;
    let mut i = table_kw + 1;
    while matches!(
        tokens.get(i).map(kw),
        Some(Keyword::IF | Keyword::NOT | Keyword::EXISTS)
    ) {
        i += 1;
    }
    let (raw_name, after_name) =
        read_name_chain(tokens, i).ok_or(SchemaParseError::MissingTableName {
            statement_kind: "CREATE TABLE",
        })?;
    let name = normalize_relation_name(&raw_name);

    let (lp, rp) =
        paren_group(tokens, after_name).ok_or(SchemaParseError::UnparseableColumnList {
            table: name.clone(),
        })?;

    let mut table = Table::new(name.clone());
    for (cs, ce) in split_top_commas(tokens, lp + 1, rp) {
        let clause = &tokens[cs..ce];
        if clause.is_empty() {
            continue;
        }
        apply_table_clause(clause, &mut table, scope)?;
    }

    // Key membership implies NOT NULL + UNIQUE on the member columns.
    let primary_cols: Vec<String> = table
        .keys
        .iter()
        .filter(|k| k.kind == KeyKind::Primary)
        .flat_map(|k| k.columns.iter().cloned())
        .collect();
    table.mark_primary(&primary_cols);

    if scope.insert(table) {
        Ok(SchemaDelta::Created(name))
    } else {
        debug!(table = %name, "duplicate CREATE TABLE, keeping first definition");
        Ok(SchemaDelta::Soft(SoftFailure::DuplicateTable(name)))
    }
}

fn apply_table_clause(
    clause: &[Token],
    table: &mut Table,
    scope: &SchemaScope,
) -> Result<(), SchemaParseError> {
    match kw(&clause[0]) {
        Keyword::CONSTRAINT => {
            let (constraint_name, rest) = match read_name_chain(clause, 1) {
                Some((n, next)) => (Some(normalize_identifier(&n)), next),
                None => (None, 1),
            };
            apply_named_constraint(clause, rest, constraint_name, table, scope)
        }
        Keyword::PRIMARY => {
            let columns = name_list_in_parens(clause, 1).ok_or_else(|| {
                SchemaParseError::MalformedConstraint {
                    constraint: "PRIMARY KEY",
                    table: table.name.clone(),
                }
            })?;
            table.keys.push(Key {
                kind: KeyKind::Primary,
                columns,
                name: None,
            });
            Ok(())
        }
        Keyword::FOREIGN => apply_foreign_key_clause(clause, 1, None, table, scope),
        Keyword::UNIQUE => apply_unique_clause(clause, 1, None, table),
        Keyword::KEY => {
            // KEY `name` (cols) — MySQL candidate key. A column named `key`
            // lands here too, so fall back to a column definition when no
            // paren list follows.
            match name_list_in_parens(clause, 1) {
                Some(columns) => {
                    table.keys.push(Key {
                        kind: KeyKind::Candidate,
                        columns,
                        name: clause_leading_name(clause, 1),
                    });
                    Ok(())
                }
                None => {
                    if let Some(parsed) = parse_column_def(clause) {
                        push_parsed_column(parsed, table, scope);
                        Ok(())
                    } else {
                        Err(SchemaParseError::MalformedConstraint {
                            constraint: "KEY",
                            table: table.name.clone(),
                        })
                    }
                }
            }
        }
        Keyword::INDEX => match name_list_in_parens(clause, 1) {
            Some(columns) => {
                table.indices.push(Index {
                    name: clause_leading_name(clause, 1),
                    columns,
                    unique: false,
                });
                Ok(())
            }
            None => {
                if let Some(parsed) = parse_column_def(clause) {
                    push_parsed_column(parsed, table, scope);
                    Ok(())
                } else {
                    Err(SchemaParseError::MalformedConstraint {
                        constraint: "INDEX",
                        table: table.name.clone(),
                    })
                }
            }
        },
        Keyword::CHECK | Keyword::COMMENT => Ok(()),
        _ => {
            if let Some(parsed) = parse_column_def(clause) {
                push_parsed_column(parsed, table, scope);
            } else {
                debug!(clause = %crate::token::joined_text(clause), "skipping unrecognized clause");
            }
            Ok(())
        }
    }
}

fn apply_named_constraint(
    clause: &[Token],
    at: usize,
    constraint_name: Option<String>,
    table: &mut Table,
    scope: &SchemaScope,
) -> Result<(), SchemaParseError> {
    match clause.get(at).map(kw) {
        Some(Keyword::PRIMARY) => {
            let columns = name_list_in_parens(clause, at).ok_or_else(|| {
                SchemaParseError::MalformedConstraint {
                    constraint: "CONSTRAINT PRIMARY KEY",
                    table: table.name.clone(),
                }
            })?;
            table.keys.push(Key {
                kind: KeyKind::Primary,
                columns,
                name: constraint_name,
            });
            Ok(())
        }
        Some(Keyword::FOREIGN) => {
            apply_foreign_key_clause(clause, at + 1, constraint_name, table, scope)
        }
        Some(Keyword::UNIQUE) => apply_unique_clause(clause, at + 1, constraint_name, table),
        Some(Keyword::CHECK) => Ok(()),
        _ => {
            debug!(clause = %crate::token::joined_text(clause), "unknown constraint kind");
            Ok(())
        }
    }
}

/// `... [KEY] (cols) REFERENCES t (cols)` with `at` pointing just past the
/// FOREIGN keyword.
fn apply_foreign_key_clause(
    clause: &[Token],
    at: usize,
    constraint_name: Option<String>,
    table: &mut Table,
    scope: &SchemaScope,
) -> Result<(), SchemaParseError> {
    let columns = name_list_in_parens(clause, at).ok_or_else(|| {
        SchemaParseError::MalformedConstraint {
            constraint: "FOREIGN KEY",
            table: table.name.clone(),
        }
    })?;
    let (ref_table, ref_columns) = parse_references(clause, at).ok_or_else(|| {
        SchemaParseError::MalformedConstraint {
            constraint: "FOREIGN KEY",
            table: table.name.clone(),
        }
    })?;
    let resolution = reference_resolution(scope, Some(table), &ref_table, &ref_columns);
    table.foreign_keys.push(ForeignKey {
        columns,
        ref_table,
        ref_columns,
        resolution,
        name: constraint_name,
    });
    Ok(())
}

/// `UNIQUE [KEY|INDEX] [name] (cols)` with `at` just past UNIQUE.
fn apply_unique_clause(
    clause: &[Token],
    at: usize,
    constraint_name: Option<String>,
    table: &mut Table,
) -> Result<(), SchemaParseError> {
    let mut i = at;
    let as_index = matches!(clause.get(i).map(kw), Some(Keyword::INDEX));
    if matches!(clause.get(i).map(kw), Some(Keyword::KEY | Keyword::INDEX)) {
        i += 1;
    }
    let name = constraint_name.or_else(|| clause_leading_name(clause, i));
    let columns =
        name_list_in_parens(clause, i).ok_or_else(|| SchemaParseError::MalformedConstraint {
            constraint: "UNIQUE",
            table: table.name.clone(),
        })?;
    for column in &columns {
        if let Some(c) = table.column_mut(column) {
            c.unique = true;
        }
    }
    if as_index {
        table.indices.push(Index {
            name,
            columns,
            unique: true,
        });
    } else {
        table.keys.push(Key {
            kind: KeyKind::Unique,
            columns,
            name,
        });
    }
    Ok(())
}

// === ALTER TABLE ===

fn apply_alter_table(
    tokens: &[Token],
    scope: &mut SchemaScope,
) -> Result<SchemaDelta, SchemaParseError> {
    let table_kw = tokens
        .iter()
        .position(|t| is_kw(t, Keyword::TABLE))
        .ok_or(SchemaParseError::MissingTableName {
            statement_kind: "ALTER TABLE",
        })?;
    let mut i = table_kw + 1;
    if matches!(tokens.get(i).map(kw), Some(Keyword::ONLY)) {
        i += 1;
    }
    if matches!(tokens.get(i).map(kw), Some(Keyword::IF)) {
        // ALTER TABLE IF EXISTS t
        while matches!(tokens.get(i).map(kw), Some(Keyword::IF | Keyword::EXISTS)) {
            i += 1;
        }
    }
    let (raw_name, after_name) =
        read_name_chain(tokens, i).ok_or(SchemaParseError::MissingTableName {
            statement_kind: "ALTER TABLE",
        })?;
    let name = normalize_relation_name(&raw_name);

    // Mutate a copy so a failed action never leaves a half-altered table,
    // and so FK resolution can consult the scope while we hold the table.
    let Some(mut table) = scope.resolve(&raw_name).or_else(|| scope.get(&name)).cloned() else {
        debug!(table = %name, "ALTER TABLE target not seen in this unit");
        return Ok(SchemaDelta::Soft(SoftFailure::UnknownAlterTarget(name)));
    };

    for (cs, ce) in split_top_commas(tokens, after_name, tokens.len()) {
        let action = &tokens[cs..ce];
        if action.is_empty() {
            continue;
        }
        apply_alter_action(action, &mut table, scope)?;
    }

    let key = table.name.clone();
    if let Some(slot) = scope.get_mut(&key) {
        *slot = table;
    }
    Ok(SchemaDelta::Altered(key))
}

fn apply_alter_action(
    action: &[Token],
    table: &mut Table,
    scope: &SchemaScope,
) -> Result<(), SchemaParseError> {
    match kw(&action[0]) {
        Keyword::ADD => {
            let mut i = 1;
            match action.get(i).map(kw) {
                Some(Keyword::COLUMN) => {
                    i += 1;
                    if matches!(action.get(i).map(kw), Some(Keyword::IF)) {
                        while matches!(action.get(i).map(kw), Some(Keyword::IF | Keyword::NOT | Keyword::EXISTS))
                        {
                            i += 1;
                        }
                    }
                    if let Some(parsed) = parse_column_def(&action[i..]) {
                        push_parsed_column(parsed, table, scope);
                    }
                    Ok(())
                }
                Some(Keyword::CONSTRAINT) => {
                    let (constraint_name, rest) = match read_name_chain(action, i + 1) {
                        Some((n, next)) => (Some(normalize_identifier(&n)), next),
                        None => (None, i + 1),
                    };
                    apply_named_constraint(action, rest, constraint_name, table, scope)
                }
                Some(Keyword::PRIMARY) => {
                    let columns = name_list_in_parens(action, i).ok_or_else(|| {
                        SchemaParseError::MalformedConstraint {
                            constraint: "ADD PRIMARY KEY",
                            table: table.name.clone(),
                        }
                    })?;
                    table.mark_primary(&columns);
                    table.keys.push(Key {
                        kind: KeyKind::Primary,
                        columns,
                        name: None,
                    });
                    Ok(())
                }
                Some(Keyword::FOREIGN) => {
                    apply_foreign_key_clause(action, i + 1, None, table, scope)
                }
                Some(Keyword::UNIQUE) => apply_unique_clause(action, i + 1, None, table),
                Some(Keyword::KEY) => {
                    let columns = name_list_in_parens(action, i + 1).ok_or_else(|| {
                        SchemaParseError::MalformedConstraint {
                            constraint: "ADD KEY",
                            table: table.name.clone(),
                        }
                    })?;
                    table.keys.push(Key {
                        kind: KeyKind::Candidate,
                        columns,
                        name: clause_leading_name(action, i + 1),
                    });
                    Ok(())
                }
                Some(Keyword::INDEX) => {
                    let columns = name_list_in_parens(action, i + 1).ok_or_else(|| {
                        SchemaParseError::MalformedConstraint {
                            constraint: "ADD INDEX",
                            table: table.name.clone(),
                        }
                    })?;
                    table.indices.push(Index {
                        name: clause_leading_name(action, i + 1),
                        columns,
                        unique: false,
                    });
                    Ok(())
                }
                // Bare `ADD <col def>` — COLUMN is optional in most dialects.
                _ => {
                    if let Some(parsed) = parse_column_def(&action[i..]) {
                        push_parsed_column(parsed, table, scope);
                    }
                    Ok(())
                }
            }
        }
        Keyword::DROP => apply_drop_action(action, table),
        Keyword::MODIFY => {
            let mut i = 1;
            if matches!(action.get(i).map(kw), Some(Keyword::COLUMN)) {
                i += 1;
            }
            modify_column(&action[i..], table);
            Ok(())
        }
        Keyword::ALTER => {
            // ALTER [COLUMN] name SET DEFAULT ... | DROP DEFAULT |
            //                     SET NOT NULL | DROP NOT NULL | TYPE t
            let mut i = 1;
            if matches!(action.get(i).map(kw), Some(Keyword::COLUMN)) {
                i += 1;
            }
            alter_column(&action[i..], table);
            Ok(())
        }
        _ => {
            debug!(action = %crate::token::joined_text(action), "unhandled ALTER TABLE action");
            Ok(())
        }
    }
}

fn apply_drop_action(action: &[Token], table: &mut Table) -> Result<(), SchemaParseError> {
    let mut i = 1;
    match action.get(i).map(kw) {
        Some(Keyword::COLUMN) => {
            i += 1;
            if matches!(action.get(i).map(kw), Some(Keyword::IF)) {
                while matches!(action.get(i).map(kw), Some(Keyword::IF | Keyword::EXISTS)) {
                    i += 1;
                }
            }
            if let Some((raw, _)) = read_name_chain(action, i) {
                table.drop_column(&normalize_identifier(&raw));
            }
            Ok(())
        }
        Some(Keyword::CONSTRAINT) => {
            if let Some((raw, _)) = read_name_chain(action, i + 1) {
                let name = normalize_identifier(&raw);
                table.keys.retain(|k| k.name.as_deref() != Some(&name));
                table
                    .foreign_keys
                    .retain(|fk| fk.name.as_deref() != Some(&name));
                table
                    .indices
                    .retain(|ix| ix.name.as_deref() != Some(&name));
            }
            Ok(())
        }
        Some(Keyword::PRIMARY) => {
            table.keys.retain(|k| k.kind != KeyKind::Primary);
            Ok(())
        }
        Some(Keyword::FOREIGN) => {
            // DROP FOREIGN KEY name (MySQL)
            if let Some((raw, _)) = read_name_chain(action, i + 2) {
                let name = normalize_identifier(&raw);
                table
                    .foreign_keys
                    .retain(|fk| fk.name.as_deref() != Some(&name));
            }
            Ok(())
        }
        Some(Keyword::KEY | Keyword::INDEX) => {
            if let Some((raw, _)) = read_name_chain(action, i + 1) {
                let name = normalize_identifier(&raw);
                table
                    .indices
                    .retain(|ix| ix.name.as_deref() != Some(&name));
                table.keys.retain(|k| k.name.as_deref() != Some(&name));
            }
            Ok(())
        }
        // Bare `DROP name` — treat as a column drop.
        _ => {
            if let Some((raw, _)) = read_name_chain(action, i) {
                table.drop_column(&normalize_identifier(&raw));
            }
            Ok(())
        }
    }
}

/// MODIFY COLUMN: replace type/nullability/default, keep the ordinal.
fn modify_column(def: &[Token], table: &mut Table) {
    let Some(parsed) = parse_column_def(def) else {
        return;
    };
    let Some(existing) = table.column_mut(&parsed.column.name) else {
        debug!(column = %parsed.column.name, "MODIFY COLUMN target missing, ignoring");
        return;
    };
    existing.declared_type = parsed.column.declared_type;
    existing.category = parsed.column.category;
    existing.nullable = parsed.column.nullable;
    existing.default = parsed.column.default;
    if parsed.column.unique {
        existing.unique = true;
    }
}

/// Postgres-style ALTER COLUMN sub-actions.
fn alter_column(def: &[Token], table: &mut Table) {
    let Some((raw, mut i)) = read_name_chain(def, 0) else {
        return;
    };
    let name = normalize_identifier(&raw);
    let Some(column) = table.column_mut(&name) else {
        return;
    };
    match def.get(i).map(kw) {
        Some(Keyword::SET) => {
            i += 1;
            match def.get(i).map(kw) {
                Some(Keyword::DEFAULT) => {
                    column.default = Some(crate::token::joined_text(&def[i + 1..]));
                }
                Some(Keyword::NOT) => column.nullable = false,
                Some(Keyword::DATA) | Some(Keyword::TYPE) => {
                    if matches!(def.get(i).map(kw), Some(Keyword::DATA)) {
                        i += 1;
                    }
                    set_column_type(column, &def[i + 1..]);
                }
                _ => {}
            }
        }
        Some(Keyword::DROP) => match def.get(i + 1).map(kw) {
            Some(Keyword::DEFAULT) => column.default = None,
            Some(Keyword::NOT) => column.nullable = true,
            _ => {}
        },
        Some(Keyword::TYPE) => set_column_type(column, &def[i + 1..]),
        // MySQL permits `ALTER TABLE t ALTER name <type>`.
        _ => set_column_type(column, &def[i..]),
    }
}

fn set_column_type(column: &mut Column, type_tokens: &[Token]) {
    if let Some((declared, _)) = read_declared_type(type_tokens, 0) {
        column.category = TypeCategory::of(&declared);
        column.declared_type = declared;
    }
}

// === CREATE INDEX ===

fn apply_create_index(
    tokens: &[Token],
    scope: &mut SchemaScope,
) -> Result<SchemaDelta, SchemaParseError> {
    let unique = tokens.iter().any(|t| is_kw(t, Keyword::UNIQUE));
    let index_kw = tokens
        .iter()
        .position(|t| is_kw(t, Keyword::INDEX))
        .ok_or(SchemaParseError::MalformedIndex)?;
    let mut i = index_kw + 1;
    while matches!(
        tokens.get(i).map(kw),
        Some(Keyword::IF | Keyword::NOT | Keyword::EXISTS)
    ) {
        i += 1;
    }
    let index_name = read_name_chain(tokens, i).map(|(n, _)| normalize_identifier(&n));

    let on_pos = tokens
        .iter()
        .position(|t| is_kw(t, Keyword::ON))
        .ok_or(SchemaParseError::MalformedIndex)?;
    let (raw_table, mut after_table) =
        read_name_chain(tokens, on_pos + 1).ok_or(SchemaParseError::MalformedIndex)?;
    if matches!(tokens.get(after_table).map(kw), Some(Keyword::USING)) {
        after_table += 2;
    }
    let columns =
        name_list_in_parens(tokens, after_table).ok_or(SchemaParseError::MalformedIndex)?;

    let resolved = scope.resolve(&raw_table).map(|t| t.name.clone());
    let Some(table) = resolved.and_then(|n| scope.get_mut(&n)) else {
        let name = normalize_relation_name(&raw_table);
        debug!(table = %name, "CREATE INDEX target not seen in this unit");
        return Ok(SchemaDelta::Soft(SoftFailure::UnknownIndexTarget(name)));
    };
    if unique {
        for column in &columns {
            if let Some(c) = table.column_mut(column) {
                c.unique = true;
            }
        }
    }
    table.indices.push(Index {
        name: index_name,
        columns,
        unique,
    });
    Ok(SchemaDelta::Indexed(table.name.clone()))
}

// === column definitions ===

struct ParsedColumn {
    column: Column,
    primary: bool,
    references: Option<(String, Vec<String>)>,
}

fn push_parsed_column(parsed: ParsedColumn, table: &mut Table, scope: &SchemaScope) {
    let name = parsed.column.name.clone();
    table.push_column(parsed.column);
    if parsed.primary {
        table.keys.push(Key {
            kind: KeyKind::Primary,
            columns: vec![name.clone()],
            name: None,
        });
        table.mark_primary(&[name.clone()]);
    }
    if let Some((ref_table, ref_columns)) = parsed.references {
        let resolution = reference_resolution(scope, Some(table), &ref_table, &ref_columns);
        table.foreign_keys.push(ForeignKey {
            columns: vec![name],
            ref_table,
            ref_columns,
            resolution,
            name: None,
        });
    }
}

/// Parse `name type [size] [column options...]`.
///
/// Returns `None` when the clause does not look like a column definition —
/// in particular when the type is unrecognized, which is the gate that
/// keeps stray clauses out of the model.
fn parse_column_def(clause: &[Token]) -> Option<ParsedColumn> {
    if clause.len() < 2 {
        return None;
    }
    let (raw_name, type_at) = read_name_chain(clause, 0)?;
    let name = normalize_relation_name(&raw_name);
    let (declared_type, mut i) = read_declared_type(clause, type_at)?;
    if !TypeCategory::is_recognized(&declared_type) {
        debug!(column = %name, declared = %declared_type, "unrecognized column type");
        return None;
    }

    let mut column = Column::new(name, declared_type);
    let mut primary = false;
    let mut references = None;

    while i < clause.len() {
        match kw(&clause[i]) {
            Keyword::NOT if matches!(clause.get(i + 1).map(kw), Some(Keyword::NULL)) => {
                column.nullable = false;
                i += 2;
            }
            Keyword::NULL => i += 1,
            Keyword::UNIQUE => {
                column.unique = true;
                i += 1;
            }
            Keyword::PRIMARY => {
                primary = true;
                column.nullable = false;
                column.unique = true;
                i += if matches!(clause.get(i + 1).map(kw), Some(Keyword::KEY)) {
                    2
                } else {
                    1
                };
            }
            Keyword::DEFAULT => {
                let (text, next) = read_default_expr(clause, i + 1);
                column.default = Some(text);
                i = next;
            }
            Keyword::REFERENCES => {
                let (raw_table, mut next) = read_name_chain(clause, i + 1)?;
                let ref_table = normalize_relation_name(&raw_table);
                let ref_columns = match name_list_in_parens(clause, next) {
                    Some(cols) => {
                        next = skip_paren_group(clause, next).unwrap_or(next);
                        cols
                    }
                    None => Vec::new(),
                };
                references = Some((ref_table, ref_columns));
                i = next;
            }
            Keyword::COMMENT => {
                // COMMENT [=] 'text'
                i += 1;
                if matches!(clause.get(i), Some(Token::Eq)) {
                    i += 1;
                }
                i += 1;
            }
            Keyword::CHECK => {
                i = skip_paren_group(clause, i + 1).unwrap_or(clause.len());
            }
            _ => i += 1,
        }
    }

    Some(ParsedColumn {
        column,
        primary,
        references,
    })
}

/// Read a declared type starting at `at`: base word, optional second word
/// (`double precision`, `character varying`), optional size suffix.
fn read_declared_type(tokens: &[Token], at: usize) -> Option<(String, usize)> {
    let base = match tokens.get(at) {
        Some(Token::Word(w)) => w.value.clone(),
        _ => return None,
    };
    let mut declared = base;
    let mut i = at + 1;

    if let Some(Token::Word(w)) = tokens.get(i) {
        let lower = w.value.to_ascii_lowercase();
        if lower == "precision" || lower == "varying" {
            declared.push(' ');
            declared.push_str(&w.value);
            i += 1;
        }
    }
    if matches!(tokens.get(i), Some(Token::LParen)) {
        let close = matching_rparen(tokens, i)?;
        let mut suffix = String::from("(");
        for token in &tokens[i + 1..close] {
            suffix.push_str(&token.to_string());
        }
        suffix.push(')');
        declared.push_str(&suffix);
        i = close + 1;
    }
    Some((declared, i))
}

/// Read a DEFAULT expression: balanced tokens until the next column option.
fn read_default_expr(tokens: &[Token], at: usize) -> (String, usize) {
    let mut parts: Vec<Token> = Vec::new();
    let mut i = at;
    let mut depth = 0usize;
    while i < tokens.len() {
        let token = &tokens[i];
        if depth == 0
            && matches!(
                kw(token),
                Keyword::NOT
                    | Keyword::UNIQUE
                    | Keyword::PRIMARY
                    | Keyword::REFERENCES
                    | Keyword::CHECK
                    | Keyword::CONSTRAINT
                    | Keyword::COMMENT
            )
        {
            break;
        }
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            _ => {}
        }
        parts.push(token.clone());
        i += 1;
        // A bare literal default ends after one value unless a call
        // follows; a leading sign keeps collecting its number.
        if depth == 0
            && parts.len() == 1
            && !matches!(parts[0], Token::Minus | Token::Plus)
            && !matches!(tokens.get(i), Some(Token::LParen))
        {
            break;
        }
    }
    (crate::token::joined_text(&parts), i)
}

// === token-slice utilities ===

/// First paren group at/after `from`: returns (lparen, rparen) positions.
fn paren_group(tokens: &[Token], from: usize) -> Option<(usize, usize)> {
    let lp = tokens[from..]
        .iter()
        .position(|t| matches!(t, Token::LParen))?
        + from;
    let rp = matching_rparen(tokens, lp)?;
    Some((lp, rp))
}

fn matching_rparen(tokens: &[Token], lparen: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(lparen) {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Skip a paren group starting at/after `from`; returns the index after it.
fn skip_paren_group(tokens: &[Token], from: usize) -> Option<usize> {
    let (_, rp) = paren_group(tokens, from)?;
    Some(rp + 1)
}

/// Split `tokens[start..end]` at top-level commas into subranges.
fn split_top_commas(tokens: &[Token], start: usize, end: usize) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut depth = 0usize;
    let mut piece_start = start;
    for i in start..end {
        match &tokens[i] {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Comma if depth == 0 => {
                ranges.push((piece_start, i));
                piece_start = i + 1;
            }
            _ => {}
        }
    }
    ranges.push((piece_start, end));
    ranges
}

/// Column-name list from the next paren group at/after `from`.
///
/// Skips ASC/DESC markers and size suffixes like `name(10)`; descends into
/// one layer of grouping parens (`((col))`, seen in btree index DDL).
fn name_list_in_parens(tokens: &[Token], from: usize) -> Option<Vec<String>> {
    let (lp, rp) = paren_group(tokens, from)?;
    let mut columns = Vec::new();
    let mut i = lp + 1;
    let mut pending_name = true;
    while i < rp {
        match &tokens[i] {
            Token::Comma => {
                pending_name = true;
                i += 1;
            }
            Token::LParen => {
                if pending_name {
                    // grouping parens, descend
                    i += 1;
                } else {
                    // size suffix, skip the group
                    i = matching_rparen(tokens, i).map_or(rp, |p| p + 1);
                }
            }
            Token::RParen => i += 1,
            _ => {
                if pending_name {
                    if let Some((raw, next)) = read_name_chain(tokens, i) {
                        columns.push(normalize_relation_name(&raw));
                        pending_name = false;
                        i = next;
                        continue;
                    }
                }
                i += 1;
            }
        }
    }
    if columns.is_empty() {
        None
    } else {
        Some(columns)
    }
}

/// `REFERENCES t (cols)` tail anywhere in `[from..]`.
fn parse_references(tokens: &[Token], from: usize) -> Option<(String, Vec<String>)> {
    let ref_kw = tokens[from..]
        .iter()
        .position(|t| is_kw(t, Keyword::REFERENCES))?
        + from;
    let (raw_table, next) = read_name_chain(tokens, ref_kw + 1)?;
    let ref_table = normalize_relation_name(&raw_table);
    let ref_columns = name_list_in_parens(tokens, next).unwrap_or_default();
    Some((ref_table, ref_columns))
}

/// Optional bare name between a constraint keyword and its paren list,
/// e.g. the `idx_name` in `KEY idx_name (a, b)`.
fn clause_leading_name(clause: &[Token], at: usize) -> Option<String> {
    match clause.get(at) {
        Some(Token::LParen) => None,
        Some(token) => word_value(token).map(normalize_identifier),
        None => None,
    }
}

/// Resolution of a table/column reference against the scope, with `own`
/// covering self-references from a table still under construction.
fn reference_resolution(
    scope: &SchemaScope,
    own: Option<&Table>,
    ref_table: &str,
    ref_columns: &[String],
) -> Resolution {
    let normalized = normalize_relation_name(ref_table);
    let target = own
        .filter(|t| t.name == normalized)
        .or_else(|| scope.resolve(ref_table));
    match target {
        Some(table) if ref_columns.is_empty() || table.has_columns(ref_columns) => {
            Resolution::Resolved
        }
        _ => Resolution::Unresolved,
    }
}
