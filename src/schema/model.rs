//! The persistent table model produced by the schema builder.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Normalized category of a declared column type.
///
/// The raw declared type is kept verbatim on the column; this is the coarse
/// bucket used by downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    /// Integer, decimal, and floating types.
    Numeric,
    /// Bit and boolean types.
    Boolean,
    /// Money types.
    Currency,
    /// Character and text types.
    String,
    /// SET enumerations.
    Set,
    /// Blob and binary types.
    Binary,
    /// UUID and identifier types.
    Id,
    /// Date, time, and timestamp types.
    DateTime,
    /// Recognized but uncategorized types (json, xml, spatial, ...).
    Other,
    /// Not a recognized type at all.
    Unknown,
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeCategory::Numeric => "numeric",
            TypeCategory::Boolean => "boolean",
            TypeCategory::Currency => "currency",
            TypeCategory::String => "string",
            TypeCategory::Set => "set",
            TypeCategory::Binary => "binary",
            TypeCategory::Id => "id",
            TypeCategory::DateTime => "datetime",
            TypeCategory::Other => "other",
            TypeCategory::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

const NUMERIC_TYPES: &[&str] = &[
    "number", "int", "tinyint", "smallint", "mediumint", "bigint", "integer", "long", "numeric",
    "float", "double", "dec", "decimal", "real", "serial",
];
const BOOLEAN_TYPES: &[&str] = &["bit", "bool", "boolean"];
const CURRENCY_TYPES: &[&str] = &["money", "smallmoney"];
const STRING_TYPES: &[&str] = &[
    "char", "varchar", "nvarchar", "nchar", "string", "text", "longtext", "mediumtext", "tinytext",
    "ntext", "enum", "clob",
];
const BINARY_TYPES: &[&str] = &[
    "blob", "longblob", "mediumblob", "tinyblob", "binary", "varbinary", "bytea", "image",
];
const ID_TYPES: &[&str] = &["uuid", "identity", "identifier", "uniqueidentifier"];
const DATETIME_TYPES: &[&str] = &[
    "date",
    "time",
    "datetime",
    "datetime2",
    "smalldatetime",
    "datetimeoffset",
    "year",
    "timestamp",
];
const OTHER_TYPES: &[&str] = &[
    "json",
    "xml",
    "set",
    "raw",
    "graphic",
    "geography",
    "cursor",
    "rowversion",
    "hierarchyid",
    "sql_variant",
    "inet",
    "cidr",
    "macaddr",
    "point",
    "line",
    "lseg",
    "box",
    "path",
    "polygon",
    "circle",
    "regproc",
    "tsvector",
    "sysname",
];

impl TypeCategory {
    /// Categorize a raw declared type, e.g. `VARCHAR(255)` -> `String`.
    pub fn of(declared: &str) -> TypeCategory {
        let base = declared
            .split(['(', ' '])
            .next()
            .unwrap_or(declared)
            .trim()
            .to_ascii_lowercase();
        if base == "set" {
            return TypeCategory::Set;
        }
        let buckets: [(&[&str], TypeCategory); 8] = [
            (ID_TYPES, TypeCategory::Id),
            (NUMERIC_TYPES, TypeCategory::Numeric),
            (BOOLEAN_TYPES, TypeCategory::Boolean),
            (CURRENCY_TYPES, TypeCategory::Currency),
            (STRING_TYPES, TypeCategory::String),
            (BINARY_TYPES, TypeCategory::Binary),
            (DATETIME_TYPES, TypeCategory::DateTime),
            (OTHER_TYPES, TypeCategory::Other),
        ];
        for (names, category) in buckets {
            if names.contains(&base.as_str()) {
                return category;
            }
        }
        // Dialect spellings the exact table misses: `character varying`,
        // `int4`, `timestamptz`, `bigserial`. Substring fallback, with the
        // buckets whose names collide (e.g. `point` contains `int`) checked
        // in exact-first order above.
        let fallback: [(&[&str], TypeCategory); 8] = [
            (ID_TYPES, TypeCategory::Id),
            (OTHER_TYPES, TypeCategory::Other),
            (DATETIME_TYPES, TypeCategory::DateTime),
            (BINARY_TYPES, TypeCategory::Binary),
            (STRING_TYPES, TypeCategory::String),
            (CURRENCY_TYPES, TypeCategory::Currency),
            (BOOLEAN_TYPES, TypeCategory::Boolean),
            (NUMERIC_TYPES, TypeCategory::Numeric),
        ];
        for (names, category) in fallback {
            if names.iter().any(|n| base.contains(n)) {
                return category;
            }
        }
        TypeCategory::Unknown
    }

    /// True when a clause's second token looks like a column type at all.
    ///
    /// Used as the gate that separates column definitions from stray
    /// clauses in malformed CREATE TABLE bodies: an unrecognized type means
    /// the clause is skipped rather than inventing a column.
    pub fn is_recognized(declared: &str) -> bool {
        TypeCategory::of(declared) != TypeCategory::Unknown
    }
}

/// One column of a table. Owned exclusively by its [`Table`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Case-normalized column name.
    pub name: String,
    /// Declared type, verbatim (size suffix included).
    pub declared_type: String,
    /// Normalized type bucket.
    pub category: TypeCategory,
    /// False when declared NOT NULL or inferred from a key membership.
    pub nullable: bool,
    /// Raw DEFAULT expression text, when present.
    pub default: Option<String>,
    /// Zero-based declaration position.
    pub ordinal: usize,
    /// Inferred uniqueness (inline UNIQUE, key membership, unique index).
    pub unique: bool,
}

impl Column {
    /// Build a column with the given name and declared type at an ordinal
    /// filled in by [`Table::push_column`].
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        let declared_type = declared_type.into();
        let category = TypeCategory::of(&declared_type);
        Column {
            name: name.into(),
            declared_type,
            category,
            nullable: true,
            default: None,
            ordinal: 0,
            unique: false,
        }
    }
}

/// Key kind: primary, unique, or bare candidate key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    /// PRIMARY KEY — at most one per table.
    Primary,
    /// UNIQUE constraint or unique key.
    Unique,
    /// Bare KEY clause (MySQL candidate key).
    Candidate,
}

/// A key over one or more columns, referenced by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    /// Key kind.
    pub kind: KeyKind,
    /// Ordered column-name references into the owning table.
    pub columns: Vec<String>,
    /// Constraint name, when declared; lets DROP CONSTRAINT find it.
    pub name: Option<String>,
}

/// Resolution status of a cross-table reference.
///
/// `Unresolved` is a first-class terminal state, not an error: the target
/// table may simply never be defined in the processing unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Target table and columns were found in the unit's schema scope.
    Resolved,
    /// Target not (yet) known in this unit.
    Unresolved,
}

/// A foreign-key constraint on a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Child column names, in constraint order.
    pub columns: Vec<String>,
    /// Referenced table name (normalized).
    pub ref_table: String,
    /// Referenced column names, in constraint order.
    pub ref_columns: Vec<String>,
    /// Whether the reference resolved within this unit.
    pub resolution: Resolution,
    /// Constraint name, when declared; lets DROP CONSTRAINT find it.
    pub name: Option<String>,
}

/// A (possibly unique) index over table columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Index name, when one was given.
    pub name: Option<String>,
    /// Ordered indexed columns.
    pub columns: Vec<String>,
    /// True for UNIQUE INDEX.
    pub unique: bool,
}

/// One table: columns in declaration order plus keys, foreign keys, and
/// indices. Created by the first CREATE TABLE for its name in a unit and
/// mutated in place by later ALTER TABLE statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Case-normalized table name, the lookup key within a unit.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<Column>,
    /// Primary/unique/candidate keys.
    pub keys: Vec<Key>,
    /// Foreign keys, including unresolved ones.
    pub foreign_keys: Vec<ForeignKey>,
    /// Indices, including those from standalone CREATE INDEX statements.
    pub indices: Vec<Index>,
}

impl Table {
    /// New empty table with the given normalized name.
    pub fn new(name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            columns: Vec::new(),
            keys: Vec::new(),
            foreign_keys: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Look up a column by normalized name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Mutable column lookup by normalized name.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// True when every name in `names` is a column of this table.
    pub fn has_columns(&self, names: &[String]) -> bool {
        names.iter().all(|n| self.column(n).is_some())
    }

    /// Append a column, assigning its ordinal. A duplicate name is ignored,
    /// keeping the first definition.
    pub fn push_column(&mut self, mut column: Column) {
        if self.column(&column.name).is_some() {
            return;
        }
        column.ordinal = self.columns.len();
        self.columns.push(column);
    }

    /// Remove a column by name; later ordinals shift down.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| c.name != name);
        let dropped = self.columns.len() != before;
        if dropped {
            for (i, column) in self.columns.iter_mut().enumerate() {
                column.ordinal = i;
            }
        }
        dropped
    }

    /// Mark the named columns as primary-key members: key, not null, unique.
    pub fn mark_primary(&mut self, names: &[String]) {
        for name in names {
            if let Some(column) = self.column_mut(name) {
                column.nullable = false;
                column.unique = true;
            }
        }
    }
}

/// All tables seen so far in one processing unit, keyed by normalized name
/// with insertion order preserved.
#[derive(Debug, Default, Clone)]
pub struct SchemaScope {
    tables: Vec<Table>,
    by_name: HashMap<String, usize>,
}

impl SchemaScope {
    /// New empty scope.
    pub fn new() -> Self {
        SchemaScope::default()
    }

    /// Number of tables in the scope.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// True when no tables have been defined.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Look up a table by normalized name.
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.by_name.get(name).map(|&i| &self.tables[i])
    }

    /// Mutable table lookup by normalized name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Table> {
        let idx = *self.by_name.get(name)?;
        Some(&mut self.tables[idx])
    }

    /// Resolve a possibly qualified reference by trying lookup candidates
    /// from most to least specific.
    pub fn resolve(&self, reference: &str) -> Option<&Table> {
        crate::token::names::table_lookup_candidates(reference)
            .into_iter()
            .find_map(|candidate| self.get(&candidate))
    }

    /// Insert a new table. Returns `false` (leaving the scope untouched)
    /// when a table with that name already exists — the keep-first policy.
    pub fn insert(&mut self, table: Table) -> bool {
        if self.by_name.contains_key(&table.name) {
            return false;
        }
        self.by_name.insert(table.name.clone(), self.tables.len());
        self.tables.push(table);
        true
    }

    /// Iterate tables in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    /// Iterate tables mutably in definition order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Table> {
        self.tables.iter_mut()
    }

    /// Consume the scope, yielding tables in definition order.
    pub fn into_tables(self) -> Vec<Table> {
        self.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_categories_match_known_names() {
        assert_eq!(TypeCategory::of("INT(11)"), TypeCategory::Numeric);
        assert_eq!(TypeCategory::of("varchar(255)"), TypeCategory::String);
        assert_eq!(TypeCategory::of("uuid"), TypeCategory::Id);
        assert_eq!(TypeCategory::of("TIMESTAMP"), TypeCategory::DateTime);
        assert_eq!(TypeCategory::of("bytea"), TypeCategory::Binary);
        assert_eq!(TypeCategory::of("frobnicator"), TypeCategory::Unknown);
        assert!(!TypeCategory::is_recognized("frobnicator"));
    }

    #[test]
    fn push_column_keeps_first_and_assigns_ordinals() {
        let mut table = Table::new("t");
        table.push_column(Column::new("a", "int"));
        table.push_column(Column::new("b", "int"));
        table.push_column(Column::new("a", "varchar"));
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.column("a").unwrap().declared_type, "int");
        assert_eq!(table.column("b").unwrap().ordinal, 1);
    }

    #[test]
    fn drop_column_reassigns_ordinals() {
        let mut table = Table::new("t");
        table.push_column(Column::new("a", "int"));
        table.push_column(Column::new("b", "int"));
        table.push_column(Column::new("c", "int"));
        assert!(table.drop_column("b"));
        assert_eq!(table.column("c").unwrap().ordinal, 1);
        assert!(!table.drop_column("b"));
    }

    #[test]
    fn scope_insert_is_keep_first() {
        let mut scope = SchemaScope::new();
        let mut first = Table::new("t");
        first.push_column(Column::new("a", "int"));
        assert!(scope.insert(first));
        assert!(!scope.insert(Table::new("t")));
        assert_eq!(scope.get("t").unwrap().columns.len(), 1);
    }

    #[test]
    fn scope_resolve_falls_back_to_terminal_name() {
        let mut scope = SchemaScope::new();
        scope.insert(Table::new("users"));
        assert!(scope.resolve("public.users").is_some());
        assert!(scope.resolve("users").is_some());
        assert!(scope.resolve("missing").is_none());
    }
}
