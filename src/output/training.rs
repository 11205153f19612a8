//! Language-modeling training lines for parsed tables.
//!
//! One CSV line per column: `unit,table,column,marker`, columns in
//! declaration order. A name with embedded punctuation almost always
//! means a bad parse upstream, so such lines are skipped rather than
//! poisoning the training set.

use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

use crate::pipeline::UnitResult;
use crate::schema::Table;

/// Marker for columns inferred unique.
pub const TOKEN_UNIQUE: &str = "[UNIQUE]";
/// Marker for columns inferred not-null without uniqueness.
pub const TOKEN_NOTNULL: &str = "[NOTNULL]";

fn has_bad_punct(name: &str) -> bool {
    name.contains(' ') || name.contains(',')
}

/// Render one table as training lines.
pub fn table_training_lines(unit_id: &str, table: &Table) -> Vec<String> {
    if has_bad_punct(&table.name) {
        debug!(table = %table.name, "skipping table with punctuation in name");
        return Vec::new();
    }
    let mut lines = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        if has_bad_punct(&column.name) {
            debug!(column = %column.name, "skipping column with punctuation in name");
            continue;
        }
        let marker = if column.unique {
            TOKEN_UNIQUE
        } else if !column.nullable {
            TOKEN_NOTNULL
        } else {
            ""
        };
        lines.push(format!("{unit_id},{},{},{marker}", table.name, column.name));
    }
    lines
}

/// Write the training CSV for a run's merged results.
pub fn write_training_csv(path: &Path, results: &[UnitResult]) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    for result in results {
        for table in &result.tables {
            for line in table_training_lines(&result.unit_id, table) {
                writeln!(file, "{line}")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, Table};

    #[test]
    fn training_lines_mark_unique_over_notnull() {
        let mut table = Table::new("users");
        let mut id = Column::new("id", "int");
        id.unique = true;
        id.nullable = false;
        let mut email = Column::new("email", "varchar(64)");
        email.nullable = false;
        table.push_column(id);
        table.push_column(email);
        table.push_column(Column::new("bio", "text"));

        let lines = table_training_lines("f.sql", &table);
        assert_eq!(
            lines,
            vec![
                "f.sql,users,id,[UNIQUE]".to_string(),
                "f.sql,users,email,[NOTNULL]".to_string(),
                "f.sql,users,bio,".to_string(),
            ]
        );
    }

    #[test]
    fn punctuated_names_are_skipped() {
        let mut table = Table::new("bad table");
        table.push_column(Column::new("a", "int"));
        assert!(table_training_lines("f.sql", &table).is_empty());

        let mut table = Table::new("ok");
        table.push_column(Column::new("bad,col", "int"));
        table.push_column(Column::new("good", "int"));
        let lines = table_training_lines("f.sql", &table);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("good"));
    }
}
