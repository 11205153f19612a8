//! Schema entities and the DDL interpreter that builds them.

mod builder;
mod model;

pub use builder::{apply_ddl, resolve_foreign_keys, SchemaDelta, SoftFailure};
pub use model::{
    Column, ForeignKey, Index, Key, KeyKind, Resolution, SchemaScope, Table, TypeCategory,
};
