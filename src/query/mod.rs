//! Query-tree construction and per-scope clause extraction.

mod aggregation;
mod binding;
mod extract;
mod group_by;
mod join;
mod model;
mod projection;
mod selection;
mod tree;

pub use extract::{extract_queries, ExtractStats};
pub use join::{extract_join, from_items, FromItem};
pub use model::{
    Aggregate, AggregateFunc, BinaryJoin, ColumnRef, CompareOp, JoinKind, JoinPredicate, Operand,
    Predicate, ProjectionItem, Query, Selection, TableBinding, TableInstance,
};
pub use tree::{build_tree, QueryNode, QueryTree};
