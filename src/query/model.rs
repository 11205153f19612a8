//! Entities describing what a query references and does.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A possibly table-qualified column reference.
///
/// `table` is `None` when the reference could not be bound to a table —
/// an ambiguous unqualified name stays unbound rather than guessed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Normalized owning-table name, when bound.
    pub table: Option<String>,
    /// Normalized column name.
    pub column: String,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{table}.{}", self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

/// Comparison operators that participate in join and selection predicates.
///
/// `!=`/`<>` conditions never link tables and are kept only as opaque
/// predicate text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::LtEq => "<=",
            CompareOp::GtEq => ">=",
        };
        write!(f, "{s}")
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// A column reference.
    Column(ColumnRef),
    /// A literal value, kept as text.
    Literal(String),
    /// Any other expression, kept as text.
    Expr(String),
}

impl Operand {
    /// The column reference, when this operand is one.
    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self {
            Operand::Column(c) => Some(c),
            _ => None,
        }
    }
}

/// How a FROM-clause table introduction resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableBinding {
    /// The name matched a table in the unit's schema scope.
    Resolved,
    /// The introduction is an alias over a subquery's result set.
    SubqueryAlias,
    /// The name matched nothing known; kept, not dropped.
    Unresolved,
}

/// A table binding introduced by a FROM/JOIN clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInstance {
    /// Normalized table name, or the alias for a subquery instance.
    pub name: String,
    /// Alias bound in the FROM clause, when present.
    pub alias: Option<String>,
    /// Resolution against the unit's schema scope.
    pub binding: TableBinding,
}

/// Join kind of a [`BinaryJoin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    /// Explicit or bare `JOIN`.
    Inner,
    /// `LEFT [OUTER] JOIN`.
    Left,
    /// `RIGHT [OUTER] JOIN`.
    Right,
    /// `FULL [OUTER] JOIN`.
    Full,
    /// `CROSS JOIN`.
    Cross,
    /// Comma-separated FROM list; conditions, if any, live in WHERE.
    Comma,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JoinKind::Inner => "inner",
            JoinKind::Left => "left",
            JoinKind::Right => "right",
            JoinKind::Full => "full",
            JoinKind::Cross => "cross",
            JoinKind::Comma => "comma",
        };
        write!(f, "{s}")
    }
}

/// One join condition: `left op right`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPredicate {
    /// Left operand.
    pub left: Operand,
    /// Comparison operator.
    pub op: CompareOp,
    /// Right operand.
    pub right: Operand,
}

/// A join between exactly two table instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryJoin {
    /// Left instance.
    pub left: TableInstance,
    /// Right instance.
    pub right: TableInstance,
    /// Join kind.
    pub kind: JoinKind,
    /// Join conditions; empty for bare comma joins.
    pub predicates: Vec<JoinPredicate>,
}

/// One output expression of the SELECT list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionItem {
    /// `SELECT *` (or `t.*`): column-level expansion needs schema
    /// resolution that may be unavailable, so the wildcard is kept as-is.
    Wildcard,
    /// A regular output expression.
    Expr {
        /// Expression text.
        expr: String,
        /// Output alias, when present.
        alias: Option<String>,
    },
}

/// Recognized aggregate functions, with common dialect variants folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunc {
    /// `count`, `count_big`
    Count,
    /// `sum`, `total`
    Sum,
    /// `avg`
    Avg,
    /// `min`
    Min,
    /// `max`
    Max,
}

impl AggregateFunc {
    /// Map a function name to a recognized aggregate, if it is one.
    pub fn from_name(name: &str) -> Option<AggregateFunc> {
        match name.to_ascii_lowercase().as_str() {
            "count" | "count_big" => Some(AggregateFunc::Count),
            "sum" | "total" => Some(AggregateFunc::Sum),
            "avg" => Some(AggregateFunc::Avg),
            "min" => Some(AggregateFunc::Min),
            "max" => Some(AggregateFunc::Max),
            _ => None,
        }
    }
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregateFunc::Count => "count",
            AggregateFunc::Sum => "sum",
            AggregateFunc::Avg => "avg",
            AggregateFunc::Min => "min",
            AggregateFunc::Max => "max",
        };
        write!(f, "{s}")
    }
}

/// One aggregate call found in the SELECT list or HAVING clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    /// The aggregate function.
    pub func: AggregateFunc,
    /// Argument expression text (`*`, `distinct x`, `b.y`).
    pub argument: String,
    /// Output alias, when present.
    pub alias: Option<String>,
}

/// WHERE-clause predicate tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// A plain comparison.
    Compare {
        /// Left operand.
        left: Operand,
        /// Comparison operator.
        op: CompareOp,
        /// Right operand.
        right: Operand,
    },
    /// Conjunction of two or more predicates.
    And(Vec<Predicate>),
    /// Disjunction of two or more predicates.
    Or(Vec<Predicate>),
    /// Negated predicate.
    Not(Box<Predicate>),
    /// An atom this extractor does not model (IN lists, LIKE, EXISTS,
    /// inequality); kept as text so the predicate shape survives.
    Opaque(String),
}

/// The parsed WHERE clause of one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Root of the predicate tree.
    pub predicate: Predicate,
    /// Unqualified column names that could not be bound to a single FROM
    /// table; recorded, never guessed.
    pub unbound_columns: Vec<String>,
}

impl Selection {
    /// All column/column comparisons in the tree, for join correlation.
    pub fn column_comparisons(&self) -> Vec<(ColumnRef, CompareOp, ColumnRef)> {
        let mut out = Vec::new();
        collect_column_comparisons(&self.predicate, &mut out);
        out
    }
}

fn collect_column_comparisons(
    predicate: &Predicate,
    out: &mut Vec<(ColumnRef, CompareOp, ColumnRef)>,
) {
    match predicate {
        Predicate::Compare { left, op, right } => {
            if let (Operand::Column(l), Operand::Column(r)) = (left, right) {
                out.push((l.clone(), *op, r.clone()));
            }
        }
        Predicate::And(parts) | Predicate::Or(parts) => {
            for part in parts {
                collect_column_comparisons(part, out);
            }
        }
        Predicate::Not(inner) => collect_column_comparisons(inner, out),
        Predicate::Opaque(_) => {}
    }
}

/// Extraction results for one query scope.
///
/// Constructed only through [`Query::from_parts`], which enforces the
/// emission rule: at least one of the five clause extractions succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Index of the source statement within its file.
    pub statement_index: usize,
    /// Scope id within the statement's query tree.
    pub scope_id: usize,
    /// Binary joins, when the join resolver succeeded.
    pub joins: Option<Vec<BinaryJoin>>,
    /// Output expressions, when the projection extractor succeeded.
    pub projections: Option<Vec<ProjectionItem>>,
    /// Aggregate calls, when the aggregation extractor succeeded.
    pub aggregates: Option<Vec<Aggregate>>,
    /// WHERE predicate, when the selection extractor succeeded.
    pub selection: Option<Selection>,
    /// GROUP BY columns, when that extractor succeeded.
    pub group_by: Option<Vec<ColumnRef>>,
}

impl Query {
    /// Assemble a query from the five extraction results; `None` when all
    /// five came back empty.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        statement_index: usize,
        scope_id: usize,
        joins: Option<Vec<BinaryJoin>>,
        projections: Option<Vec<ProjectionItem>>,
        aggregates: Option<Vec<Aggregate>>,
        selection: Option<Selection>,
        group_by: Option<Vec<ColumnRef>>,
    ) -> Option<Query> {
        if joins.is_none()
            && projections.is_none()
            && aggregates.is_none()
            && selection.is_none()
            && group_by.is_none()
        {
            return None;
        }
        Some(Query {
            statement_index,
            scope_id,
            joins,
            projections,
            aggregates,
            selection,
            group_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_requires_at_least_one_clause() {
        assert!(Query::from_parts(0, 0, None, None, None, None, None).is_none());
        let q = Query::from_parts(0, 0, None, Some(vec![ProjectionItem::Wildcard]), None, None, None);
        assert!(q.is_some());
    }

    #[test]
    fn aggregate_names_fold_dialect_variants() {
        assert_eq!(AggregateFunc::from_name("COUNT"), Some(AggregateFunc::Count));
        assert_eq!(
            AggregateFunc::from_name("count_big"),
            Some(AggregateFunc::Count)
        );
        assert_eq!(AggregateFunc::from_name("total"), Some(AggregateFunc::Sum));
        assert_eq!(AggregateFunc::from_name("stddev"), None);
    }

    #[test]
    fn selection_collects_column_comparisons_through_logic() {
        let col = |t: &str, c: &str| ColumnRef {
            table: Some(t.to_string()),
            column: c.to_string(),
        };
        let selection = Selection {
            predicate: Predicate::And(vec![
                Predicate::Compare {
                    left: Operand::Column(col("a", "id")),
                    op: CompareOp::Eq,
                    right: Operand::Column(col("b", "aid")),
                },
                Predicate::Compare {
                    left: Operand::Column(col("a", "v")),
                    op: CompareOp::Gt,
                    right: Operand::Literal("10".to_string()),
                },
            ]),
            unbound_columns: Vec::new(),
        };
        let pairs = selection.column_comparisons();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, col("a", "id"));
    }
}
