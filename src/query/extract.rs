//! Per-scope clause extraction: five independent attempts, any one
//! success emits a Query for the scope.

use tracing::debug;

use crate::query::aggregation::extract_aggregation;
use crate::query::group_by::extract_group_by;
use crate::query::join::extract_join;
use crate::query::model::Query;
use crate::query::projection::extract_projection;
use crate::query::selection::extract_selection;
use crate::query::tree::QueryTree;
use crate::schema::SchemaScope;

/// Reference-check tallies accumulated during extraction, reported per
/// unit for downstream failure statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractStats {
    /// Join conditions whose table reference matched no FROM instance.
    pub table_check_failed: u64,
    /// Join conditions whose column was absent from a resolved table.
    pub column_check_failed: u64,
    /// Scopes where all five extractors came back empty.
    pub nodes_failed: u64,
}

impl ExtractStats {
    /// Fold another tally into this one.
    pub fn merge(&mut self, other: &ExtractStats) {
        self.table_check_failed += other.table_check_failed;
        self.column_check_failed += other.column_check_failed;
        self.nodes_failed += other.nodes_failed;
    }
}

/// Run the five clause extractors over every scope of a tree, root first.
///
/// Each extractor failure is local: a scope may still produce a Query via
/// any of the other four. A scope with unparseable boundaries is skipped
/// entirely.
pub fn extract_queries(
    tree: &QueryTree,
    schema: &SchemaScope,
    statement_index: usize,
    stats: &mut ExtractStats,
) -> Vec<Query> {
    let mut queries = Vec::new();
    for node in tree.nodes() {
        if node.unparsed {
            debug!(scope = node.id, "skipping scope with unparsed boundaries");
            continue;
        }
        let own = tree.own_tokens(node.id);

        // A set-operation container owns no clauses of its own — its
        // branches do. Not a failure.
        if !node.children.is_empty()
            && !own
                .iter()
                .any(|t| crate::token::is_kw(t, crate::token::Keyword::SELECT))
        {
            continue;
        }

        // Selection first: its column/column comparisons feed comma-join
        // correlation in the join resolver.
        let selection = extract_selection(tree, node.id);
        let where_pairs = selection
            .as_ref()
            .map(|s| s.column_comparisons())
            .unwrap_or_default();

        let joins = extract_join(tree, node.id, schema, &where_pairs, stats);
        let projections = extract_projection(&own);
        let aggregates = extract_aggregation(&own);
        let group_by = extract_group_by(tree, node.id);

        match Query::from_parts(
            statement_index,
            node.id,
            joins,
            projections,
            aggregates,
            selection,
            group_by,
        ) {
            Some(query) => queries.push(query),
            None => stats.nodes_failed += 1,
        }
    }
    queries
}
