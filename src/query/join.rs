//! Join resolver: FROM-clause table introductions and join conditions.

use sqlparser::tokenizer::Token;
use tracing::debug;

use crate::query::extract::ExtractStats;
use crate::query::model::{
    BinaryJoin, ColumnRef, CompareOp, JoinKind, JoinPredicate, Operand, TableBinding,
    TableInstance,
};
use crate::query::selection::parse_operand_at;
use crate::query::tree::QueryTree;
use crate::schema::SchemaScope;
use crate::token::names::{normalize_identifier, normalize_relation_name};
use crate::token::{is_kw, kw, Keyword};

/// One table introduction in a FROM clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromItem {
    /// Normalized table name; `None` when the item is a subquery.
    pub name: Option<String>,
    /// Normalized alias, when one is bound.
    pub alias: Option<String>,
    /// How the item was introduced: `None` for the first item, `Comma` for
    /// list members, an explicit kind for JOIN syntax.
    pub join: Option<JoinKind>,
    /// Columns from a `USING (...)` clause attached to this introduction.
    pub using: Vec<String>,
}

/// Scan a scope's own tokens for its FROM-clause table introductions.
///
/// Handles explicit JOIN chains, comma lists, subquery holes (an adjacent
/// `( )` pair left by child-scope exclusion), and parenthesized join
/// groups, which are scanned through transparently.
pub fn from_items(own: &[Token]) -> Vec<FromItem> {
    let Some(from_pos) = own.iter().position(|t| is_kw(t, Keyword::FROM)) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    let mut pending_join: Option<JoinKind> = None;
    let mut i = from_pos + 1;

    while i < own.len() {
        match &own[i] {
            Token::Comma => {
                pending_join = Some(JoinKind::Comma);
                i += 1;
            }
            Token::LParen => {
                if matches!(own.get(i + 1), Some(Token::RParen)) {
                    // subquery hole
                    let (alias, next) = read_alias(own, i + 2);
                    items.push(FromItem {
                        name: None,
                        alias,
                        join: pending_join.take(),
                        using: Vec::new(),
                    });
                    i = next;
                } else {
                    // parenthesized join group; scan through it
                    i += 1;
                }
            }
            Token::RParen => i += 1,
            token => match kw(token) {
                Keyword::INNER | Keyword::OUTER => i += 1,
                Keyword::LEFT => {
                    pending_join = Some(JoinKind::Left);
                    i += 1;
                }
                Keyword::RIGHT => {
                    pending_join = Some(JoinKind::Right);
                    i += 1;
                }
                Keyword::FULL => {
                    pending_join = Some(JoinKind::Full);
                    i += 1;
                }
                Keyword::CROSS => {
                    pending_join = Some(JoinKind::Cross);
                    i += 1;
                }
                Keyword::JOIN => {
                    if pending_join.is_none() {
                        pending_join = Some(JoinKind::Inner);
                    }
                    i += 1;
                }
                Keyword::ON => {
                    // conditions are parsed separately; skip to the next
                    // introducer or clause end
                    i += 1;
                    while i < own.len() && !at_join_boundary(&own[i]) {
                        i += 1;
                    }
                }
                Keyword::USING => {
                    let mut columns = Vec::new();
                    if matches!(own.get(i + 1), Some(Token::LParen)) {
                        let mut j = i + 2;
                        while j < own.len() && !matches!(own[j], Token::RParen) {
                            if let Some(value) = crate::token::word_value(&own[j]) {
                                columns.push(normalize_identifier(value));
                            }
                            j += 1;
                        }
                        i = j + 1;
                    } else {
                        i += 1;
                    }
                    if let Some(last) = items.last_mut() {
                        last.using = columns;
                    }
                }
                Keyword::WHERE
                | Keyword::GROUP
                | Keyword::ORDER
                | Keyword::HAVING
                | Keyword::LIMIT
                | Keyword::UNION
                | Keyword::INTERSECT
                | Keyword::EXCEPT
                | Keyword::SELECT => break,
                _ => {
                    if let Some((raw, next)) = crate::token::read_name_chain(own, i) {
                        let name = normalize_relation_name(&raw);
                        let (alias, next) = read_alias(own, next);
                        items.push(FromItem {
                            name: Some(name),
                            alias,
                            join: pending_join.take(),
                            using: Vec::new(),
                        });
                        i = next;
                    } else {
                        i += 1;
                    }
                }
            },
        }
    }
    items
}

fn at_join_boundary(token: &Token) -> bool {
    matches!(
        kw(token),
        Keyword::JOIN
            | Keyword::INNER
            | Keyword::LEFT
            | Keyword::RIGHT
            | Keyword::FULL
            | Keyword::CROSS
            | Keyword::WHERE
            | Keyword::GROUP
            | Keyword::ORDER
            | Keyword::HAVING
            | Keyword::LIMIT
            | Keyword::UNION
            | Keyword::INTERSECT
            | Keyword::EXCEPT
    ) || matches!(token, Token::Comma)
}

/// Optional `[AS] alias` after a FROM item.
fn read_alias(own: &[Token], at: usize) -> (Option<String>, usize) {
    let mut i = at;
    if matches!(own.get(i).map(kw), Some(Keyword::AS)) {
        i += 1;
    }
    match own.get(i) {
        Some(Token::Word(w)) if !crate::token::is_reserved_stop(w.keyword) => {
            (Some(normalize_identifier(&w.value)), i + 1)
        }
        _ => (None, at),
    }
}

/// Extract the binary joins of one scope.
///
/// `where_pairs` carries column/column comparisons found by the selection
/// extractor, which is how comma-join conditions written in WHERE reach
/// the join resolver.
pub fn extract_join(
    tree: &QueryTree,
    node_id: usize,
    schema: &SchemaScope,
    where_pairs: &[(ColumnRef, CompareOp, ColumnRef)],
    stats: &mut ExtractStats,
) -> Option<Vec<BinaryJoin>> {
    let node = tree.node(node_id);
    let items = &node.from_items;
    if items.is_empty() {
        return None;
    }

    let instances: Vec<TableInstance> = items.iter().map(|it| instantiate(it, schema)).collect();

    // Conditions from ON clauses, USING clauses, and WHERE.
    let own = tree.own_tokens(node_id);
    let mut conditions = parse_on_conditions(&own, tree, node_id);
    for (item_idx, item) in items.iter().enumerate() {
        if item.using.is_empty() || item_idx == 0 {
            continue;
        }
        let left_name = effective_name(&items[item_idx - 1]);
        let right_name = effective_name(item);
        for column in &item.using {
            conditions.push((
                ColumnRef {
                    table: left_name.clone(),
                    column: column.clone(),
                },
                CompareOp::Eq,
                ColumnRef {
                    table: right_name.clone(),
                    column: column.clone(),
                },
            ));
        }
    }
    conditions.extend(where_pairs.iter().cloned());

    // Group validated conditions by table pair, in first-seen order.
    let find_instance = |table: &Option<String>| -> Option<usize> {
        let name = table.as_deref()?;
        instances
            .iter()
            .position(|inst| inst.name == name || inst.alias.as_deref() == Some(name))
    };

    let mut pair_order: Vec<(usize, usize)> = Vec::new();
    let mut pair_predicates: Vec<Vec<JoinPredicate>> = Vec::new();
    for (left, op, right) in conditions {
        let Some(li) = find_instance(&left.table) else {
            // References something outside this scope's FROM list — a
            // correlated column or an unknown table.
            stats.table_check_failed += 1;
            debug!(column = %left, "join condition references no local table");
            continue;
        };
        let Some(ri) = find_instance(&right.table) else {
            stats.table_check_failed += 1;
            debug!(column = %right, "join condition references no local table");
            continue;
        };
        if li == ri {
            continue;
        }
        if !column_exists(schema, &instances[li], &left.column) {
            stats.column_check_failed += 1;
            debug!(column = %left, "join condition column not in table");
            continue;
        }
        if !column_exists(schema, &instances[ri], &right.column) {
            stats.column_check_failed += 1;
            debug!(column = %right, "join condition column not in table");
            continue;
        }

        let (a, b, predicate) = if li <= ri {
            (
                li,
                ri,
                JoinPredicate {
                    left: Operand::Column(left),
                    op,
                    right: Operand::Column(right),
                },
            )
        } else {
            (
                ri,
                li,
                JoinPredicate {
                    left: Operand::Column(right),
                    op,
                    right: Operand::Column(left),
                },
            )
        };
        match pair_order.iter().position(|&p| p == (a, b)) {
            Some(idx) => pair_predicates[idx].push(predicate),
            None => {
                pair_order.push((a, b));
                pair_predicates.push(vec![predicate]);
            }
        }
    }

    let explicit_kind = node.dominant_join;
    let mut joins: Vec<BinaryJoin> = pair_order
        .into_iter()
        .zip(pair_predicates)
        .map(|((a, b), predicates)| BinaryJoin {
            left: instances[a].clone(),
            right: instances[b].clone(),
            kind: join_kind_for(&items[b], explicit_kind),
            predicates,
        })
        .collect();

    // Comma/cross introductions with no matched condition still join;
    // the condition, if any, is expected in WHERE and is not
    // cross-correlated here.
    for idx in 1..items.len() {
        if !matches!(items[idx].join, Some(JoinKind::Comma | JoinKind::Cross)) {
            continue;
        }
        let covered = joins.iter().any(|j| {
            (j.left == instances[idx - 1] && j.right == instances[idx])
                || (j.left == instances[idx] && j.right == instances[idx - 1])
        });
        if !covered {
            joins.push(BinaryJoin {
                left: instances[idx - 1].clone(),
                right: instances[idx].clone(),
                kind: items[idx].join.unwrap_or(JoinKind::Comma),
                predicates: Vec::new(),
            });
        }
    }

    if joins.is_empty() {
        None
    } else {
        Some(joins)
    }
}

fn instantiate(item: &FromItem, schema: &SchemaScope) -> TableInstance {
    match &item.name {
        None => TableInstance {
            name: item.alias.clone().unwrap_or_else(|| "subquery".to_string()),
            alias: item.alias.clone(),
            binding: TableBinding::SubqueryAlias,
        },
        Some(name) => {
            let binding = if schema.resolve(name).is_some() {
                TableBinding::Resolved
            } else {
                TableBinding::Unresolved
            };
            TableInstance {
                name: name.clone(),
                alias: item.alias.clone(),
                binding,
            }
        }
    }
}

fn effective_name(item: &FromItem) -> Option<String> {
    item.name.clone().or_else(|| item.alias.clone())
}

/// Join kind for the pair introducing `right_item`, preferring that item's
/// own introducer over the scope-dominant kind.
fn join_kind_for(right_item: &FromItem, dominant: Option<JoinKind>) -> JoinKind {
    right_item
        .join
        .or(dominant)
        .unwrap_or(JoinKind::Inner)
}

fn column_exists(schema: &SchemaScope, instance: &TableInstance, column: &str) -> bool {
    match instance.binding {
        // Only resolvable tables can be checked; aliases over subqueries
        // and unresolved tables are taken at their word.
        TableBinding::Resolved => schema
            .resolve(&instance.name)
            .is_some_and(|t| t.column(column).is_some()),
        _ => true,
    }
}

/// Parse the comparisons inside ON clauses of a scope's own tokens.
fn parse_on_conditions(
    own: &[Token],
    tree: &QueryTree,
    node_id: usize,
) -> Vec<(ColumnRef, CompareOp, ColumnRef)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < own.len() {
        if !is_kw(&own[i], Keyword::ON) {
            i += 1;
            continue;
        }
        i += 1;
        while i < own.len() && !at_join_boundary(&own[i]) {
            let Some((left, op, right, next)) = parse_comparison(own, i, tree, node_id) else {
                i += 1;
                continue;
            };
            if let (Operand::Column(l), Operand::Column(r)) = (left, right) {
                out.push((l, op, r));
            }
            i = next;
        }
    }
    out
}

/// Parse `operand op operand` at `i`, if present.
fn parse_comparison(
    own: &[Token],
    i: usize,
    tree: &QueryTree,
    node_id: usize,
) -> Option<(Operand, CompareOp, Operand, usize)> {
    let (left, after_left) = parse_operand_at(own, i, tree, node_id)?;
    let op = compare_op(own.get(after_left)?)?;
    let (right, after_right) = parse_operand_at(own, after_left + 1, tree, node_id)?;
    Some((left, op, right, after_right))
}

/// Map a comparison token to the operator set that links tables.
pub(crate) fn compare_op(token: &Token) -> Option<CompareOp> {
    match token {
        Token::Eq => Some(CompareOp::Eq),
        Token::Lt => Some(CompareOp::Lt),
        Token::Gt => Some(CompareOp::Gt),
        Token::LtEq => Some(CompareOp::LtEq),
        Token::GtEq => Some(CompareOp::GtEq),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    fn own_tokens(sql: &str) -> Vec<Token> {
        tokenize(sql).expect("should tokenize").remove(0).tokens
    }

    #[test]
    fn from_items_reads_comma_lists_with_aliases() {
        let own = own_tokens("SELECT 1 FROM yoga_class c, yoga_program p WHERE 1 = 1");
        let items = from_items(&own);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name.as_deref(), Some("yoga_class"));
        assert_eq!(items[0].alias.as_deref(), Some("c"));
        assert_eq!(items[0].join, None);
        assert_eq!(items[1].join, Some(JoinKind::Comma));
    }

    #[test]
    fn from_items_reads_explicit_join_chain() {
        let own = own_tokens(
            "SELECT 1 FROM a JOIN b ON a.id = b.aid LEFT OUTER JOIN c AS cc ON b.id = cc.bid",
        );
        let items = from_items(&own);
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].join, Some(JoinKind::Inner));
        assert_eq!(items[2].join, Some(JoinKind::Left));
        assert_eq!(items[2].alias.as_deref(), Some("cc"));
    }

    #[test]
    fn from_items_records_using_columns() {
        let own = own_tokens("SELECT 1 FROM a JOIN b USING (id)");
        let items = from_items(&own);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].using, vec!["id".to_string()]);
    }
}
