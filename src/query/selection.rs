//! Selection extractor: the WHERE clause as a predicate tree.

use sqlparser::tokenizer::Token;

use crate::query::binding::{bind_unqualified, resolve_qualifier};
use crate::query::join::compare_op;
use crate::query::model::{ColumnRef, Operand, Predicate, Selection};
use crate::query::tree::QueryTree;
use crate::token::names::normalize_identifier;
use crate::token::{is_kw, kw, joined_text, Keyword};

/// Beyond this paren depth the predicate degrades to opaque text instead
/// of recursing further.
const MAX_PREDICATE_DEPTH: usize = 64;

/// Extract the WHERE clause of one scope, when present and non-empty.
///
/// Unqualified column references bind to the nearest enclosing scope's
/// single FROM table when unambiguous; otherwise they stay unbound and
/// are recorded on the result.
pub fn extract_selection(tree: &QueryTree, node_id: usize) -> Option<Selection> {
    let own = tree.own_tokens(node_id);
    let where_pos = own.iter().position(|t| is_kw(t, Keyword::WHERE))?;
    let end = own[where_pos + 1..]
        .iter()
        .position(at_clause_end)
        .map_or(own.len(), |p| where_pos + 1 + p);
    let clause = &own[where_pos + 1..end];
    if clause.is_empty() {
        return None;
    }

    let predicate = parse_disjunction(clause, tree, node_id, 0);
    let mut unbound_columns = Vec::new();
    collect_unbound(&predicate, &mut unbound_columns);
    Some(Selection {
        predicate,
        unbound_columns,
    })
}

fn at_clause_end(token: &Token) -> bool {
    matches!(
        kw(token),
        Keyword::GROUP
            | Keyword::ORDER
            | Keyword::HAVING
            | Keyword::LIMIT
            | Keyword::UNION
            | Keyword::INTERSECT
            | Keyword::EXCEPT
    )
}

fn collect_unbound(predicate: &Predicate, out: &mut Vec<String>) {
    match predicate {
        Predicate::Compare { left, right, .. } => {
            for operand in [left, right] {
                if let Operand::Column(ColumnRef {
                    table: None,
                    column,
                }) = operand
                {
                    if !out.contains(column) {
                        out.push(column.clone());
                    }
                }
            }
        }
        Predicate::And(parts) | Predicate::Or(parts) => {
            for part in parts {
                collect_unbound(part, out);
            }
        }
        Predicate::Not(inner) => collect_unbound(inner, out),
        Predicate::Opaque(_) => {}
    }
}

/// OR level of the precedence climb.
fn parse_disjunction(
    clause: &[Token],
    tree: &QueryTree,
    node_id: usize,
    depth: usize,
) -> Predicate {
    let parts = split_top_level(clause, Keyword::OR);
    if parts.len() > 1 {
        Predicate::Or(
            parts
                .into_iter()
                .map(|r| parse_conjunction(&clause[r.0..r.1], tree, node_id, depth))
                .collect(),
        )
    } else {
        parse_conjunction(clause, tree, node_id, depth)
    }
}

/// AND level of the precedence climb.
fn parse_conjunction(
    clause: &[Token],
    tree: &QueryTree,
    node_id: usize,
    depth: usize,
) -> Predicate {
    let parts = split_top_level(clause, Keyword::AND);
    if parts.len() > 1 {
        Predicate::And(
            parts
                .into_iter()
                .map(|r| parse_atom(&clause[r.0..r.1], tree, node_id, depth))
                .collect(),
        )
    } else {
        parse_atom(clause, tree, node_id, depth)
    }
}

fn split_top_level(clause: &[Token], keyword: Keyword) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, token) in clause.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            _ if depth == 0 && is_kw(token, keyword) => {
                ranges.push((start, i));
                start = i + 1;
            }
            _ => {}
        }
    }
    ranges.push((start, clause.len()));
    ranges.retain(|(s, e)| e > s);
    ranges
}

fn parse_atom(clause: &[Token], tree: &QueryTree, node_id: usize, depth: usize) -> Predicate {
    if clause.is_empty() {
        return Predicate::Opaque(String::new());
    }
    if depth >= MAX_PREDICATE_DEPTH {
        return Predicate::Opaque(joined_text(clause));
    }

    // NOT atom
    if is_kw(&clause[0], Keyword::NOT) {
        return Predicate::Not(Box::new(parse_atom(
            &clause[1..],
            tree,
            node_id,
            depth + 1,
        )));
    }

    // Fully parenthesized group
    if matches!(clause.first(), Some(Token::LParen)) && group_spans_whole(clause) {
        return parse_disjunction(&clause[1..clause.len() - 1], tree, node_id, depth + 1);
    }

    // Plain comparison
    if let Some((left, after_left)) = parse_operand_at(clause, 0, tree, node_id) {
        if let Some(op) = clause.get(after_left).and_then(compare_op) {
            if let Some((right, after_right)) = parse_operand_at(clause, after_left + 1, tree, node_id)
            {
                if after_right == clause.len() {
                    return Predicate::Compare { left, op, right };
                }
            }
        }
    }

    // IN lists, LIKE, BETWEEN, EXISTS, inequality — kept, not modeled.
    Predicate::Opaque(joined_text(clause))
}

fn group_spans_whole(clause: &[Token]) -> bool {
    let mut depth = 0usize;
    for (i, token) in clause.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    return i == clause.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

/// Parse one comparison operand starting at `i`.
///
/// Shared with the join resolver, which reads ON-clause conditions with
/// the same grammar.
pub(crate) fn parse_operand_at(
    own: &[Token],
    i: usize,
    tree: &QueryTree,
    node_id: usize,
) -> Option<(Operand, usize)> {
    match own.get(i)? {
        Token::Number(n, _) => Some((Operand::Literal(n.clone()), i + 1)),
        Token::SingleQuotedString(s) => {
            Some((Operand::Literal(format!("'{s}'")), i + 1))
        }
        Token::Minus => {
            // negative literal
            if let Some(Token::Number(n, _)) = own.get(i + 1) {
                Some((Operand::Literal(format!("-{n}")), i + 2))
            } else {
                None
            }
        }
        Token::LParen => {
            // parenthesized expression (or a subquery hole): opaque operand
            let close = matching(own, i)?;
            Some((
                Operand::Expr(joined_text(&own[i..=close])),
                close + 1,
            ))
        }
        _ => {
            let (raw, next) = crate::token::read_name_chain(own, i)?;
            // function call → opaque expression operand
            if matches!(own.get(next), Some(Token::LParen)) {
                let close = matching(own, next)?;
                return Some((
                    Operand::Expr(joined_text(&own[i..=close])),
                    close + 1,
                ));
            }
            let column_ref = if let Some((qualifier, column)) = raw.rsplit_once('.') {
                ColumnRef {
                    table: Some(resolve_qualifier(tree, node_id, qualifier)),
                    column: normalize_identifier(column),
                }
            } else {
                ColumnRef {
                    table: bind_unqualified(tree, node_id),
                    column: normalize_identifier(&raw),
                }
            };
            Some((Operand::Column(column_ref), next))
        }
    }
}

fn matching(own: &[Token], lparen: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in own.iter().enumerate().skip(lparen) {
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
