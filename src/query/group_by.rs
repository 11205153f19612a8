//! GROUP BY extractor.

use sqlparser::tokenizer::Token;

use crate::query::binding::{bind_unqualified, resolve_qualifier};
use crate::query::model::ColumnRef;
use crate::query::tree::QueryTree;
use crate::token::names::normalize_identifier;
use crate::token::{is_kw, kw, Keyword};

/// Extract the GROUP BY column list of one scope; `None` when the clause
/// is absent or empty.
pub fn extract_group_by(tree: &QueryTree, node_id: usize) -> Option<Vec<ColumnRef>> {
    let own = tree.own_tokens(node_id);
    let group_pos = own
        .iter()
        .enumerate()
        .position(|(i, t)| {
            is_kw(t, Keyword::GROUP) && matches!(own.get(i + 1).map(kw), Some(Keyword::BY))
        })?;
    let start = group_pos + 2;
    let end = own[start..]
        .iter()
        .position(|t| {
            matches!(
                kw(t),
                Keyword::ORDER
                    | Keyword::HAVING
                    | Keyword::LIMIT
                    | Keyword::UNION
                    | Keyword::INTERSECT
                    | Keyword::EXCEPT
            )
        })
        .map_or(own.len(), |p| start + p);

    let mut columns = Vec::new();
    let mut i = start;
    while i < end {
        match &own[i] {
            Token::Comma => i += 1,
            _ => {
                let Some((raw, next)) = crate::token::read_name_chain(&own, i) else {
                    // positional (`GROUP BY 1`) and expression entries are
                    // not column references
                    i += 1;
                    continue;
                };
                if matches!(own.get(next), Some(Token::LParen)) {
                    // function-call entry; skip the whole call
                    i = skip_group(&own, next).unwrap_or(end);
                    continue;
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
                columns.push(column_ref);
                i = next;
            }
        }
    }
    if columns.is_empty() {
        None
    } else {
        Some(columns)
    }
}

fn skip_group(own: &[Token], lparen: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in own.iter().enumerate().skip(lparen) {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
