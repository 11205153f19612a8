//! Projection extractor: the SELECT list as output expressions.

use sqlparser::tokenizer::Token;

use crate::query::model::ProjectionItem;
use crate::token::names::normalize_identifier;
use crate::token::{is_kw, kw, joined_text, Keyword};

/// Extract the SELECT list of a scope's own tokens.
///
/// `SELECT *` (and `t.*`) degrades to the wildcard sentinel rather than
/// failing — column-level expansion needs schema resolution that may be
/// unavailable for crawled queries.
pub fn extract_projection(own: &[Token]) -> Option<Vec<ProjectionItem>> {
    let select_pos = own.iter().position(|t| is_kw(t, Keyword::SELECT))?;
    let end = own[select_pos + 1..]
        .iter()
        .position(|t| is_kw(t, Keyword::FROM))
        .map_or(own.len(), |p| select_pos + 1 + p);
    let mut start = select_pos + 1;

    // SELECT [DISTINCT|ALL] [TOP n]
    while let Some(token) = own.get(start) {
        match kw(token) {
            Keyword::DISTINCT | Keyword::ALL => start += 1,
            Keyword::TOP => {
                start += 1;
                if matches!(own.get(start), Some(Token::Number(..))) {
                    start += 1;
                }
            }
            _ => break,
        }
    }
    if start >= end {
        return None;
    }

    let mut items = Vec::new();
    for (s, e) in split_commas(&own[start..end]) {
        let item = &own[start + s..start + e];
        if item.is_empty() {
            continue;
        }
        // Aggregate calls belong to the aggregation extractor, not the
        // projection list.
        if is_aggregate_item(item) {
            continue;
        }
        items.push(parse_item(item));
    }
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn is_aggregate_item(item: &[Token]) -> bool {
    let Some(Token::Word(w)) = item.first() else {
        return false;
    };
    crate::query::model::AggregateFunc::from_name(&w.value).is_some()
        && matches!(item.get(1), Some(Token::LParen))
}

fn split_commas(tokens: &[Token]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Comma if depth == 0 => {
                ranges.push((start, i));
                start = i + 1;
            }
            _ => {}
        }
    }
    ranges.push((start, tokens.len()));
    ranges
}

fn parse_item(item: &[Token]) -> ProjectionItem {
    // `*` or `t.*`
    if matches!(item.last(), Some(Token::Mul))
        && (item.len() == 1 || matches!(item.get(item.len() - 2), Some(Token::Period)))
    {
        return ProjectionItem::Wildcard;
    }

    // explicit AS alias
    if let Some(as_pos) = top_level_position(item, |t| is_kw(t, Keyword::AS)) {
        let alias = item
            .get(as_pos + 1)
            .and_then(crate::token::word_value)
            .map(normalize_identifier);
        return ProjectionItem::Expr {
            expr: joined_text(&item[..as_pos]),
            alias,
        };
    }

    // bare trailing alias: `expr alias` where both ends are words
    if item.len() >= 2 {
        let last_is_alias = matches!(
            item.last(),
            Some(Token::Word(w)) if !crate::token::is_reserved_stop(w.keyword)
        );
        let before_ok = matches!(
            item.get(item.len() - 2),
            Some(
                Token::Word(_)
                    | Token::RParen
                    | Token::Number(..)
                    | Token::SingleQuotedString(_)
                    | Token::Mul
            )
        );
        if last_is_alias && before_ok {
            let alias = crate::token::word_value(&item[item.len() - 1]).map(normalize_identifier);
            return ProjectionItem::Expr {
                expr: joined_text(&item[..item.len() - 1]),
                alias,
            };
        }
    }

    ProjectionItem::Expr {
        expr: joined_text(item),
        alias: None,
    }
}

fn top_level_position(tokens: &[Token], pred: impl Fn(&Token) -> bool) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            _ if depth == 0 && pred(token) => return Some(i),
            _ => {}
        }
    }
    None
}
