//! Narrow typed facade over the external tokenizer.
//!
//! The upstream `sqlparser` tokenizer does the lexing; this module exposes
//! only what the core needs per statement — a coarse statement kind, the
//! ordered significant tokens, and the source span — so nothing downstream
//! depends on the rest of the upstream representation. Scripts are split
//! into statements here, and a tokenizer failure on one fragment degrades
//! that fragment instead of the whole file.

use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, TokenWithSpan, Tokenizer};

use crate::error::TokenizeError;

pub mod names;

pub use sqlparser::keywords::Keyword;

/// Statements larger than this are skipped as a soft failure; crawled files
/// occasionally contain megabyte-scale INSERT blobs.
pub const MAX_STATEMENT_TOKENS: usize = 10_000;

const MAX_STATEMENT_TEXT: usize = 4_000;

/// Coarse statement classification, the only statement-kind signal the core
/// consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// `CREATE TABLE ...`
    CreateTable,
    /// `ALTER TABLE ...`
    AlterTable,
    /// `CREATE [UNIQUE] INDEX ...`
    CreateIndex,
    /// A SELECT-shaped query statement.
    Query,
    /// Anything else (INSERT, GRANT, vendor noise); ignored by the core.
    Other,
}

impl StatementKind {
    /// True for the schema-definition kinds.
    pub fn is_ddl(self) -> bool {
        matches!(
            self,
            StatementKind::CreateTable | StatementKind::AlterTable | StatementKind::CreateIndex
        )
    }
}

/// Source location of a statement within its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSpan {
    /// 1-based line of the first token.
    pub start_line: u64,
    /// 1-based column of the first token.
    pub start_column: u64,
    /// 1-based line of the last token.
    pub end_line: u64,
    /// 1-based column of the last token.
    pub end_column: u64,
}

/// One classified statement: kind, significant tokens, span, and a bounded
/// normalized text rendering.
#[derive(Debug, Clone)]
pub struct SqlStatement {
    /// Coarse classification.
    pub kind: StatementKind,
    /// Ordered tokens with whitespace and comments removed.
    pub tokens: Vec<Token>,
    /// Location of the statement in its source file.
    pub span: SourceSpan,
    /// Whitespace-normalized statement text, truncated to a bounded length.
    pub text: String,
}

impl SqlStatement {
    /// True when the statement exceeds the processing size limit.
    pub fn is_oversized(&self) -> bool {
        self.tokens.len() > MAX_STATEMENT_TOKENS
    }
}

/// Result of tokenizing one script.
#[derive(Debug, Default)]
pub struct TokenizedScript {
    /// Statements in source order.
    pub statements: Vec<SqlStatement>,
    /// Fragments the tokenizer rejected even after fallback splitting.
    pub unparsed_fragments: usize,
}

/// Tokenize a whole script, failing on the first tokenizer error.
pub fn tokenize(sql: &str) -> Result<Vec<SqlStatement>, TokenizeError> {
    let raw = raw_tokens(sql)?;
    Ok(split_statements(raw))
}

/// Tokenize a script, degrading gracefully on tokenizer errors.
///
/// If the whole text tokenizes, that result is used. Otherwise the text is
/// split on `;` and each fragment is tokenized independently; fragments that
/// still fail are counted as unparsed and skipped, so one unterminated
/// string does not lose the rest of the file.
pub fn tokenize_script(sql: &str) -> TokenizedScript {
    match tokenize(sql) {
        Ok(statements) => TokenizedScript {
            statements,
            unparsed_fragments: 0,
        },
        Err(_) => {
            let mut script = TokenizedScript::default();
            for fragment in sql.split(';') {
                if fragment.trim().is_empty() {
                    continue;
                }
                match tokenize(fragment) {
                    Ok(statements) => script.statements.extend(statements),
                    Err(_) => script.unparsed_fragments += 1,
                }
            }
            script
        }
    }
}

fn raw_tokens(sql: &str) -> Result<Vec<TokenWithSpan>, TokenizeError> {
    Tokenizer::new(&GenericDialect {}, sql)
        .tokenize_with_location()
        .map_err(|e| TokenizeError::Upstream {
            message: e.message,
            line: e.location.line,
            column: e.location.column,
        })
}

fn split_statements(raw: Vec<TokenWithSpan>) -> Vec<SqlStatement> {
    let mut statements = Vec::new();
    let mut current: Vec<TokenWithSpan> = Vec::new();
    let mut depth = 0usize;

    for tws in raw {
        match &tws.token {
            Token::Whitespace(_) => continue,
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::SemiColon if depth == 0 => {
                if let Some(stmt) = finish_statement(std::mem::take(&mut current)) {
                    statements.push(stmt);
                }
                continue;
            }
            _ => {}
        }
        current.push(tws);
    }
    if let Some(stmt) = finish_statement(current) {
        statements.push(stmt);
    }
    statements
}

fn finish_statement(raw: Vec<TokenWithSpan>) -> Option<SqlStatement> {
    if raw.is_empty() {
        return None;
    }
    let span = SourceSpan {
        start_line: raw[0].span.start.line,
        start_column: raw[0].span.start.column,
        end_line: raw[raw.len() - 1].span.end.line,
        end_column: raw[raw.len() - 1].span.end.column,
    };
    let tokens: Vec<Token> = raw.into_iter().map(|t| t.token).collect();
    let kind = classify(&tokens);
    let text = joined_text(&tokens);
    Some(SqlStatement {
        kind,
        tokens,
        span,
        text,
    })
}

/// Classify a statement from its leading keywords.
fn classify(tokens: &[Token]) -> StatementKind {
    let mut first_words = tokens.iter().filter_map(|t| match t {
        Token::Word(w) => Some(w.keyword),
        Token::LParen => Some(Keyword::NoKeyword),
        _ => None,
    });

    match first_words.next() {
        Some(Keyword::CREATE) => {
            // CREATE [OR REPLACE] [TEMPORARY] TABLE vs CREATE [UNIQUE] INDEX
            for token in tokens.iter().take(6) {
                match kw(token) {
                    Keyword::TABLE => return StatementKind::CreateTable,
                    Keyword::INDEX => return StatementKind::CreateIndex,
                    _ => {}
                }
            }
            StatementKind::Other
        }
        Some(Keyword::ALTER) => {
            if tokens.iter().take(3).any(|t| is_kw(t, Keyword::TABLE)) {
                StatementKind::AlterTable
            } else {
                StatementKind::Other
            }
        }
        Some(Keyword::SELECT) => StatementKind::Query,
        // `(SELECT ...) UNION ...` and `WITH cte AS (...) SELECT ...`
        Some(Keyword::NoKeyword) | Some(Keyword::WITH) => {
            if tokens.iter().any(|t| is_kw(t, Keyword::SELECT)) {
                StatementKind::Query
            } else {
                StatementKind::Other
            }
        }
        _ => StatementKind::Other,
    }
}

/// Keyword of a token, `NoKeyword` for everything that is not a keyword.
pub fn kw(token: &Token) -> Keyword {
    match token {
        Token::Word(w) => w.keyword,
        _ => Keyword::NoKeyword,
    }
}

/// True when the token is the given keyword.
pub fn is_kw(token: &Token, keyword: Keyword) -> bool {
    kw(token) == keyword
}

/// Identifier-ish payload of a token: bare/quoted word or quoted string.
pub fn word_value(token: &Token) -> Option<&str> {
    match token {
        Token::Word(w) => Some(&w.value),
        Token::SingleQuotedString(s) | Token::DoubleQuotedString(s) => Some(s),
        _ => None,
    }
}

/// Render a token slice as whitespace-normalized text, bounded in length.
pub fn joined_text(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&token.to_string());
        if out.len() > MAX_STATEMENT_TEXT {
            out.truncate(MAX_STATEMENT_TEXT);
            out.push_str(" ...");
            break;
        }
    }
    out
}

/// Keywords that terminate a name chain even when unquoted.
///
/// The tokenizer tags many harmless identifiers (`year`, `status`, `data`)
/// as keywords; only the structural ones may not begin or continue a name.
pub fn is_reserved_stop(keyword: Keyword) -> bool {
    matches!(
        keyword,
        Keyword::SELECT
            | Keyword::FROM
            | Keyword::WHERE
            | Keyword::GROUP
            | Keyword::ORDER
            | Keyword::BY
            | Keyword::HAVING
            | Keyword::LIMIT
            | Keyword::JOIN
            | Keyword::INNER
            | Keyword::LEFT
            | Keyword::RIGHT
            | Keyword::FULL
            | Keyword::CROSS
            | Keyword::OUTER
            | Keyword::ON
            | Keyword::USING
            | Keyword::AS
            | Keyword::AND
            | Keyword::OR
            | Keyword::NOT
            | Keyword::NULL
            | Keyword::IN
            | Keyword::IS
            | Keyword::EXISTS
            | Keyword::BETWEEN
            | Keyword::LIKE
            | Keyword::UNION
            | Keyword::INTERSECT
            | Keyword::EXCEPT
            | Keyword::CREATE
            | Keyword::TABLE
            | Keyword::ALTER
            | Keyword::ADD
            | Keyword::DROP
            | Keyword::PRIMARY
            | Keyword::FOREIGN
            | Keyword::REFERENCES
            | Keyword::CONSTRAINT
            | Keyword::UNIQUE
            | Keyword::INDEX
            | Keyword::DEFAULT
            | Keyword::SET
            | Keyword::VALUES
            | Keyword::INSERT
            | Keyword::UPDATE
            | Keyword::DELETE
            | Keyword::INTO
            | Keyword::DISTINCT
            | Keyword::CASE
            | Keyword::WHEN
            | Keyword::THEN
            | Keyword::ELSE
            | Keyword::END
            | Keyword::WITH
    )
}

/// Read a possibly qualified, possibly bracketed name chain starting at
/// `start`: `users`, `public.users`, `[dbo].[Orders]`, `"a"."b"`.
///
/// Returns the raw dotted name and the index one past the chain.
pub fn read_name_chain(tokens: &[Token], start: usize) -> Option<(String, usize)> {
    let mut i = start;
    let mut parts: Vec<String> = Vec::new();

    loop {
        match tokens.get(i) {
            Some(Token::Word(w)) if !is_reserved_stop(w.keyword) || w.quote_style.is_some() => {
                parts.push(w.value.clone());
                i += 1;
            }
            Some(Token::SingleQuotedString(s)) | Some(Token::DoubleQuotedString(s)) => {
                parts.push(s.clone());
                i += 1;
            }
            Some(Token::LBracket) => match tokens.get(i + 1) {
                Some(token) => {
                    let value = word_value(token)?.to_string();
                    if !matches!(tokens.get(i + 2), Some(Token::RBracket)) {
                        return None;
                    }
                    parts.push(value);
                    i += 3;
                }
                None => return None,
            },
            _ => break,
        }
        if matches!(tokens.get(i), Some(Token::Period)) {
            i += 1;
            continue;
        }
        break;
    }

    if parts.is_empty() {
        None
    } else {
        Some((parts.join("."), i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_create_alter_index_and_query() {
        let script = "CREATE TABLE t (a INT); ALTER TABLE t ADD COLUMN b INT; \
                      CREATE UNIQUE INDEX ix ON t (a); SELECT a FROM t; DROP TABLE t;";
        let statements = tokenize(script).expect("script should tokenize");
        let kinds: Vec<StatementKind> = statements.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StatementKind::CreateTable,
                StatementKind::AlterTable,
                StatementKind::CreateIndex,
                StatementKind::Query,
                StatementKind::Other,
            ]
        );
    }

    #[test]
    fn semicolons_inside_parens_do_not_split() {
        let statements = tokenize("SELECT a FROM t WHERE b = 'x;y'").expect("should tokenize");
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn tokenize_script_degrades_per_fragment() {
        // The unterminated string poisons whole-script tokenization; the
        // fallback recovers the valid fragment and counts the bad one.
        let script = "SELECT 'unterminated; CREATE TABLE t (a INT)";
        let result = tokenize_script(script);
        assert_eq!(result.unparsed_fragments, 1);
        assert_eq!(result.statements.len(), 1);
        assert_eq!(result.statements[0].kind, StatementKind::CreateTable);
    }

    #[test]
    fn read_name_chain_handles_quoting_styles() {
        let tokens = tokenize("SELECT [dbo].[Orders]").expect("should tokenize")[0]
            .tokens
            .clone();
        let (name, next) = read_name_chain(&tokens, 1).expect("chain should parse");
        assert_eq!(name, "dbo.Orders");
        assert_eq!(next, tokens.len());
    }

    #[test]
    fn statement_spans_cover_their_tokens() {
        let statements = tokenize("SELECT 1;\nSELECT 2;").expect("should tokenize");
        assert_eq!(statements[0].span.start_line, 1);
        assert_eq!(statements[1].span.start_line, 2);
    }
}
