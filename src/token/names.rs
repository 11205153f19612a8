/// Return the identifier without surrounding quote characters.
///
/// Handles double quotes, single quotes, backticks, and square brackets,
/// the four quoting styles that survive in crawled SQL.
pub fn unquote_identifier(ident: &str) -> &str {
    let trimmed = ident.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('`', '`'), ('[', ']')] {
        if let Some(inner) = trimmed
            .strip_prefix(open)
            .and_then(|s| s.strip_suffix(close))
        {
            return inner;
        }
    }
    trimmed
}

/// Normalize an identifier for case-insensitive matching.
///
/// Trims whitespace, removes one layer of surrounding quotes, and
/// lowercases the result.
pub fn normalize_identifier(ident: &str) -> String {
    unquote_identifier(ident).to_ascii_lowercase()
}

/// Split a potentially schema-qualified name into `(qualifier, relation)`.
///
/// Handles dots inside quoted identifiers, e.g. `"my.schema"."table.name"`.
/// Returns `None` for unqualified names.
pub fn split_qualified(name: &str) -> Option<(String, String)> {
    let mut in_quote: Option<char> = None;
    let mut start = 0usize;
    let mut parts: Vec<&str> = Vec::new();

    for (idx, ch) in name.char_indices() {
        match (in_quote, ch) {
            (None, '"' | '`' | '\'') => in_quote = Some(ch),
            (None, '[') => in_quote = Some(']'),
            (Some(q), c) if c == q => in_quote = None,
            (None, '.') => {
                parts.push(name[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(name[start..].trim());

    if parts.len() < 2 {
        return None;
    }

    let qualifier = unquote_identifier(parts[parts.len() - 2]).to_string();
    let relation = unquote_identifier(parts[parts.len() - 1]).to_string();
    Some((qualifier, relation))
}

/// Normalize an object name to its terminal relation identifier.
///
/// Examples:
/// - `public.users` -> `users`
/// - `"Auth"."Grants"` -> `grants`
/// - `[dbo].[Orders]` -> `orders`
pub fn normalize_relation_name(name: &str) -> String {
    if let Some((_, relation)) = split_qualified(name.trim()) {
        return normalize_identifier(&relation);
    }
    normalize_identifier(name)
}

/// Build lookup candidates for resolving a table reference against a schema
/// scope, ordered from most to least specific.
///
/// Crawled schemas reference the same table as `users`, `public.users`,
/// `dbo.users`, or a quoted variant; the scope keys tables by the terminal
/// relation, so the terminal form always comes last as the broad fallback.
pub fn table_lookup_candidates(name: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    let normalized = normalize_identifier(name);
    candidates.push(normalized);
    if let Some((_, relation)) = split_qualified(name) {
        candidates.push(normalize_identifier(&relation));
    }

    let mut deduped: Vec<String> = Vec::new();
    for candidate in candidates {
        if !deduped.contains(&candidate) {
            deduped.push(candidate);
        }
    }
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquote_identifier_strips_all_four_styles() {
        assert_eq!(unquote_identifier("\"users\""), "users");
        assert_eq!(unquote_identifier("`users`"), "users");
        assert_eq!(unquote_identifier("'users'"), "users");
        assert_eq!(unquote_identifier("[users]"), "users");
        assert_eq!(unquote_identifier("users"), "users");
    }

    #[test]
    fn split_qualified_handles_quoted_dots() {
        assert_eq!(
            split_qualified(r#""my.schema"."table.name""#),
            Some(("my.schema".to_string(), "table.name".to_string()))
        );
        assert_eq!(split_qualified("users"), None);
    }

    #[test]
    fn normalize_relation_name_takes_terminal_component() {
        assert_eq!(normalize_relation_name("public.users"), "users");
        assert_eq!(normalize_relation_name("[dbo].[Orders]"), "orders");
        assert_eq!(normalize_relation_name("\"UID\""), "uid");
    }

    #[test]
    fn table_lookup_candidates_prefer_qualified_then_terminal() {
        assert_eq!(
            table_lookup_candidates("app.docs"),
            vec!["app.docs".to_string(), "docs".to_string()]
        );
        assert_eq!(table_lookup_candidates("docs"), vec!["docs".to_string()]);
    }
}
