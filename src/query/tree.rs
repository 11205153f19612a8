//! Lexical scope discovery over a query statement's token stream.
//!
//! A scope begins at each parenthesized SELECT (FROM-clause subquery,
//! EXISTS/IN subquery, scalar subquery) and at each branch of a set
//! operation. Nesting is unbounded in crawled SQL, so discovery is a
//! single left-to-right pass with an explicit stack — never call-depth
//! recursion.

use sqlparser::tokenizer::Token;

use crate::error::QueryTreeError;
use crate::query::join::{from_items, FromItem};
use crate::query::model::JoinKind;
use crate::token::{is_kw, kw, joined_text, Keyword, SqlStatement};

/// One lexical scope of a query statement.
#[derive(Debug, Clone)]
pub struct QueryNode {
    /// Scope id; index into the owning tree's arena.
    pub id: usize,
    /// Parent scope id; `None` only for the root.
    pub parent: Option<usize>,
    /// Child scope ids in source order.
    pub children: Vec<usize>,
    /// Start of this scope's token range (inclusive).
    pub start: usize,
    /// End of this scope's token range (exclusive).
    pub end: usize,
    /// Raw substatement text, bounded in length.
    pub text: String,
    /// True when the scope's boundaries could not be parsed; the node is
    /// excluded from clause extraction but its ancestors are unaffected.
    pub unparsed: bool,
    /// Most frequent explicit join kind in this scope's own text.
    pub dominant_join: Option<JoinKind>,
    /// Table introductions from this scope's FROM clause.
    pub from_items: Vec<FromItem>,
}

/// Arena of all scopes for one statement; node 0 is the root.
#[derive(Debug)]
pub struct QueryTree {
    nodes: Vec<QueryNode>,
    tokens: Vec<Token>,
}

impl QueryTree {
    /// Number of scopes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the tree has no scopes (never the case after a successful
    /// build).
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The outermost scope.
    pub fn root(&self) -> &QueryNode {
        &self.nodes[0]
    }

    /// Scope by id.
    pub fn node(&self, id: usize) -> &QueryNode {
        &self.nodes[id]
    }

    /// All scopes in discovery order (root first).
    pub fn nodes(&self) -> impl Iterator<Item = &QueryNode> {
        self.nodes.iter()
    }

    /// The statement's full token stream.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// The scope's own tokens: its range minus the ranges of its children.
    ///
    /// The parentheses around a child subquery stay in, so an adjacent
    /// `( )` pair marks a subquery hole for the extractors.
    pub fn own_tokens(&self, id: usize) -> Vec<Token> {
        self.own_token_indices(id)
            .into_iter()
            .map(|i| self.tokens[i].clone())
            .collect()
    }

    fn own_token_indices(&self, id: usize) -> Vec<usize> {
        let node = &self.nodes[id];
        let mut holes: Vec<(usize, usize)> = node
            .children
            .iter()
            .map(|&c| (self.nodes[c].start, self.nodes[c].end))
            .collect();
        holes.sort_unstable();

        let mut out = Vec::with_capacity(node.end - node.start);
        let mut i = node.start;
        for (hs, he) in holes {
            while i < hs.min(node.end) {
                out.push(i);
                i += 1;
            }
            i = i.max(he);
        }
        while i < node.end {
            out.push(i);
            i += 1;
        }
        out
    }
}

/// Discover the scope tree of one query statement.
///
/// Fails only when no SELECT keyword can be located at all; a nested scope
/// with unparseable boundaries degrades to `unparsed` instead.
pub fn build_tree(stmt: &SqlStatement) -> Result<QueryTree, QueryTreeError> {
    if stmt.tokens.is_empty() {
        return Err(QueryTreeError::EmptyStatement);
    }
    if !stmt.tokens.iter().any(|t| is_kw(t, Keyword::SELECT)) {
        return Err(QueryTreeError::NoRootSelect);
    }

    let tokens = stmt.tokens.clone();
    let mut nodes = vec![QueryNode {
        id: 0,
        parent: None,
        children: Vec::new(),
        start: 0,
        end: tokens.len(),
        text: String::new(),
        unparsed: false,
        dominant_join: None,
        from_items: Vec::new(),
    }];

    // Pass 1: parenthesized SELECT scopes, explicit stacks only.
    let mut paren_stack: Vec<Option<usize>> = Vec::new();
    let mut scope_stack: Vec<usize> = vec![0];
    for i in 0..tokens.len() {
        match &tokens[i] {
            Token::LParen => {
                if matches!(tokens.get(i + 1).map(kw), Some(Keyword::SELECT)) {
                    let id = nodes.len();
                    let parent = *scope_stack.last().unwrap_or(&0);
                    nodes.push(QueryNode {
                        id,
                        parent: Some(parent),
                        children: Vec::new(),
                        start: i + 1,
                        end: tokens.len(),
                        text: String::new(),
                        unparsed: false,
                        dominant_join: None,
                        from_items: Vec::new(),
                    });
                    nodes[parent].children.push(id);
                    paren_stack.push(Some(id));
                    scope_stack.push(id);
                } else {
                    paren_stack.push(None);
                }
            }
            Token::RParen => {
                if let Some(entry) = paren_stack.pop() {
                    if let Some(id) = entry {
                        nodes[id].end = i;
                        scope_stack.pop();
                    }
                }
                // a stray closer with no opener is ignored
            }
            _ => {}
        }
    }
    // Unclosed scopes reach the end of the statement; their boundaries are
    // not trustworthy, so they degrade rather than fail the tree.
    for entry in paren_stack.into_iter().flatten() {
        nodes[entry].unparsed = true;
    }

    let mut tree = QueryTree { nodes, tokens };

    // Pass 2: set-operation branches become child scopes.
    split_set_operations(&mut tree);

    // Pass 3: per-node derived data.
    for id in 0..tree.nodes.len() {
        let mut children = std::mem::take(&mut tree.nodes[id].children);
        children.sort_by_key(|&c| tree.nodes[c].start);
        tree.nodes[id].children = children;
        let own = tree.own_tokens(id);
        tree.nodes[id].dominant_join = dominant_join_kind(&own);
        tree.nodes[id].from_items = from_items(&own);
        let range = tree.nodes[id].start..tree.nodes[id].end;
        tree.nodes[id].text = joined_text(&tree.tokens[range]);
    }

    Ok(tree)
}

/// Split every scope containing top-level UNION/INTERSECT/EXCEPT into
/// per-branch child scopes. Only branches that carry their own SELECT
/// become nodes; a branch that is just a parenthesized subquery hole is
/// already a scope.
fn split_set_operations(tree: &mut QueryTree) {
    let existing = tree.nodes.len();
    for id in 0..existing {
        let own = tree.own_token_indices(id);
        let operator_positions: Vec<usize> = own
            .iter()
            .copied()
            .filter(|&i| {
                matches!(
                    kw(&tree.tokens[i]),
                    Keyword::UNION | Keyword::INTERSECT | Keyword::EXCEPT
                )
            })
            .collect();
        if operator_positions.is_empty() {
            continue;
        }

        // Branch index groups between operator positions.
        let mut branches: Vec<Vec<usize>> = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        for i in own {
            if operator_positions.contains(&i) {
                branches.push(std::mem::take(&mut current));
            } else {
                current.push(i);
            }
        }
        branches.push(current);

        for branch in branches {
            let has_select = branch.iter().any(|&i| is_kw(&tree.tokens[i], Keyword::SELECT));
            let (Some(&first), Some(&last)) = (branch.first(), branch.last()) else {
                continue;
            };
            if !has_select {
                continue;
            }
            let (start, end) = (first, last + 1);
            let branch_id = tree.nodes.len();
            tree.nodes.push(QueryNode {
                id: branch_id,
                parent: Some(id),
                children: Vec::new(),
                start,
                end,
                text: String::new(),
                unparsed: false,
                dominant_join: None,
                from_items: Vec::new(),
            });
            // Re-parent scopes that now fall inside this branch.
            let moved: Vec<usize> = tree.nodes[id]
                .children
                .iter()
                .copied()
                .filter(|&c| tree.nodes[c].start >= start && tree.nodes[c].end <= end)
                .collect();
            for child in &moved {
                tree.nodes[*child].parent = Some(branch_id);
                tree.nodes[branch_id].children.push(*child);
            }
            tree.nodes[id].children.retain(|c| !moved.contains(c));
            tree.nodes[id].children.push(branch_id);
        }
    }
}

/// The most frequent explicit join kind among a scope's own tokens.
fn dominant_join_kind(own: &[Token]) -> Option<JoinKind> {
    let mut counts: [(JoinKind, usize); 5] = [
        (JoinKind::Inner, 0),
        (JoinKind::Left, 0),
        (JoinKind::Right, 0),
        (JoinKind::Full, 0),
        (JoinKind::Cross, 0),
    ];
    for (i, token) in own.iter().enumerate() {
        if !is_kw(token, Keyword::JOIN) {
            continue;
        }
        let mut kind = JoinKind::Inner;
        let mut back = i;
        while back > 0 {
            back -= 1;
            match kw(&own[back]) {
                Keyword::OUTER => continue,
                Keyword::LEFT => kind = JoinKind::Left,
                Keyword::RIGHT => kind = JoinKind::Right,
                Keyword::FULL => kind = JoinKind::Full,
                Keyword::CROSS => kind = JoinKind::Cross,
                Keyword::INNER => kind = JoinKind::Inner,
                _ => {}
            }
            break;
        }
        for slot in counts.iter_mut() {
            if slot.0 == kind {
                slot.1 += 1;
            }
        }
    }
    counts
        .iter()
        .filter(|(_, n)| *n > 0)
        .max_by_key(|(_, n)| *n)
        .map(|(k, _)| *k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    fn tree_for(sql: &str) -> QueryTree {
        let stmt = tokenize(sql).expect("should tokenize").remove(0);
        build_tree(&stmt).expect("tree should build")
    }

    #[test]
    fn flat_query_has_single_scope() {
        let tree = tree_for("SELECT a FROM t WHERE a > 1");
        assert_eq!(tree.len(), 1);
        assert!(tree.root().parent.is_none());
    }

    #[test]
    fn nested_scopes_chain_parent_links() {
        let tree =
            tree_for("SELECT x FROM (SELECT y FROM (SELECT z FROM t) inner1) outer1 WHERE x > 0");
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.node(1).parent, Some(0));
        assert_eq!(tree.node(2).parent, Some(1));
        assert_eq!(tree.node(0).children, vec![1]);
        assert_eq!(tree.node(1).children, vec![2]);
    }

    #[test]
    fn own_tokens_exclude_child_ranges() {
        let tree = tree_for("SELECT x FROM (SELECT y FROM u) sub");
        let own = tree.own_tokens(0);
        assert!(!own.iter().any(|t| {
            matches!(t, Token::Word(w) if w.value == "y" || w.value == "u")
        }));
        // the paren pair survives as a subquery hole
        assert!(own.iter().any(|t| matches!(t, Token::LParen)));
    }

    #[test]
    fn exists_subquery_becomes_child_scope() {
        let tree = tree_for("SELECT a FROM t WHERE EXISTS (SELECT 1 FROM u WHERE u.id = t.id)");
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.node(1).parent, Some(0));
    }

    #[test]
    fn union_branches_become_children() {
        let tree = tree_for("SELECT a FROM t UNION SELECT b FROM u");
        // root + two branches
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.root().children.len(), 2);
        for &child in &tree.root().children {
            assert_eq!(tree.node(child).parent, Some(0));
        }
    }

    #[test]
    fn non_query_statement_is_rejected() {
        let stmt = tokenize("DELETE FROM t").expect("should tokenize").remove(0);
        assert!(matches!(
            build_tree(&stmt),
            Err(QueryTreeError::NoRootSelect)
        ));
    }

    #[test]
    fn dominant_join_kind_counts_own_text_only() {
        let tree = tree_for(
            "SELECT a FROM t LEFT JOIN u ON t.id = u.tid LEFT OUTER JOIN v ON t.id = v.tid \
             JOIN w ON t.id = w.tid",
        );
        assert_eq!(tree.root().dominant_join, Some(JoinKind::Left));
    }

    #[test]
    fn deep_nesting_is_handled_iteratively() {
        // 200 levels of nesting would overflow a recursive builder's stack
        // long before a real corpus would.
        let mut sql = String::from("SELECT a FROM t WHERE x IN ");
        for _ in 0..200 {
            sql.push_str("(SELECT a FROM t WHERE x IN ");
        }
        sql.push_str("(SELECT 1)");
        for _ in 0..200 {
            sql.push(')');
        }
        let tree = tree_for(&sql);
        assert_eq!(tree.len(), 202);
    }
}
