//! Identifier binding across lexical scopes.
//!
//! A qualified column's table part may be an alias from the current scope,
//! an alias over a child subquery, or an alias bound in an enclosing scope
//! (a correlated reference). Resolution walks the current scope first,
//! then ancestors; a qualifier that matches nothing is kept as written.

use crate::query::tree::QueryTree;

/// Resolve a table qualifier to the table name it binds to, walking the
/// scope chain from `node_id` upward.
pub(crate) fn resolve_qualifier(tree: &QueryTree, node_id: usize, qualifier: &str) -> String {
    let wanted = crate::token::names::normalize_relation_name(qualifier);
    let mut current = Some(node_id);
    while let Some(id) = current {
        let node = tree.node(id);
        for item in &node.from_items {
            if item.alias.as_deref() == Some(wanted.as_str()) {
                // A subquery alias has no underlying table; the alias is
                // the binding.
                return item.name.clone().unwrap_or(wanted);
            }
            if item.name.as_deref() == Some(wanted.as_str()) {
                return wanted;
            }
        }
        current = node.parent;
    }
    wanted
}

/// Bind an unqualified column to the nearest enclosing scope's single FROM
/// table. Ambiguity (zero or several candidate tables) yields `None`.
pub(crate) fn bind_unqualified(tree: &QueryTree, node_id: usize) -> Option<String> {
    let mut current = Some(node_id);
    while let Some(id) = current {
        let node = tree.node(id);
        if !node.from_items.is_empty() {
            if node.from_items.len() == 1 {
                return node.from_items[0].name.clone();
            }
            return None;
        }
        current = node.parent;
    }
    None
}
