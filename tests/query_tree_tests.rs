use sqlsift::error::QueryTreeError;
use sqlsift::query::{build_tree, JoinKind, QueryTree};
use sqlsift::token::tokenize;

fn tree_for(sql: &str) -> QueryTree {
    let stmt = tokenize(sql).expect("should tokenize").remove(0);
    build_tree(&stmt).expect("tree should build")
}

#[test]
fn flat_select_is_one_scope() {
    let tree = tree_for("SELECT a, b FROM t WHERE a = 1");
    assert_eq!(tree.len(), 1);
    assert!(tree.root().parent.is_none());
    assert!(tree.root().children.is_empty());
}

#[test]
fn k_levels_of_nesting_give_k_plus_one_nodes() {
    for k in 1..=6 {
        let mut sql = String::from("SELECT a FROM t WHERE x IN ");
        for _ in 0..k - 1 {
            sql.push_str("(SELECT a FROM t WHERE x IN ");
        }
        sql.push_str("(SELECT 1)");
        for _ in 0..k - 1 {
            sql.push(')');
        }
        let tree = tree_for(&sql);
        assert_eq!(tree.len(), k + 1, "k = {k}");

        // exactly one parent per node except the root
        let mut current = tree.len() - 1;
        let mut hops = 0;
        while let Some(parent) = tree.node(current).parent {
            current = parent;
            hops += 1;
        }
        assert_eq!(current, 0);
        assert_eq!(hops, k);
    }
}

#[test]
fn from_clause_subquery_is_a_child_scope() {
    let tree = tree_for("SELECT s.a FROM (SELECT a FROM t) s WHERE s.a > 1");
    assert_eq!(tree.len(), 2);
    assert_eq!(tree.node(1).parent, Some(0));
    assert_eq!(tree.root().children, vec![1]);
    // the subquery instance is visible as a FROM item of the root
    assert_eq!(tree.root().from_items.len(), 1);
    assert!(tree.root().from_items[0].name.is_none());
    assert_eq!(tree.root().from_items[0].alias.as_deref(), Some("s"));
}

#[test]
fn scalar_and_in_subqueries_become_scopes() {
    let tree = tree_for(
        "SELECT a, (SELECT MAX(v) FROM m) FROM t \
         WHERE t.id IN (SELECT tid FROM u) AND EXISTS (SELECT 1 FROM w)",
    );
    assert_eq!(tree.len(), 4);
    for id in 1..tree.len() {
        assert_eq!(tree.node(id).parent, Some(0));
    }
}

#[test]
fn own_text_excludes_children() {
    let tree = tree_for("SELECT a FROM t WHERE t.id IN (SELECT tid FROM u)");
    let own = tree.own_tokens(0);
    let own_text = own.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ");
    assert!(!own_text.contains("tid"));
    assert!(tree.node(1).text.contains("tid"));
}

#[test]
fn union_and_intersect_branches() {
    let tree = tree_for("SELECT a FROM t UNION SELECT b FROM u INTERSECT SELECT c FROM v");
    assert_eq!(tree.root().children.len(), 3);
    assert!(tree
        .root()
        .children
        .iter()
        .all(|&c| tree.node(c).parent == Some(0)));
}

#[test]
fn union_of_parenthesized_selects_does_not_double_count() {
    let tree = tree_for("(SELECT a FROM t) UNION (SELECT b FROM u)");
    // two paren scopes under the root, no extra branch nodes
    assert_eq!(tree.len(), 3);
    assert_eq!(tree.root().children.len(), 2);
}

#[test]
fn statement_without_select_fails_tree_build() {
    let stmt = tokenize("INSERT INTO t VALUES (1)")
        .expect("should tokenize")
        .remove(0);
    assert!(matches!(
        build_tree(&stmt),
        Err(QueryTreeError::NoRootSelect)
    ));
}

#[test]
fn unbalanced_nested_scope_degrades_without_failing_ancestors() {
    let stmt = tokenize("SELECT a FROM t WHERE t.id IN (SELECT tid FROM u")
        .expect("should tokenize")
        .remove(0);
    let tree = build_tree(&stmt).expect("root should survive");
    assert_eq!(tree.len(), 2);
    assert!(!tree.root().unparsed);
    assert!(tree.node(1).unparsed);
}

#[test]
fn dominant_join_kind_is_most_frequent() {
    let tree = tree_for(
        "SELECT * FROM a \
         LEFT JOIN b ON a.id = b.aid \
         LEFT JOIN c ON a.id = c.aid \
         JOIN d ON a.id = d.aid",
    );
    assert_eq!(tree.root().dominant_join, Some(JoinKind::Left));

    let tree = tree_for("SELECT * FROM a, b WHERE a.id = b.aid");
    assert_eq!(tree.root().dominant_join, None);
}
