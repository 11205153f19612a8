use sqlsift::schema::{
    apply_ddl, resolve_foreign_keys, KeyKind, Resolution, SchemaDelta, SchemaScope, SoftFailure,
    TypeCategory,
};
use sqlsift::token::tokenize;

fn build_schema(sql: &str) -> SchemaScope {
    let statements = tokenize(sql).expect("DDL should tokenize");
    let mut scope = SchemaScope::new();
    for stmt in &statements {
        let _ = apply_ddl(stmt, &mut scope);
    }
    resolve_foreign_keys(&mut scope);
    scope
}

#[test]
fn create_table_preserves_declaration_order() {
    let scope = build_schema(
        "CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(64) NOT NULL, bio TEXT);",
    );
    let users = scope.get("users").expect("users table");
    let names: Vec<&str> = users.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "name", "bio"]);
    assert_eq!(users.columns[0].ordinal, 0);
    assert_eq!(users.columns[2].ordinal, 2);
}

#[test]
fn create_table_is_idempotent_across_reparses() {
    let sql = "CREATE TABLE t (a INT PRIMARY KEY, b VARCHAR(10) DEFAULT 'x', UNIQUE (b));";
    let first = build_schema(sql);
    let second = build_schema(sql);
    assert_eq!(first.get("t"), second.get("t"));
}

#[test]
fn column_attributes_are_parsed() {
    let scope = build_schema(
        "CREATE TABLE t (
            id INT PRIMARY KEY,
            name VARCHAR(64) NOT NULL,
            status VARCHAR(16) DEFAULT 'new',
            flag BOOLEAN
        );",
    );
    let t = scope.get("t").expect("table t");

    let id = t.column("id").expect("id column");
    assert!(!id.nullable);
    assert!(id.unique);
    assert_eq!(id.category, TypeCategory::Numeric);

    let name = t.column("name").expect("name column");
    assert!(!name.nullable);
    assert_eq!(name.declared_type, "VARCHAR(64)");

    let status = t.column("status").expect("status column");
    assert_eq!(status.default.as_deref(), Some("'new'"));
    assert!(status.nullable);

    assert_eq!(
        t.column("flag").expect("flag column").category,
        TypeCategory::Boolean
    );
}

#[test]
fn spec_example_create_then_alter() {
    // CREATE TABLE t(a INT PRIMARY KEY, b INT); ALTER TABLE t ADD COLUMN c INT
    // yields columns [a, b, c] and one primary key [a].
    let scope = build_schema(
        "CREATE TABLE t(a INT PRIMARY KEY, b INT); ALTER TABLE t ADD COLUMN c INT;",
    );
    let t = scope.get("t").expect("table t");
    let names: Vec<&str> = t.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["a", "b", "c"]);

    let primaries: Vec<_> = t.keys.iter().filter(|k| k.kind == KeyKind::Primary).collect();
    assert_eq!(primaries.len(), 1);
    assert_eq!(primaries[0].columns, ["a".to_string()]);
}

#[test]
fn alter_add_column_appends_exactly_one() {
    let base = build_schema("CREATE TABLE t (a INT, b INT);");
    let altered = build_schema("CREATE TABLE t (a INT, b INT); ALTER TABLE t ADD COLUMN c INT;");
    let before = base.get("t").unwrap().columns.len();
    let after = altered.get("t").unwrap();
    assert_eq!(after.columns.len(), before + 1);
    assert_eq!(after.columns.last().unwrap().name, "c");
    assert_eq!(after.columns.last().unwrap().ordinal, before);
}

#[test]
fn alter_drop_and_modify_column() {
    let scope = build_schema(
        "CREATE TABLE t (a INT, b INT, c VARCHAR(10));
         ALTER TABLE t DROP COLUMN b;
         ALTER TABLE t MODIFY COLUMN c TEXT NOT NULL;",
    );
    let t = scope.get("t").expect("table t");
    assert!(t.column("b").is_none());
    let c = t.column("c").expect("c column");
    assert_eq!(c.declared_type, "TEXT");
    assert!(!c.nullable);
    // ordinals compact after the drop
    assert_eq!(c.ordinal, 1);
}

#[test]
fn duplicate_create_table_keeps_first_definition() {
    let statements = tokenize(
        "CREATE TABLE t (a INT, b INT); CREATE TABLE t (z TEXT);",
    )
    .expect("should tokenize");
    let mut scope = SchemaScope::new();

    let first = apply_ddl(&statements[0], &mut scope).expect("first create");
    assert_eq!(first, SchemaDelta::Created("t".to_string()));

    let second = apply_ddl(&statements[1], &mut scope).expect("second create");
    assert_eq!(
        second,
        SchemaDelta::Soft(SoftFailure::DuplicateTable("t".to_string()))
    );

    let t = scope.get("t").expect("table t");
    assert_eq!(t.columns.len(), 2);
    assert!(t.column("a").is_some());
    assert!(t.column("z").is_none());
}

#[test]
fn alter_unknown_table_is_soft_and_invents_nothing() {
    let statements = tokenize("ALTER TABLE ghost ADD COLUMN a INT;").expect("should tokenize");
    let mut scope = SchemaScope::new();
    let delta = apply_ddl(&statements[0], &mut scope).expect("alter should not error");
    assert_eq!(
        delta,
        SchemaDelta::Soft(SoftFailure::UnknownAlterTarget("ghost".to_string()))
    );
    assert!(scope.is_empty());
}

#[test]
fn table_level_constraints_are_collected() {
    let scope = build_schema(
        "CREATE TABLE orders (
            id INT,
            user_id INT,
            sku VARCHAR(32),
            PRIMARY KEY (id),
            CONSTRAINT fk_user FOREIGN KEY (user_id) REFERENCES users (id),
            UNIQUE (sku),
            KEY idx_user (user_id)
        );
        CREATE TABLE users (id INT PRIMARY KEY);",
    );
    let orders = scope.get("orders").expect("orders table");

    assert!(orders
        .keys
        .iter()
        .any(|k| k.kind == KeyKind::Primary && k.columns == ["id".to_string()]));
    assert!(orders
        .keys
        .iter()
        .any(|k| k.kind == KeyKind::Unique && k.columns == ["sku".to_string()]));
    assert!(orders
        .keys
        .iter()
        .any(|k| k.kind == KeyKind::Candidate && k.columns == ["user_id".to_string()]));

    assert_eq!(orders.foreign_keys.len(), 1);
    let fk = &orders.foreign_keys[0];
    assert_eq!(fk.columns, ["user_id".to_string()]);
    assert_eq!(fk.ref_table, "users");
    assert_eq!(fk.ref_columns, ["id".to_string()]);
    // users is created after orders; the end-of-unit pass resolves it
    assert_eq!(fk.resolution, Resolution::Resolved);
}

#[test]
fn forward_fk_resolves_only_after_second_pass() {
    let statements = tokenize(
        "CREATE TABLE child (pid INT, FOREIGN KEY (pid) REFERENCES parent (id));
         CREATE TABLE parent (id INT PRIMARY KEY);",
    )
    .expect("should tokenize");
    let mut scope = SchemaScope::new();
    for stmt in &statements {
        apply_ddl(stmt, &mut scope).expect("DDL should apply");
    }
    assert_eq!(
        scope.get("child").unwrap().foreign_keys[0].resolution,
        Resolution::Unresolved
    );

    let resolved = resolve_foreign_keys(&mut scope);
    assert_eq!(resolved, 1);
    assert_eq!(
        scope.get("child").unwrap().foreign_keys[0].resolution,
        Resolution::Resolved
    );
}

#[test]
fn fk_with_missing_ref_column_stays_unresolved() {
    let scope = build_schema(
        "CREATE TABLE parent (id INT);
         CREATE TABLE child (pid INT, FOREIGN KEY (pid) REFERENCES parent (nope));",
    );
    let fk = &scope.get("child").unwrap().foreign_keys[0];
    assert_eq!(fk.resolution, Resolution::Unresolved);
    // the unresolved reference is kept, not dropped
    assert_eq!(fk.ref_table, "parent");
    assert_eq!(fk.ref_columns, ["nope".to_string()]);
}

#[test]
fn inline_references_creates_foreign_key() {
    let scope = build_schema(
        "CREATE TABLE users (id INT PRIMARY KEY);
         CREATE TABLE posts (id INT PRIMARY KEY, author INT REFERENCES users (id));",
    );
    let posts = scope.get("posts").expect("posts table");
    assert_eq!(posts.foreign_keys.len(), 1);
    assert_eq!(posts.foreign_keys[0].columns, ["author".to_string()]);
    assert_eq!(posts.foreign_keys[0].resolution, Resolution::Resolved);
}

#[test]
fn create_index_statements_attach_to_tables() {
    let scope = build_schema(
        "CREATE TABLE t (a INT, b INT);
         CREATE INDEX idx_a ON t (a);
         CREATE UNIQUE INDEX idx_ab ON t (a, b);",
    );
    let t = scope.get("t").expect("table t");
    assert_eq!(t.indices.len(), 2);
    assert_eq!(t.indices[0].name.as_deref(), Some("idx_a"));
    assert!(!t.indices[0].unique);
    assert!(t.indices[1].unique);
    assert_eq!(
        t.indices[1].columns,
        vec!["a".to_string(), "b".to_string()]
    );
    // unique index membership marks the columns unique
    assert!(t.column("a").unwrap().unique);
}

#[test]
fn create_index_on_unknown_table_is_soft() {
    let statements = tokenize("CREATE INDEX idx ON ghost (a);").expect("should tokenize");
    let mut scope = SchemaScope::new();
    let delta = apply_ddl(&statements[0], &mut scope).expect("should not error");
    assert_eq!(
        delta,
        SchemaDelta::Soft(SoftFailure::UnknownIndexTarget("ghost".to_string()))
    );
}

#[test]
fn add_constraint_and_drop_constraint_round_trip() {
    let scope = build_schema(
        "CREATE TABLE t (a INT, b INT);
         ALTER TABLE t ADD CONSTRAINT uq_ab UNIQUE (a, b);
         ALTER TABLE t DROP CONSTRAINT uq_ab;",
    );
    let t = scope.get("t").expect("table t");
    assert!(t.keys.iter().all(|k| k.name.as_deref() != Some("uq_ab")));
}

#[test]
fn quoted_and_qualified_names_normalize() {
    let scope = build_schema(
        "CREATE TABLE `public`.`Users` (`Id` INT PRIMARY KEY);
         ALTER TABLE public.users ADD COLUMN email VARCHAR(128);",
    );
    let users = scope.get("users").expect("users under terminal name");
    assert!(users.column("id").is_some());
    assert!(users.column("email").is_some());
}

#[test]
fn malformed_ddl_skips_statement_and_continues() {
    let scope = build_schema(
        "CREATE TABLE;
         CREATE TABLE ok (a INT);",
    );
    assert_eq!(scope.len(), 1);
    assert!(scope.get("ok").is_some());
}

#[test]
fn vendor_noise_clauses_are_ignored() {
    let scope = build_schema(
        "CREATE TABLE t (
            a INT NOT NULL COMMENT 'primary field',
            b INT,
            CHECK (b > 0)
        );",
    );
    let t = scope.get("t").expect("table t");
    assert_eq!(t.columns.len(), 2);
    assert!(!t.column("a").unwrap().nullable);
}
