use std::fs;
use std::path::Path;

use sqlsift::pipeline::{
    discover_units, merge_batches, parse_unit, run_units, BatchSink, Deadline, FailureCounts,
    RunConfig, SourceUnit, UnitGranularity, UnitResult,
};

fn write_file(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).expect("fixture write");
}

fn config_for(input: &Path, output: &Path) -> RunConfig {
    let mut config = RunConfig::new(input.to_path_buf(), output.to_path_buf());
    config.workers = 2;
    config.batch_size = 2;
    config
}

fn unit_for(dir: &Path, names: &[&str]) -> SourceUnit {
    SourceUnit {
        id: "unit-under-test".to_string(),
        files: names.iter().map(|n| dir.join(n)).collect(),
    }
}

#[test]
fn parse_unit_builds_tables_and_queries() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(
        dir.path(),
        "schema.sql",
        "CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(64));
         CREATE TABLE posts (id INT PRIMARY KEY, uid INT,
             FOREIGN KEY (uid) REFERENCES users (id));",
    );
    write_file(
        dir.path(),
        "queries.sql",
        "SELECT u.name FROM users u JOIN posts p ON u.id = p.uid WHERE p.id > 10;",
    );

    let config = config_for(dir.path(), &dir.path().join("out"));
    let unit = unit_for(dir.path(), &["schema.sql", "queries.sql"]);
    let result = parse_unit(&unit, &config, &Deadline::after(None)).expect("unit should parse");

    assert_eq!(result.tables.len(), 2);
    assert_eq!(result.queries.len(), 1);
    assert_eq!(result.files, 2);
    let query = &result.queries[0];
    assert!(query.joins.is_some());
    assert!(query.selection.is_some());
}

#[test]
fn schema_resolves_across_files_within_a_unit() {
    let dir = tempfile::tempdir().expect("tempdir");
    // the referencing file comes first; CREATE statements from the second
    // file must still satisfy the foreign key
    write_file(
        dir.path(),
        "a_child.sql",
        "CREATE TABLE child (pid INT, FOREIGN KEY (pid) REFERENCES parent (id));",
    );
    write_file(dir.path(), "b_parent.sql", "CREATE TABLE parent (id INT);");

    let config = config_for(dir.path(), &dir.path().join("out"));
    let unit = unit_for(dir.path(), &["a_child.sql", "b_parent.sql"]);
    let result = parse_unit(&unit, &config, &Deadline::after(None)).expect("unit should parse");

    let child = result
        .tables
        .iter()
        .find(|t| t.name == "child")
        .expect("child table");
    assert_eq!(
        child.foreign_keys[0].resolution,
        sqlsift::schema::Resolution::Resolved
    );
}

#[test]
fn expired_deadline_discards_the_unit() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "a.sql", "CREATE TABLE t (a INT);");

    let config = config_for(dir.path(), &dir.path().join("out"));
    let unit = unit_for(dir.path(), &["a.sql"]);
    let result = parse_unit(&unit, &config, &Deadline::expired_now());
    assert!(result.is_err());
}

#[test]
fn timed_out_unit_contributes_nothing_to_the_sink() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "slow.sql", "CREATE TABLE t (a INT);");
    write_file(dir.path(), "fine.sql", "CREATE TABLE u (b INT);");
    let out = dir.path().join("out");

    let mut config = config_for(dir.path(), &out);
    config.timeout_secs = 0; // disabled: both units complete
    let units = discover_units(&config).expect("discover");
    assert_eq!(units.len(), 2);

    let mut sink = BatchSink::new(&out, 10).expect("sink");
    let summary = run_units(units, &config, &mut sink);
    assert_eq!(summary.units_ok, 2);
    assert_eq!(summary.units_failed, 0);
    sink.finish().expect("finish");

    // rerun into a fresh sink with an already-expired budget by driving
    // parse_unit directly: the failed unit publishes nothing
    let out2 = dir.path().join("out2");
    let mut sink2 = BatchSink::new(&out2, 10).expect("sink2");
    let unit = unit_for(dir.path(), &["slow.sql"]);
    if parse_unit(&unit, &config, &Deadline::expired_now()).is_ok() {
        panic!("expired deadline should fail the unit");
    }
    let batches = sink2.flush().expect("flush");
    assert!(batches.is_none(), "nothing was submitted, nothing flushes");
}

#[test]
fn sink_batches_and_merge_consolidates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("out");
    let mut sink = BatchSink::new(&out, 2).expect("sink");

    for i in 0..5 {
        sink.submit(UnitResult {
            unit_id: format!("unit-{i}"),
            files: 1,
            statements: 0,
            tables: Vec::new(),
            queries: Vec::new(),
            failures: FailureCounts::default(),
        })
        .expect("submit");
    }
    let batches = sink.finish().expect("finish");
    // 5 units at batch size 2 -> three batches, the last holding the tail
    assert_eq!(batches.len(), 3);
    for path in &batches {
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("parsed.batch-"));
    }

    let outcome = merge_batches(&out).expect("merge");
    assert_eq!(outcome.units, 5);
    assert_eq!(outcome.duplicates_dropped, 0);
    assert!(outcome.path.ends_with("parsed.json"));

    let merged: Vec<UnitResult> =
        serde_json::from_slice(&fs::read(&outcome.path).expect("read merged")).expect("json");
    let ids: Vec<&str> = merged.iter().map(|u| u.unit_id.as_str()).collect();
    assert_eq!(ids, ["unit-0", "unit-1", "unit-2", "unit-3", "unit-4"]);
}

#[test]
fn merge_drops_duplicate_units() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("out");

    let unit = |id: &str| UnitResult {
        unit_id: id.to_string(),
        files: 1,
        statements: 0,
        tables: Vec::new(),
        queries: Vec::new(),
        failures: FailureCounts::default(),
    };

    let mut sink = BatchSink::new(&out, 1).expect("sink");
    sink.submit(unit("dup")).expect("submit");
    sink.submit(unit("dup")).expect("submit");
    sink.submit(unit("solo")).expect("submit");
    sink.finish().expect("finish");

    let outcome = merge_batches(&out).expect("merge");
    assert_eq!(outcome.units, 2);
    assert_eq!(outcome.duplicates_dropped, 1);
}

#[test]
fn discover_units_respects_granularity() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir(dir.path().join("repo1")).expect("mkdir");
    fs::create_dir(dir.path().join("repo2")).expect("mkdir");
    write_file(&dir.path().join("repo1"), "a.sql", "CREATE TABLE a (x INT);");
    write_file(&dir.path().join("repo1"), "b.sql", "CREATE TABLE b (x INT);");
    write_file(&dir.path().join("repo2"), "c.sql", "CREATE TABLE c (x INT);");

    let mut config = config_for(dir.path(), &dir.path().join("out"));
    config.granularity = UnitGranularity::File;
    let by_file = discover_units(&config).expect("discover files");
    assert_eq!(by_file.len(), 3);

    config.granularity = UnitGranularity::Repository;
    let by_repo = discover_units(&config).expect("discover repos");
    assert_eq!(by_repo.len(), 2);
    let repo1 = by_repo.iter().find(|u| u.id == "repo1").expect("repo1");
    assert_eq!(repo1.files.len(), 2);
}

#[test]
fn failure_counts_are_carried_on_the_result() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(
        dir.path(),
        "messy.sql",
        "CREATE TABLE t (a INT);
         CREATE TABLE t (b INT);
         ALTER TABLE ghost ADD COLUMN x INT;
         DELETE FROM t;",
    );

    let config = config_for(dir.path(), &dir.path().join("out"));
    let unit = unit_for(dir.path(), &["messy.sql"]);
    let result = parse_unit(&unit, &config, &Deadline::after(None)).expect("unit should parse");

    assert_eq!(result.failures.duplicate_tables, 1);
    assert_eq!(result.failures.unknown_targets, 1);
    assert_eq!(result.tables.len(), 1);
}

#[test]
fn training_csv_renders_merged_results() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(
        dir.path(),
        "s.sql",
        "CREATE TABLE users (id INT PRIMARY KEY, email VARCHAR(64) NOT NULL, bio TEXT);",
    );
    let config = config_for(dir.path(), &dir.path().join("out"));
    let unit = unit_for(dir.path(), &["s.sql"]);
    let result = parse_unit(&unit, &config, &Deadline::after(None)).expect("unit should parse");

    let csv_path = dir.path().join("training.csv");
    sqlsift::output::training::write_training_csv(&csv_path, &[result]).expect("csv");
    let csv = fs::read_to_string(&csv_path).expect("read csv");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "unit-under-test,users,id,[UNIQUE]");
    assert_eq!(lines[1], "unit-under-test,users,email,[NOTNULL]");
    assert_eq!(lines[2], "unit-under-test,users,bio,");
}
