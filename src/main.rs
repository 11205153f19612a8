//! CLI entry point for `sqlsift`.

use std::path::PathBuf;
use std::process::{self, Stdio};

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use sqlsift::output::report::write_report;
use sqlsift::output::training::write_training_csv;
use sqlsift::pipeline::{
    discover_units, merge_batches, run_units, BatchSink, RunConfig, UnitGranularity, UnitResult,
};

#[derive(Parser)]
#[command(
    name = "sqlsift",
    about = "Mine table schemas and query structure from raw SQL corpora"
)]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand)]
enum Mode {
    /// Launch the parallel parse detached, logging to a timestamped file
    Run(RunArgs),
    /// Run the same parse pipeline synchronously in the foreground
    Debug(RunArgs),
    /// Run the built-in self-test over an embedded mini-corpus
    Selftest,
}

#[derive(Args, Clone)]
struct RunArgs {
    /// Directory holding the crawled .sql corpus
    input_dir: PathBuf,

    /// Output directory for batches, the merged collection, and reports
    #[arg(long, default_value = "sqlsift-output")]
    output_dir: PathBuf,

    /// Processing-unit granularity
    #[arg(long, value_enum, default_value_t = Granularity::File)]
    granularity: Granularity,

    /// Keep roughly this percentage of units (1-100)
    #[arg(long)]
    sample_percent: Option<u32>,

    /// Debug: process only this file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Debug: process only the statement with this unit-wide index
    #[arg(long)]
    statement: Option<usize>,

    /// Per-unit wall-clock budget in seconds (0 disables)
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Completed units per persisted batch
    #[arg(long, default_value_t = 64)]
    batch_size: usize,

    /// Worker threads (0 = all cores)
    #[arg(long, default_value_t = 0)]
    workers: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Granularity {
    /// One unit per .sql file
    File,
    /// One unit per first-level subdirectory
    Repository,
}

fn main() {
    let cli = Cli::parse();
    let Some(mode) = cli.mode else {
        Cli::command().print_help().ok();
        println!();
        return;
    };

    match mode {
        Mode::Run(args) => {
            if let Err(e) = spawn_detached(&args) {
                eprintln!("Failed to launch detached run: {e}");
                process::exit(2);
            }
        }
        Mode::Debug(args) => {
            init_logging();
            if let Err(e) = run_pipeline(&args) {
                eprintln!("Run failed: {e}");
                process::exit(2);
            }
        }
        Mode::Selftest => {
            if !selftest::run_all() {
                process::exit(1);
            }
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn config_from(args: &RunArgs) -> RunConfig {
    let mut config = RunConfig::new(args.input_dir.clone(), args.output_dir.clone());
    config.granularity = match args.granularity {
        Granularity::File => UnitGranularity::File,
        Granularity::Repository => UnitGranularity::Repository,
    };
    config.sample_percent = args.sample_percent;
    config.target_file = args.file.clone();
    config.target_statement = args.statement;
    config.timeout_secs = args.timeout_secs;
    config.batch_size = args.batch_size;
    if args.workers > 0 {
        config.workers = args.workers;
    }
    config
}

/// Re-launch ourselves in `debug` mode with output captured to a
/// timestamped log file, without blocking the caller's shell.
fn spawn_detached(args: &RunArgs) -> Result<(), String> {
    let exe = std::env::current_exe().map_err(|e| e.to_string())?;
    let log_name = format!(
        "sqlsift-{}.log",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    );
    let log =
        std::fs::File::create(&log_name).map_err(|e| format!("cannot create {log_name}: {e}"))?;
    let log_err = log.try_clone().map_err(|e| e.to_string())?;

    let mut command = process::Command::new(exe);
    command
        .arg("debug")
        .arg(&args.input_dir)
        .arg("--output-dir")
        .arg(&args.output_dir)
        .arg("--granularity")
        .arg(match args.granularity {
            Granularity::File => "file",
            Granularity::Repository => "repository",
        })
        .arg("--timeout-secs")
        .arg(args.timeout_secs.to_string())
        .arg("--batch-size")
        .arg(args.batch_size.to_string())
        .arg("--workers")
        .arg(args.workers.to_string());
    if let Some(percent) = args.sample_percent {
        command.arg("--sample-percent").arg(percent.to_string());
    }
    if let Some(file) = &args.file {
        command.arg("--file").arg(file);
    }
    if let Some(statement) = args.statement {
        command.arg("--statement").arg(statement.to_string());
    }

    let child = command
        .stdin(Stdio::null())
        .stdout(log)
        .stderr(log_err)
        .spawn()
        .map_err(|e| e.to_string())?;

    println!(
        "Launched parse run (pid {}), logging to {log_name}",
        child.id()
    );
    Ok(())
}

fn run_pipeline(args: &RunArgs) -> Result<(), String> {
    let config = config_from(args);
    let units = discover_units(&config)
        .map_err(|e| format!("discovering units under {}: {e}", config.input_dir.display()))?;
    if units.is_empty() {
        return Err("no .sql files found".to_string());
    }

    let mut sink = BatchSink::new(&config.output_dir, config.batch_size)
        .map_err(|e| format!("opening sink: {e}"))?;
    let summary = run_units(units, &config, &mut sink);
    sink.finish().map_err(|e| format!("flushing sink: {e}"))?;

    let merge = merge_batches(&config.output_dir).map_err(|e| format!("merging batches: {e}"))?;
    let merged: Vec<UnitResult> = std::fs::read(&merge.path)
        .map_err(|e| e.to_string())
        .and_then(|body| serde_json::from_slice(&body).map_err(|e| e.to_string()))?;
    write_training_csv(&config.output_dir.join("training.csv"), &merged)
        .map_err(|e| format!("writing training csv: {e}"))?;
    write_report(&config.output_dir, &summary).map_err(|e| format!("writing report: {e}"))?;

    println!(
        "{} units ({} ok, {} failed, {} timed out); {} tables, {} queries; merged {} units into {}",
        summary.units_total,
        summary.units_ok,
        summary.units_failed,
        summary.timeouts,
        summary.tables,
        summary.queries,
        merge.units,
        merge.path.display(),
    );
    Ok(())
}

mod selftest {
    //! Built-in checks over an embedded mini-corpus, runnable without any
    //! input data.

    use sqlsift::query::{build_tree, extract_queries, ExtractStats, JoinKind, ProjectionItem};
    use sqlsift::schema::{apply_ddl, resolve_foreign_keys, Resolution, SchemaScope};
    use sqlsift::token::tokenize;

    pub fn run_all() -> bool {
        let cases: &[(&str, fn() -> Result<(), String>)] = &[
            ("schema create and alter", case_schema),
            ("query clause extraction", case_query),
            ("wildcard projection with selection", case_wildcard),
            ("unresolved foreign key", case_unresolved_fk),
            ("nested scope discovery", case_nesting),
        ];

        let mut ok = true;
        for (name, case) in cases {
            match case() {
                Ok(()) => println!("ok   {name}"),
                Err(e) => {
                    println!("FAIL {name}: {e}");
                    ok = false;
                }
            }
        }
        ok
    }

    fn check(condition: bool, message: &str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn schema_for(sql: &str) -> Result<SchemaScope, String> {
        let statements = tokenize(sql).map_err(|e| e.to_string())?;
        let mut scope = SchemaScope::new();
        for stmt in &statements {
            apply_ddl(stmt, &mut scope).map_err(|e| e.to_string())?;
        }
        resolve_foreign_keys(&mut scope);
        Ok(scope)
    }

    fn case_schema() -> Result<(), String> {
        let scope =
            schema_for("CREATE TABLE t(a INT PRIMARY KEY, b INT); ALTER TABLE t ADD COLUMN c INT;")?;
        let table = scope.get("t").ok_or("table t missing")?;
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        check(names == ["a", "b", "c"], "columns should be [a, b, c]")?;
        check(table.keys.len() == 1, "expected one key")?;
        check(
            table.keys[0].columns == ["a".to_string()],
            "primary key should be [a]",
        )
    }

    fn case_query() -> Result<(), String> {
        let stmt = tokenize("SELECT a.x, COUNT(b.y) FROM a JOIN b ON a.id=b.aid GROUP BY a.x")
            .map_err(|e| e.to_string())?
            .remove(0);
        let tree = build_tree(&stmt).map_err(|e| e.to_string())?;
        let mut stats = ExtractStats::default();
        let queries = extract_queries(&tree, &SchemaScope::new(), 0, &mut stats);
        check(queries.len() == 1, "expected one query")?;
        let query = &queries[0];

        let joins = query.joins.as_ref().ok_or("joins missing")?;
        check(joins.len() == 1, "expected one binary join")?;
        check(joins[0].kind == JoinKind::Inner, "join should be inner")?;
        check(joins[0].predicates.len() == 1, "expected one predicate")?;

        let projections = query.projections.as_ref().ok_or("projection missing")?;
        check(projections.len() == 1, "projection should be [a.x]")?;

        let aggregates = query.aggregates.as_ref().ok_or("aggregation missing")?;
        check(aggregates.len() == 1, "expected one aggregate")?;

        let group_by = query.group_by.as_ref().ok_or("group by missing")?;
        check(group_by.len() == 1, "group by should be [a.x]")
    }

    fn case_wildcard() -> Result<(), String> {
        let stmt = tokenize("SELECT * FROM t WHERE t.v > 10")
            .map_err(|e| e.to_string())?
            .remove(0);
        let tree = build_tree(&stmt).map_err(|e| e.to_string())?;
        let mut stats = ExtractStats::default();
        let queries = extract_queries(&tree, &SchemaScope::new(), 0, &mut stats);
        check(queries.len() == 1, "expected one query")?;
        let query = &queries[0];
        check(
            query.projections.as_deref() == Some(&[ProjectionItem::Wildcard][..]),
            "projection should be the wildcard sentinel",
        )?;
        check(query.selection.is_some(), "selection should be present")
    }

    fn case_unresolved_fk() -> Result<(), String> {
        let scope = schema_for("CREATE TABLE c(x INT, FOREIGN KEY (x) REFERENCES missing(id));")?;
        let table = scope.get("c").ok_or("table c missing")?;
        check(table.foreign_keys.len() == 1, "expected one foreign key")?;
        check(
            table.foreign_keys[0].resolution == Resolution::Unresolved,
            "reference to an unseen table should stay unresolved",
        )
    }

    fn case_nesting() -> Result<(), String> {
        let stmt = tokenize("SELECT x FROM (SELECT y FROM (SELECT z FROM t) q1) q2 WHERE x > 0")
            .map_err(|e| e.to_string())?
            .remove(0);
        let tree = build_tree(&stmt).map_err(|e| e.to_string())?;
        check(tree.len() == 3, "two nested levels should give three scopes")?;
        check(tree.root().parent.is_none(), "root has no parent")?;
        check(
            (1..tree.len()).all(|id| tree.node(id).parent.is_some()),
            "every non-root scope has exactly one parent",
        )
    }
}
