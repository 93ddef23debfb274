//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::path::{Path, PathBuf};

use spendtree_core::{MonthRange, Session, TransactionSource, ViewState};

use crate::commands::{self, truncate, BrowseCommand};

const LEDGER: &str = "id,date,amount,label,tags
1,2024-01-05,-50.00,Chez Paul,resto
2,2024-01-12,-12.50,Cinema Lux,cinema
3,2024-01-20,-82.10,Carrefour,courses
4,2024-02-01,-750.00,Loyer,loyer
5,2024-02-14,-38.00,Fleuriste,cadeaux
6,2024-02-25,2500.00,Salaire,salaire";

const CONFIG: &str = r#"
[[categories]]
id = "groceries"
name = "Groceries"

[[categories]]
id = "leisure"
name = "Leisure"

[[categories]]
id = "home"
name = "Home"

[mapping]
courses = "groceries"
resto = "leisure"
cinema = "leisure"
loyer = "home"
"#;

struct TestFiles {
    dir: tempfile::TempDir,
}

impl TestFiles {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ledger.csv"), LEDGER).unwrap();
        std::fs::write(dir.path().join("spendtree.toml"), CONFIG).unwrap();
        Self { dir }
    }

    fn csv(&self) -> PathBuf {
        self.dir.path().join("ledger.csv")
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("spendtree.toml")
    }

    async fn session(&self) -> Session {
        commands::open_session(&self.csv(), Some(self.config().as_path()), MonthRange::all())
            .await
            .unwrap()
    }
}

// ========== Dispatch Tests ==========

fn parse_args(files: &TestFiles, args: &[&str]) -> crate::cli::Cli {
    use clap::Parser;

    let csv = files.csv();
    let config = files.config();
    let mut argv = vec![
        "spendtree",
        "--file",
        csv.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ];
    argv.extend_from_slice(args);
    crate::cli::Cli::try_parse_from(argv).unwrap()
}

#[tokio::test]
async fn test_run_dispatches_every_command() {
    let files = TestFiles::new();
    for args in [
        vec!["summary"],
        vec!["summary", "--json"],
        vec!["months"],
        vec!["month", "2024-01"],
        vec!["tag", "leisure", "resto"],
        vec!["tag", "leisure", "cinema", "--month", "2024-01"],
        vec!["categories"],
        vec!["map", "cadeaux", "leisure"],
        vec!["reclassify", "2", "courses"],
    ] {
        crate::run(parse_args(&files, &args))
            .await
            .unwrap_or_else(|e| panic!("{:?} failed: {:#}", args, e));
    }

    let stored = spendtree_core::CsvSource::new(files.csv())
        .list_transactions(&MonthRange::all())
        .await
        .unwrap();
    assert_eq!(stored[1].tags, vec!["courses"]);
}

#[tokio::test]
async fn test_run_rejects_bad_period() {
    let files = TestFiles::new();
    let cli = parse_args(&files, &["--from", "2024-13", "summary"]);
    assert!(crate::run(cli).await.is_err());
}

// ========== Helpers ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("courses", 10), "courses");
    assert_eq!(truncate("supermarche du coin", 10), "superma...");
    // Multi-byte labels are cut on character boundaries
    assert_eq!(truncate("épicerie fine", 8), "épice...");
}

#[test]
fn test_resolve_period() {
    let range = commands::resolve_period(Some("2024-01"), Some("2024-03")).unwrap();
    assert!(range.contains("2024-02"));
    assert!(!range.contains("2024-04"));

    assert!(commands::resolve_period(Some("2024-13"), None).is_err());
    assert!(commands::resolve_period(Some("2024-05"), Some("2024-01")).is_err());
}

// ========== Session Tests ==========

#[tokio::test]
async fn test_open_session_reads_config_mapping() {
    let files = TestFiles::new();
    let session = files.session().await;
    let analysis = session.analysis().unwrap();

    assert_eq!(analysis.category("leisure").unwrap().total, 6250);
    assert_eq!(analysis.category("other").unwrap().total, 3800);
}

#[tokio::test]
async fn test_open_session_missing_file() {
    let files = TestFiles::new();
    let result = commands::open_session(
        Path::new("/nonexistent/ledger.csv"),
        Some(files.config().as_path()),
        MonthRange::all(),
    )
    .await;
    assert!(result.is_err());
}

// ========== Report Tests ==========

#[tokio::test]
async fn test_cmd_summary() {
    let files = TestFiles::new();
    let session = files.session().await;
    assert!(commands::cmd_summary(&session, false).is_ok());
    assert!(commands::cmd_summary(&session, true).is_ok());
    assert!(commands::cmd_months(&session).is_ok());
}

#[tokio::test]
async fn test_cmd_month() {
    let files = TestFiles::new();
    let session = files.session().await;
    assert!(commands::cmd_month(&session, "2024-02").is_ok());
    assert!(commands::cmd_month(&session, "not-a-month").is_err());
}

#[tokio::test]
async fn test_cmd_tag() {
    let files = TestFiles::new();
    let session = files.session().await;
    commands::cmd_tag(&session, "leisure", "resto", None).unwrap();
    assert_eq!(session.view().unwrap().name(), "transactions");
}

#[tokio::test]
async fn test_cmd_tag_with_month() {
    let files = TestFiles::new();
    let session = files.session().await;
    commands::cmd_tag(&session, "leisure", "cinema", Some("2024-01")).unwrap();
    assert_eq!(
        session.view().unwrap().name(),
        "category month transactions"
    );
}

#[tokio::test]
async fn test_cmd_tag_unknown_category() {
    let files = TestFiles::new();
    let session = files.session().await;
    assert!(commands::cmd_tag(&session, "travel", "train", None).is_err());
}

#[test]
fn test_cmd_categories() {
    let files = TestFiles::new();
    assert!(commands::cmd_categories(Some(files.config().as_path())).is_ok());
}

// ========== Edit Tests ==========

#[tokio::test]
async fn test_cmd_reclassify_persists() {
    let files = TestFiles::new();
    let session = files.session().await;
    commands::cmd_reclassify(&session, 1, "courses").await.unwrap();

    let analysis = session.analysis().unwrap();
    assert_eq!(analysis.category("groceries").unwrap().total, 13210);

    let source = spendtree_core::CsvSource::new(files.csv());
    let stored = source.list_transactions(&MonthRange::all()).await.unwrap();
    assert_eq!(stored[0].tags, vec!["courses"]);
}

#[tokio::test]
async fn test_cmd_reclassify_unknown_transaction() {
    let files = TestFiles::new();
    let session = files.session().await;
    assert!(commands::cmd_reclassify(&session, 99, "courses").await.is_err());
}

#[tokio::test]
async fn test_cmd_map_writes_config() {
    let files = TestFiles::new();
    commands::cmd_map(
        &files.csv(),
        Some(files.config().as_path()),
        MonthRange::all(),
        "cadeaux",
        "leisure",
    )
    .await
    .unwrap();

    let content = std::fs::read_to_string(files.config()).unwrap();
    assert!(content.contains("cadeaux = \"leisure\""));

    let session = files.session().await;
    let analysis = session.analysis().unwrap();
    assert!(analysis.category("other").is_none());
    assert_eq!(analysis.category("leisure").unwrap().total, 10050);
}

#[tokio::test]
async fn test_cmd_map_creates_config_from_defaults() {
    let files = TestFiles::new();
    let fresh = files.dir.path().join("new").join("config.toml");
    commands::cmd_map(
        &files.csv(),
        Some(fresh.as_path()),
        MonthRange::all(),
        "cadeaux",
        "leisure",
    )
    .await
    .unwrap();

    let config = spendtree_core::EngineConfig::load(Some(fresh.as_path())).unwrap();
    assert_eq!(config.mapping.get("cadeaux"), Some("leisure"));
    // Built-in categories came along
    assert!(config.catalog.get("groceries").is_some());
}

// ========== Browse Tests ==========

#[test]
fn test_parse_browse_command() {
    assert_eq!(
        commands::parse_browse_command("c leisure").unwrap(),
        BrowseCommand::Category("leisure".into())
    );
    assert_eq!(
        commands::parse_browse_command("tm resto 2024-01").unwrap(),
        BrowseCommand::TagMonth("resto".into(), "2024-01".into())
    );
    assert_eq!(
        commands::parse_browse_command("  mv 3 courses \n").unwrap(),
        BrowseCommand::Move(3, "courses".into())
    );
    assert_eq!(commands::parse_browse_command("b").unwrap(), BrowseCommand::Back);
    assert_eq!(commands::parse_browse_command("q").unwrap(), BrowseCommand::Quit);
    assert!(commands::parse_browse_command("mv x courses").is_err());
    assert!(commands::parse_browse_command("zoom").is_err());
}

#[tokio::test]
async fn test_browse_drill_and_edit() {
    let files = TestFiles::new();
    let session = files.session().await;

    let run = |line: &str| commands::parse_browse_command(line).unwrap();

    assert!(commands::run_browse_command(&session, run("c home")).await.unwrap());
    assert!(commands::run_browse_command(&session, run("t loyer")).await.unwrap());
    assert_eq!(session.view().unwrap().name(), "transactions");

    // Emptying the shown tag pops back to the root
    assert!(commands::run_browse_command(&session, run("mv 4 cadeaux")).await.unwrap());
    assert!(session.view().unwrap().is_root());

    // A stale selection is reported, not fatal
    assert!(commands::run_browse_command(&session, run("c home")).await.unwrap());
    assert!(matches!(session.view().unwrap(), ViewState::Categories));

    assert!(!commands::run_browse_command(&session, BrowseCommand::Quit).await.unwrap());
}

#[tokio::test]
async fn test_browse_month_path() {
    let files = TestFiles::new();
    let session = files.session().await;
    let run = |line: &str| commands::parse_browse_command(line).unwrap();

    commands::run_browse_command(&session, run("m 2024-02")).await.unwrap();
    assert_eq!(session.view().unwrap().name(), "month tags");
    commands::run_browse_command(&session, run("t loyer")).await.unwrap();
    assert_eq!(session.view().unwrap().name(), "month transactions");
    commands::run_browse_command(&session, run("b")).await.unwrap();
    commands::run_browse_command(&session, run("b")).await.unwrap();
    assert!(session.view().unwrap().is_root());

    // Wrong level: reported and ignored
    assert!(commands::run_browse_command(&session, run("t loyer")).await.unwrap());
    assert!(session.view().unwrap().is_root());
}
