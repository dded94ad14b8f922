// crates/capreport-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Run Store Unit Tests
// Description: Durability and contract tests for the SQLite-backed store.
// Purpose: Validate persistence across reopen, referential integrity, and
//          ordering against a real database file.
// ============================================================================

//! ## Overview
//! File-backed store tests:
//! - Runs and KPIs survive a close-and-reopen cycle
//! - Foreign-key violations surface as missing-run errors without orphans
//! - Status transitions and newest-first listing match the contract
//! - Schema version gating fails closed

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    clippy::float_cmp,
    reason = "Test-only assertions and helpers are permitted."
)]

use capreport_core::OutputFormat;
use capreport_core::RunId;
use capreport_core::RunStatus;
use capreport_core::RunStore;
use capreport_core::StoreError;
use capreport_store_sqlite::SqliteRunStore;
use capreport_store_sqlite::SqliteStoreConfig;
use capreport_store_sqlite::SqliteStoreError;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Opens a fresh store under the provided directory.
fn open_store(dir: &TempDir) -> SqliteRunStore {
    let config = SqliteStoreConfig::new(dir.path().join("capreport.db"));
    SqliteRunStore::new(&config).expect("open store")
}

// ============================================================================
// SECTION: Durability
// ============================================================================

#[test]
fn runs_and_kpis_survive_reopen() {
    let dir = TempDir::new().expect("temp dir");
    let run_id = {
        let store = open_store(&dir);
        let run = store
            .create_run("data/sp500.csv", OutputFormat::Markdown, Some(500), RunStatus::Completed, None)
            .expect("create run");
        store
            .add_kpi(run.id, "avg_market_cap", 1.9e12, Some("USD"), Some("Average market cap"))
            .expect("add kpi");
        run.id
    };
    let store = open_store(&dir);
    let run = store.get_run(run_id).expect("get run").expect("run exists");
    assert_eq!(run.source, "data/sp500.csv");
    assert_eq!(run.rows_processed, Some(500));
    let kpis = store.kpis_for_run(run_id).expect("list kpis");
    assert_eq!(kpis.len(), 1);
    assert_eq!(kpis[0].name, "avg_market_cap");
    assert_eq!(kpis[0].value, 1.9e12);
    assert_eq!(kpis[0].unit.as_deref(), Some("USD"));
}

#[test]
fn schema_version_gate_fails_closed() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("capreport.db");
    {
        let config = SqliteStoreConfig::new(&path);
        let _store = SqliteRunStore::new(&config).expect("open store");
    }
    {
        let connection = rusqlite::Connection::open(&path).expect("open raw");
        connection.execute("UPDATE store_meta SET version = 99", []).expect("bump version");
    }
    let config = SqliteStoreConfig::new(&path);
    let err = SqliteRunStore::new(&config).expect_err("version mismatch");
    assert!(matches!(err, SqliteStoreError::VersionMismatch(_)), "unexpected error: {err}");
}

#[test]
fn directory_path_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let config = SqliteStoreConfig::new(dir.path());
    let err = SqliteRunStore::new(&config).expect_err("directory path");
    assert!(matches!(err, SqliteStoreError::Invalid(_)), "unexpected error: {err}");
}

// ============================================================================
// SECTION: Referential Integrity
// ============================================================================

#[test]
fn add_kpi_rejects_missing_run_without_orphan() {
    let dir = TempDir::new().expect("temp dir");
    let store = open_store(&dir);
    let missing = RunId::new(42);
    let err = store.add_kpi(missing, "total_companies", 3.0, None, None).expect_err("missing run");
    assert_eq!(err, StoreError::MissingRun(missing));
    assert!(store.kpis_for_run(missing).expect("list kpis").is_empty());
}

#[test]
fn kpis_for_run_preserves_insertion_order() {
    let dir = TempDir::new().expect("temp dir");
    let store = open_store(&dir);
    let run = store
        .create_run("a.csv", OutputFormat::Markdown, Some(3), RunStatus::Completed, None)
        .expect("create run");
    for name in ["total_companies", "avg_market_cap", "median_market_cap"] {
        store.add_kpi(run.id, name, 1.0, None, None).expect("add kpi");
    }
    let names: Vec<String> =
        store.kpis_for_run(run.id).expect("list kpis").into_iter().map(|k| k.name).collect();
    assert_eq!(names, ["total_companies", "avg_market_cap", "median_market_cap"]);
}

// ============================================================================
// SECTION: Status Transitions
// ============================================================================

#[test]
fn update_run_status_returns_fresh_snapshot() {
    let dir = TempDir::new().expect("temp dir");
    let store = open_store(&dir);
    let run = store
        .create_run("a.csv", OutputFormat::Html, None, RunStatus::Processing, None)
        .expect("create run");
    let updated = store
        .update_run_status(run.id, RunStatus::Completed, None, Some(2.5))
        .expect("update status");
    assert_eq!(updated.status, RunStatus::Completed);
    assert_eq!(updated.duration_seconds, Some(2.5));
    assert_eq!(updated.output_format, OutputFormat::Html);
    let fetched = store.get_run(run.id).expect("get run").expect("run exists");
    assert_eq!(fetched, updated);
}

#[test]
fn update_run_status_keeps_existing_error_message() {
    let dir = TempDir::new().expect("temp dir");
    let store = open_store(&dir);
    let run = store
        .create_run("a.csv", OutputFormat::Markdown, None, RunStatus::Processing, None)
        .expect("create run");
    store
        .update_run_status(run.id, RunStatus::Failed, Some("load failed"), None)
        .expect("mark failed");
    let updated = store
        .update_run_status(run.id, RunStatus::Failed, None, Some(0.5))
        .expect("second update");
    assert_eq!(updated.error_message.as_deref(), Some("load failed"));
    assert_eq!(updated.duration_seconds, Some(0.5));
}

#[test]
fn update_run_status_fails_for_unknown_run() {
    let dir = TempDir::new().expect("temp dir");
    let store = open_store(&dir);
    let err = store
        .update_run_status(RunId::new(9), RunStatus::Completed, None, None)
        .expect_err("unknown run");
    assert_eq!(err, StoreError::NotFound(RunId::new(9)));
}

// ============================================================================
// SECTION: Listings
// ============================================================================

#[test]
fn recent_runs_returns_newest_first_with_limit() {
    let dir = TempDir::new().expect("temp dir");
    let store = open_store(&dir);
    let mut ids = Vec::new();
    for index in 0..5 {
        let run = store
            .create_run(
                &format!("file-{index}.csv"),
                OutputFormat::Markdown,
                None,
                RunStatus::Completed,
                None,
            )
            .expect("create run");
        ids.push(run.id);
    }
    let recent = store.recent_runs(3).expect("recent runs");
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].id, ids[4]);
    assert_eq!(recent[1].id, ids[3]);
    assert_eq!(recent[2].id, ids[2]);
}

#[test]
fn get_run_returns_none_for_unknown_id() {
    let dir = TempDir::new().expect("temp dir");
    let store = open_store(&dir);
    assert!(store.get_run(RunId::new(7)).expect("get run").is_none());
}
