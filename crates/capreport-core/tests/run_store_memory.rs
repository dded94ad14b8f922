// crates/capreport-core/tests/run_store_memory.rs
// ============================================================================
// Module: In-Memory Run Store Unit Tests
// Description: Contract tests for the reference RunStore implementation.
// Purpose: Validate round-trips, referential integrity, status transitions,
//          and recent-run ordering.
// ============================================================================

//! ## Overview
//! Contract-level tests for [`InMemoryRunStore`]:
//! - Create/get round-trip with identical field values
//! - KPI insertion, listing, and referential integrity
//! - Status transitions returning fresh snapshots
//! - Newest-first ordering with identifier tie-break

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

use capreport_core::InMemoryRunStore;
use capreport_core::OutputFormat;
use capreport_core::RunId;
use capreport_core::RunStatus;
use capreport_core::RunStore;
use capreport_core::StoreError;

// ============================================================================
// SECTION: Run Round-Trips
// ============================================================================

#[test]
fn create_run_round_trips_through_get_run() {
    let store = InMemoryRunStore::new();
    let created = store
        .create_run("data/sp500.csv", OutputFormat::Html, Some(500), RunStatus::Completed, None)
        .expect("create run");
    let fetched = store.get_run(created.id).expect("get run").expect("run exists");
    assert_eq!(created, fetched);
    assert_eq!(fetched.source, "data/sp500.csv");
    assert_eq!(fetched.output_format, OutputFormat::Html);
    assert_eq!(fetched.rows_processed, Some(500));
    assert_eq!(fetched.status, RunStatus::Completed);
    assert!(fetched.error_message.is_none());
}

#[test]
fn get_run_returns_none_for_unknown_id() {
    let store = InMemoryRunStore::new();
    assert!(store.get_run(RunId::new(42)).expect("get run").is_none());
}

#[test]
fn run_ids_are_monotonically_increasing() {
    let store = InMemoryRunStore::new();
    let first = store
        .create_run("a.csv", OutputFormat::Markdown, None, RunStatus::Processing, None)
        .expect("create run");
    let second = store
        .create_run("b.csv", OutputFormat::Markdown, None, RunStatus::Processing, None)
        .expect("create run");
    assert!(second.id > first.id);
}

// ============================================================================
// SECTION: Status Transitions
// ============================================================================

#[test]
fn update_run_status_returns_fresh_snapshot() {
    let store = InMemoryRunStore::new();
    let run = store
        .create_run("a.csv", OutputFormat::Markdown, None, RunStatus::Processing, None)
        .expect("create run");
    let updated = store
        .update_run_status(run.id, RunStatus::Completed, None, Some(1.25))
        .expect("update status");
    assert_eq!(updated.status, RunStatus::Completed);
    assert_eq!(updated.duration_seconds, Some(1.25));
    let fetched = store.get_run(run.id).expect("get run").expect("run exists");
    assert_eq!(fetched.status, RunStatus::Completed);
}

#[test]
fn update_run_status_records_failure_message() {
    let store = InMemoryRunStore::new();
    let run = store
        .create_run("a.csv", OutputFormat::Markdown, None, RunStatus::Processing, None)
        .expect("create run");
    let updated = store
        .update_run_status(run.id, RunStatus::Failed, Some("missing column: Sector"), None)
        .expect("update status");
    assert_eq!(updated.status, RunStatus::Failed);
    assert_eq!(updated.error_message.as_deref(), Some("missing column: Sector"));
}

#[test]
fn update_run_status_fails_for_unknown_run() {
    let store = InMemoryRunStore::new();
    let err = store
        .update_run_status(RunId::new(9), RunStatus::Completed, None, None)
        .expect_err("unknown run");
    assert_eq!(err, StoreError::NotFound(RunId::new(9)));
}

// ============================================================================
// SECTION: KPI Integrity
// ============================================================================

#[test]
fn add_kpi_appears_exactly_once_in_listing() {
    let store = InMemoryRunStore::new();
    let run = store
        .create_run("a.csv", OutputFormat::Markdown, Some(3), RunStatus::Completed, None)
        .expect("create run");
    let kpi = store
        .add_kpi(run.id, "avg_market_cap", 1.9e12, Some("USD"), Some("Average market cap"))
        .expect("add kpi");
    let kpis = store.kpis_for_run(run.id).expect("list kpis");
    assert_eq!(kpis.len(), 1);
    assert_eq!(kpis[0], kpi);
    assert_eq!(kpis[0].run_id, run.id);
    assert_eq!(kpis[0].name, "avg_market_cap");
}

#[test]
fn add_kpi_rejects_missing_run_without_orphan() {
    let store = InMemoryRunStore::new();
    let missing = RunId::new(7);
    let err = store.add_kpi(missing, "total_companies", 3.0, None, None).expect_err("missing run");
    assert_eq!(err, StoreError::MissingRun(missing));
    assert!(store.kpis_for_run(missing).expect("list kpis").is_empty());
}

#[test]
fn kpis_for_run_is_empty_for_run_without_kpis() {
    let store = InMemoryRunStore::new();
    let run = store
        .create_run("a.csv", OutputFormat::Markdown, None, RunStatus::Failed, Some("load failed"))
        .expect("create run");
    assert!(store.kpis_for_run(run.id).expect("list kpis").is_empty());
}

#[test]
fn kpis_for_run_preserves_insertion_order() {
    let store = InMemoryRunStore::new();
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
// SECTION: Recent Runs
// ============================================================================

#[test]
fn recent_runs_returns_newest_first_with_limit() {
    let store = InMemoryRunStore::new();
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
    // Creation timestamps may collide within a millisecond; identifier
    // descending keeps the order total.
    assert_eq!(recent[0].id, ids[4]);
    assert_eq!(recent[1].id, ids[3]);
    assert_eq!(recent[2].id, ids[2]);
}

#[test]
fn recent_runs_with_zero_limit_is_empty() {
    let store = InMemoryRunStore::new();
    store
        .create_run("a.csv", OutputFormat::Markdown, None, RunStatus::Completed, None)
        .expect("create run");
    assert!(store.recent_runs(0).expect("recent runs").is_empty());
}
