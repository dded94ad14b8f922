// crates/capreport-loader/tests/loader_unit.rs
// ============================================================================
// Module: Dataset Loader Unit Tests
// Description: File-backed loading and required-column validation tests.
// Purpose: Validate source resolution, header checks, and parse errors.
// ============================================================================

//! ## Overview
//! File-backed loader tests:
//! - Valid CSV round-trips into typed rows, including empty market caps
//! - Missing required columns are all reported in one error
//! - Missing files, malformed values, and absent sources fail closed

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

use std::io::Write;
use std::path::Path;

use capreport_loader::DatasetLoader;
use capreport_loader::LoadError;
use capreport_loader::LoaderConfig;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Writes `contents` to `name` under `dir` and returns the full path string.
fn write_csv(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("create csv");
    file.write_all(contents.as_bytes()).expect("write csv");
    path.display().to_string()
}

/// A well-formed three-row dataset with one missing market cap.
const VALID_CSV: &str = "\
Symbol,Shortname,Marketcap,Sector
AAPL,Apple Inc.,2000000000000,Technology
MSFT,Microsoft Corporation,1800000000000,Technology
BRK-B,Berkshire Hathaway,,Financial Services
";

// ============================================================================
// SECTION: Path Loading
// ============================================================================

#[test]
fn loads_rows_from_local_csv() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_csv(&dir, "sp500.csv", VALID_CSV);
    let loader = DatasetLoader::new().expect("loader");
    let dataset = loader.load(Some(&path)).expect("load dataset");
    assert_eq!(dataset.len(), 3);
    let rows = dataset.rows();
    assert_eq!(rows[0].symbol, "AAPL");
    assert_eq!(rows[0].name, "Apple Inc.");
    assert_eq!(rows[0].market_cap, Some(2e12));
    assert_eq!(rows[0].sector, "Technology");
    assert_eq!(rows[2].market_cap, None);
    assert_eq!(rows[2].sector, "Financial Services");
}

#[test]
fn extra_columns_are_ignored() {
    let dir = TempDir::new().expect("temp dir");
    let csv = "\
Symbol,Shortname,Marketcap,Sector,Country
AAPL,Apple Inc.,2000000000000,Technology,United States
";
    let path = write_csv(&dir, "extra.csv", csv);
    let loader = DatasetLoader::new().expect("loader");
    let dataset = loader.load(Some(&path)).expect("load dataset");
    assert_eq!(dataset.len(), 1);
}

#[test]
fn missing_file_is_not_found() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("absent.csv").display().to_string();
    let loader = DatasetLoader::new().expect("loader");
    let err = loader.load(Some(&path)).expect_err("absent file");
    assert_eq!(err, LoadError::NotFound(path));
}

// ============================================================================
// SECTION: Column Validation
// ============================================================================

#[test]
fn missing_columns_are_all_reported() {
    let dir = TempDir::new().expect("temp dir");
    let csv = "\
Symbol,Shortname
AAPL,Apple Inc.
";
    let path = write_csv(&dir, "short.csv", csv);
    let loader = DatasetLoader::new().expect("loader");
    let err = loader.load(Some(&path)).expect_err("missing columns");
    assert_eq!(
        err,
        LoadError::MissingColumns(vec!["Marketcap".to_string(), "Sector".to_string()])
    );
}

#[test]
fn column_check_runs_before_row_parsing() {
    let dir = TempDir::new().expect("temp dir");
    // The single data row is malformed, but the header failure wins.
    let csv = "\
Symbol,Shortname,Marketcap
AAPL,Apple Inc.,not-a-number
";
    let path = write_csv(&dir, "header-first.csv", csv);
    let loader = DatasetLoader::new().expect("loader");
    let err = loader.load(Some(&path)).expect_err("missing column");
    assert_eq!(err, LoadError::MissingColumns(vec!["Sector".to_string()]));
}

// ============================================================================
// SECTION: Parse Errors
// ============================================================================

#[test]
fn malformed_market_cap_is_a_parse_error() {
    let dir = TempDir::new().expect("temp dir");
    let csv = "\
Symbol,Shortname,Marketcap,Sector
AAPL,Apple Inc.,not-a-number,Technology
";
    let path = write_csv(&dir, "bad.csv", csv);
    let loader = DatasetLoader::new().expect("loader");
    let err = loader.load(Some(&path)).expect_err("bad float");
    assert!(matches!(err, LoadError::Parse(_)), "unexpected error: {err}");
}

#[test]
fn header_only_input_yields_empty_dataset() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_csv(&dir, "empty.csv", "Symbol,Shortname,Marketcap,Sector\n");
    let loader = DatasetLoader::new().expect("loader");
    let dataset = loader.load(Some(&path)).expect("load dataset");
    assert!(dataset.is_empty());
}

// ============================================================================
// SECTION: Source Resolution
// ============================================================================

#[test]
fn default_source_is_used_when_no_argument_is_given() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_csv(&dir, "default.csv", VALID_CSV);
    let loader = DatasetLoader::with_config(
        LoaderConfig::new().default_source(Path::new(&path)),
    )
    .expect("loader");
    let dataset = loader.load(None).expect("load dataset");
    assert_eq!(dataset.len(), 3);
}

#[test]
fn no_source_and_no_default_fails() {
    let loader = DatasetLoader::new().expect("loader");
    let err = loader.load(None).expect_err("no source");
    assert_eq!(err, LoadError::NoSource);
}
