// crates/capreport-core/tests/kpi_engine.rs
// ============================================================================
// Module: KPI Engine Unit Tests
// Description: Contract tests for base, sector, and enhanced computations.
// Purpose: Validate aggregation math, bucket overlap, ranking order, and the
//          empty-dataset error contract.
// ============================================================================

//! ## Overview
//! Unit-level tests for the KPI engine contract:
//! - Base totals, mean, and conventional median
//! - Sector grouping with degenerate single-row sectors
//! - Top-N ordering and tie determinism
//! - Percentile interpolation and monotonicity
//! - The preserved large/mega bucket overlap
//! - Tech-vs-traditional policy classification
//! - Uniform empty-dataset error behavior

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

use capreport_core::CompanyRecord;
use capreport_core::Dataset;
use capreport_core::KpiEngine;
use capreport_core::KpiError;
use proptest::prelude::proptest;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn company(symbol: &str, name: &str, cap: Option<f64>, sector: &str) -> CompanyRecord {
    CompanyRecord {
        symbol: symbol.to_string(),
        name: name.to_string(),
        market_cap: cap,
        sector: sector.to_string(),
    }
}

/// The three-row scenario from the end-to-end acceptance contract.
fn scenario_dataset() -> Dataset {
    Dataset::new(vec![
        company("AAPL", "Apple", Some(2_000_000_000_000.0), "Technology"),
        company("MSFT", "Microsoft", Some(1_800_000_000_000.0), "Technology"),
        company("GOOGL", "Alphabet", Some(1_500_000_000_000.0), "Communication Services"),
    ])
}

fn caps_dataset(caps: &[f64]) -> Dataset {
    Dataset::new(
        caps.iter()
            .enumerate()
            .map(|(index, &cap)| company(&format!("S{index}"), "Co", Some(cap), "Industrials"))
            .collect(),
    )
}

// ============================================================================
// SECTION: Base KPIs
// ============================================================================

#[test]
fn base_kpis_match_scenario() {
    let engine = KpiEngine::new();
    let base = engine.compute_base(&scenario_dataset()).expect("base kpis");
    assert_eq!(base.total_companies, 3);
    let expected_avg = (2.0e12 + 1.8e12 + 1.5e12) / 3.0;
    assert!((base.avg_market_cap - expected_avg).abs() < 1.0);
    assert_eq!(base.median_market_cap, 1_800_000_000_000.0);
}

#[test]
fn base_median_averages_middle_pair_for_even_counts() {
    let engine = KpiEngine::new();
    let base = engine.compute_base(&caps_dataset(&[1.0, 2.0, 3.0, 4.0])).expect("base kpis");
    assert_eq!(base.median_market_cap, 2.5);
}

#[test]
fn base_total_counts_rows_missing_capitalization() {
    let engine = KpiEngine::new();
    let dataset = Dataset::new(vec![
        company("A", "A", Some(5.0e9), "Energy"),
        company("B", "B", None, "Energy"),
    ]);
    let base = engine.compute_base(&dataset).expect("base kpis");
    assert_eq!(base.total_companies, 2);
    assert_eq!(base.avg_market_cap, 5.0e9);
}

#[test]
fn empty_dataset_fails_uniformly() {
    let engine = KpiEngine::new();
    let empty = Dataset::default();
    assert_eq!(engine.compute_base(&empty), Err(KpiError::EmptyDataset));
    assert_eq!(engine.compute_sector(&empty).unwrap_err(), KpiError::EmptyDataset);
    assert_eq!(engine.compute_enhanced(&empty).unwrap_err(), KpiError::EmptyDataset);
    assert!(engine.compute_all(&empty).is_err());
}

#[test]
fn dataset_without_any_capitalization_values_fails() {
    let engine = KpiEngine::new();
    let dataset = Dataset::new(vec![company("A", "A", None, "Energy")]);
    assert_eq!(engine.compute_base(&dataset), Err(KpiError::EmptyDataset));
}

// ============================================================================
// SECTION: Sector KPIs
// ============================================================================

#[test]
fn sector_kpis_match_scenario() {
    let engine = KpiEngine::new();
    let sectors = engine.compute_sector(&scenario_dataset()).expect("sector kpis");
    assert_eq!(sectors.sectors.len(), 2);
    let comm = &sectors.sectors[0];
    assert_eq!(comm.sector, "Communication Services");
    assert_eq!(comm.company_count, 1);
    assert_eq!(comm.avg_market_cap, 1_500_000_000_000.0);
    let tech = &sectors.sectors[1];
    assert_eq!(tech.sector, "Technology");
    assert_eq!(tech.company_count, 2);
    assert_eq!(tech.avg_market_cap, 1_900_000_000_000.0);
}

#[test]
fn sector_counts_sum_to_row_count() {
    let engine = KpiEngine::new();
    let dataset = Dataset::new(vec![
        company("A", "A", Some(1.0e9), "Energy"),
        company("B", "B", Some(2.0e9), "Utilities"),
        company("C", "C", Some(3.0e9), "Energy"),
        company("D", "D", Some(4.0e9), "Financials"),
    ]);
    let sectors = engine.compute_sector(&dataset).expect("sector kpis");
    let total: u64 = sectors.sectors.iter().map(|s| s.company_count).sum();
    assert_eq!(total, 4);
}

#[test]
fn single_row_sector_has_equal_mean_and_median() {
    let engine = KpiEngine::new();
    let dataset = Dataset::new(vec![
        company("A", "A", Some(7.0e9), "Utilities"),
        company("B", "B", Some(1.0e9), "Energy"),
        company("C", "C", Some(3.0e9), "Energy"),
    ]);
    let sectors = engine.compute_sector(&dataset).expect("sector kpis");
    let utilities = sectors.sectors.iter().find(|s| s.sector == "Utilities").expect("utilities");
    assert_eq!(utilities.avg_market_cap, 7.0e9);
    assert_eq!(utilities.median_market_cap, 7.0e9);
    assert_eq!(utilities.company_count, 1);
}

// ============================================================================
// SECTION: Enhanced KPIs
// ============================================================================

#[test]
fn top_companies_sorted_descending_and_capped_at_ten() {
    let engine = KpiEngine::new();
    let caps: Vec<f64> = (1..=12).map(|i| f64::from(i) * 1.0e9).collect();
    let enhanced = engine.compute_enhanced(&caps_dataset(&caps)).expect("enhanced");
    assert_eq!(enhanced.top_companies.len(), 10);
    for pair in enhanced.top_companies.windows(2) {
        assert!(pair[0].market_cap >= pair[1].market_cap);
    }
    assert_eq!(enhanced.top_companies[0].market_cap, 12.0e9);
    assert_eq!(enhanced.top_companies[0].market_cap_billions, 12.0);
}

#[test]
fn top_companies_length_is_row_count_when_small() {
    let engine = KpiEngine::new();
    let enhanced = engine.compute_enhanced(&scenario_dataset()).expect("enhanced");
    assert_eq!(enhanced.top_companies.len(), 3);
    assert_eq!(enhanced.top_companies[0].symbol, "AAPL");
}

#[test]
fn top_companies_ties_keep_source_order() {
    let engine = KpiEngine::new();
    let dataset = Dataset::new(vec![
        company("FIRST", "First", Some(5.0e9), "Energy"),
        company("SECOND", "Second", Some(5.0e9), "Energy"),
    ]);
    let enhanced = engine.compute_enhanced(&dataset).expect("enhanced");
    assert_eq!(enhanced.top_companies[0].symbol, "FIRST");
    assert_eq!(enhanced.top_companies[1].symbol, "SECOND");
}

#[test]
fn percentiles_interpolate_linearly() {
    let engine = KpiEngine::new();
    // Values 1..=5: p50 is the middle value, p25 interpolates between 1 and 2.
    let enhanced = engine.compute_enhanced(&caps_dataset(&[1.0, 2.0, 3.0, 4.0, 5.0])).expect("enhanced");
    assert_eq!(enhanced.percentiles.p50, 3.0);
    assert_eq!(enhanced.percentiles.p25, 2.0);
    assert_eq!(enhanced.percentiles.p75, 4.0);
    assert!((enhanced.percentiles.p90 - 4.6).abs() < 1e-9);
}

#[test]
fn bucket_counts_preserve_large_mega_overlap() {
    let engine = KpiEngine::new();
    let dataset = caps_dataset(&[1.0e9, 5.0e9, 50.0e9, 150.0e9, 300.0e9]);
    let dist = engine.compute_enhanced(&dataset).expect("enhanced").market_cap_distribution;
    assert_eq!(dist.small_cap_count, 1);
    assert_eq!(dist.mid_cap_count, 1);
    // Every mega row is also a large row; the four counts do not partition.
    assert_eq!(dist.large_cap_count, 3);
    assert_eq!(dist.mega_cap_count, 2);
    assert_eq!(dist.small_cap_count + dist.mid_cap_count + dist.large_cap_count, 5);
    assert!(dist.large_cap_count >= dist.mega_cap_count);
    assert_eq!(dist.large_cap_pct, 60.0);
    assert_eq!(dist.mega_cap_pct, 40.0);
}

#[test]
fn sector_rankings_sorted_by_mean_and_top_sectors_by_sum() {
    let engine = KpiEngine::new();
    let dataset = Dataset::new(vec![
        // Energy: mean 2e9, sum 6e9. Utilities: mean 5e9, sum 5e9.
        company("A", "A", Some(1.0e9), "Energy"),
        company("B", "B", Some(2.0e9), "Energy"),
        company("C", "C", Some(3.0e9), "Energy"),
        company("D", "D", Some(5.0e9), "Utilities"),
    ]);
    let enhanced = engine.compute_enhanced(&dataset).expect("enhanced");
    assert_eq!(enhanced.sector_rankings[0].sector, "Utilities");
    assert_eq!(enhanced.sector_rankings[1].sector, "Energy");
    assert_eq!(enhanced.top_sectors_by_market_cap[0].sector, "Energy");
    assert_eq!(enhanced.top_sectors_by_market_cap[0].total_market_cap, 6.0e9);
}

#[test]
fn tech_split_matches_scenario() {
    let engine = KpiEngine::new();
    let split = engine.compute_enhanced(&scenario_dataset()).expect("enhanced").tech_vs_traditional;
    assert_eq!(split.tech_companies, 3);
    assert_eq!(split.traditional_companies, 0);
    assert_eq!(split.traditional_market_cap, 0.0);
    assert_eq!(split.traditional_avg_market_cap, 0.0);
    assert_eq!(split.tech_market_cap, 5_300_000_000_000.0);
}

#[test]
fn tech_split_honors_custom_sector_set() {
    let engine = KpiEngine::with_tech_sectors(["Energy"]);
    let dataset = Dataset::new(vec![
        company("A", "A", Some(1.0e9), "Energy"),
        company("B", "B", Some(2.0e9), "Technology"),
    ]);
    let split = engine.compute_enhanced(&dataset).expect("enhanced").tech_vs_traditional;
    assert_eq!(split.tech_companies, 1);
    assert_eq!(split.traditional_companies, 1);
    assert_eq!(split.tech_market_cap, 1.0e9);
}

#[test]
fn compute_all_packages_the_three_layers() {
    let engine = KpiEngine::new();
    let summary = engine.compute_all(&scenario_dataset()).expect("summary");
    assert_eq!(summary.base_kpis.total_companies, 3);
    assert_eq!(summary.sector_kpis.sectors.len(), 2);
    assert_eq!(summary.enhanced_kpis.top_companies.len(), 3);
    let metrics = summary.persisted_metrics();
    assert!(metrics.iter().any(|m| m.name == "avg_market_cap"));
    assert!(metrics.iter().any(|m| m.name == "tech_companies" && m.value == 3.0));
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn percentiles_are_monotonically_non_decreasing(
        caps in proptest::collection::vec(0.0_f64..1.0e13, 1..200),
    ) {
        let engine = KpiEngine::new();
        let enhanced = engine.compute_enhanced(&caps_dataset(&caps)).expect("enhanced");
        let p = &enhanced.percentiles;
        assert!(p.p25 <= p.p50);
        assert!(p.p50 <= p.p75);
        assert!(p.p75 <= p.p90);
        assert!(p.p90 <= p.p95);
        assert!(p.p95 <= p.p99);
    }

    #[test]
    fn base_total_equals_row_count(
        caps in proptest::collection::vec(0.0_f64..1.0e13, 1..100),
    ) {
        let engine = KpiEngine::new();
        let base = engine.compute_base(&caps_dataset(&caps)).expect("base kpis");
        assert_eq!(base.total_companies, u64::try_from(caps.len()).expect("row count"));
    }
}
