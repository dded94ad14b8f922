// crates/capreport-core/src/core/kpi.rs
// ============================================================================
// Module: Capreport KPI Engine
// Description: Pure derivation of base, sector, and enhanced statistics.
// Purpose: Transform a loaded dataset into the three KPI layers.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! The KPI engine is a pure, deterministic transform from a [`Dataset`] to
//! three layers of derived statistics: dataset-wide aggregates
//! ([`BaseKpis`]), per-sector aggregates ([`SectorKpis`]), and the composite
//! [`EnhancedKpis`] (top-N ranking, percentiles, cap buckets, sector
//! rankings, tech/traditional split). It performs no I/O and never mutates
//! its input.
//!
//! Contract choices, applied uniformly:
//! - A dataset with zero rows fails with [`KpiError::EmptyDataset`], as does
//!   any mean/median/percentile over zero usable capitalization values.
//!   No NaN or null sentinels are produced.
//! - Rows whose capitalization cell is empty count toward row totals and
//!   sector counts but are excluded from every value aggregation.
//! - The `large` and `mega` buckets overlap by construction (`mega` is the
//!   `>= $100B` subset of `large`); the raw counts are reported exactly as
//!   the upstream tool reported them. Flagged for product clarification in
//!   DESIGN.md.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::company::CompanyRecord;
use crate::core::company::Dataset;

// ============================================================================
// SECTION: Policy Constants
// ============================================================================

/// Sectors classified as "tech" in the tech-vs-traditional split.
///
/// Policy constant, not derived from data; override via
/// [`KpiEngine::with_tech_sectors`].
pub const TECH_SECTORS: [&str; 2] = ["Technology", "Communication Services"];

/// Number of companies reported in the top ranking.
const TOP_COMPANIES_LIMIT: usize = 10;
/// Number of sectors reported in the top-by-total-cap sub-view.
const TOP_SECTORS_LIMIT: usize = 5;
/// Upper bound of the small-cap bucket (exclusive), in USD.
const SMALL_CAP_CEILING: f64 = 2e9;
/// Lower bound of the large-cap bucket (inclusive), in USD.
const LARGE_CAP_FLOOR: f64 = 10e9;
/// Lower bound of the mega-cap bucket (inclusive), in USD.
const MEGA_CAP_FLOOR: f64 = 100e9;
/// Percentile ranks reported by the engine, in ascending order.
const PERCENTILE_RANKS: [u64; 6] = [25, 50, 75, 90, 95, 99];
/// Divisor converting USD to billions of USD.
const BILLION: f64 = 1e9;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// KPI computation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KpiError {
    /// The dataset carries no rows, or no rows with a usable capitalization
    /// value where one is required.
    #[error("empty dataset: no rows with capitalization values to aggregate")]
    EmptyDataset,
}

// ============================================================================
// SECTION: Result Types
// ============================================================================

/// Dataset-wide aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseKpis {
    /// Total number of rows, including rows without a capitalization value.
    pub total_companies: u64,
    /// Arithmetic mean of capitalization over rows carrying a value.
    pub avg_market_cap: f64,
    /// Median of capitalization over rows carrying a value.
    pub median_market_cap: f64,
}

/// Aggregates for one sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorKpi {
    /// Sector category label.
    pub sector: String,
    /// Arithmetic mean of capitalization within the sector.
    pub avg_market_cap: f64,
    /// Median of capitalization within the sector.
    pub median_market_cap: f64,
    /// Number of rows in the sector, including rows without a value.
    pub company_count: u64,
}

/// Per-sector aggregates for the whole dataset.
///
/// # Invariants
/// - Sectors are listed in ascending label order for determinism.
/// - `company_count` values sum to the dataset row count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorKpis {
    /// One entry per distinct sector label.
    pub sectors: Vec<SectorKpi>,
}

/// One entry of the top-companies ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopCompany {
    /// Ticker-like identifier.
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Market capitalization in USD.
    pub market_cap: f64,
    /// Market capitalization in billions of USD.
    pub market_cap_billions: f64,
    /// Sector category label.
    pub sector: String,
}

/// Capitalization values at fixed percentile ranks.
///
/// # Invariants
/// - Values are monotonically non-decreasing from `p25` through `p99`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    /// 25th percentile of capitalization.
    pub p25: f64,
    /// 50th percentile of capitalization.
    pub p50: f64,
    /// 75th percentile of capitalization.
    pub p75: f64,
    /// 90th percentile of capitalization.
    pub p90: f64,
    /// 95th percentile of capitalization.
    pub p95: f64,
    /// 99th percentile of capitalization.
    pub p99: f64,
}

/// Bucketed capitalization distribution.
///
/// # Invariants
/// - `small` is `< $2B`, `mid` is `[$2B, $10B)`, `large` is `>= $10B`, and
///   `mega` is `>= $100B`. Every mega row is also a large row, so the four
///   counts do not partition the dataset.
/// - Percentages are relative to the total row count, including rows
///   without a capitalization value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCapDistribution {
    /// Rows below $2B.
    pub small_cap_count: u64,
    /// Rows in `[$2B, $10B)`.
    pub mid_cap_count: u64,
    /// Rows at or above $10B (superset of mega).
    pub large_cap_count: u64,
    /// Rows at or above $100B.
    pub mega_cap_count: u64,
    /// Small bucket share of all rows, in percent.
    pub small_cap_pct: f64,
    /// Mid bucket share of all rows, in percent.
    pub mid_cap_pct: f64,
    /// Large bucket share of all rows, in percent.
    pub large_cap_pct: f64,
    /// Mega bucket share of all rows, in percent.
    pub mega_cap_pct: f64,
}

/// One entry of the sector ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorRanking {
    /// Sector category label.
    pub sector: String,
    /// Arithmetic mean of capitalization within the sector.
    pub avg_market_cap: f64,
    /// Median of capitalization within the sector.
    pub median_market_cap: f64,
    /// Number of rows in the sector.
    pub company_count: u64,
    /// Sum of capitalization within the sector.
    pub total_market_cap: f64,
}

/// Tech-vs-traditional sector split.
///
/// Group membership is decided by the engine's tech sector set; empty
/// groups report zero counts, sums, and averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechSplit {
    /// Rows whose sector is in the tech set.
    pub tech_companies: u64,
    /// Rows whose sector is outside the tech set.
    pub traditional_companies: u64,
    /// Total capitalization of the tech group.
    pub tech_market_cap: f64,
    /// Total capitalization of the traditional group.
    pub traditional_market_cap: f64,
    /// Average capitalization of the tech group; `0.0` when empty.
    pub tech_avg_market_cap: f64,
    /// Average capitalization of the traditional group; `0.0` when empty.
    pub traditional_avg_market_cap: f64,
}

/// Composite of the five enhanced views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedKpis {
    /// Top companies by capitalization, descending, at most ten.
    pub top_companies: Vec<TopCompany>,
    /// Capitalization percentiles.
    pub percentiles: Percentiles,
    /// Bucketed capitalization distribution.
    pub market_cap_distribution: MarketCapDistribution,
    /// Sector rankings sorted descending by mean capitalization.
    pub sector_rankings: Vec<SectorRanking>,
    /// Top sectors by total capitalization, at most five.
    pub top_sectors_by_market_cap: Vec<SectorRanking>,
    /// Tech-vs-traditional split.
    pub tech_vs_traditional: TechSplit,
}

/// All three KPI layers packaged under named keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    /// Dataset-wide aggregates.
    pub base_kpis: BaseKpis,
    /// Per-sector aggregates.
    pub sector_kpis: SectorKpis,
    /// Composite enhanced views.
    pub enhanced_kpis: EnhancedKpis,
}

/// One named metric value flattened for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedMetric {
    /// Stable metric name, e.g. `avg_market_cap`.
    pub name: &'static str,
    /// Metric value.
    pub value: f64,
    /// Unit of measurement, e.g. `USD`.
    pub unit: Option<&'static str>,
    /// Human-readable description.
    pub description: Option<&'static str>,
}

impl KpiSummary {
    /// Flattens the summary into the named metrics persisted per run.
    #[must_use]
    pub fn persisted_metrics(&self) -> Vec<PersistedMetric> {
        let base = &self.base_kpis;
        let dist = &self.enhanced_kpis.market_cap_distribution;
        let split = &self.enhanced_kpis.tech_vs_traditional;
        vec![
            PersistedMetric {
                name: "total_companies",
                value: u64_to_f64(base.total_companies),
                unit: Some("companies"),
                description: Some("Total number of companies in the dataset"),
            },
            PersistedMetric {
                name: "avg_market_cap",
                value: base.avg_market_cap,
                unit: Some("USD"),
                description: Some("Average market capitalization"),
            },
            PersistedMetric {
                name: "median_market_cap",
                value: base.median_market_cap,
                unit: Some("USD"),
                description: Some("Median market capitalization"),
            },
            PersistedMetric {
                name: "small_cap_count",
                value: u64_to_f64(dist.small_cap_count),
                unit: Some("companies"),
                description: Some("Companies below $2B market cap"),
            },
            PersistedMetric {
                name: "mid_cap_count",
                value: u64_to_f64(dist.mid_cap_count),
                unit: Some("companies"),
                description: Some("Companies between $2B and $10B market cap"),
            },
            PersistedMetric {
                name: "large_cap_count",
                value: u64_to_f64(dist.large_cap_count),
                unit: Some("companies"),
                description: Some("Companies at or above $10B market cap"),
            },
            PersistedMetric {
                name: "mega_cap_count",
                value: u64_to_f64(dist.mega_cap_count),
                unit: Some("companies"),
                description: Some("Companies at or above $100B market cap"),
            },
            PersistedMetric {
                name: "tech_companies",
                value: u64_to_f64(split.tech_companies),
                unit: Some("companies"),
                description: Some("Companies in the tech sector set"),
            },
            PersistedMetric {
                name: "traditional_companies",
                value: u64_to_f64(split.traditional_companies),
                unit: Some("companies"),
                description: Some("Companies outside the tech sector set"),
            },
            PersistedMetric {
                name: "tech_market_cap",
                value: split.tech_market_cap,
                unit: Some("USD"),
                description: Some("Total market cap of the tech group"),
            },
            PersistedMetric {
                name: "traditional_market_cap",
                value: split.traditional_market_cap,
                unit: Some("USD"),
                description: Some("Total market cap of the traditional group"),
            },
        ]
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Pure KPI computation engine.
///
/// Constructed explicitly so the tech-sector policy set travels with the
/// engine instead of living in scattered literals.
///
/// # Invariants
/// - Computation is deterministic for a given dataset and configuration.
/// - The engine never mutates its input and performs no I/O.
#[derive(Debug, Clone)]
pub struct KpiEngine {
    /// Sector labels classified as "tech".
    tech_sectors: Vec<String>,
}

impl Default for KpiEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl KpiEngine {
    /// Creates an engine with the default tech sector set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tech_sectors: TECH_SECTORS.iter().map(ToString::to_string).collect(),
        }
    }

    /// Creates an engine with a custom tech sector set.
    #[must_use]
    pub fn with_tech_sectors<I, S>(sectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tech_sectors: sectors.into_iter().map(Into::into).collect(),
        }
    }

    /// Computes dataset-wide aggregates.
    ///
    /// # Errors
    ///
    /// Returns [`KpiError::EmptyDataset`] when the dataset has zero rows or
    /// no row carries a capitalization value.
    pub fn compute_base(&self, dataset: &Dataset) -> Result<BaseKpis, KpiError> {
        if dataset.is_empty() {
            return Err(KpiError::EmptyDataset);
        }
        let caps = present_caps(dataset.rows());
        let avg = mean(&caps).ok_or(KpiError::EmptyDataset)?;
        let med = median(&caps).ok_or(KpiError::EmptyDataset)?;
        Ok(BaseKpis {
            total_companies: rows_as_u64(dataset.len()),
            avg_market_cap: avg,
            median_market_cap: med,
        })
    }

    /// Computes per-sector aggregates, sectors in ascending label order.
    ///
    /// # Errors
    ///
    /// Returns [`KpiError::EmptyDataset`] when the dataset has zero rows or
    /// a sector carries rows but no capitalization values.
    pub fn compute_sector(&self, dataset: &Dataset) -> Result<SectorKpis, KpiError> {
        if dataset.is_empty() {
            return Err(KpiError::EmptyDataset);
        }
        let groups = group_by_sector(dataset.rows());
        let mut sectors = Vec::with_capacity(groups.len());
        for (sector, rows) in groups {
            let caps = present_caps(&rows);
            let avg = mean(&caps).ok_or(KpiError::EmptyDataset)?;
            let med = median(&caps).ok_or(KpiError::EmptyDataset)?;
            sectors.push(SectorKpi {
                sector,
                avg_market_cap: avg,
                median_market_cap: med,
                company_count: rows_as_u64(rows.len()),
            });
        }
        Ok(SectorKpis {
            sectors,
        })
    }

    /// Computes the composite enhanced views.
    ///
    /// # Errors
    ///
    /// Returns [`KpiError::EmptyDataset`] when the dataset has zero rows or
    /// no row carries a capitalization value.
    pub fn compute_enhanced(&self, dataset: &Dataset) -> Result<EnhancedKpis, KpiError> {
        if dataset.is_empty() {
            return Err(KpiError::EmptyDataset);
        }
        let caps = present_caps(dataset.rows());
        if caps.is_empty() {
            return Err(KpiError::EmptyDataset);
        }
        let sector_rankings = sector_rankings(dataset.rows())?;
        let mut top_sectors = sector_rankings.clone();
        top_sectors.sort_by(|a, b| b.total_market_cap.total_cmp(&a.total_market_cap));
        top_sectors.truncate(TOP_SECTORS_LIMIT);
        Ok(EnhancedKpis {
            top_companies: top_companies(dataset.rows()),
            percentiles: percentiles(&caps),
            market_cap_distribution: distribution(dataset.rows(), dataset.len()),
            sector_rankings,
            top_sectors_by_market_cap: top_sectors,
            tech_vs_traditional: self.tech_split(dataset.rows()),
        })
    }

    /// Computes all three KPI layers; no additional logic.
    ///
    /// # Errors
    ///
    /// Returns [`KpiError`] from any of the three underlying computations.
    pub fn compute_all(&self, dataset: &Dataset) -> Result<KpiSummary, KpiError> {
        Ok(KpiSummary {
            base_kpis: self.compute_base(dataset)?,
            sector_kpis: self.compute_sector(dataset)?,
            enhanced_kpis: self.compute_enhanced(dataset)?,
        })
    }

    /// Returns `true` when the sector label belongs to the tech set.
    fn is_tech(&self, sector: &str) -> bool {
        self.tech_sectors.iter().any(|tech| tech == sector)
    }

    /// Computes the tech-vs-traditional split.
    fn tech_split(&self, rows: &[CompanyRecord]) -> TechSplit {
        let mut tech_count: u64 = 0;
        let mut traditional_count: u64 = 0;
        let mut tech_caps = Vec::new();
        let mut traditional_caps = Vec::new();
        for row in rows {
            if self.is_tech(&row.sector) {
                tech_count += 1;
                if let Some(cap) = row.market_cap {
                    tech_caps.push(cap);
                }
            } else {
                traditional_count += 1;
                if let Some(cap) = row.market_cap {
                    traditional_caps.push(cap);
                }
            }
        }
        TechSplit {
            tech_companies: tech_count,
            traditional_companies: traditional_count,
            tech_market_cap: tech_caps.iter().sum(),
            traditional_market_cap: traditional_caps.iter().sum(),
            tech_avg_market_cap: mean(&tech_caps).unwrap_or(0.0),
            traditional_avg_market_cap: mean(&traditional_caps).unwrap_or(0.0),
        }
    }
}

// ============================================================================
// SECTION: Aggregation Helpers
// ============================================================================

/// Collects the capitalization values present in the given rows.
fn present_caps(rows: &[CompanyRecord]) -> Vec<f64> {
    rows.iter().filter_map(|row| row.market_cap).collect()
}

/// Arithmetic mean; `None` over zero values.
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    Some(sum / usize_to_f64(values.len()))
}

/// Conventional median (average of middle order statistics when even);
/// `None` over zero values.
fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Groups rows by sector label, groups in ascending label order.
fn group_by_sector(rows: &[CompanyRecord]) -> Vec<(String, Vec<CompanyRecord>)> {
    let mut groups: Vec<(String, Vec<CompanyRecord>)> = Vec::new();
    for row in rows {
        match groups.iter_mut().find(|(sector, _)| sector == &row.sector) {
            Some((_, members)) => members.push(row.clone()),
            None => groups.push((row.sector.clone(), vec![row.clone()])),
        }
    }
    groups.sort_by(|a, b| a.0.cmp(&b.0));
    groups
}

/// Builds the sector ranking sorted descending by mean capitalization.
fn sector_rankings(rows: &[CompanyRecord]) -> Result<Vec<SectorRanking>, KpiError> {
    let groups = group_by_sector(rows);
    let mut rankings = Vec::with_capacity(groups.len());
    for (sector, members) in groups {
        let caps = present_caps(&members);
        let avg = mean(&caps).ok_or(KpiError::EmptyDataset)?;
        let med = median(&caps).ok_or(KpiError::EmptyDataset)?;
        rankings.push(SectorRanking {
            sector,
            avg_market_cap: avg,
            median_market_cap: med,
            company_count: rows_as_u64(members.len()),
            total_market_cap: caps.iter().sum(),
        });
    }
    rankings.sort_by(|a, b| b.avg_market_cap.total_cmp(&a.avg_market_cap));
    Ok(rankings)
}

/// Builds the top-companies ranking, descending by capitalization.
///
/// Ties keep source order (stable sort), which makes the ranking
/// deterministic for equal capitalization values.
fn top_companies(rows: &[CompanyRecord]) -> Vec<TopCompany> {
    let mut ranked: Vec<(f64, &CompanyRecord)> =
        rows.iter().filter_map(|row| row.market_cap.map(|cap| (cap, row))).collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    ranked
        .into_iter()
        .take(TOP_COMPANIES_LIMIT)
        .map(|(cap, row)| TopCompany {
            symbol: row.symbol.clone(),
            name: row.name.clone(),
            market_cap: cap,
            market_cap_billions: cap / BILLION,
            sector: row.sector.clone(),
        })
        .collect()
}

/// Computes the fixed percentile ranks with linear interpolation.
fn percentiles(caps: &[f64]) -> Percentiles {
    let mut sorted = caps.to_vec();
    sorted.sort_by(f64::total_cmp);
    let values: Vec<f64> =
        PERCENTILE_RANKS.iter().map(|&rank| percentile_interpolated(&sorted, rank)).collect();
    Percentiles {
        p25: values[0],
        p50: values[1],
        p75: values[2],
        p90: values[3],
        p95: values[4],
        p99: values[5],
    }
}

/// Linear interpolation between order statistics for one percentile rank.
///
/// Uses the conventional continuous method: the rank position is
/// `pct * (n - 1) / 100`, interpolating between the flanking values.
fn percentile_interpolated(sorted: &[f64], pct: u64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let span = u64::try_from(n - 1).unwrap_or(u64::MAX);
    let position = pct * span;
    let index = usize::try_from(position / 100).unwrap_or(n - 1).min(n - 1);
    let fraction = u64_to_f64(position % 100) / 100.0;
    let lower = sorted[index];
    let upper = sorted[(index + 1).min(n - 1)];
    upper.mul_add(fraction, lower * (1.0 - fraction))
}

/// Buckets rows by capitalization and reports counts plus shares of total.
fn distribution(rows: &[CompanyRecord], total_rows: usize) -> MarketCapDistribution {
    let mut small: u64 = 0;
    let mut mid: u64 = 0;
    let mut large: u64 = 0;
    let mut mega: u64 = 0;
    for cap in rows.iter().filter_map(|row| row.market_cap) {
        if cap < SMALL_CAP_CEILING {
            small += 1;
        } else if cap < LARGE_CAP_FLOOR {
            mid += 1;
        } else {
            // large deliberately includes mega; the overlap is preserved.
            large += 1;
        }
        if cap >= MEGA_CAP_FLOOR {
            mega += 1;
        }
    }
    let total = usize_to_f64(total_rows);
    let pct = |count: u64| u64_to_f64(count) / total * 100.0;
    MarketCapDistribution {
        small_cap_count: small,
        mid_cap_count: mid,
        large_cap_count: large,
        mega_cap_count: mega,
        small_cap_pct: pct(small),
        mid_cap_pct: pct(mid),
        large_cap_pct: pct(large),
        mega_cap_pct: pct(mega),
    }
}

// ============================================================================
// SECTION: Numeric Conversions
// ============================================================================

/// Converts a row count to `u64`.
fn rows_as_u64(count: usize) -> u64 {
    u64::try_from(count).unwrap_or(u64::MAX)
}

/// Converts a row count to `f64` for ratio computations.
#[allow(clippy::cast_precision_loss, reason = "row counts are far below 2^52")]
fn usize_to_f64(value: usize) -> f64 {
    value as f64
}

/// Converts a metric count to `f64` for persistence and ratios.
#[allow(clippy::cast_precision_loss, reason = "metric counts are far below 2^52")]
pub(crate) fn u64_to_f64(value: u64) -> f64 {
    value as f64
}
