// crates/capreport-core/src/core/company.rs
// ============================================================================
// Module: Capreport Dataset Model
// Description: Typed rows and dataset container for company market-cap data.
// Purpose: Define the tabular input contract consumed by the KPI engine.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Dataset`] is an ordered collection of [`CompanyRecord`] rows loaded
//! from a CSV source. The loader guarantees the four required columns are
//! present ([`REQUIRED_COLUMNS`]); individual rows may still lack a
//! capitalization value, which the KPI engine excludes from value
//! aggregations while counting the row itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Column Contract
// ============================================================================

/// Column headers every input dataset must carry.
///
/// The names match the upstream S&P 500 companies export and are validated
/// by the loader before any computation starts.
pub const REQUIRED_COLUMNS: [&str; 4] = ["Symbol", "Shortname", "Marketcap", "Sector"];

// ============================================================================
// SECTION: Records
// ============================================================================

/// One company row from the input dataset.
///
/// # Invariants
/// - `market_cap`, when present, is a non-negative real number.
/// - `sector` is a free-form category label; the engine treats equal strings
///   as the same sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    /// Ticker-like identifier, e.g. `AAPL`.
    #[serde(rename = "Symbol")]
    pub symbol: String,
    /// Display name, e.g. `Apple Inc.`.
    #[serde(rename = "Shortname")]
    pub name: String,
    /// Market capitalization in USD; `None` when the source cell is empty.
    #[serde(rename = "Marketcap")]
    pub market_cap: Option<f64>,
    /// Sector category label, e.g. `Technology`.
    #[serde(rename = "Sector")]
    pub sector: String,
}

/// Ordered, immutable collection of company rows.
///
/// # Invariants
/// - Row order is the source order; the engine relies on it for
///   deterministic tie-breaking in rankings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Rows in source order.
    rows: Vec<CompanyRecord>,
}

impl Dataset {
    /// Creates a dataset from rows in source order.
    #[must_use]
    pub fn new(rows: Vec<CompanyRecord>) -> Self {
        Self {
            rows,
        }
    }

    /// Returns the rows in source order.
    #[must_use]
    pub fn rows(&self) -> &[CompanyRecord] {
        &self.rows
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when the dataset has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl From<Vec<CompanyRecord>> for Dataset {
    fn from(rows: Vec<CompanyRecord>) -> Self {
        Self::new(rows)
    }
}
