// crates/capreport-core/src/core/run.rs
// ============================================================================
// Module: Capreport Run Provenance
// Description: Run and KPI records persisted per pipeline execution.
// Purpose: Provide the typed provenance model shared by all run stores.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every pipeline invocation produces one [`RunRecord`] plus zero or more
//! [`KpiRecord`] rows keyed to it. Records are immutable snapshots: stores
//! return fresh values from every operation, and status transitions go
//! through [`crate::interfaces::RunStore::update_run_status`] rather than
//! in-place mutation of a live object.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifiers
// ============================================================================

/// Run identifier assigned by the store on creation.
///
/// # Invariants
/// - Always >= 1; stores assign identifiers monotonically increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(i64);

impl RunId {
    /// Creates a run identifier from a raw store value.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// KPI row identifier assigned by the store on creation.
///
/// # Invariants
/// - Always >= 1; stores assign identifiers monotonically increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KpiId(i64);

impl KpiId {
    /// Creates a KPI identifier from a raw store value.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for KpiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Enumerations
// ============================================================================

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The pipeline is still executing.
    Processing,
    /// The pipeline finished and the full KPI set is persisted.
    Completed,
    /// The pipeline failed; `error_message` carries the cause.
    Failed,
    /// Row created by a test; excluded from default listings.
    Test,
}

impl RunStatus {
    /// Returns the stable wire label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Test => "test",
        }
    }

    /// Parses a stable wire label into a status.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "test" => Some(Self::Test),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format of the rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Markdown document.
    Markdown,
    /// HTML document.
    Html,
}

impl OutputFormat {
    /// Returns the stable wire label for the format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
        }
    }

    /// Parses a stable wire label into a format.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "markdown" => Some(Self::Markdown),
            "html" => Some(Self::Html),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// One recorded execution of the load→compute→report pipeline.
///
/// # Invariants
/// - `error_message` is populated only when `status` is [`RunStatus::Failed`].
/// - `created_at` is unix epoch milliseconds assigned at insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Store-assigned identifier.
    pub id: RunId,
    /// Creation timestamp, unix epoch milliseconds.
    pub created_at: i64,
    /// Source identifier (file name, path, or URL string).
    pub source: String,
    /// Rendered output format for the run.
    pub output_format: OutputFormat,
    /// Number of rows processed; `None` before load completes.
    pub rows_processed: Option<u64>,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Failure cause when `status` is `failed`.
    pub error_message: Option<String>,
    /// Pipeline duration in seconds; populated on completion.
    pub duration_seconds: Option<f64>,
}

/// One derived metric value persisted against a run.
///
/// # Invariants
/// - `run_id` references a run that existed at insertion time.
/// - Records are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiRecord {
    /// Store-assigned identifier.
    pub id: KpiId,
    /// Owning run.
    pub run_id: RunId,
    /// Stable metric name, e.g. `avg_market_cap`.
    pub name: String,
    /// Metric value.
    pub value: f64,
    /// Unit of measurement, e.g. `USD`.
    pub unit: Option<String>,
    /// Human-readable description of the metric.
    pub description: Option<String>,
    /// Calculation timestamp, unix epoch milliseconds.
    pub calculated_at: i64,
}

// ============================================================================
// SECTION: Time
// ============================================================================

/// Returns the current unix epoch in milliseconds.
///
/// The single wall-clock read in the core; stores use it to assign
/// creation and calculation timestamps.
#[must_use]
pub fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
