// crates/capreport-core/src/interfaces/mod.rs
// ============================================================================
// Module: Capreport Interfaces
// Description: Backend-agnostic run-store contract and in-memory reference.
// Purpose: Define the persistence surface used by orchestrators.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! [`RunStore`] is the only persistence surface in capreport. Each operation
//! is a single, independently committed transaction; there is no
//! cross-operation transaction spanning create → add-KPI → update-status,
//! and a crash mid-pipeline may leave a run in `processing` with a partial
//! KPI set. Implementations must tolerate concurrent writers through their
//! backing store's native isolation.
//!
//! [`InMemoryRunStore`] is the reference implementation used by tests and
//! as the default server store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;

use thiserror::Error;

use crate::core::run::KpiId;
use crate::core::run::KpiRecord;
use crate::core::run::OutputFormat;
use crate::core::run::RunId;
use crate::core::run::RunRecord;
use crate::core::run::RunStatus;
use crate::core::run::unix_millis;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Run store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The referenced run does not exist.
    #[error("run not found: {0}")]
    NotFound(RunId),
    /// A KPI insert referenced a run that does not exist.
    #[error("kpi references missing run: {0}")]
    MissingRun(RunId),
    /// Invalid input to a store operation.
    #[error("invalid store input: {0}")]
    Invalid(String),
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Backing database error.
    #[error("store db error: {0}")]
    Db(String),
}

// ============================================================================
// SECTION: Run Store Contract
// ============================================================================

/// Durable, queryable record of pipeline executions and derived metrics.
///
/// Implementations own the `run` and `kpi` rows exclusively; no other
/// component writes to the backing store.
pub trait RunStore: Send + Sync {
    /// Inserts a new run and returns the fully populated record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn create_run(
        &self,
        source: &str,
        output_format: OutputFormat,
        rows_processed: Option<u64>,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<RunRecord, StoreError>;

    /// Transitions a run's status and returns a fresh immutable snapshot.
    ///
    /// Error message and duration are set only when provided. The update is
    /// atomic with respect to concurrent readers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when `run_id` does not resolve.
    fn update_run_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        error_message: Option<&str>,
        duration_seconds: Option<f64>,
    ) -> Result<RunRecord, StoreError>;

    /// Inserts a KPI row referencing `run_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingRun`] when `run_id` does not exist; no
    /// orphan row is created.
    fn add_kpi(
        &self,
        run_id: RunId,
        name: &str,
        value: f64,
        unit: Option<&str>,
        description: Option<&str>,
    ) -> Result<KpiRecord, StoreError>;

    /// Point lookup of one run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails; a missing run is
    /// `Ok(None)`, not an error.
    fn get_run(&self, run_id: RunId) -> Result<Option<RunRecord>, StoreError>;

    /// Returns all KPIs for a run in insertion order; empty when none exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn kpis_for_run(&self, run_id: RunId) -> Result<Vec<KpiRecord>, StoreError>;

    /// Returns at most `limit` runs, newest first.
    ///
    /// Ordered by creation timestamp descending with identifier descending
    /// as tie-break, which is a stable total order because identifiers are
    /// monotonically increasing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, StoreError>;
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Mutable store contents behind the lock.
#[derive(Debug, Default)]
struct InMemoryInner {
    /// Run rows in insertion order.
    runs: Vec<RunRecord>,
    /// KPI rows in insertion order.
    kpis: Vec<KpiRecord>,
    /// Next run identifier to assign.
    next_run_id: i64,
    /// Next KPI identifier to assign.
    next_kpi_id: i64,
}

/// In-memory [`RunStore`] for tests and default server wiring.
///
/// # Invariants
/// - Identifiers are assigned monotonically starting at 1.
/// - All operations take the single mutex, so readers never observe a
///   half-written row.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    /// Store contents guarded by a mutex.
    inner: Mutex<InMemoryInner>,
}

impl InMemoryRunStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the store contents.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryInner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Io("store mutex poisoned".to_string()))
    }
}

impl RunStore for InMemoryRunStore {
    fn create_run(
        &self,
        source: &str,
        output_format: OutputFormat,
        rows_processed: Option<u64>,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<RunRecord, StoreError> {
        let mut inner = self.lock()?;
        inner.next_run_id += 1;
        let record = RunRecord {
            id: RunId::new(inner.next_run_id),
            created_at: unix_millis(),
            source: source.to_string(),
            output_format,
            rows_processed,
            status,
            error_message: error_message.map(ToString::to_string),
            duration_seconds: None,
        };
        inner.runs.push(record.clone());
        Ok(record)
    }

    fn update_run_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        error_message: Option<&str>,
        duration_seconds: Option<f64>,
    ) -> Result<RunRecord, StoreError> {
        let mut inner = self.lock()?;
        let run = inner
            .runs
            .iter_mut()
            .find(|run| run.id == run_id)
            .ok_or(StoreError::NotFound(run_id))?;
        run.status = status;
        if let Some(message) = error_message {
            run.error_message = Some(message.to_string());
        }
        if let Some(duration) = duration_seconds {
            run.duration_seconds = Some(duration);
        }
        Ok(run.clone())
    }

    fn add_kpi(
        &self,
        run_id: RunId,
        name: &str,
        value: f64,
        unit: Option<&str>,
        description: Option<&str>,
    ) -> Result<KpiRecord, StoreError> {
        let mut inner = self.lock()?;
        if !inner.runs.iter().any(|run| run.id == run_id) {
            return Err(StoreError::MissingRun(run_id));
        }
        inner.next_kpi_id += 1;
        let record = KpiRecord {
            id: KpiId::new(inner.next_kpi_id),
            run_id,
            name: name.to_string(),
            value,
            unit: unit.map(ToString::to_string),
            description: description.map(ToString::to_string),
            calculated_at: unix_millis(),
        };
        inner.kpis.push(record.clone());
        Ok(record)
    }

    fn get_run(&self, run_id: RunId) -> Result<Option<RunRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.runs.iter().find(|run| run.id == run_id).cloned())
    }

    fn kpis_for_run(&self, run_id: RunId) -> Result<Vec<KpiRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.kpis.iter().filter(|kpi| kpi.run_id == run_id).cloned().collect())
    }

    fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, StoreError> {
        let inner = self.lock()?;
        let mut runs: Vec<RunRecord> = inner.runs.clone();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        runs.truncate(limit);
        Ok(runs)
    }
}
