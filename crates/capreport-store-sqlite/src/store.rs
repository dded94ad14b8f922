// crates/capreport-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Run Store
// Description: Durable RunStore backed by SQLite WAL.
// Purpose: Persist run provenance and KPI rows across restarts.
// Dependencies: capreport-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! [`SqliteRunStore`] implements [`RunStore`] over two tables, `runs` and
//! `kpis`, with the `kpis.run_id` foreign key enforced at the connection
//! level. Each trait operation is one independently committed transaction.
//! The schema version is recorded in `store_meta` and validated on open;
//! an unknown version fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use capreport_core::KpiId;
use capreport_core::KpiRecord;
use capreport_core::OutputFormat;
use capreport_core::RunId;
use capreport_core::RunRecord;
use capreport_core::RunStatus;
use capreport_core::RunStore;
use capreport_core::StoreError;
use capreport_core::unix_millis;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` run store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a configuration with default pragmas for the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store configuration or data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) | SqliteStoreError::VersionMismatch(message) => {
                Self::Db(message)
            }
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed run store with WAL support.
///
/// # Invariants
/// - `kpis.run_id` references an existing run; the foreign key is enforced.
/// - Connection access is serialized through a mutex.
#[derive(Debug, Clone)]
pub struct SqliteRunStore {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteRunStore {
    /// Opens an `SQLite`-backed run store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized, or when the stored schema version is unsupported.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection.lock().map_err(|_| StoreError::Io("sqlite mutex poisoned".to_string()))
    }
}

impl RunStore for SqliteRunStore {
    fn create_run(
        &self,
        source: &str,
        output_format: OutputFormat,
        rows_processed: Option<u64>,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<RunRecord, StoreError> {
        let connection = self.lock()?;
        let created_at = unix_millis();
        let rows = rows_processed.map(i64::try_from).transpose().map_err(|_| {
            StoreError::Invalid("rows_processed exceeds the storable range".to_string())
        })?;
        connection
            .execute(
                "INSERT INTO runs (created_at, source, output_format, rows_processed, status, \
                 error_message, duration_seconds)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
                params![created_at, source, output_format.as_str(), rows, status.as_str(), error_message],
            )
            .map_err(map_db_error)?;
        let id = RunId::new(connection.last_insert_rowid());
        Ok(RunRecord {
            id,
            created_at,
            source: source.to_string(),
            output_format,
            rows_processed,
            status,
            error_message: error_message.map(ToString::to_string),
            duration_seconds: None,
        })
    }

    fn update_run_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        error_message: Option<&str>,
        duration_seconds: Option<f64>,
    ) -> Result<RunRecord, StoreError> {
        let mut connection = self.lock()?;
        let tx = connection.transaction().map_err(map_db_error)?;
        let updated = tx
            .execute(
                "UPDATE runs SET status = ?1,
                     error_message = COALESCE(?2, error_message),
                     duration_seconds = COALESCE(?3, duration_seconds)
                 WHERE id = ?4",
                params![status.as_str(), error_message, duration_seconds, run_id.get()],
            )
            .map_err(map_db_error)?;
        if updated == 0 {
            return Err(StoreError::NotFound(run_id));
        }
        let record = tx
            .query_row(
                "SELECT id, created_at, source, output_format, rows_processed, status, \
                 error_message, duration_seconds
                 FROM runs WHERE id = ?1",
                params![run_id.get()],
                run_from_row,
            )
            .map_err(map_db_error)?;
        tx.commit().map_err(map_db_error)?;
        Ok(record)
    }

    fn add_kpi(
        &self,
        run_id: RunId,
        name: &str,
        value: f64,
        unit: Option<&str>,
        description: Option<&str>,
    ) -> Result<KpiRecord, StoreError> {
        let connection = self.lock()?;
        let calculated_at = unix_millis();
        connection
            .execute(
                "INSERT INTO kpis (run_id, name, value, unit, description, calculated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![run_id.get(), name, value, unit, description, calculated_at],
            )
            .map_err(|err| map_kpi_insert_error(err, run_id))?;
        let id = KpiId::new(connection.last_insert_rowid());
        Ok(KpiRecord {
            id,
            run_id,
            name: name.to_string(),
            value,
            unit: unit.map(ToString::to_string),
            description: description.map(ToString::to_string),
            calculated_at,
        })
    }

    fn get_run(&self, run_id: RunId) -> Result<Option<RunRecord>, StoreError> {
        let connection = self.lock()?;
        connection
            .query_row(
                "SELECT id, created_at, source, output_format, rows_processed, status, \
                 error_message, duration_seconds
                 FROM runs WHERE id = ?1",
                params![run_id.get()],
                run_from_row,
            )
            .optional()
            .map_err(map_db_error)
    }

    fn kpis_for_run(&self, run_id: RunId) -> Result<Vec<KpiRecord>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(
                "SELECT id, run_id, name, value, unit, description, calculated_at
                 FROM kpis WHERE run_id = ?1 ORDER BY id ASC",
            )
            .map_err(map_db_error)?;
        let rows = statement.query_map(params![run_id.get()], kpi_from_row).map_err(map_db_error)?;
        rows.collect::<Result<Vec<KpiRecord>, rusqlite::Error>>().map_err(map_db_error)
    }

    fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, StoreError> {
        let connection = self.lock()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut statement = connection
            .prepare(
                "SELECT id, created_at, source, output_format, rows_processed, status, \
                 error_message, duration_seconds
                 FROM runs ORDER BY created_at DESC, id DESC LIMIT ?1",
            )
            .map_err(map_db_error)?;
        let rows = statement.query_map(params![limit], run_from_row).map_err(map_db_error)?;
        rows.collect::<Result<Vec<RunRecord>, rusqlite::Error>>().map_err(map_db_error)
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Maps a `runs` row into a [`RunRecord`].
fn run_from_row(row: &Row<'_>) -> Result<RunRecord, rusqlite::Error> {
    let output_format: String = row.get(3)?;
    let output_format = OutputFormat::parse(&output_format)
        .ok_or_else(|| decode_error(3, format!("unknown output format: {output_format}")))?;
    let rows_processed: Option<i64> = row.get(4)?;
    let rows_processed = rows_processed
        .map(u64::try_from)
        .transpose()
        .map_err(|_| decode_error(4, "negative rows_processed".to_string()))?;
    let status: String = row.get(5)?;
    let status = RunStatus::parse(&status)
        .ok_or_else(|| decode_error(5, format!("unknown run status: {status}")))?;
    Ok(RunRecord {
        id: RunId::new(row.get(0)?),
        created_at: row.get(1)?,
        source: row.get(2)?,
        output_format,
        rows_processed,
        status,
        error_message: row.get(6)?,
        duration_seconds: row.get(7)?,
    })
}

/// Maps a `kpis` row into a [`KpiRecord`].
fn kpi_from_row(row: &Row<'_>) -> Result<KpiRecord, rusqlite::Error> {
    Ok(KpiRecord {
        id: KpiId::new(row.get(0)?),
        run_id: RunId::new(row.get(1)?),
        name: row.get(2)?,
        value: row.get(3)?,
        unit: row.get(4)?,
        description: row.get(5)?,
        calculated_at: row.get(6)?,
    })
}

/// Builds a column decode error carrying the offending column index.
fn decode_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

// ============================================================================
// SECTION: Error Mapping
// ============================================================================

/// Maps a `rusqlite` error into a [`StoreError`].
fn map_db_error(error: rusqlite::Error) -> StoreError {
    StoreError::Db(error.to_string())
}

/// Maps a KPI insert failure, turning a foreign-key violation into
/// [`StoreError::MissingRun`].
fn map_kpi_insert_error(error: rusqlite::Error, run_id: RunId) -> StoreError {
    match &error {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StoreError::MissingRun(run_id)
        }
        _ => map_db_error(error),
    }
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Rejects store paths that point at a directory.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Creates the parent directory of the database file when missing.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    }
    Ok(())
}

/// Opens an `SQLite` connection with durability pragmas applied.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability and integrity.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS runs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    created_at INTEGER NOT NULL,
                    source TEXT NOT NULL,
                    output_format TEXT NOT NULL,
                    rows_processed INTEGER,
                    status TEXT NOT NULL,
                    error_message TEXT,
                    duration_seconds REAL
                );
                CREATE INDEX IF NOT EXISTS idx_runs_created_at
                    ON runs (created_at DESC, id DESC);
                CREATE TABLE IF NOT EXISTS kpis (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    run_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    value REAL NOT NULL,
                    unit TEXT,
                    description TEXT,
                    calculated_at INTEGER NOT NULL,
                    FOREIGN KEY (run_id) REFERENCES runs(id)
                );
                CREATE INDEX IF NOT EXISTS idx_kpis_run_id ON kpis (run_id);",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}
