// crates/capreport-loader/src/loader.rs
// ============================================================================
// Module: Capreport Dataset Loader
// Description: CSV ingestion from local paths and HTTP(S) URLs.
// Purpose: Resolve a source string into a validated dataset.
// Dependencies: capreport-core, csv, reqwest, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`DatasetLoader`] resolves a source string into a [`Dataset`]:
//! - `http://` and `https://` sources are downloaded with a 30 second
//!   timeout and a [`MAX_DOWNLOAD_BYTES`] size cap; non-success statuses
//!   fail closed.
//! - Any other source string is treated as a local file path.
//!
//! The header row is validated against [`REQUIRED_COLUMNS`] before any row
//! is deserialized; a violation lists every missing column in one error.
//! Extra columns are ignored.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use capreport_core::CompanyRecord;
use capreport_core::Dataset;
use capreport_core::REQUIRED_COLUMNS;
use reqwest::blocking::Client;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted size of a downloaded dataset in bytes.
pub const MAX_DOWNLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Timeout applied to dataset downloads.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Dataset loading errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// No source argument was given and no default source is configured.
    #[error("no dataset source given and no default configured")]
    NoSource,
    /// The source path does not exist.
    #[error("dataset file not found: {0}")]
    NotFound(String),
    /// Local file I/O failed.
    #[error("dataset io error: {0}")]
    Io(String),
    /// The download request failed.
    #[error("dataset download failed: {0}")]
    Download(String),
    /// The download completed with a non-success status.
    #[error("dataset download returned status {status} for {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code of the response.
        status: u16,
    },
    /// The downloaded payload exceeds the size cap.
    #[error("dataset exceeds {max_bytes} bytes")]
    TooLarge {
        /// Maximum accepted payload size in bytes.
        max_bytes: usize,
    },
    /// The header row is missing required columns.
    #[error("dataset missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    /// A row failed CSV parsing or deserialization.
    #[error("dataset parse error: {0}")]
    Parse(String),
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Loader configuration.
///
/// The default source is an explicit field rather than a literal scattered
/// through call sites; callers that want a fallback dataset opt in here.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// Dataset used when a load call passes no source.
    default_source: Option<PathBuf>,
}

impl LoaderConfig {
    /// Creates a configuration with no default source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the dataset used when a load call passes no source.
    #[must_use]
    pub fn default_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_source = Some(path.into());
        self
    }
}

// ============================================================================
// SECTION: Dataset Loader
// ============================================================================

/// Loads datasets from local CSV files or HTTP(S) URLs.
///
/// # Invariants
/// - Required columns are validated before any row is deserialized.
/// - Downloaded payloads never exceed [`MAX_DOWNLOAD_BYTES`].
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    /// HTTP client used for URL sources.
    client: Client,
    /// Loader configuration.
    config: LoaderConfig,
}

impl DatasetLoader {
    /// Builds a loader with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Download`] when the HTTP client cannot be
    /// constructed.
    pub fn new() -> Result<Self, LoadError> {
        Self::with_config(LoaderConfig::default())
    }

    /// Builds a loader with a specific configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Download`] when the HTTP client cannot be
    /// constructed.
    pub fn with_config(config: LoaderConfig) -> Result<Self, LoadError> {
        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|err| LoadError::Download(err.to_string()))?;
        Ok(Self {
            client,
            config,
        })
    }

    /// Resolves `source` (or the configured default) into a dataset.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::NoSource`] when neither an argument nor a
    /// default source is available, and the corresponding variant for
    /// download, I/O, column, and parse failures.
    pub fn load(&self, source: Option<&str>) -> Result<Dataset, LoadError> {
        let resolved = match source {
            Some(value) => value.to_string(),
            None => self
                .config
                .default_source
                .as_ref()
                .map(|path| path.display().to_string())
                .ok_or(LoadError::NoSource)?,
        };
        debug!(source = %resolved, "loading dataset");
        let dataset = if is_url(&resolved) {
            let body = self.download(&resolved)?;
            parse_csv(body.as_bytes())?
        } else {
            load_path(Path::new(&resolved))?
        };
        debug!(rows = dataset.len(), "dataset loaded");
        Ok(dataset)
    }

    /// Downloads a URL source into a size-capped string body.
    fn download(&self, url: &str) -> Result<String, LoadError> {
        let response =
            self.client.get(url).send().map_err(|err| LoadError::Download(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if let Some(length) = response.content_length()
            && length > max_download_bytes_u64()
        {
            return Err(LoadError::TooLarge {
                max_bytes: MAX_DOWNLOAD_BYTES,
            });
        }
        // Read one byte past the cap so an oversized body without a
        // Content-Length header is still detected.
        let limit = max_download_bytes_u64().saturating_add(1);
        let mut limited = response.take(limit);
        let mut bytes = Vec::new();
        limited.read_to_end(&mut bytes).map_err(|err| LoadError::Download(err.to_string()))?;
        if bytes.len() > MAX_DOWNLOAD_BYTES {
            return Err(LoadError::TooLarge {
                max_bytes: MAX_DOWNLOAD_BYTES,
            });
        }
        String::from_utf8(bytes).map_err(|err| LoadError::Parse(err.to_string()))
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Loads a dataset from a local CSV file.
fn load_path(path: &Path) -> Result<Dataset, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.display().to_string()));
    }
    let file = File::open(path).map_err(|err| LoadError::Io(err.to_string()))?;
    parse_csv(file)
}

/// Parses CSV bytes into a dataset, validating the header row first.
fn parse_csv(input: impl Read) -> Result<Dataset, LoadError> {
    let mut reader = csv::Reader::from_reader(input);
    let headers = reader.headers().map_err(|err| LoadError::Parse(err.to_string()))?;
    validate_columns(headers)?;
    let mut rows: Vec<CompanyRecord> = Vec::new();
    for row in reader.deserialize() {
        let record: CompanyRecord = row.map_err(|err| LoadError::Parse(err.to_string()))?;
        rows.push(record);
    }
    Ok(Dataset::new(rows))
}

/// Rejects header rows missing any required column, listing every one.
fn validate_columns(headers: &csv::StringRecord) -> Result<(), LoadError> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|header| header == **column))
        .map(ToString::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(LoadError::MissingColumns(missing))
    }
}

/// Returns true when the source string is an HTTP(S) URL.
fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Returns the download cap as a `u64` for content-length comparison.
const fn max_download_bytes_u64() -> u64 {
    MAX_DOWNLOAD_BYTES as u64
}
