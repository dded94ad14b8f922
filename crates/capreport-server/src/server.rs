// crates/capreport-server/src/server.rs
// ============================================================================
// Module: Capreport HTTP Server
// Description: Upload and run-history endpoints over axum.
// Purpose: Run the pipeline on uploaded datasets and expose run history.
// Dependencies: axum, capreport-core, capreport-loader, capreport-report,
//               capreport-store-sqlite, tempfile, tokio
// ============================================================================

//! ## Overview
//! [`ReportServer`] binds an axum router over shared [`AppState`]. The
//! request-processing functions are synchronous and handler-independent;
//! the async handlers wrap them in `spawn_blocking` because the loader and
//! the SQLite store both block. Uploaded bodies are size-capped and spooled
//! to a temporary file for the loader.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::routing::post;
use capreport_core::InMemoryRunStore;
use capreport_core::KpiEngine;
use capreport_core::OutputFormat;
use capreport_core::RunId;
use capreport_core::RunStatus;
use capreport_core::RunStore;
use capreport_loader::DatasetLoader;
use capreport_loader::LoadError;
use capreport_report::Pipeline;
use capreport_report::PipelineError;
use capreport_report::PipelineRequest;
use capreport_report::Renderer;
use capreport_store_sqlite::SqliteRunStore;
use capreport_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tracing::info;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default bind address.
const DEFAULT_BIND: &str = "127.0.0.1:8000";
/// Default maximum upload body size in bytes.
const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;
/// Default number of runs returned by the listing endpoint.
const DEFAULT_RECENT_LIMIT: usize = 20;
/// Source label prefix recorded for uploaded datasets.
const UPLOAD_LABEL_PREFIX: &str = "upload:";
/// Filename recorded when the upload does not name one.
const DEFAULT_UPLOAD_NAME: &str = "dataset.csv";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server construction and transport errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid server configuration.
    #[error("server config error: {0}")]
    Config(String),
    /// Component initialization failed.
    #[error("server init error: {0}")]
    Init(String),
    /// Transport-level failure.
    #[error("server transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. `127.0.0.1:8000`.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum accepted upload body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Path to the `SQLite` run store; `None` uses an in-memory store.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    /// Default number of runs returned by `GET /runs`.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            store_path: None,
            recent_limit: default_recent_limit(),
        }
    }
}

/// Returns the default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Returns the default maximum upload body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Returns the default run listing limit.
const fn default_recent_limit() -> usize {
    DEFAULT_RECENT_LIMIT
}

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared state behind the HTTP handlers.
pub struct AppState {
    /// Pipeline driven by the upload endpoint.
    pipeline: Pipeline,
    /// Run store backing all endpoints.
    store: Arc<dyn RunStore>,
    /// Maximum accepted upload body size in bytes.
    max_body_bytes: usize,
    /// Default run listing limit.
    recent_limit: usize,
}

impl AppState {
    /// Builds the shared state from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Init`] when a collaborator cannot be built.
    pub fn new(config: &ServerConfig) -> Result<Self, ServerError> {
        let store: Arc<dyn RunStore> = match &config.store_path {
            Some(path) => {
                let store = SqliteRunStore::new(&SqliteStoreConfig::new(path))
                    .map_err(|err| ServerError::Init(err.to_string()))?;
                Arc::new(store)
            }
            None => Arc::new(InMemoryRunStore::new()),
        };
        let loader = DatasetLoader::new().map_err(|err| ServerError::Init(err.to_string()))?;
        let pipeline = Pipeline::new(loader, KpiEngine::new(), Renderer::new());
        Ok(Self {
            pipeline,
            store,
            max_body_bytes: config.max_body_bytes,
            recent_limit: config.recent_limit,
        })
    }

    /// Builds state over an existing store, for embedding and tests.
    #[must_use]
    pub fn with_store(config: &ServerConfig, store: Arc<dyn RunStore>, pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            store,
            max_body_bytes: config.max_body_bytes,
            recent_limit: config.recent_limit,
        }
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server instance.
pub struct ReportServer {
    /// Server configuration.
    config: ServerConfig,
    /// Shared handler state.
    state: Arc<AppState>,
}

impl ReportServer {
    /// Builds a server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when initialization fails.
    pub fn from_config(config: ServerConfig) -> Result<Self, ServerError> {
        let state = Arc::new(AppState::new(&config)?);
        Ok(Self {
            config,
            state,
        })
    }

    /// Serves requests until the process is stopped.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr: SocketAddr = self
            .config
            .bind
            .parse()
            .map_err(|_| ServerError::Config(format!("invalid bind address: {}", self.config.bind)))?;
        let app = Router::new()
            .route("/upload", post(handle_upload))
            .route("/runs", get(handle_runs))
            .route("/runs/{id}", get(handle_run_detail))
            .with_state(Arc::clone(&self.state));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| ServerError::Transport(format!("http bind failed: {err}")))?;
        info!(bind = %addr, "report server listening");
        axum::serve(listener, app)
            .await
            .map_err(|err| ServerError::Transport(format!("http server failed: {err}")))
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Upload endpoint query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadParams {
    /// Original filename recorded on the run.
    pub filename: Option<String>,
    /// Requested report format label; defaults to `markdown`.
    pub output_format: Option<String>,
}

/// Run listing query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunsParams {
    /// Maximum number of runs to return.
    pub limit: Option<usize>,
    /// Whether `test` status runs are included; defaults to `false`.
    pub include_tests: Option<bool>,
}

/// `POST /upload` handler.
async fn handle_upload(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> impl IntoResponse {
    let result =
        tokio::task::spawn_blocking(move || process_upload(&state, &params, &body)).await;
    into_response(result)
}

/// `GET /runs` handler.
async fn handle_runs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RunsParams>,
) -> impl IntoResponse {
    let result = tokio::task::spawn_blocking(move || process_runs(&state, &params)).await;
    into_response(result)
}

/// `GET /runs/{id}` handler.
async fn handle_run_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let result =
        tokio::task::spawn_blocking(move || process_run_detail(&state, RunId::new(id))).await;
    into_response(result)
}

/// Converts a blocking-task result into an axum response.
fn into_response(
    result: Result<(StatusCode, Value), tokio::task::JoinError>,
) -> (StatusCode, axum::Json<Value>) {
    let (status, body) = result.unwrap_or_else(|err| {
        (StatusCode::INTERNAL_SERVER_ERROR, error_body(&format!("worker task failed: {err}")))
    });
    (status, axum::Json(body))
}

// ============================================================================
// SECTION: Request Processing
// ============================================================================

/// Runs the pipeline on an uploaded CSV body.
///
/// The body is spooled to a temporary file for the loader; the recorded
/// source label keeps the original filename.
#[must_use]
pub fn process_upload(state: &AppState, params: &UploadParams, body: &[u8]) -> (StatusCode, Value) {
    if body.len() > state.max_body_bytes {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            error_body(&format!("upload exceeds {} bytes", state.max_body_bytes)),
        );
    }
    let format = match &params.output_format {
        None => OutputFormat::Markdown,
        Some(label) => match OutputFormat::parse(label) {
            Some(format) => format,
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    error_body(&format!("unknown output format: {label}")),
                );
            }
        },
    };
    let mut spool = match tempfile::NamedTempFile::new() {
        Ok(file) => file,
        Err(err) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body(&format!("upload spool failed: {err}")),
            );
        }
    };
    if let Err(err) = spool.write_all(body) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body(&format!("upload spool failed: {err}")),
        );
    }
    let filename = params.filename.as_deref().unwrap_or(DEFAULT_UPLOAD_NAME);
    let request = PipelineRequest::new(format)
        .source(spool.path().display().to_string())
        .label(format!("{UPLOAD_LABEL_PREFIX}{filename}"));
    match state.pipeline.execute(state.store.as_ref(), None, &request) {
        Ok(outcome) => (
            StatusCode::OK,
            json!({
                "run": outcome.run,
                "summary": outcome.summary,
            }),
        ),
        Err(err) => map_pipeline_error(&err),
    }
}

/// Lists recent runs, newest first, excluding `test` runs by default.
#[must_use]
pub fn process_runs(state: &AppState, params: &RunsParams) -> (StatusCode, Value) {
    let limit = params.limit.unwrap_or(state.recent_limit);
    let include_tests = params.include_tests.unwrap_or(false);
    match state.store.recent_runs(limit) {
        Ok(runs) => {
            let runs: Vec<_> = runs
                .into_iter()
                .filter(|run| include_tests || run.status != RunStatus::Test)
                .collect();
            (StatusCode::OK, json!({ "runs": runs }))
        }
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(&err.to_string())),
    }
}

/// Returns one run with its persisted KPIs.
#[must_use]
pub fn process_run_detail(state: &AppState, run_id: RunId) -> (StatusCode, Value) {
    let run = match state.store.get_run(run_id) {
        Ok(Some(run)) => run,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, error_body(&format!("run not found: {run_id}")));
        }
        Err(err) => return (StatusCode::INTERNAL_SERVER_ERROR, error_body(&err.to_string())),
    };
    match state.store.kpis_for_run(run_id) {
        Ok(kpis) => (StatusCode::OK, json!({ "run": run, "kpis": kpis })),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(&err.to_string())),
    }
}

// ============================================================================
// SECTION: Error Mapping
// ============================================================================

/// Maps a pipeline error to an HTTP status and JSON body.
fn map_pipeline_error(error: &PipelineError) -> (StatusCode, Value) {
    let status = match error {
        PipelineError::Load(LoadError::TooLarge {
            ..
        }) => StatusCode::PAYLOAD_TOO_LARGE,
        PipelineError::Load(_) | PipelineError::Kpi(_) => StatusCode::BAD_REQUEST,
        PipelineError::Render(_) | PipelineError::Store(_) | PipelineError::Mail(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, error_body(&error.to_string()))
}

/// Builds the JSON error body.
fn error_body(message: &str) -> Value {
    json!({ "error": message })
}
