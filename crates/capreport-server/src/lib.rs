// crates/capreport-server/src/lib.rs
// ============================================================================
// Module: Capreport Server Library
// Description: HTTP surface for dataset upload and run history.
// Purpose: Expose the pipeline and run store over three JSON endpoints.
// Dependencies: axum, capreport-core, capreport-loader, capreport-report,
//               capreport-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! Three endpoints, all JSON:
//! - `POST /upload` runs the pipeline on an uploaded CSV body.
//! - `GET /runs` lists recent runs, newest first.
//! - `GET /runs/{id}` returns one run with its persisted KPIs.
//!
//! The HTTP layer stays thin: request handling delegates to the pipeline
//! and run store, and errors map to 4xx/5xx with a JSON error body.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use server::AppState;
pub use server::ReportServer;
pub use server::RunsParams;
pub use server::ServerConfig;
pub use server::ServerError;
pub use server::UploadParams;
pub use server::process_run_detail;
pub use server::process_runs;
pub use server::process_upload;
