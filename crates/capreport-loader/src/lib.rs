// crates/capreport-loader/src/lib.rs
// ============================================================================
// Module: Capreport Loader Library
// Description: Dataset loading from local CSV files and HTTP(S) URLs.
// Purpose: Turn a source string into a validated in-memory dataset.
// Dependencies: capreport-core, csv, reqwest, thiserror, tracing
// ============================================================================

//! ## Overview
//! The loader is the only component that touches raw input. It resolves a
//! source string (local path or `http(s)` URL) into a
//! [`capreport_core::Dataset`], enforcing the required-column contract
//! before any row is handed to computation. Downloads are size-capped and
//! non-success statuses fail closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod loader;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use loader::DatasetLoader;
pub use loader::LoadError;
pub use loader::LoaderConfig;
pub use loader::MAX_DOWNLOAD_BYTES;
