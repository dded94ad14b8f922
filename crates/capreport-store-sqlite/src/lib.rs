// crates/capreport-store-sqlite/src/lib.rs
// ============================================================================
// Module: Capreport SQLite Store Library
// Description: Durable RunStore implementation backed by SQLite.
// Purpose: Persist runs and KPIs across process restarts.
// Dependencies: capreport-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! SQLite-backed implementation of [`capreport_core::RunStore`]. Runs and
//! KPIs live in two tables with an enforced foreign key; WAL journaling is
//! the default. See [`store::SqliteRunStore`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteJournalMode;
pub use store::SqliteRunStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteSyncMode;
