// crates/capreport-core/src/core/mod.rs
// ============================================================================
// Module: Capreport Core Types
// Description: Dataset model, KPI engine, and run provenance records.
// Purpose: Group the pure domain types consumed by the rest of the workspace.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! The core module groups the dataset model ([`company`]), the pure KPI
//! engine ([`kpi`]), and the run/KPI provenance records ([`run`]).

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod company;
pub mod kpi;
pub mod run;
