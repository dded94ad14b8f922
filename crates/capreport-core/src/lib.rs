// crates/capreport-core/src/lib.rs
// ============================================================================
// Module: Capreport Core Library
// Description: Domain model, KPI engine, and run-store contract for capreport.
// Purpose: Provide pure computation and storage-agnostic interfaces.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Capreport core holds the pieces of the pipeline with actual data-shape
//! invariants: the tabular dataset model, the pure KPI engine, the run/KPI
//! provenance records, and the [`RunStore`] contract that persistence
//! backends implement. Everything here is side-effect free except the single
//! wall-clock helper [`core::run::unix_millis`]; loading, rendering, and
//! delivery live in sibling crates.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::core::company::CompanyRecord;
pub use self::core::company::Dataset;
pub use self::core::company::REQUIRED_COLUMNS;
pub use self::core::kpi::BaseKpis;
pub use self::core::kpi::EnhancedKpis;
pub use self::core::kpi::KpiEngine;
pub use self::core::kpi::KpiError;
pub use self::core::kpi::KpiSummary;
pub use self::core::kpi::MarketCapDistribution;
pub use self::core::kpi::PersistedMetric;
pub use self::core::kpi::Percentiles;
pub use self::core::kpi::SectorKpi;
pub use self::core::kpi::SectorKpis;
pub use self::core::kpi::SectorRanking;
pub use self::core::kpi::TECH_SECTORS;
pub use self::core::kpi::TechSplit;
pub use self::core::kpi::TopCompany;
pub use self::core::run::KpiId;
pub use self::core::run::KpiRecord;
pub use self::core::run::OutputFormat;
pub use self::core::run::RunId;
pub use self::core::run::RunRecord;
pub use self::core::run::RunStatus;
pub use self::core::run::unix_millis;
pub use self::interfaces::InMemoryRunStore;
pub use self::interfaces::RunStore;
pub use self::interfaces::StoreError;
