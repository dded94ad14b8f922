// crates/capreport-report/src/lib.rs
// ============================================================================
// Module: Capreport Report Library
// Description: Report rendering, email seam, and pipeline orchestration.
// Purpose: Turn KPI summaries into deliverable reports and recorded runs.
// Dependencies: capreport-core, capreport-loader, thiserror, time, tracing
// ============================================================================

//! ## Overview
//! Three pieces sit here:
//! - [`render::Renderer`] turns a [`capreport_core::KpiSummary`] into a
//!   markdown or HTML document with an embedded generation timestamp.
//! - [`mail::Mailer`] is the delivery seam; transport details stay behind
//!   it ([`mail::LogMailer`] and [`mail::ChannelMailer`] are provided).
//! - [`pipeline::Pipeline`] orchestrates one invocation end to end:
//!   load, compute, persist, render, persist-status.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod mail;
pub mod pipeline;
pub mod render;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use mail::ChannelMailer;
pub use mail::LogMailer;
pub use mail::MailError;
pub use mail::Mailer;
pub use mail::ReportEmail;
pub use pipeline::Pipeline;
pub use pipeline::PipelineError;
pub use pipeline::PipelineOutcome;
pub use pipeline::PipelineRequest;
pub use render::RenderError;
pub use render::Renderer;
pub use render::RendererConfig;
