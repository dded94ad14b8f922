// crates/capreport-report/src/pipeline.rs
// ============================================================================
// Module: Capreport Pipeline Orchestrator
// Description: Single-invocation load, compute, persist, render sequence.
// Purpose: Drive one pipeline execution and record its run provenance.
// Dependencies: capreport-core, capreport-loader, thiserror, tracing
// ============================================================================

//! ## Overview
//! One [`Pipeline::execute`] call performs load, compute, persist, render,
//! and persist-status in strict sequence on the calling thread. A failure
//! before the run row exists leaves no run behind; a failure after it
//! marks the run `failed` best-effort and propagates the original error.
//! There is no retry, cancellation, or timeout at this layer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Instant;

use capreport_core::KpiEngine;
use capreport_core::KpiError;
use capreport_core::KpiSummary;
use capreport_core::OutputFormat;
use capreport_core::RunId;
use capreport_core::RunRecord;
use capreport_core::RunStatus;
use capreport_core::RunStore;
use capreport_core::StoreError;
use capreport_core::unix_millis;
use capreport_loader::DatasetLoader;
use capreport_loader::LoadError;
use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::mail::MailError;
use crate::mail::Mailer;
use crate::mail::ReportEmail;
use crate::render::RenderError;
use crate::render::Renderer;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Subject line used for report emails.
const EMAIL_SUBJECT: &str = "S&P 500 Market Capitalization Report";

/// Source label recorded when the loader default is used.
const DEFAULT_SOURCE_LABEL: &str = "default";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Pipeline execution errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Dataset loading failed.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// KPI computation failed.
    #[error(transparent)]
    Kpi(#[from] KpiError),
    /// Report rendering failed.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// Run store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Email delivery failed.
    #[error(transparent)]
    Mail(#[from] MailError),
}

// ============================================================================
// SECTION: Request and Outcome
// ============================================================================

/// One pipeline invocation request.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    /// Dataset source (path or URL); `None` uses the loader default.
    source: Option<String>,
    /// Source label recorded on the run; defaults to the source string.
    label: Option<String>,
    /// Requested report format.
    output_format: OutputFormat,
    /// Recipient for email delivery; `None` skips delivery.
    email_to: Option<String>,
}

impl PipelineRequest {
    /// Creates a request for the given output format.
    #[must_use]
    pub const fn new(output_format: OutputFormat) -> Self {
        Self {
            source: None,
            label: None,
            output_format,
            email_to: None,
        }
    }

    /// Sets the dataset source (path or URL).
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Overrides the source label recorded on the run.
    ///
    /// Used when the loadable source is a temporary location but the run
    /// should record the original name, e.g. an uploaded file.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Requests email delivery of the rendered report.
    #[must_use]
    pub fn email_to(mut self, recipient: impl Into<String>) -> Self {
        self.email_to = Some(recipient.into());
        self
    }

    /// Returns the source label recorded on the run.
    fn source_label(&self) -> String {
        self.label
            .clone()
            .or_else(|| self.source.clone())
            .unwrap_or_else(|| DEFAULT_SOURCE_LABEL.to_string())
    }
}

/// Result of a completed pipeline invocation.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Final run record, status `completed`.
    pub run: RunRecord,
    /// Computed KPI summary.
    pub summary: KpiSummary,
    /// Rendered report document.
    pub report: String,
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Orchestrates one load, compute, persist, render sequence.
pub struct Pipeline {
    /// Dataset loader.
    loader: DatasetLoader,
    /// KPI engine.
    engine: KpiEngine,
    /// Report renderer.
    renderer: Renderer,
}

impl Pipeline {
    /// Creates a pipeline from its collaborators.
    #[must_use]
    pub const fn new(loader: DatasetLoader, engine: KpiEngine, renderer: Renderer) -> Self {
        Self {
            loader,
            engine,
            renderer,
        }
    }

    /// Executes one pipeline invocation against `store`.
    ///
    /// The run row is created after the dataset loads, so the recorded row
    /// count is always known. A load failure therefore leaves no run
    /// behind; every later failure marks the run `failed` best-effort and
    /// propagates the original error.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] carrying the first failing step's error.
    pub fn execute(
        &self,
        store: &dyn RunStore,
        mailer: Option<&dyn Mailer>,
        request: &PipelineRequest,
    ) -> Result<PipelineOutcome, PipelineError> {
        let started = Instant::now();
        let label = request.source_label();
        let dataset = self.loader.load(request.source.as_deref())?;
        let rows = u64::try_from(dataset.len()).unwrap_or(u64::MAX);
        let run = store.create_run(
            &label,
            request.output_format,
            Some(rows),
            RunStatus::Processing,
            None,
        )?;
        info!(run_id = %run.id, source = %label, rows, "pipeline run started");

        let summary = match self.engine.compute_all(&dataset) {
            Ok(summary) => summary,
            Err(err) => return Err(fail_run(store, run.id, err.into())),
        };
        let report = match self.renderer.render(&summary, request.output_format, unix_millis()) {
            Ok(report) => report,
            Err(err) => return Err(fail_run(store, run.id, err.into())),
        };
        for metric in summary.persisted_metrics() {
            if let Err(err) =
                store.add_kpi(run.id, metric.name, metric.value, metric.unit, metric.description)
            {
                return Err(fail_run(store, run.id, err.into()));
            }
        }
        if let Some(recipient) = &request.email_to {
            let email = ReportEmail {
                to: recipient.clone(),
                subject: EMAIL_SUBJECT.to_string(),
                body: report.clone(),
            };
            let outcome = match mailer {
                Some(mailer) => mailer.send(&email),
                None => Err(MailError::Delivery("no mailer configured".to_string())),
            };
            if let Err(err) = outcome {
                return Err(fail_run(store, run.id, err.into()));
            }
        }

        let duration = started.elapsed().as_secs_f64();
        let run = store.update_run_status(run.id, RunStatus::Completed, None, Some(duration))?;
        info!(run_id = %run.id, duration_seconds = duration, "pipeline run completed");
        Ok(PipelineOutcome {
            run,
            summary,
            report,
        })
    }
}

/// Marks the run `failed` best-effort and returns the original error.
fn fail_run(store: &dyn RunStore, run_id: RunId, error: PipelineError) -> PipelineError {
    let message = error.to_string();
    if let Err(update_err) =
        store.update_run_status(run_id, RunStatus::Failed, Some(&message), None)
    {
        warn!(run_id = %run_id, error = %update_err, "failed to mark run as failed");
    }
    error
}
