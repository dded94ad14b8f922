// crates/capreport-report/src/render.rs
// ============================================================================
// Module: Capreport Report Renderer
// Description: Markdown and HTML rendering of KPI summaries.
// Purpose: Produce the deliverable report document for a pipeline run.
// Dependencies: capreport-core, thiserror, time
// ============================================================================

//! ## Overview
//! [`Renderer`] turns a [`KpiSummary`] into a report document. Both formats
//! carry the same sections: overview, top companies, sector breakdown,
//! percentiles, distribution buckets, top sectors, and the tech-vs-
//! traditional split, plus a generation timestamp supplied by the caller.
//! Rendering is pure; the caller provides the wall-clock value so output
//! is reproducible in tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use capreport_core::KpiSummary;
use capreport_core::MarketCapDistribution;
use capreport_core::OutputFormat;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// One billion, for money formatting.
const BILLION: f64 = 1e9;

/// Default report title.
const DEFAULT_TITLE: &str = "S&P 500 Market Capitalization Report";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Report rendering errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The generation timestamp could not be formatted.
    #[error("report timestamp invalid: {0}")]
    Timestamp(String),
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Renderer configuration.
///
/// All template inputs are explicit fields; there are no implicit defaults
/// read from the environment.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Document title used as the top-level heading.
    pub title: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

impl RendererConfig {
    /// Creates a configuration with the default title.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the document title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

// ============================================================================
// SECTION: Renderer
// ============================================================================

/// Renders KPI summaries into markdown or HTML documents.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    /// Renderer configuration.
    config: RendererConfig,
}

impl Renderer {
    /// Creates a renderer with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a renderer with a specific configuration.
    #[must_use]
    pub const fn with_config(config: RendererConfig) -> Self {
        Self {
            config,
        }
    }

    /// Renders `summary` in the requested format.
    ///
    /// `generated_at_millis` is the unix-millisecond timestamp embedded in
    /// the document footer.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Timestamp`] when the timestamp is outside the
    /// representable datetime range.
    pub fn render(
        &self,
        summary: &KpiSummary,
        format: OutputFormat,
        generated_at_millis: i64,
    ) -> Result<String, RenderError> {
        let generated_at = format_rfc3339(generated_at_millis)?;
        Ok(match format {
            OutputFormat::Markdown => render_markdown(&self.config.title, summary, &generated_at),
            OutputFormat::Html => render_html(&self.config.title, summary, &generated_at),
        })
    }
}

// ============================================================================
// SECTION: Markdown
// ============================================================================

/// Renders the markdown document.
fn render_markdown(title: &str, summary: &KpiSummary, generated_at: &str) -> String {
    let base = &summary.base_kpis;
    let enhanced = &summary.enhanced_kpis;
    let mut out = String::new();
    out.push_str(&format!("# {title}\n\n"));
    out.push_str(&format!("Generated: {generated_at}\n\n"));

    out.push_str("## Overview\n\n");
    out.push_str("| Metric | Value |\n|---|---|\n");
    out.push_str(&format!("| Total companies | {} |\n", base.total_companies));
    out.push_str(&format!("| Average market cap | {} |\n", usd_billions(base.avg_market_cap)));
    out.push_str(&format!(
        "| Median market cap | {} |\n\n",
        usd_billions(base.median_market_cap)
    ));

    out.push_str("## Top 10 Companies by Market Cap\n\n");
    out.push_str("| Rank | Symbol | Company | Market Cap | Sector |\n|---|---|---|---|---|\n");
    for (index, company) in enhanced.top_companies.iter().enumerate() {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            index + 1,
            company.symbol,
            company.name,
            usd_billions(company.market_cap),
            company.sector
        ));
    }
    out.push('\n');

    out.push_str("## Sector Breakdown\n\n");
    out.push_str(
        "| Sector | Companies | Average Market Cap | Median Market Cap |\n|---|---|---|---|\n",
    );
    for sector in &summary.sector_kpis.sectors {
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            sector.sector,
            sector.company_count,
            usd_billions(sector.avg_market_cap),
            usd_billions(sector.median_market_cap)
        ));
    }
    out.push('\n');

    out.push_str("## Market Cap Percentiles\n\n");
    out.push_str("| Percentile | Value |\n|---|---|\n");
    for (label, value) in percentile_rows(summary) {
        out.push_str(&format!("| {label} | {} |\n", usd_billions(value)));
    }
    out.push('\n');

    out.push_str("## Market Cap Distribution\n\n");
    out.push_str("| Bucket | Companies | Share |\n|---|---|---|\n");
    for (label, count, pct) in distribution_rows(&enhanced.market_cap_distribution) {
        out.push_str(&format!("| {label} | {count} | {pct:.1}% |\n"));
    }
    out.push('\n');

    out.push_str("## Top Sectors by Total Market Cap\n\n");
    out.push_str("| Rank | Sector | Total Market Cap | Companies |\n|---|---|---|---|\n");
    for (index, ranking) in enhanced.top_sectors_by_market_cap.iter().enumerate() {
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            index + 1,
            ranking.sector,
            usd_billions(ranking.total_market_cap),
            ranking.company_count
        ));
    }
    out.push('\n');

    let split = &enhanced.tech_vs_traditional;
    out.push_str("## Tech vs Traditional\n\n");
    out.push_str("| Group | Companies | Total Market Cap | Average Market Cap |\n|---|---|---|---|\n");
    out.push_str(&format!(
        "| Tech | {} | {} | {} |\n",
        split.tech_companies,
        usd_billions(split.tech_market_cap),
        usd_billions(split.tech_avg_market_cap)
    ));
    out.push_str(&format!(
        "| Traditional | {} | {} | {} |\n",
        split.traditional_companies,
        usd_billions(split.traditional_market_cap),
        usd_billions(split.traditional_avg_market_cap)
    ));
    out
}

// ============================================================================
// SECTION: HTML
// ============================================================================

/// Renders the HTML document.
fn render_html(title: &str, summary: &KpiSummary, generated_at: &str) -> String {
    let base = &summary.base_kpis;
    let enhanced = &summary.enhanced_kpis;
    let title = escape_html(title);
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    out.push_str(&format!("<meta charset=\"utf-8\">\n<title>{title}</title>\n"));
    out.push_str("</head>\n<body>\n");
    out.push_str(&format!("<h1>{title}</h1>\n"));
    out.push_str(&format!("<p>Generated: {generated_at}</p>\n"));

    out.push_str("<h2>Overview</h2>\n<table>\n");
    out.push_str("<tr><th>Metric</th><th>Value</th></tr>\n");
    out.push_str(&format!(
        "<tr><td>Total companies</td><td>{}</td></tr>\n",
        base.total_companies
    ));
    out.push_str(&format!(
        "<tr><td>Average market cap</td><td>{}</td></tr>\n",
        usd_billions(base.avg_market_cap)
    ));
    out.push_str(&format!(
        "<tr><td>Median market cap</td><td>{}</td></tr>\n",
        usd_billions(base.median_market_cap)
    ));
    out.push_str("</table>\n");

    out.push_str("<h2>Top 10 Companies by Market Cap</h2>\n<table>\n");
    out.push_str(
        "<tr><th>Rank</th><th>Symbol</th><th>Company</th><th>Market Cap</th><th>Sector</th></tr>\n",
    );
    for (index, company) in enhanced.top_companies.iter().enumerate() {
        out.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            index + 1,
            escape_html(&company.symbol),
            escape_html(&company.name),
            usd_billions(company.market_cap),
            escape_html(&company.sector)
        ));
    }
    out.push_str("</table>\n");

    out.push_str("<h2>Sector Breakdown</h2>\n<table>\n");
    out.push_str(
        "<tr><th>Sector</th><th>Companies</th><th>Average Market Cap</th><th>Median Market \
         Cap</th></tr>\n",
    );
    for sector in &summary.sector_kpis.sectors {
        out.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape_html(&sector.sector),
            sector.company_count,
            usd_billions(sector.avg_market_cap),
            usd_billions(sector.median_market_cap)
        ));
    }
    out.push_str("</table>\n");

    out.push_str("<h2>Market Cap Percentiles</h2>\n<table>\n");
    out.push_str("<tr><th>Percentile</th><th>Value</th></tr>\n");
    for (label, value) in percentile_rows(summary) {
        out.push_str(&format!(
            "<tr><td>{label}</td><td>{}</td></tr>\n",
            usd_billions(value)
        ));
    }
    out.push_str("</table>\n");

    out.push_str("<h2>Market Cap Distribution</h2>\n<table>\n");
    out.push_str("<tr><th>Bucket</th><th>Companies</th><th>Share</th></tr>\n");
    for (label, count, pct) in distribution_rows(&enhanced.market_cap_distribution) {
        out.push_str(&format!(
            "<tr><td>{label}</td><td>{count}</td><td>{pct:.1}%</td></tr>\n"
        ));
    }
    out.push_str("</table>\n");

    out.push_str("<h2>Top Sectors by Total Market Cap</h2>\n<table>\n");
    out.push_str(
        "<tr><th>Rank</th><th>Sector</th><th>Total Market Cap</th><th>Companies</th></tr>\n",
    );
    for (index, ranking) in enhanced.top_sectors_by_market_cap.iter().enumerate() {
        out.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            index + 1,
            escape_html(&ranking.sector),
            usd_billions(ranking.total_market_cap),
            ranking.company_count
        ));
    }
    out.push_str("</table>\n");

    let split = &enhanced.tech_vs_traditional;
    out.push_str("<h2>Tech vs Traditional</h2>\n<table>\n");
    out.push_str(
        "<tr><th>Group</th><th>Companies</th><th>Total Market Cap</th><th>Average Market \
         Cap</th></tr>\n",
    );
    out.push_str(&format!(
        "<tr><td>Tech</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
        split.tech_companies,
        usd_billions(split.tech_market_cap),
        usd_billions(split.tech_avg_market_cap)
    ));
    out.push_str(&format!(
        "<tr><td>Traditional</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
        split.traditional_companies,
        usd_billions(split.traditional_market_cap),
        usd_billions(split.traditional_avg_market_cap)
    ));
    out.push_str("</table>\n</body>\n</html>\n");
    out
}

// ============================================================================
// SECTION: Formatting Helpers
// ============================================================================

/// Formats a USD value in billions with two decimals, e.g. `$96.52B`.
fn usd_billions(value: f64) -> String {
    format!("${:.2}B", value / BILLION)
}

/// Returns the percentile table rows in ascending rank order.
fn percentile_rows(summary: &KpiSummary) -> [(&'static str, f64); 6] {
    let p = &summary.enhanced_kpis.percentiles;
    [
        ("25th", p.p25),
        ("50th", p.p50),
        ("75th", p.p75),
        ("90th", p.p90),
        ("95th", p.p95),
        ("99th", p.p99),
    ]
}

/// Returns the distribution table rows. Large includes mega by value range.
fn distribution_rows(distribution: &MarketCapDistribution) -> [(&'static str, u64, f64); 4] {
    [
        ("Small (< $2B)", distribution.small_cap_count, distribution.small_cap_pct),
        ("Mid ($2B to $10B)", distribution.mid_cap_count, distribution.mid_cap_pct),
        ("Large (>= $10B)", distribution.large_cap_count, distribution.large_cap_pct),
        ("Mega (>= $100B)", distribution.mega_cap_count, distribution.mega_cap_pct),
    ]
}

/// Escapes the HTML special characters in untrusted dataset text.
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Formats unix milliseconds as an RFC 3339 timestamp.
fn format_rfc3339(millis: i64) -> Result<String, RenderError> {
    let seconds = millis.div_euclid(1_000);
    let datetime = OffsetDateTime::from_unix_timestamp(seconds)
        .map_err(|err| RenderError::Timestamp(err.to_string()))?;
    datetime.format(&Rfc3339).map_err(|err| RenderError::Timestamp(err.to_string()))
}
