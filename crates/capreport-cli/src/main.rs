// crates/capreport-cli/src/main.rs
// ============================================================================
// Module: Capreport CLI Entry Point
// Description: Command dispatcher for reports, run history, and the server.
// Purpose: Provide the capreport binary over the pipeline and run store.
// Dependencies: capreport crates, clap, serde_json, tokio, toml, tracing
// ============================================================================

//! ## Overview
//! The capreport CLI drives the market-capitalization pipeline:
//! - `report` runs one load-compute-render invocation and prints or writes
//!   the rendered document; delivery goes to the log-backed mailer.
//! - `runs list` / `runs show` query the run store as JSON.
//! - `serve` starts the HTTP upload surface.
//!
//! Logs go to stderr so stdout stays clean for report and JSON output.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use capreport_core::KpiEngine;
use capreport_core::OutputFormat;
use capreport_core::RunId;
use capreport_core::RunRecord;
use capreport_core::RunStatus;
use capreport_core::RunStore;
use capreport_loader::DatasetLoader;
use capreport_loader::LoaderConfig;
use capreport_report::LogMailer;
use capreport_report::Pipeline;
use capreport_report::PipelineRequest;
use capreport_report::Renderer;
use capreport_server::ReportServer;
use capreport_server::ServerConfig;
use capreport_store_sqlite::SqliteRunStore;
use capreport_store_sqlite::SqliteStoreConfig;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde_json::json;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default run store database path.
const DEFAULT_STORE_PATH: &str = "capreport.db";
/// Dataset used when `--source` is not given.
const DEFAULT_DATASET_PATH: &str = "data/sp500_companies.csv";
/// Default number of runs shown by `runs list`.
const DEFAULT_RUNS_LIMIT: usize = 20;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "capreport", version, about = "Market capitalization reports")]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline once and emit the rendered report.
    Report(ReportCommand),
    /// Run history utilities.
    Runs {
        /// Selected runs subcommand.
        #[command(subcommand)]
        command: RunsCommand,
    },
    /// Start the HTTP upload and run-history server.
    Serve(ServeCommand),
}

/// Arguments for the `report` command.
#[derive(Args, Debug)]
struct ReportCommand {
    /// Dataset source: local CSV path or http(s) URL.
    #[arg(long, value_name = "PATH_OR_URL")]
    source: Option<String>,
    /// Report output format.
    #[arg(long, value_enum, default_value_t = FormatArg::Markdown)]
    format: FormatArg,
    /// Write the rendered report to this file instead of stdout.
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// Email the rendered report to this recipient.
    #[arg(long, value_name = "ADDRESS")]
    email: Option<String>,
    /// Path to the SQLite run store.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_STORE_PATH)]
    store: PathBuf,
}

/// Run history subcommands.
#[derive(Subcommand, Debug)]
enum RunsCommand {
    /// List recent runs, newest first, as JSON.
    List(RunsListCommand),
    /// Show one run with its persisted KPIs as JSON.
    Show(RunsShowCommand),
}

/// Arguments for `runs list`.
#[derive(Args, Debug)]
struct RunsListCommand {
    /// Path to the SQLite run store.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_STORE_PATH)]
    store: PathBuf,
    /// Maximum number of runs to list.
    #[arg(long, default_value_t = DEFAULT_RUNS_LIMIT)]
    limit: usize,
    /// Include runs with `test` status.
    #[arg(long)]
    include_tests: bool,
}

/// Arguments for `runs show`.
#[derive(Args, Debug)]
struct RunsShowCommand {
    /// Run identifier to show.
    id: i64,
    /// Path to the SQLite run store.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_STORE_PATH)]
    store: PathBuf,
}

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Path to a TOML server configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Report format CLI argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    /// Markdown document.
    Markdown,
    /// HTML document.
    Html,
}

impl FormatArg {
    /// Maps the CLI argument to the domain output format.
    const fn output_format(self) -> OutputFormat {
        match self {
            Self::Markdown => OutputFormat::Markdown,
            Self::Html => OutputFormat::Html,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Installs the stderr log subscriber honoring `RUST_LOG`.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Report(command) => command_report(&command),
        Commands::Runs {
            command,
        } => match command {
            RunsCommand::List(command) => command_runs_list(&command),
            RunsCommand::Show(command) => command_runs_show(&command),
        },
        Commands::Serve(command) => command_serve(&command),
    }
}

// ============================================================================
// SECTION: Report Command
// ============================================================================

/// Executes the `report` command.
fn command_report(command: &ReportCommand) -> CliResult<ExitCode> {
    let store = open_store(&command.store)?;
    let loader = DatasetLoader::with_config(LoaderConfig::new().default_source(DEFAULT_DATASET_PATH))
        .map_err(|err| CliError::new(err.to_string()))?;
    let pipeline = Pipeline::new(loader, KpiEngine::new(), Renderer::new());
    let mailer = LogMailer::new();

    let mut request = PipelineRequest::new(command.format.output_format());
    if let Some(source) = &command.source {
        request = request.source(source);
    }
    if let Some(recipient) = &command.email {
        request = request.email_to(recipient);
    }

    let outcome = pipeline
        .execute(&store, Some(&mailer), &request)
        .map_err(|err| CliError::new(err.to_string()))?;
    info!(
        run_id = %outcome.run.id,
        rows = outcome.run.rows_processed,
        "report run completed"
    );
    match &command.output {
        Some(path) => {
            fs::write(path, &outcome.report).map_err(|err| {
                CliError::new(format!("failed to write {}: {err}", path.display()))
            })?;
        }
        None => {
            write_stdout_line(&outcome.report)
                .map_err(|err| CliError::new(format!("stdout write failed: {err}")))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Runs Commands
// ============================================================================

/// Executes the `runs list` command.
fn command_runs_list(command: &RunsListCommand) -> CliResult<ExitCode> {
    let store = open_store(&command.store)?;
    let runs = store.recent_runs(command.limit).map_err(|err| CliError::new(err.to_string()))?;
    let runs = filter_runs(runs, command.include_tests);
    let rendered = serde_json::to_string_pretty(&json!({ "runs": runs }))
        .map_err(|err| CliError::new(format!("json encoding failed: {err}")))?;
    write_stdout_line(&rendered)
        .map_err(|err| CliError::new(format!("stdout write failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `runs show` command.
fn command_runs_show(command: &RunsShowCommand) -> CliResult<ExitCode> {
    let store = open_store(&command.store)?;
    let run_id = RunId::new(command.id);
    let run = store
        .get_run(run_id)
        .map_err(|err| CliError::new(err.to_string()))?
        .ok_or_else(|| CliError::new(format!("run not found: {run_id}")))?;
    let kpis = store.kpis_for_run(run_id).map_err(|err| CliError::new(err.to_string()))?;
    let rendered = serde_json::to_string_pretty(&json!({ "run": run, "kpis": kpis }))
        .map_err(|err| CliError::new(format!("json encoding failed: {err}")))?;
    write_stdout_line(&rendered)
        .map_err(|err| CliError::new(format!("stdout write failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Drops `test` status runs unless explicitly included.
fn filter_runs(runs: Vec<RunRecord>, include_tests: bool) -> Vec<RunRecord> {
    runs.into_iter().filter(|run| include_tests || run.status != RunStatus::Test).collect()
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
fn command_serve(command: &ServeCommand) -> CliResult<ExitCode> {
    let config = load_server_config(command.config.as_deref())?;
    let server = ReportServer::from_config(config).map_err(|err| CliError::new(err.to_string()))?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(format!("runtime start failed: {err}")))?;
    runtime.block_on(server.serve()).map_err(|err| CliError::new(err.to_string()))?;
    Ok(ExitCode::SUCCESS)
}

/// Loads the server configuration, defaulting when no file is given.
fn load_server_config(path: Option<&Path>) -> CliResult<ServerConfig> {
    let Some(path) = path else {
        return Ok(ServerConfig::default());
    };
    let raw = fs::read_to_string(path)
        .map_err(|err| CliError::new(format!("failed to read {}: {err}", path.display())))?;
    toml::from_str(&raw)
        .map_err(|err| CliError::new(format!("invalid server config {}: {err}", path.display())))
}

// ============================================================================
// SECTION: Store Helpers
// ============================================================================

/// Opens the SQLite run store at the given path.
fn open_store(path: &Path) -> CliResult<SqliteRunStore> {
    SqliteRunStore::new(&SqliteStoreConfig::new(path))
        .map_err(|err| CliError::new(err.to_string()))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error to stderr and returns a failing exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
