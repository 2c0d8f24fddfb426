// crates/outbox-cli/src/main.rs
// ============================================================================
// Module: Outbox CLI Entry Point
// Description: Command dispatcher for contract, validate, and write workflows.
// Purpose: Drive the outbox from the command line with strict exit codes.
// Dependencies: clap, outbox-ado, outbox-config, outbox-contract, outbox-core,
// serde_json, serde_yaml, thiserror, tracing-subscriber.
// ============================================================================

//! ## Overview
//! The `outbox` binary lints and exports the contract, validates bundles from
//! the ready queue, and writes validated bundles to the remote system.
//! Reports go to stdout as JSON or YAML; summaries and logs go to stderr.
//!
//! ## Exit Codes
//! - `0`: the run reached a strict-ready state.
//! - `1`: the run could not start (configuration, arguments, lock).
//! - `2`: the run completed but a bundle or finding failed it.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use outbox_ado::AdoHttpConfig;
use outbox_ado::AdoHttpWriter;
use outbox_cli::t;
use outbox_config::ContractPaths;
use outbox_contract::export_contract;
use outbox_contract::lint_contract;
use outbox_contract::write_lint_report;
use outbox_core::BundleSelection;
use outbox_core::OutboxLayout;
use outbox_core::RemoteEndpoint;
use outbox_core::WriteMode;
use outbox_core::WriteOverrides;
use outbox_core::WriteRequest;
use outbox_core::validate_outbox;
use outbox_core::write_outbox;
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default policy document directory.
const DEFAULT_POLICY_DIR: &str = "config/policy";
/// Default generated reference data directory.
const DEFAULT_GENERATED_DIR: &str = "config/generated";
/// Default outbox root.
const DEFAULT_OUTBOX_DIR: &str = "outbox";
/// Default bundle schema location.
const DEFAULT_SCHEMA_PATH: &str = "schema/bundle.schema.json";
/// Default audit record directory.
const DEFAULT_AUDIT_DIR: &str = "outbox/audit";
/// Default remote API version.
const DEFAULT_API_VERSION: &str = "7.0";
/// Default environment variable holding the access token.
const DEFAULT_PAT_ENV: &str = "ADO_PAT";
/// Snapshot file written by `contract export` when `--out` is omitted.
const AGENT_CONTRACT_FILE: &str = "agent_contract.yaml";
/// Log filter used when `RUST_LOG` is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "warn";
/// Exit status for runs that completed without reaching strict-ready.
const NOT_READY_EXIT: u8 = 2;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "outbox", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Contract linting and export utilities.
    Contract {
        /// Selected contract subcommand.
        #[command(subcommand)]
        command: ContractCommand,
    },
    /// Validate bundles and route them through the queue.
    Validate(ValidateCommand),
    /// Write validated bundles to the remote system.
    Write(WriteCommand),
}

/// Contract subcommands.
#[derive(Subcommand, Debug)]
enum ContractCommand {
    /// Cross-check the policy documents and generated metadata.
    Lint(ContractLintCommand),
    /// Write the agent contract snapshot.
    Export(ContractExportCommand),
}

/// Contract document locations shared by every command.
#[derive(Args, Debug, Clone)]
struct ContractArgs {
    /// Directory holding the policy documents.
    #[arg(long, value_name = "DIR", default_value = DEFAULT_POLICY_DIR)]
    policy_dir: PathBuf,
    /// Directory holding generated reference data.
    #[arg(long, value_name = "DIR", default_value = DEFAULT_GENERATED_DIR)]
    generated_dir: PathBuf,
}

impl ContractArgs {
    /// Returns the contract paths for these arguments.
    fn paths(&self) -> ContractPaths {
        ContractPaths::new(self.policy_dir.clone(), self.generated_dir.clone())
    }
}

/// Report output formats.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Pretty-printed JSON.
    Json,
    /// YAML.
    Yaml,
}

/// Arguments for `contract lint`.
#[derive(Args, Debug)]
struct ContractLintCommand {
    /// Contract document locations.
    #[command(flatten)]
    contract: ContractArgs,
    /// Optional path receiving the lint report as YAML.
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,
    /// Output format for stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

/// Arguments for `contract export`.
#[derive(Args, Debug)]
struct ContractExportCommand {
    /// Contract document locations.
    #[command(flatten)]
    contract: ContractArgs,
    /// Snapshot path (defaults to `agent_contract.yaml` in the generated dir).
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,
    /// Output format for stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

/// Arguments shared by `validate` and `write` for bundle selection.
#[derive(Args, Debug, Clone)]
struct SelectionArgs {
    /// Single bundle file to process.
    #[arg(value_name = "BUNDLE")]
    bundle: Option<PathBuf>,
    /// Process every bundle in the command's source queue.
    #[arg(long, action = ArgAction::SetTrue)]
    all: bool,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
struct ValidateCommand {
    /// Bundle selection.
    #[command(flatten)]
    selection: SelectionArgs,
    /// Contract document locations.
    #[command(flatten)]
    contract: ContractArgs,
    /// Outbox root directory.
    #[arg(long, value_name = "DIR", default_value = DEFAULT_OUTBOX_DIR)]
    outbox: PathBuf,
    /// Bundle JSON Schema.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_SCHEMA_PATH)]
    schema: PathBuf,
    /// Output format for stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

/// Arguments for `write`.
#[derive(Args, Debug)]
struct WriteCommand {
    /// Bundle selection.
    #[command(flatten)]
    selection: SelectionArgs,
    /// Plan operations without calling the remote system.
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
    /// Contract document locations.
    #[command(flatten)]
    contract: ContractArgs,
    /// Outbox root directory.
    #[arg(long, value_name = "DIR", default_value = DEFAULT_OUTBOX_DIR)]
    outbox: PathBuf,
    /// Directory receiving the audit record.
    #[arg(long, value_name = "DIR", default_value = DEFAULT_AUDIT_DIR)]
    audit_dir: PathBuf,
    /// Organization base URL.
    #[arg(long, value_name = "URL")]
    org_url: String,
    /// Project name.
    #[arg(long, value_name = "NAME")]
    project: String,
    /// Remote API version.
    #[arg(long, value_name = "VERSION", default_value = DEFAULT_API_VERSION)]
    api_version: String,
    /// Environment variable holding the personal access token.
    #[arg(long, value_name = "ENV", default_value = DEFAULT_PAT_ENV)]
    pat_env: String,
    /// Area path applied to every item.
    #[arg(long, value_name = "PATH")]
    area: Option<String>,
    /// Iteration path applied to every item.
    #[arg(long, value_name = "PATH")]
    iteration: Option<String>,
    /// Owner display name applied to every item.
    #[arg(long, value_name = "NAME")]
    owner: Option<String>,
    /// Output format for stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for catalog messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a catalog message.
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
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    init_logging()?;

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Contract {
            command,
        } => command_contract(command),
        Commands::Validate(command) => command_validate(&command),
        Commands::Write(command) => command_write(&command),
    }
}

/// Installs the stderr log subscriber.
fn init_logging() -> CliResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| CliError::new(t!("logging.init_failed", error = err)))
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Contract Commands
// ============================================================================

/// Dispatches contract commands.
fn command_contract(command: ContractCommand) -> CliResult<ExitCode> {
    match command {
        ContractCommand::Lint(command) => command_contract_lint(&command),
        ContractCommand::Export(command) => command_contract_export(&command),
    }
}

/// Executes `contract lint`.
fn command_contract_lint(command: &ContractLintCommand) -> CliResult<ExitCode> {
    let report = lint_contract(&command.contract.paths());
    if let Some(out) = &command.out {
        write_lint_report(&report, out).map_err(|err| {
            CliError::new(t!("contract.lint.write_failed", path = out.display(), error = err))
        })?;
        write_stderr_line(&t!("contract.lint.written", path = out.display()))
            .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }
    emit_report(&report, command.format)?;
    Ok(exit_code_for(report.strict_ready))
}

/// Executes `contract export`.
fn command_contract_export(command: &ContractExportCommand) -> CliResult<ExitCode> {
    let out = export_path(&command.contract, command.out.as_deref());
    let outcome = export_contract(&command.contract.paths(), &out)
        .map_err(|err| CliError::new(t!("contract.export.failed", error = err)))?;
    write_stderr_line(&t!("contract.export.written", path = outcome.output_path.display()))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    emit_report(&outcome, command.format)?;
    Ok(exit_code_for(outcome.strict_ready))
}

/// Resolves the snapshot path for `contract export`.
fn export_path(contract: &ContractArgs, out: Option<&Path>) -> PathBuf {
    out.map_or_else(|| contract.generated_dir.join(AGENT_CONTRACT_FILE), Path::to_path_buf)
}

// ============================================================================
// SECTION: Validate Command
// ============================================================================

/// Executes `validate`.
fn command_validate(command: &ValidateCommand) -> CliResult<ExitCode> {
    let selection = selection_from(&command.selection)
        .map_err(|err| CliError::new(t!("validate.failed", error = err)))?;
    let layout = OutboxLayout::new(command.outbox.clone());
    let run =
        validate_outbox(&selection, &command.contract.paths(), &command.schema, &layout)
            .map_err(|err| CliError::new(t!("validate.failed", error = err)))?;
    emit_report(&run, command.format)?;
    write_stderr_line(&t!(
        "validate.summary",
        total = run.validated_count,
        passed = run.passed_count,
        failed = run.failed_count
    ))
    .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    Ok(exit_code_for(run.strict_ready))
}

// ============================================================================
// SECTION: Write Command
// ============================================================================

/// Executes `write`.
fn command_write(command: &WriteCommand) -> CliResult<ExitCode> {
    let selection = selection_from(&command.selection)
        .map_err(|err| CliError::new(t!("write.failed", error = err)))?;
    let pat = resolve_pat(command.dry_run, &command.pat_env, std::env::var(&command.pat_env).ok())?;
    let writer = match pat {
        Some(pat) => Some(
            AdoHttpWriter::new(AdoHttpConfig::new(pat))
                .map_err(|err| CliError::new(t!("write.client_failed", error = err)))?,
        ),
        None => None,
    };
    let mode = match &writer {
        Some(writer) => WriteMode::Live(writer),
        None => WriteMode::DryRun,
    };

    let contract_paths = command.contract.paths();
    let layout = OutboxLayout::new(command.outbox.clone());
    let endpoint = RemoteEndpoint::new(
        command.org_url.clone(),
        command.project.clone(),
        command.api_version.clone(),
    );
    let overrides = overrides_from(command);
    let request = WriteRequest {
        selection: &selection,
        contract_paths: &contract_paths,
        layout: &layout,
        audit_dir: &command.audit_dir,
        endpoint: &endpoint,
        overrides: &overrides,
    };
    let run = write_outbox(&request, mode)
        .map_err(|err| CliError::new(t!("write.failed", error = err)))?;

    emit_report(&run, command.format)?;
    let mut lines = vec![t!(
        "write.summary",
        processed = run.summary.processed_count,
        succeeded = run.summary.succeeded_count,
        failed = run.summary.failed_count,
        dry_run = run.dry_run
    )];
    if run.summary.stopped_on_error {
        lines.push(t!("write.stopped"));
    }
    if let Some(note) = &run.registry_note {
        lines.push(t!("write.registry_note", note = note));
    }
    lines.push(t!("write.audit", path = run.audit_path));
    for line in lines {
        write_stderr_line(&line).map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }
    Ok(exit_code_for(run.strict_ready))
}

/// Returns the token for live runs; dry runs never need one.
fn resolve_pat(dry_run: bool, pat_env: &str, value: Option<String>) -> CliResult<Option<String>> {
    if dry_run {
        return Ok(None);
    }
    match value {
        Some(pat) if !pat.trim().is_empty() => Ok(Some(pat)),
        _ => Err(CliError::new(t!("write.pat_missing", env = pat_env))),
    }
}

/// Collects run-wide overrides from the write arguments.
fn overrides_from(command: &WriteCommand) -> WriteOverrides {
    WriteOverrides {
        area_path: command.area.clone(),
        iteration_path: command.iteration.clone(),
        owner_display_name: command.owner.clone(),
    }
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Converts selection arguments into a bundle selection.
fn selection_from(args: &SelectionArgs) -> Result<BundleSelection, outbox_core::OutboxError> {
    BundleSelection::from_args(args.bundle.clone(), args.all)
}

/// Maps a strict-ready flag onto the process exit code.
fn exit_code_for(strict_ready: bool) -> ExitCode {
    if strict_ready { ExitCode::SUCCESS } else { ExitCode::from(NOT_READY_EXIT) }
}

/// Serializes a report in the requested format.
fn render_report<T: Serialize>(value: &T, format: OutputFormat) -> CliResult<String> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).map_err(|err| err.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|err| err.to_string()),
    };
    rendered.map_err(|error| {
        CliError::new(t!("output.serialize_failed", kind = "report", error = error))
    })
}

/// Writes a report to stdout.
fn emit_report<T: Serialize>(value: &T, format: OutputFormat) -> CliResult<()> {
    let mut output = render_report(value, format)?;
    if !output.ends_with('\n') {
        output.push('\n');
    }
    write_stdout_bytes(output.as_bytes()).map_err(|err| CliError::new(output_error("stdout", &err)))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.stdout"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
