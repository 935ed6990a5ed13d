// crates/entitlement-cli/src/main.rs
// ============================================================================
// Module: Entitlement CLI Entry Point
// Description: Command dispatcher for offline law evaluation.
// Purpose: Evaluate rule documents against caller facts from the shell.
// Dependencies: clap, entitlement-config, entitlement-core, entitlement-providers,
//               serde_json, thiserror, tokio, tracing-subscriber.
// ============================================================================

//! ## Overview
//! The `entitlement` binary loads an engine configuration, builds the rule
//! catalog and provider registry it names, and evaluates one law per
//! invocation. Results are written to stdout as JSON; logs go to stderr so
//! the output stays machine readable.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use entitlement_config::ConfigError;
use entitlement_config::EngineConfig;
use entitlement_config::load_rule_directory;
use entitlement_core::AttributeError;
use entitlement_core::EngineError;
use entitlement_core::EvaluationRequest;
use entitlement_core::LawId;
use entitlement_core::Orchestrator;
use entitlement_core::RuleCatalog;
use entitlement_core::ServiceName;
use entitlement_core::Symbol;
use entitlement_core::TraceNode;
use entitlement_core::core::time::format_iso_date;
use entitlement_core::core::time::parse_iso_date;
use entitlement_providers::FixtureError;
use entitlement_providers::FixtureProvider;
use entitlement_providers::ProviderRegistry;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use time::Date;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum size of a facts or overrides file in bytes.
const MAX_INPUT_FILE_SIZE: usize = 1024 * 1024;
/// Prefix marking a facts or overrides argument as a file path.
const FILE_ARG_PREFIX: char = '@';

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "entitlement", version, disable_help_subcommand = true)]
struct Cli {
    /// Engine configuration file (defaults to `ENTITLEMENT_CONFIG`, then
    /// `entitlement.toml`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate one law for one subject.
    Evaluate(EvaluateCommand),
    /// List the laws and rule versions in the configured rule directory.
    Laws,
}

/// Arguments for the `evaluate` command.
#[derive(Args, Debug)]
struct EvaluateCommand {
    /// Law identifier.
    #[arg(long)]
    law: String,
    /// Reference date (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    date: Date,
    /// Facts as a JSON object, or `@file` to read one.
    #[arg(long, default_value = "{}")]
    facts: String,
    /// Overrides as a JSON object keyed `@SERVICE.field`, or `@file`.
    #[arg(long, default_value = "{}")]
    overrides: String,
    /// Only compute this output and the outputs it depends on.
    #[arg(long, value_name = "NAME")]
    output: Option<String>,
    /// Service expected to own the law.
    #[arg(long)]
    service: Option<String>,
    /// Include the evaluation trace in the result.
    #[arg(long)]
    trace: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failures reported on stderr.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration or rule loading failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Fixture data could not be loaded.
    #[error(transparent)]
    Fixture(#[from] FixtureError),
    /// Provider registration failed.
    #[error(transparent)]
    Provider(#[from] AttributeError),
    /// Evaluation could not start.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// Invalid command-line input.
    #[error("invalid input: {0}")]
    Input(String),
    /// Output could not be written.
    #[error("output error: {0}")]
    Output(String),
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// JSON document written by `evaluate`.
#[derive(Debug, Serialize)]
struct EvaluationReport<'a> {
    /// Evaluated law.
    law: &'a LawId,
    /// Reference date.
    reference_date: String,
    /// Identifier of the rule version used.
    rule_uuid: &'a str,
    /// Whether the requirements were met.
    requirements_met: bool,
    /// Computed outputs.
    outputs: &'a BTreeMap<String, Value>,
    /// Externally resolved inputs.
    inputs: &'a BTreeMap<Symbol, Value>,
    /// Every symbol the evaluation referenced.
    accessed: &'a BTreeSet<Symbol>,
    /// Evaluation trace, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<&'a TraceNode>,
}

/// One law in the `laws` listing.
#[derive(Debug, Serialize)]
struct LawListing {
    /// Law identifier.
    law: String,
    /// Versions, oldest first.
    versions: Vec<VersionListing>,
}

/// One rule version in the `laws` listing.
#[derive(Debug, Serialize)]
struct VersionListing {
    /// Rule version identifier.
    uuid: String,
    /// Rule name.
    name: String,
    /// Owning service.
    service: String,
    /// First date the version applies to.
    valid_from: String,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref())?;
    init_logging(&config.logging.filter);
    let document = match cli.command {
        Commands::Evaluate(command) => command_evaluate(&config, &command).await?,
        Commands::Laws => command_laws(&config)?,
    };
    write_json_value(&document)?;
    Ok(ExitCode::SUCCESS)
}

/// Installs the stderr log subscriber. `RUST_LOG` wins over the config filter.
fn init_logging(filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes the `evaluate` command and returns the report document.
async fn command_evaluate(config: &EngineConfig, command: &EvaluateCommand) -> CliResult<Value> {
    let orchestrator = build_orchestrator(config)?;
    let mut request = EvaluationRequest::new(LawId::new(command.law.as_str()), command.date)
        .with_facts(parse_json_object("facts", &command.facts)?)
        .with_overrides(parse_json_object("overrides", &command.overrides)?);
    if let Some(output) = &command.output {
        request = request.with_requested_output(output.as_str());
    }
    if let Some(service) = &command.service {
        request = request.with_service(ServiceName::new(service.as_str()));
    }
    let decision = orchestrator.evaluate(&request).await?;
    info!(
        law = %request.law,
        requirements_met = decision.requirements_met,
        outputs = decision.outputs.len(),
        "evaluation finished"
    );
    let report = EvaluationReport {
        law: &request.law,
        reference_date: format_iso_date(request.reference_date),
        rule_uuid: &decision.rule_uuid,
        requirements_met: decision.requirements_met,
        outputs: &decision.outputs,
        inputs: &decision.inputs,
        accessed: &decision.accessed,
        trace: command.trace.then_some(&decision.trace),
    };
    serde_json::to_value(&report).map_err(|err| CliError::Output(err.to_string()))
}

/// Executes the `laws` command and returns the listing document.
fn command_laws(config: &EngineConfig) -> CliResult<Value> {
    let catalog = load_rule_directory(&config.rules_directory())?;
    let listing = list_laws(&catalog);
    serde_json::to_value(&listing).map_err(|err| CliError::Output(err.to_string()))
}

/// Builds the listing of every law and version in a catalog.
fn list_laws(catalog: &RuleCatalog) -> Vec<LawListing> {
    catalog
        .laws()
        .map(|law| LawListing {
            law: law.to_string(),
            versions: catalog
                .versions(law)
                .map(|spec| VersionListing {
                    uuid: spec.uuid.clone(),
                    name: spec.name.clone(),
                    service: spec.service.to_string(),
                    valid_from: format_iso_date(spec.valid_from),
                })
                .collect(),
        })
        .collect()
}

/// Builds an orchestrator over the configured rules and providers.
fn build_orchestrator(config: &EngineConfig) -> CliResult<Orchestrator> {
    let catalog = load_rule_directory(&config.rules_directory())?;
    let mut registry = ProviderRegistry::new(config.providers.access_policy());
    if let Some(fixtures) = config.fixture_config() {
        let provider = Arc::new(FixtureProvider::load(&fixtures)?);
        for service in provider.services() {
            registry.register_provider(service.clone(), provider.clone())?;
        }
    }
    Ok(Orchestrator::new(Arc::new(catalog), Arc::new(registry), config.orchestrator_config()))
}

// ============================================================================
// SECTION: Input Parsing
// ============================================================================

/// Parses a `YYYY-MM-DD` argument.
fn parse_date(text: &str) -> Result<Date, String> {
    parse_iso_date(text).ok_or_else(|| format!("invalid date {text}, expected YYYY-MM-DD"))
}

/// Parses an inline JSON object, or reads one from `@file`.
fn parse_json_object(field: &str, arg: &str) -> CliResult<BTreeMap<String, Value>> {
    let content = match arg.strip_prefix(FILE_ARG_PREFIX) {
        Some(path) => read_input_file(field, path)?,
        None => arg.to_string(),
    };
    let value: Value = serde_json::from_str(&content)
        .map_err(|err| CliError::Input(format!("{field} must be valid json: {err}")))?;
    match value {
        Value::Object(map) => Ok(into_btree(map)),
        _ => Err(CliError::Input(format!("{field} must be a json object"))),
    }
}

/// Reads a facts or overrides file with size and encoding guards.
fn read_input_file(field: &str, path: &str) -> CliResult<String> {
    let bytes = fs::read(path)
        .map_err(|err| CliError::Input(format!("{field} file {path} unreadable: {err}")))?;
    if bytes.len() > MAX_INPUT_FILE_SIZE {
        return Err(CliError::Input(format!("{field} file exceeds size limit")));
    }
    String::from_utf8(bytes).map_err(|_| CliError::Input(format!("{field} file must be utf-8")))
}

/// Converts a JSON object into an ordered map.
fn into_btree(map: Map<String, Value>) -> BTreeMap<String, Value> {
    map.into_iter().collect()
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a JSON document to stdout.
fn write_json_value(value: &Value) -> CliResult<()> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| CliError::Output(err.to_string()))?;
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{rendered}").map_err(|err| CliError::Output(err.to_string()))
}

/// Writes an error to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let mut stderr = std::io::stderr();
    let _ = writeln!(&mut stderr, "error: {message}");
    ExitCode::FAILURE
}
