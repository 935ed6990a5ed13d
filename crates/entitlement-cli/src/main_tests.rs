// crates/entitlement-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and command execution.
// Purpose: Ensure inputs are validated and evaluation reports are complete.
// Dependencies: entitlement-cli main helpers, tempfile
// ============================================================================

//! ## Overview
//! Validates input parsing guards and runs `evaluate` and `laws` against a
//! temporary configuration with rule documents and fixture data.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use clap::Parser;
use entitlement_config::EngineConfig;
use entitlement_config::load_rule_directory;
use serde_json::json;
use tempfile::TempDir;

use super::Cli;
use super::CliError;
use super::Commands;
use super::EvaluateCommand;
use super::command_evaluate;
use super::list_laws;
use super::parse_date;
use super::parse_json_object;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const ZORGTOESLAG: &str = r"
uuid: zorgtoeslag-2025
name: Zorgtoeslag
law: zorgtoeslagwet
service: TOESLAGEN
valid_from: 2025-01-01
properties:
  input:
    - name: INCOME
      service_reference:
        service: BELASTINGDIENST
        field: income
requirements:
  - subject: $age
    operation: GREATER_OR_EQUAL
    value: 18
  - subject: $INCOME
    operation: LESS_THAN
    value: 40000
actions:
  - output: amount
    operation: SUBTRACT
    values: [2000, $INCOME]
  - output: doubled
    operation: MULTIPLY
    values: [$amount, 2]
";

const FIXTURES: &str = r#"
BELASTINGDIENST:
  "999993653":
    income: 1500
"#;

fn workspace() -> (TempDir, EngineConfig) {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("rules")).unwrap();
    fs::write(dir.path().join("rules/zorgtoeslag.yaml"), ZORGTOESLAG).unwrap();
    fs::write(dir.path().join("fixtures.yaml"), FIXTURES).unwrap();
    let config_path = dir.path().join("entitlement.toml");
    fs::write(
        &config_path,
        "[rules]\ndirectory = \"rules\"\n[providers]\nfixtures = \"fixtures.yaml\"\n",
    )
    .unwrap();
    let config = EngineConfig::load(Some(&config_path)).unwrap();
    (dir, config)
}

fn evaluate_args(args: &[&str]) -> EvaluateCommand {
    let argv = ["entitlement", "evaluate"].iter().chain(args);
    match Cli::try_parse_from(argv).unwrap().command {
        Commands::Evaluate(command) => command,
        Commands::Laws => panic!("expected evaluate"),
    }
}

// ============================================================================
// SECTION: Input Parsing
// ============================================================================

#[test]
fn dates_must_be_iso_calendar_dates() {
    assert!(parse_date("2025-03-01").is_ok());
    assert!(parse_date("01-03-2025").is_err());
    let bad_date = ["entitlement", "evaluate", "--law", "x", "--date", "soon"];
    assert!(Cli::try_parse_from(bad_date).is_err());
}

#[test]
fn json_objects_parse_inline_and_from_files() {
    let inline = parse_json_object("facts", r#"{"age": 20, "bsn": "1"}"#).unwrap();
    assert_eq!(inline.get("age"), Some(&json!(20)));

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("facts.json");
    fs::write(&path, r#"{"bsn": "999993653"}"#).unwrap();
    let from_file = parse_json_object("facts", &format!("@{}", path.display())).unwrap();
    assert_eq!(from_file.get("bsn"), Some(&json!("999993653")));
}

#[test]
fn json_inputs_fail_closed() {
    let not_object = parse_json_object("facts", "[1, 2]").unwrap_err();
    assert_eq!(not_object.to_string(), "invalid input: facts must be a json object");
    assert!(matches!(parse_json_object("overrides", "{"), Err(CliError::Input(_))));
    assert!(matches!(
        parse_json_object("facts", "@/nonexistent/facts.json"),
        Err(CliError::Input(_))
    ));

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("huge.json");
    fs::write(&path, vec![b' '; 1_048_577]).unwrap();
    let err = parse_json_object("facts", &format!("@{}", path.display())).unwrap_err();
    assert_eq!(err.to_string(), "invalid input: facts file exceeds size limit");
}

#[test]
fn config_flag_is_global() {
    let cli = Cli::try_parse_from(["entitlement", "laws", "--config", "other.toml"]).unwrap();
    assert_eq!(cli.config.as_deref(), Some(Path::new("other.toml")));
    assert!(matches!(cli.command, Commands::Laws));
}

// ============================================================================
// SECTION: Commands
// ============================================================================

#[tokio::test]
async fn evaluate_reports_outputs_and_inputs() {
    let (_dir, config) = workspace();
    let command = evaluate_args(&[
        "--law",
        "zorgtoeslagwet",
        "--date",
        "2025-06-01",
        "--facts",
        r#"{"age": 30, "bsn": "999993653"}"#,
    ]);
    let report = command_evaluate(&config, &command).await.unwrap();
    assert_eq!(report["requirements_met"], json!(true));
    assert_eq!(report["rule_uuid"], json!("zorgtoeslag-2025"));
    assert_eq!(report["reference_date"], json!("2025-06-01"));
    assert_eq!(report["outputs"], json!({"amount": 500, "doubled": 1000}));
    assert_eq!(report["inputs"], json!({"INCOME": 1500}));
    assert_eq!(report["accessed"], json!(["INCOME", "age", "amount"]));
    assert!(report.get("trace").is_none());
}

#[tokio::test]
async fn evaluate_honors_output_overrides_and_trace() {
    let (_dir, config) = workspace();
    let command = evaluate_args(&[
        "--law",
        "zorgtoeslagwet",
        "--date",
        "2025-06-01",
        "--facts",
        r#"{"age": 30}"#,
        "--overrides",
        r#"{"@BELASTINGDIENST.income": 100}"#,
        "--output",
        "amount",
        "--trace",
    ]);
    let report = command_evaluate(&config, &command).await.unwrap();
    assert_eq!(report["outputs"], json!({"amount": 1900}));
    assert_eq!(report["trace"]["kind"], json!("evaluation"));
}

#[tokio::test]
async fn evaluate_surfaces_engine_errors() {
    let (_dir, config) = workspace();
    let unknown = evaluate_args(&["--law", "onbekend", "--date", "2025-06-01"]);
    let err = command_evaluate(&config, &unknown).await.unwrap_err();
    assert!(matches!(err, CliError::Engine(_)));

    let too_early = evaluate_args(&["--law", "zorgtoeslagwet", "--date", "2024-06-01"]);
    assert!(command_evaluate(&config, &too_early).await.is_err());

    let wrong_service = evaluate_args(&[
        "--law",
        "zorgtoeslagwet",
        "--date",
        "2025-06-01",
        "--service",
        "UWV",
    ]);
    let err = command_evaluate(&config, &wrong_service).await.unwrap_err();
    assert_eq!(err.to_string(), "law zorgtoeslagwet belongs to service TOESLAGEN, not UWV");
}

#[test]
fn laws_lists_every_version() {
    let (_dir, config) = workspace();
    let catalog = load_rule_directory(&config.rules_directory()).unwrap();
    let listing = serde_json::to_value(list_laws(&catalog)).unwrap();
    assert_eq!(
        listing,
        json!([{
            "law": "zorgtoeslagwet",
            "versions": [{
                "uuid": "zorgtoeslag-2025",
                "name": "Zorgtoeslag",
                "service": "TOESLAGEN",
                "valid_from": "2025-01-01"
            }]
        }])
    );
}
