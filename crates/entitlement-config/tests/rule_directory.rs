//! Rule directory loading tests for entitlement-config.
// crates/entitlement-config/tests/rule_directory.rs
// =============================================================================
// Module: Rule Directory Tests
// Description: Validate recursive rule loading into a versioned catalog.
// Purpose: Ensure malformed or conflicting rule documents fail the load.
// =============================================================================

use std::fs;
use std::path::Path;

use entitlement_config::ConfigError;
use entitlement_config::load_rule_directory;
use entitlement_config::parse_rule_document;
use entitlement_core::LawId;
use entitlement_core::RuleCatalog;
use entitlement_core::RuleSource;
use tempfile::TempDir;
use time::Date;
use time::Month;

type TestResult = Result<(), String>;

fn rule(law: &str, valid_from: &str) -> String {
    format!(
        "uuid: {law}-{valid_from}\nlaw: {law}\nservice: TOESLAGEN\nvalid_from: {valid_from}\n\
         actions:\n  - output: amount\n    value: 1\n"
    )
}

fn write(dir: &Path, relative: &str, content: &[u8]) -> TestResult {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| err.to_string())?;
    }
    fs::write(path, content).map_err(|err| err.to_string())
}

fn load(dir: &TempDir) -> Result<RuleCatalog, String> {
    load_rule_directory(dir.path()).map_err(|err| err.to_string())
}

fn expect_rule_error(dir: &TempDir, needle: &str) -> TestResult {
    match load_rule_directory(dir.path()) {
        Err(ConfigError::Rule { message, .. }) if message.contains(needle) => Ok(()),
        Err(other) => Err(format!("unexpected error {other}")),
        Ok(_) => Err("expected rule load failure".to_string()),
    }
}

#[test]
fn loads_nested_documents_of_every_format() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    write(dir.path(), "zorgtoeslag/2024.yaml", rule("zorgtoeslagwet", "2024-01-01").as_bytes())?;
    write(dir.path(), "zorgtoeslag/2025.yml", rule("zorgtoeslagwet", "2025-01-01").as_bytes())?;
    let json = r#"{"uuid": "aow", "law": "aow", "service": "SVB", "valid_from": "2020-01-01"}"#;
    write(dir.path(), "svb/aow.json", json.as_bytes())?;
    write(dir.path(), "README.md", b"# not a rule")?;

    let catalog = load(&dir)?;
    if catalog.len() != 3 || catalog.laws().count() != 2 {
        return Err(format!("unexpected catalog size {}", catalog.len()));
    }
    let reference = Date::from_calendar_date(2025, Month::June, 1).map_err(|err| err.to_string())?;
    let spec =
        catalog.load(&LawId::new("zorgtoeslagwet"), reference).map_err(|err| err.to_string())?;
    if spec.uuid != "zorgtoeslagwet-2025-01-01" {
        return Err(format!("unexpected version {}", spec.uuid));
    }
    Ok(())
}

#[test]
fn rejects_duplicate_rule_versions() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    write(dir.path(), "a.yaml", rule("zorgtoeslagwet", "2025-01-01").as_bytes())?;
    write(dir.path(), "b.yaml", rule("zorgtoeslagwet", "2025-01-01").as_bytes())?;
    expect_rule_error(&dir, "duplicate rule version for law zorgtoeslagwet valid from 2025-01-01")
}

#[test]
fn rejects_malformed_documents() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    write(dir.path(), "broken.yaml", b"law: x\nservice: S\nvalid_from: not-a-date\n")?;
    expect_rule_error(&dir, "invalid date")
}

#[test]
fn rejects_non_utf8_documents() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    write(dir.path(), "binary.yaml", &[0xFF, 0xFE, 0xFF])?;
    expect_rule_error(&dir, "rule document must be utf-8")
}

#[test]
fn rejects_missing_directory() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    match load_rule_directory(&dir.path().join("absent")) {
        Err(ConfigError::Io(message)) if message.contains("rule directory not found") => Ok(()),
        _ => Err("expected missing directory error".to_string()),
    }
}

#[test]
fn parse_reports_document_origin() -> TestResult {
    match parse_rule_document("inline", "law: [unclosed") {
        Err(err) if err.to_string().starts_with("rule document inline:") => Ok(()),
        _ => Err("expected parse failure naming the origin".to_string()),
    }
}
