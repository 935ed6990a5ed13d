// crates/entitlement-config/src/rules.rs
// ============================================================================
// Module: Rule Directory Loader
// Description: Recursive loading of YAML/JSON rule documents into a catalog.
// Purpose: Build the engine's rule source from files on disk.
// Dependencies: entitlement-core, serde_yaml, tracing, walkdir
// ============================================================================

//! ## Overview
//! Every `.yaml`, `.yml`, or `.json` file below the rule directory is one rule
//! version. Files are visited in name order so failures are reported
//! deterministically. Any unreadable, oversized, or malformed document fails
//! the whole load, as does a second document for an existing
//! (law, `valid_from`) pair.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use entitlement_core::RuleCatalog;
use entitlement_core::RuleSpec;
use entitlement_core::core::time::format_iso_date;
use tracing::debug;
use tracing::info;
use walkdir::WalkDir;

use crate::config::ConfigError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum size of a single rule document in bytes.
pub(crate) const MAX_RULE_FILE_SIZE: usize = 1024 * 1024;
/// File extensions recognized as rule documents.
const RULE_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Loads every rule document below `directory` into a catalog.
///
/// # Errors
///
/// Returns [`ConfigError`] when the directory cannot be walked, a document
/// cannot be read or parsed, or two documents define the same rule version.
pub fn load_rule_directory(directory: &Path) -> Result<RuleCatalog, ConfigError> {
    if !directory.is_dir() {
        return Err(ConfigError::Io(format!(
            "rule directory not found: {}",
            directory.display()
        )));
    }
    let mut catalog = RuleCatalog::new();
    for entry in WalkDir::new(directory).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|err| ConfigError::Io(err.to_string()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_rule_document(path) {
            continue;
        }
        let spec = read_rule_document(path)?;
        let law = spec.law.clone();
        let valid_from = spec.valid_from;
        debug!(path = %path.display(), law = %law, "loaded rule document");
        if catalog.insert(spec).is_some() {
            return Err(ConfigError::Rule {
                path: path.display().to_string(),
                message: format!(
                    "duplicate rule version for law {law} valid from {}",
                    format_iso_date(valid_from)
                ),
            });
        }
    }
    info!(
        directory = %directory.display(),
        laws = catalog.laws().count(),
        versions = catalog.len(),
        "rule catalog loaded"
    );
    Ok(catalog)
}

/// Parses one rule document. `origin` names the document in errors.
///
/// # Errors
///
/// Returns [`ConfigError::Rule`] when the text is not a valid rule document.
pub fn parse_rule_document(origin: &str, content: &str) -> Result<RuleSpec, ConfigError> {
    serde_yaml::from_str(content)
        .map_err(|err| ConfigError::Rule { path: origin.to_string(), message: err.to_string() })
}

/// Returns true when the path carries a rule document extension.
fn is_rule_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| RULE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Reads and parses one rule document with size and encoding guards.
fn read_rule_document(path: &Path) -> Result<RuleSpec, ConfigError> {
    let origin = path.display().to_string();
    let rule_error =
        |message: &str| ConfigError::Rule { path: origin.clone(), message: message.to_string() };
    let bytes = fs::read(path).map_err(|err| rule_error(&err.to_string()))?;
    if bytes.len() > MAX_RULE_FILE_SIZE {
        return Err(rule_error("rule document exceeds size limit"));
    }
    let content =
        std::str::from_utf8(&bytes).map_err(|_| rule_error("rule document must be utf-8"))?;
    parse_rule_document(&origin, content)
}
