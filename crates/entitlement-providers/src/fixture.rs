// crates/entitlement-providers/src/fixture.rs
// ============================================================================
// Module: Fixture Attribute Provider
// Description: Attribute provider backed by a YAML or JSON data file.
// Purpose: Answer external attribute lookups offline from recorded data.
// Dependencies: entitlement-core, serde, serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! Fixture data maps `service -> subject -> field -> value`. The subject of a
//! request is read from a configured caller fact (for example `bsn`), so one
//! file can describe many people. JSON documents are accepted as YAML.
//!
//! ```yaml
//! BELASTINGDIENST:
//!   "999993653":
//!     income: 25000
//! ```
//!
//! A known service with a missing subject or field answers null. A service
//! absent from the file is reported as unknown.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use entitlement_core::AttributeError;
use entitlement_core::AttributeProvider;
use entitlement_core::AttributeRequest;
use entitlement_core::ServiceName;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default fact naming the subject of a lookup.
pub const DEFAULT_SUBJECT_FACT: &str = "bsn";
/// Default maximum fixture file size in bytes.
pub const DEFAULT_MAX_FILE_BYTES: usize = 4 * 1024 * 1024;

/// Records for one service: subject key, then field name.
pub type ServiceRecords = BTreeMap<String, BTreeMap<String, Value>>;

/// Configuration for the fixture provider.
///
/// # Invariants
/// - `max_file_bytes` is enforced before parsing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FixtureProviderConfig {
    /// Data file path.
    pub path: PathBuf,
    /// Fact holding the subject key.
    #[serde(default = "default_subject_fact")]
    pub subject_fact: String,
    /// Maximum accepted file size in bytes.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
}

impl FixtureProviderConfig {
    /// Creates a config for `path` with default limits.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            subject_fact: default_subject_fact(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

/// Serde default for [`FixtureProviderConfig::subject_fact`].
fn default_subject_fact() -> String {
    DEFAULT_SUBJECT_FACT.to_string()
}

/// Serde default for [`FixtureProviderConfig::max_file_bytes`].
const fn default_max_file_bytes() -> usize {
    DEFAULT_MAX_FILE_BYTES
}

/// Fixture loading failures.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// I/O failure while reading the file.
    #[error("fixture io error: {0}")]
    Io(String),
    /// File larger than the configured limit.
    #[error("fixture file exceeds size limit")]
    TooLarge,
    /// File content is not valid fixture data.
    #[error("fixture parse error: {0}")]
    Parse(String),
}

// ============================================================================
// SECTION: Provider Implementation
// ============================================================================

/// Attribute provider answering from in-memory fixture data.
#[derive(Debug, Clone)]
pub struct FixtureProvider {
    /// Fact holding the subject key.
    subject_fact: String,
    /// Records by service.
    data: BTreeMap<ServiceName, ServiceRecords>,
}

impl FixtureProvider {
    /// Creates a provider over already-parsed data.
    #[must_use]
    pub fn from_data(
        subject_fact: impl Into<String>,
        data: BTreeMap<ServiceName, ServiceRecords>,
    ) -> Self {
        Self { subject_fact: subject_fact.into(), data }
    }

    /// Loads fixture data from the configured file.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError`] when the file is unreadable, too large, or
    /// malformed.
    pub fn load(config: &FixtureProviderConfig) -> Result<Self, FixtureError> {
        let bytes = fs::read(&config.path).map_err(|err| FixtureError::Io(err.to_string()))?;
        if bytes.len() > config.max_file_bytes {
            return Err(FixtureError::TooLarge);
        }
        let data =
            serde_yaml::from_slice(&bytes).map_err(|err| FixtureError::Parse(err.to_string()))?;
        Ok(Self::from_data(config.subject_fact.clone(), data))
    }

    /// Iterates over the services present in the data.
    pub fn services(&self) -> impl Iterator<Item = &ServiceName> {
        self.data.keys()
    }
}

#[async_trait]
impl AttributeProvider for FixtureProvider {
    async fn get_value(
        &self,
        request: &AttributeRequest<'_>,
    ) -> Result<Option<Value>, AttributeError> {
        let Some(records) = self.data.get(request.service) else {
            return Err(AttributeError::UnknownService(request.service.to_string()));
        };
        let Some(subject) = request.facts.get(&self.subject_fact).and_then(subject_key) else {
            return Ok(None);
        };
        Ok(records.get(&subject).and_then(|fields| fields.get(request.field)).cloned())
    }
}

/// Renders a subject fact as a record key.
fn subject_key(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
