// crates/entitlement-config/src/config.rs
// ============================================================================
// Module: Entitlement Engine Configuration
// Description: Configuration loading and validation for the engine.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: entitlement-core, entitlement-providers, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Relative paths inside the file resolve against the directory holding it.
//!
//! ```toml
//! [engine]
//! service = "TOESLAGEN"
//! max_nesting_depth = 16
//!
//! [rules]
//! directory = "rules"
//!
//! [providers]
//! fixtures = "fixtures.yaml"
//! subject_fact = "bsn"
//! denylist = ["UWV"]
//!
//! [logging]
//! filter = "info"
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use entitlement_core::OrchestratorConfig;
use entitlement_core::ServiceName;
use entitlement_core::runtime::DEFAULT_MAX_NESTING_DEPTH;
use entitlement_providers::FixtureProviderConfig;
use entitlement_providers::ProviderAccessPolicy;
use entitlement_providers::fixture::DEFAULT_MAX_FILE_BYTES;
use entitlement_providers::fixture::DEFAULT_SUBJECT_FACT;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "entitlement.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "ENTITLEMENT_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound accepted for `engine.max_nesting_depth`.
pub(crate) const MAX_NESTING_DEPTH_LIMIT: usize = 256;
/// Default tracing filter directive.
const DEFAULT_LOG_FILTER: &str = "info";

// ============================================================================
// SECTION: Configuration Model
// ============================================================================

/// Engine configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Evaluation settings.
    #[serde(default)]
    pub engine: EngineSection,
    /// Rule document location.
    pub rules: RulesConfig,
    /// External attribute sources.
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Directory relative paths resolve against (not serialized).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl EngineConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is taken from `path`, then the `ENTITLEMENT_CONFIG`
    /// environment variable, then `entitlement.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config = Self::from_toml(content)?;
        config.base_dir = resolved.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    /// Parses and validates configuration text. Relative paths resolve
    /// against the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.rules.validate()?;
        self.providers.validate()?;
        self.logging.validate()
    }

    /// Returns the rule directory, resolved against [`Self::base_dir`].
    #[must_use]
    pub fn rules_directory(&self) -> PathBuf {
        self.base_dir.join(&self.rules.directory)
    }

    /// Returns the fixture provider config, when fixtures are configured.
    #[must_use]
    pub fn fixture_config(&self) -> Option<FixtureProviderConfig> {
        self.providers.fixtures.as_ref().map(|fixtures| FixtureProviderConfig {
            path: self.base_dir.join(fixtures),
            subject_fact: self.providers.subject_fact.clone(),
            max_file_bytes: self.providers.max_fixture_bytes,
        })
    }

    /// Returns the orchestrator settings.
    #[must_use]
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            service: self.engine.service.clone(),
            max_nesting_depth: self.engine.max_nesting_depth,
        }
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Service expected to own every evaluated law.
    #[serde(default)]
    pub service: Option<ServiceName>,
    /// Deepest allowed nested law evaluation.
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,
}

impl EngineSection {
    /// Validates engine settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_nesting_depth == 0 {
            return Err(ConfigError::Invalid(
                "engine.max_nesting_depth must be greater than zero".to_string(),
            ));
        }
        if self.max_nesting_depth > MAX_NESTING_DEPTH_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "engine.max_nesting_depth must be at most {MAX_NESTING_DEPTH_LIMIT}"
            )));
        }
        if let Some(service) = &self.service
            && service.as_str().trim().is_empty()
        {
            return Err(ConfigError::Invalid("engine.service must be non-empty".to_string()));
        }
        Ok(())
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self { service: None, max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH }
    }
}

/// Serde default for [`EngineSection::max_nesting_depth`].
const fn default_max_nesting_depth() -> usize {
    DEFAULT_MAX_NESTING_DEPTH
}

/// `[rules]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RulesConfig {
    /// Directory scanned recursively for rule documents.
    pub directory: PathBuf,
}

impl RulesConfig {
    /// Validates the rule directory path.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("rules.directory", &self.directory.to_string_lossy())
    }
}

/// `[providers]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// Optional fixture data file.
    #[serde(default)]
    pub fixtures: Option<PathBuf>,
    /// Fact holding the fixture subject key.
    #[serde(default = "default_subject_fact")]
    pub subject_fact: String,
    /// Maximum fixture file size in bytes.
    #[serde(default = "default_max_fixture_bytes")]
    pub max_fixture_bytes: usize,
    /// Optional allowlist of service names.
    #[serde(default)]
    pub allowlist: Option<BTreeSet<String>>,
    /// Explicit denylist of service names.
    #[serde(default)]
    pub denylist: BTreeSet<String>,
}

impl ProvidersConfig {
    /// Returns the registry access policy.
    #[must_use]
    pub fn access_policy(&self) -> ProviderAccessPolicy {
        ProviderAccessPolicy { allowlist: self.allowlist.clone(), denylist: self.denylist.clone() }
    }

    /// Validates provider settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(fixtures) = &self.fixtures {
            validate_path_string("providers.fixtures", &fixtures.to_string_lossy())?;
        }
        if self.subject_fact.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "providers.subject_fact must be non-empty".to_string(),
            ));
        }
        if self.max_fixture_bytes == 0 {
            return Err(ConfigError::Invalid(
                "providers.max_fixture_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            fixtures: None,
            subject_fact: default_subject_fact(),
            max_fixture_bytes: DEFAULT_MAX_FILE_BYTES,
            allowlist: None,
            denylist: BTreeSet::new(),
        }
    }
}

/// Serde default for [`ProvidersConfig::subject_fact`].
fn default_subject_fact() -> String {
    DEFAULT_SUBJECT_FACT.to_string()
}

/// Serde default for [`ProvidersConfig::max_fixture_bytes`].
const fn default_max_fixture_bytes() -> usize {
    DEFAULT_MAX_FILE_BYTES
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive, such as `info` or
    /// `entitlement_core=debug`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl LoggingConfig {
    /// Validates logging settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.filter must be non-empty".to_string()));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_log_filter() }
    }
}

/// Serde default for [`LoggingConfig::filter`].
fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration and rule loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// Rule document that could not be loaded.
    #[error("rule document {path}: {message}")]
    Rule {
        /// Document path.
        path: String,
        /// Failure description.
        message: String,
    },
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} component too long")));
        }
    }
    Ok(())
}
