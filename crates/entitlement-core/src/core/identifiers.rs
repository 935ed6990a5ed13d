// crates/entitlement-core/src/core/identifiers.rs
// ============================================================================
// Module: Entitlement Identifiers
// Description: Strongly typed identifiers for laws, services, and symbols.
// Purpose: Keep rule lookups and symbol resolution free of stringly typed keys.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque strings wrapped in newtypes. They are compared
//! verbatim: no case folding or trimming is applied, so `$INCOME` and
//! `$income` name different symbols.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Reference Prefix
// ============================================================================

/// Marker that distinguishes a symbol reference from a literal string.
pub const REFERENCE_PREFIX: char = '$';

// ============================================================================
// SECTION: Law Identifier
// ============================================================================

/// Identifier for a law (for example `zorgtoeslagwet`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LawId(String);

impl LawId {
    /// Creates a new law identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Service Name
// ============================================================================

/// Name of the service that owns a law or supplies an attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceName(String);

impl ServiceName {
    /// Creates a new service name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Symbol
// ============================================================================

/// Name a rule refers to with the `$` prefix, stored without the prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a symbol from its bare name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Parses a `$`-prefixed reference, returning `None` for literal strings.
    #[must_use]
    pub fn from_reference(text: &str) -> Option<Self> {
        text.strip_prefix(REFERENCE_PREFIX).map(Self::new)
    }

    /// Returns the bare symbol name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
