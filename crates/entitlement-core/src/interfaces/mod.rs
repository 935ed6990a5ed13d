// crates/entitlement-core/src/interfaces/mod.rs
// ============================================================================
// Module: Entitlement Interfaces
// Description: Backend-agnostic interfaces for attribute lookup and rule loading.
// Purpose: Define the contract surfaces the interpreter and orchestrator consume.
// Dependencies: async-trait, crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the engine reaches outside itself: attribute
//! providers answer "what is field F of service S for this subject", and rule
//! sources hand out the rule version valid at a reference date. Concrete
//! registries, fixture files, and rule directories live in other crates.
//!
//! Attribute lookups are the only suspension points of an evaluation, which is
//! why [`AttributeProvider`] is async while [`RuleSource`] is not.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use time::Date;

use crate::core::Facts;
use crate::core::LawId;
use crate::core::Overrides;
use crate::core::RuleSpec;
use crate::core::ServiceName;

// ============================================================================
// SECTION: Attribute Provider
// ============================================================================

/// Request for one externally sourced attribute.
#[derive(Debug, Clone, Copy)]
pub struct AttributeRequest<'a> {
    /// Service that owns the field.
    pub service: &'a ServiceName,
    /// Field name within the service.
    pub field: &'a str,
    /// Law that computes the field, when rule-derived.
    pub law: Option<&'a LawId>,
    /// Facts of the evaluation issuing the request, with any service
    /// parameters merged in.
    pub facts: &'a Facts,
    /// Caller overrides of the evaluation issuing the request.
    pub overrides: &'a Overrides,
    /// Reference date of the evaluation.
    pub reference_date: Date,
    /// Nesting depth of the evaluation issuing the request (top level is 0).
    pub depth: usize,
}

/// Attribute provider errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum AttributeError {
    /// Provider reported an error.
    #[error("attribute provider error: {0}")]
    Provider(String),
    /// No provider serves the requested service.
    #[error("no attribute provider for service: {0}")]
    UnknownService(String),
    /// Access policy rejected the request.
    #[error("attribute access blocked for service: {0}")]
    Blocked(String),
    /// Nested law evaluation would exceed the configured depth.
    #[error("nested evaluation depth {depth} exceeds limit {limit}")]
    DepthExceeded {
        /// Depth the nested evaluation would run at.
        depth: usize,
        /// Configured maximum.
        limit: usize,
    },
    /// Nested law evaluation failed.
    #[error("nested evaluation of {law} failed: {message}")]
    Nested {
        /// Law that failed.
        law: LawId,
        /// Failure description.
        message: String,
    },
}

/// Source of externally held attributes.
///
/// Returning `Ok(None)` means the source holds no value for the subject.
#[async_trait]
pub trait AttributeProvider: Send + Sync {
    /// Resolves one attribute.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeError`] when the source cannot answer.
    async fn get_value(
        &self,
        request: &AttributeRequest<'_>,
    ) -> Result<Option<Value>, AttributeError>;
}

/// Attribute provider that holds no values.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExternalSources;

#[async_trait]
impl AttributeProvider for NoExternalSources {
    async fn get_value(
        &self,
        _request: &AttributeRequest<'_>,
    ) -> Result<Option<Value>, AttributeError> {
        Ok(None)
    }
}

// ============================================================================
// SECTION: Rule Source
// ============================================================================

/// Rule source errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum RuleSourceError {
    /// No rule versions exist for the law.
    #[error("no rules found for law: {0}")]
    UnknownLaw(LawId),
    /// Every rule version of the law starts after the reference date.
    #[error("no version of law {law} is valid on {date}")]
    NoValidVersion {
        /// Requested law.
        law: LawId,
        /// Requested reference date, ISO formatted.
        date: String,
    },
    /// Backend failure while loading rules.
    #[error("rule source error: {0}")]
    Source(String),
}

/// Supplier of time-versioned rule specifications.
pub trait RuleSource: Send + Sync {
    /// Loads the rule version of `law` valid on `reference_date`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSourceError`] when no such version exists or loading fails.
    fn load(&self, law: &LawId, reference_date: Date) -> Result<Arc<RuleSpec>, RuleSourceError>;

    /// Returns true when any version of `law` is known.
    fn contains_law(&self, law: &LawId) -> bool;
}
