// crates/entitlement-core/src/runtime/orchestrator.rs
// ============================================================================
// Module: Evaluation Orchestrator
// Description: Compiled interpreter cache and cross-law attribute routing.
// Purpose: Evaluate laws by (law, date), resolving rule-derived attributes
//          through nested evaluations of other laws.
// Dependencies: async-trait, serde_json, thiserror, time, tracing
// ============================================================================

//! ## Overview
//! The orchestrator is the entry point for callers. It compiles each
//! (law, reference date) pair once, keeps the interpreter for the life of the
//! process, and acts as the attribute provider of every evaluation it runs:
//! a property whose service reference names a known law is answered by
//! evaluating that law for the requested output, anything else goes to the
//! external provider.
//!
//! Invariants:
//! - At most one compile happens per key; the cache lock is never held
//!   across an await point.
//! - Nested evaluations receive the caller's facts (with the property's
//!   service parameters merged in), overrides, and reference date, and run
//!   one level deeper than their caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use time::Date;
use tracing::debug;
use tracing::info;

use crate::core::Decision;
use crate::core::Facts;
use crate::core::LawId;
use crate::core::Overrides;
use crate::core::ServiceName;
use crate::core::time::format_iso_date;
use crate::interfaces::AttributeError;
use crate::interfaces::AttributeProvider;
use crate::interfaces::AttributeRequest;
use crate::interfaces::RuleSource;
use crate::interfaces::RuleSourceError;
use crate::runtime::interpreter::EvaluationInput;
use crate::runtime::interpreter::RuleInterpreter;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default bound on nested law evaluations.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 16;

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Service expected to own every top-level law, when set.
    pub service: Option<ServiceName>,
    /// Deepest allowed nested evaluation (top level is 0).
    pub max_nesting_depth: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { service: None, max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH }
    }
}

// ============================================================================
// SECTION: Requests and Errors
// ============================================================================

/// Key of the compiled interpreter cache.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompiledKey {
    /// Law identifier.
    pub law: LawId,
    /// Reference date the rule version was selected for.
    pub reference_date: Date,
}

/// One evaluation request.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    /// Law to evaluate.
    pub law: LawId,
    /// Reference date.
    pub reference_date: Date,
    /// Caller facts.
    pub facts: Facts,
    /// Caller overrides keyed `@{service}.{field}`.
    pub overrides: Overrides,
    /// Only compute this output and its dependencies.
    pub requested_output: Option<String>,
    /// Service expected to own the law; falls back to the configured service.
    pub service: Option<ServiceName>,
}

impl EvaluationRequest {
    /// Creates a request with no facts or overrides.
    #[must_use]
    pub const fn new(law: LawId, reference_date: Date) -> Self {
        Self {
            law,
            reference_date,
            facts: BTreeMap::new(),
            overrides: BTreeMap::new(),
            requested_output: None,
            service: None,
        }
    }

    /// Sets the caller facts.
    #[must_use]
    pub fn with_facts(mut self, facts: Facts) -> Self {
        self.facts = facts;
        self
    }

    /// Sets the caller overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Restricts evaluation to one output and its dependencies.
    #[must_use]
    pub fn with_requested_output(mut self, output: impl Into<String>) -> Self {
        self.requested_output = Some(output.into());
        self
    }

    /// Requires the law to be owned by `service`.
    #[must_use]
    pub fn with_service(mut self, service: ServiceName) -> Self {
        self.service = Some(service);
        self
    }
}

/// Evaluation failures surfaced to callers.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No applicable rule version could be loaded.
    #[error(transparent)]
    Rules(#[from] RuleSourceError),
    /// The law is owned by a different service than expected.
    #[error("law {law} belongs to service {actual}, not {expected}")]
    ServiceMismatch {
        /// Evaluated law.
        law: LawId,
        /// Expected owning service.
        expected: ServiceName,
        /// Owning service declared by the rule.
        actual: ServiceName,
    },
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Entry point that evaluates laws and routes attribute lookups.
pub struct Orchestrator {
    /// Rule versions by law.
    rules: Arc<dyn RuleSource>,
    /// External attribute source.
    provider: Arc<dyn AttributeProvider>,
    /// Settings.
    config: OrchestratorConfig,
    /// Compiled interpreters; entries are never invalidated.
    compiled: RwLock<BTreeMap<CompiledKey, Arc<RuleInterpreter>>>,
}

impl Orchestrator {
    /// Creates an orchestrator over a rule source and an external provider.
    #[must_use]
    pub fn new(
        rules: Arc<dyn RuleSource>,
        provider: Arc<dyn AttributeProvider>,
        config: OrchestratorConfig,
    ) -> Self {
        Self { rules, provider, config, compiled: RwLock::new(BTreeMap::new()) }
    }

    /// Returns the orchestrator settings.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Returns the number of compiled interpreters held.
    #[must_use]
    pub fn compiled_count(&self) -> usize {
        self.compiled.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns the compiled interpreter for `law` on `reference_date`,
    /// compiling it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Rules`] when no rule version applies.
    pub fn interpreter(
        &self,
        law: &LawId,
        reference_date: Date,
    ) -> Result<Arc<RuleInterpreter>, EngineError> {
        let key = CompiledKey { law: law.clone(), reference_date };
        if let Some(interpreter) =
            self.compiled.read().unwrap_or_else(PoisonError::into_inner).get(&key)
        {
            return Ok(Arc::clone(interpreter));
        }

        let mut compiled = self.compiled.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(interpreter) = compiled.get(&key) {
            return Ok(Arc::clone(interpreter));
        }
        let spec = self.rules.load(law, reference_date)?;
        let interpreter = Arc::new(RuleInterpreter::compile(spec));
        compiled.insert(key, Arc::clone(&interpreter));
        info!(
            law = %law,
            reference_date = %format_iso_date(reference_date),
            "compiled rule interpreter"
        );
        Ok(interpreter)
    }

    /// Evaluates a law for one subject.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when no rule version applies or the law is not
    /// owned by the expected service.
    pub async fn evaluate(&self, request: &EvaluationRequest) -> Result<Decision, EngineError> {
        let expected = request.service.as_ref().or(self.config.service.as_ref());
        self.evaluate_at_depth(request, expected, 0).await
    }

    /// Evaluates a law at a given nesting depth.
    async fn evaluate_at_depth(
        &self,
        request: &EvaluationRequest,
        expected_service: Option<&ServiceName>,
        depth: usize,
    ) -> Result<Decision, EngineError> {
        let interpreter = self.interpreter(&request.law, request.reference_date)?;
        let owner = &interpreter.spec().service;
        if let Some(expected) = expected_service
            && owner != expected
        {
            return Err(EngineError::ServiceMismatch {
                law: request.law.clone(),
                expected: expected.clone(),
                actual: owner.clone(),
            });
        }
        debug!(
            law = %request.law,
            reference_date = %format_iso_date(request.reference_date),
            depth,
            "evaluating law"
        );
        let input = EvaluationInput {
            facts: &request.facts,
            overrides: &request.overrides,
            reference_date: request.reference_date,
            requested_output: request.requested_output.as_deref(),
            depth,
        };
        Ok(interpreter.evaluate(self, input).await)
    }
}

#[async_trait]
impl AttributeProvider for Orchestrator {
    async fn get_value(
        &self,
        request: &AttributeRequest<'_>,
    ) -> Result<Option<Value>, AttributeError> {
        let Some(law) = request.law.filter(|law| self.rules.contains_law(law)) else {
            return self.provider.get_value(request).await;
        };
        let depth = request.depth + 1;
        if depth > self.config.max_nesting_depth {
            return Err(AttributeError::DepthExceeded {
                depth,
                limit: self.config.max_nesting_depth,
            });
        }
        let nested = EvaluationRequest {
            law: law.clone(),
            reference_date: request.reference_date,
            facts: request.facts.clone(),
            overrides: request.overrides.clone(),
            requested_output: Some(request.field.to_string()),
            service: Some(request.service.clone()),
        };
        let decision = self
            .evaluate_at_depth(&nested, Some(request.service), depth)
            .await
            .map_err(|err| AttributeError::Nested { law: law.clone(), message: err.to_string() })?;
        Ok(decision.outputs.get(request.field).cloned())
    }
}
