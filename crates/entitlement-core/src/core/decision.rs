// crates/entitlement-core/src/core/decision.rs
// ============================================================================
// Module: Decisions
// Description: Inputs and results of one rule evaluation.
// Purpose: Define the payload callers pass in and the decision they get back.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Facts and overrides are plain JSON maps supplied by the caller. A
//! [`Decision`] carries the computed outputs, the requirement verdict, every
//! externally resolved input, and the trace tree that explains them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::ServiceName;
use crate::core::identifiers::Symbol;
use crate::core::trace::TraceNode;

// ============================================================================
// SECTION: Caller Inputs
// ============================================================================

/// Facts supplied directly by the caller, keyed by bare symbol name.
pub type Facts = BTreeMap<String, Value>;

/// Caller overrides keyed by `@{service}.{field}`.
pub type Overrides = BTreeMap<String, Value>;

/// Builds the override key for a service attribute.
#[must_use]
pub fn override_key(service: &ServiceName, field: &str) -> String {
    format!("@{service}.{field}")
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Result of evaluating one law for one subject at one reference date.
///
/// # Invariants
/// - `outputs` is empty whenever `requirements_met` is false.
/// - `inputs` holds every symbol resolved through the context cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Identifier of the rule version that produced this decision.
    pub rule_uuid: String,
    /// Whether every requirement held.
    pub requirements_met: bool,
    /// Computed outputs by name.
    pub outputs: BTreeMap<String, Value>,
    /// Cached inputs resolved while checking requirements.
    pub inputs: BTreeMap<Symbol, Value>,
    /// Every symbol the evaluation looked up, in name order.
    pub accessed: BTreeSet<Symbol>,
    /// Explanation of the evaluation.
    pub trace: TraceNode,
}

impl Decision {
    /// Returns an output by name.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }
}
