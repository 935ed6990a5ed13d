// crates/entitlement-core/src/core/trace.rs
// ============================================================================
// Module: Evaluation Trace
// Description: Tree of evaluation steps recorded during one rule evaluation.
// Purpose: Explain a decision after the fact without re-running any logic.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The interpreter builds trace trees bottom-up: every evaluation step returns
//! its result together with the node that describes it, and the caller
//! attaches that node to its own. A finished tree is owned by the
//! [`crate::core::Decision`] it explains.
//!
//! The tree mirrors the nesting of the rule itself: requirement groups contain
//! conditions, conditions contain operations, and operations contain the
//! symbol resolutions they performed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Trace Kind
// ============================================================================

/// Category of an evaluation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    /// Whole evaluation of one law.
    Evaluation,
    /// Requirement group or single requirement check.
    Requirement,
    /// Operation applied to operands.
    Operation,
    /// One branch of an `IF` operation.
    Branch,
    /// One item of a `FOREACH` operation.
    Item,
    /// Computation of one output.
    Action,
    /// Symbol resolution.
    Resolve,
}

// ============================================================================
// SECTION: Trace Node
// ============================================================================

/// One step of an evaluation.
///
/// # Invariants
/// - `result` holds the value the step produced after any degradation.
/// - `fault` is set only when the step caught a failure and degraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceNode {
    /// Step category.
    pub kind: TraceKind,
    /// Human readable description of the step.
    pub label: String,
    /// Result of the step, if it produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Step-specific annotations (resolved symbol, tier, operation name).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
    /// Fault message when the step degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
    /// Nested steps in evaluation order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Self>,
}

impl TraceNode {
    /// Creates an empty node.
    #[must_use]
    pub fn new(kind: TraceKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            result: None,
            details: BTreeMap::new(),
            fault: None,
            children: Vec::new(),
        }
    }

    /// Sets the step result.
    pub fn set_result(&mut self, value: Value) {
        self.result = Some(value);
    }

    /// Records an annotation.
    pub fn set_detail(&mut self, key: &str, value: impl Into<Value>) {
        self.details.insert(key.to_string(), value.into());
    }

    /// Records the fault that caused this step to degrade.
    pub fn set_fault(&mut self, message: impl Into<String>) {
        self.fault = Some(message.into());
    }

    /// Appends a child step.
    pub fn push(&mut self, child: Self) {
        self.children.push(child);
    }

    /// Returns an annotation by key.
    #[must_use]
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    /// Iterates over this node and all descendants in depth-first order.
    pub fn walk(&self) -> impl Iterator<Item = &Self> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// Returns true when this node or any descendant recorded a fault.
    #[must_use]
    pub fn has_fault(&self) -> bool {
        self.walk().any(|node| node.fault.is_some())
    }
}
