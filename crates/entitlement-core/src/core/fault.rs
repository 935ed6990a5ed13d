// crates/entitlement-core/src/core/fault.rs
// ============================================================================
// Module: Evaluation Faults
// Description: Errors raised while applying a single operation or condition.
// Purpose: Give trace consumers a precise reason when a result degraded.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! Faults never escape an evaluation. The interpreter catches them at the
//! nearest operation or condition boundary, substitutes `0` or `false`, and
//! records the fault message on the trace node where it happened.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Faults
// ============================================================================

/// Failure while applying one operation to its operands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationFault {
    /// Ordering comparison between values that have no common order.
    #[error("cannot apply {comparator} to {left} and {right}")]
    IncompatibleOperands {
        /// Comparator name.
        comparator: &'static str,
        /// JSON kind of the left operand.
        left: &'static str,
        /// JSON kind of the right operand.
        right: &'static str,
    },
    /// Arithmetic operand that is not numeric.
    #[error("{operation} operand is not numeric: {kind}")]
    NonNumericOperand {
        /// Operation name.
        operation: &'static str,
        /// JSON kind of the offending operand.
        kind: &'static str,
    },
    /// Number that cannot be represented exactly.
    #[error("number out of range: {0}")]
    NumberOutOfRange(String),
    /// Operand expected to be an ISO date.
    #[error("invalid date operand: {0}")]
    InvalidDate(String),
    /// Operation received the wrong number of operands.
    #[error("{operation} expects {expected} operands, got {actual}")]
    OperandCount {
        /// Operation name.
        operation: &'static str,
        /// Expected operand count.
        expected: usize,
        /// Actual operand count.
        actual: usize,
    },
}

/// Returns a short name for the JSON kind of `value`.
#[must_use]
pub const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
