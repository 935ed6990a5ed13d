// crates/entitlement-core/src/runtime/comparator.rs
// ============================================================================
// Module: Entitlement Comparator Logic
// Description: Comparator evaluation for rule conditions.
// Purpose: Compare resolved operand values without panicking on any input.
// Dependencies: bigdecimal, serde_json, time, crate::core
// ============================================================================

//! ## Overview
//! Numeric comparison is decimal-aware, so `0.1 + 0.2`-style float artifacts
//! never decide eligibility. Strings that both parse as dates compare
//! chronologically; other strings compare lexicographically. Equality across
//! different JSON kinds is simply false, while ordering across them is a
//! fault the caller degrades to `false`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde_json::Number;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::Comparator;
use crate::core::EvaluationFault;
use crate::core::json_kind;
use crate::core::time::parse_iso_date;

// ============================================================================
// SECTION: Comparator Evaluation
// ============================================================================

/// Applies `comparator` to two resolved operands.
///
/// # Errors
///
/// Returns [`EvaluationFault`] when an ordering comparator is applied to
/// values without a common order.
pub fn evaluate_comparator(
    comparator: Comparator,
    left: &Value,
    right: &Value,
) -> Result<bool, EvaluationFault> {
    match comparator {
        Comparator::Equals => Ok(values_equal(left, right)),
        Comparator::NotEquals => Ok(!values_equal(left, right)),
        Comparator::GreaterThan => order_values(comparator, left, right).map(Ordering::is_gt),
        Comparator::LessThan => order_values(comparator, left, right).map(Ordering::is_lt),
        Comparator::GreaterOrEqual => order_values(comparator, left, right).map(Ordering::is_ge),
        Comparator::LessOrEqual => order_values(comparator, left, right).map(Ordering::is_le),
    }
}

/// Equality with decimal-aware numbers and date-aware strings.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => {
            decimal_cmp(left, right).is_some_and(Ordering::is_eq)
        }
        (Value::String(left), Value::String(right)) => {
            left == right || temporal_cmp(left, right).is_some_and(Ordering::is_eq)
        }
        _ => left == right,
    }
}

/// Orders two values or reports why they cannot be ordered.
fn order_values(
    comparator: Comparator,
    left: &Value,
    right: &Value,
) -> Result<Ordering, EvaluationFault> {
    match (left, right) {
        (Value::Number(left_number), Value::Number(right_number)) => {
            decimal_cmp(left_number, right_number).ok_or_else(|| {
                EvaluationFault::NumberOutOfRange(format!("{left_number} / {right_number}"))
            })
        }
        (Value::String(left), Value::String(right)) => {
            Ok(temporal_cmp(left, right).unwrap_or_else(|| left.cmp(right)))
        }
        (Value::Bool(left), Value::Bool(right)) => Ok(left.cmp(right)),
        _ => Err(EvaluationFault::IncompatibleOperands {
            comparator: comparator.as_str(),
            left: json_kind(left),
            right: json_kind(right),
        }),
    }
}

// ============================================================================
// SECTION: Decimal and Temporal Helpers
// ============================================================================

/// Orders numeric JSON values using decimal-aware comparison.
fn decimal_cmp(left: &Number, right: &Number) -> Option<Ordering> {
    let left = decimal_from_number(left)?;
    let right = decimal_from_number(right)?;
    Some(left.cmp(&right))
}

/// Parses a JSON number into `BigDecimal` with a stable string representation.
pub(crate) fn decimal_from_number(number: &Number) -> Option<BigDecimal> {
    let rendered = number.to_string();
    BigDecimal::from_str(&rendered).ok()
}

/// Compares RFC3339 date-times or `YYYY-MM-DD` dates; other text yields `None`.
fn temporal_cmp(left: &str, right: &str) -> Option<Ordering> {
    if let (Ok(left), Ok(right)) =
        (OffsetDateTime::parse(left, &Rfc3339), OffsetDateTime::parse(right, &Rfc3339))
    {
        return Some(left.cmp(&right));
    }
    let left = parse_iso_date(left)?;
    let right = parse_iso_date(right)?;
    Some(left.cmp(&right))
}
