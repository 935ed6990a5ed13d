// crates/entitlement-core/src/runtime/arithmetic.rs
// ============================================================================
// Module: Entitlement Arithmetic
// Description: Exact decimal folds, date differences, and output shaping.
// Purpose: Compute benefit amounts deterministically from resolved operands.
// Dependencies: bigdecimal, serde_json, time, crate::core
// ============================================================================

//! ## Overview
//! Operands are lifted into [`BigDecimal`] so that `1000 * 0.21` is exactly
//! `210`. Each operand remembers whether it was written as a fractional
//! number; integer inputs produce integer outputs.
//!
//! Two truncation rules are part of the arithmetic contract:
//! - `MULTIPLY` truncates the running product to an integer after every
//!   fractional factor below one (percentages applied to cent amounts).
//! - `DIVIDE` starts from the exact first operand, truncates after every
//!   division, and yields `0` when any divisor is zero.

// ============================================================================
// SECTION: Imports
// ============================================================================

use bigdecimal::BigDecimal;
use bigdecimal::ToPrimitive;
use bigdecimal::Zero;
use serde_json::Number;
use serde_json::Value;

use crate::core::ArithmeticOp;
use crate::core::DateUnit;
use crate::core::EvaluationFault;
use crate::core::OutputSpec;
use crate::core::json_kind;
use crate::core::time::parse_iso_date;
use crate::runtime::comparator::decimal_from_number;

// ============================================================================
// SECTION: Amounts
// ============================================================================

/// Exact numeric operand.
#[derive(Debug, Clone)]
struct Amount {
    /// Exact value.
    value: BigDecimal,
    /// Whether the value carries a fractional representation.
    fractional: bool,
}

impl Amount {
    /// Creates an integral amount.
    fn integer(value: i64) -> Self {
        Self { value: BigDecimal::from(value), fractional: false }
    }

    /// Lifts a resolved JSON operand; booleans count as 1 and 0.
    fn from_value(operation: &'static str, value: &Value) -> Result<Self, EvaluationFault> {
        match value {
            Value::Number(number) => {
                let decimal = decimal_from_number(number)
                    .ok_or_else(|| EvaluationFault::NumberOutOfRange(number.to_string()))?;
                Ok(Self { value: decimal, fractional: number.is_f64() })
            }
            Value::Bool(flag) => Ok(Self::integer(i64::from(*flag))),
            Value::Null => Ok(Self::integer(0)),
            other => Err(EvaluationFault::NonNumericOperand { operation, kind: json_kind(other) }),
        }
    }

    /// Drops the fractional part, rounding toward zero.
    fn truncated(self) -> Self {
        Self { value: self.value.with_scale(0), fractional: false }
    }

    /// Lowers the amount back into a JSON number.
    fn into_value(self) -> Result<Value, EvaluationFault> {
        if self.fractional {
            let float = self
                .value
                .to_f64()
                .ok_or_else(|| EvaluationFault::NumberOutOfRange(self.value.to_string()))?;
            Number::from_f64(float)
                .map(Value::Number)
                .ok_or_else(|| EvaluationFault::NumberOutOfRange(self.value.to_string()))
        } else {
            let truncated = self.value.with_scale(0);
            truncated
                .to_i64()
                .map(Value::from)
                .ok_or_else(|| EvaluationFault::NumberOutOfRange(truncated.to_string()))
        }
    }
}

// ============================================================================
// SECTION: Arithmetic Folds
// ============================================================================

/// Applies an arithmetic fold to resolved operands.
///
/// An empty operand list yields `0`.
///
/// # Errors
///
/// Returns [`EvaluationFault`] when an operand is not numeric or a result
/// cannot be represented.
pub fn apply_arithmetic(op: ArithmeticOp, values: &[Value]) -> Result<Value, EvaluationFault> {
    let amounts = values
        .iter()
        .map(|value| Amount::from_value(op.as_str(), value))
        .collect::<Result<Vec<_>, _>>()?;
    let Some((first, rest)) = amounts.split_first() else {
        return Ok(Value::from(0));
    };
    let result = match op {
        ArithmeticOp::Add => amounts.iter().fold(Amount::integer(0), |acc, next| Amount {
            value: acc.value + &next.value,
            fractional: acc.fractional || next.fractional,
        }),
        ArithmeticOp::Subtract => rest.iter().fold(first.clone(), |acc, next| Amount {
            value: acc.value - &next.value,
            fractional: acc.fractional || next.fractional,
        }),
        ArithmeticOp::Multiply => rest.iter().fold(first.clone(), multiply_step),
        ArithmeticOp::Divide => {
            if rest.iter().any(|divisor| divisor.value.is_zero()) {
                return Ok(Value::from(0));
            }
            rest.iter().fold(first.clone(), |acc, divisor| {
                Amount { value: acc.value / &divisor.value, fractional: false }.truncated()
            })
        }
        ArithmeticOp::Min => rest.iter().fold(first.clone(), |acc, next| {
            if next.value < acc.value { next.clone() } else { acc }
        }),
        ArithmeticOp::Max => rest.iter().fold(first.clone(), |acc, next| {
            if next.value > acc.value { next.clone() } else { acc }
        }),
    };
    result.into_value()
}

/// One `MULTIPLY` step; fractional factors below one truncate the product.
fn multiply_step(acc: Amount, factor: &Amount) -> Amount {
    let product = Amount {
        value: acc.value * &factor.value,
        fractional: acc.fractional || factor.fractional,
    };
    if factor.fractional && factor.value < BigDecimal::from(1) {
        product.truncated()
    } else {
        product
    }
}

/// Concatenates operands as text; null operands are skipped.
///
/// Strings contribute their contents, other values their JSON rendering.
#[must_use]
pub fn concat_values(values: &[Value]) -> Value {
    let text = values
        .iter()
        .filter(|value| !value.is_null())
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .collect::<String>();
    Value::String(text)
}

// ============================================================================
// SECTION: Date Differences
// ============================================================================

/// Computes `end - start` for two ISO dates in the given unit.
///
/// # Errors
///
/// Returns [`EvaluationFault`] unless exactly two valid ISO dates are given.
pub fn subtract_dates(values: &[Value], unit: DateUnit) -> Result<Value, EvaluationFault> {
    let [end, start] = values else {
        return Err(EvaluationFault::OperandCount {
            operation: "SUBTRACT_DATE",
            expected: 2,
            actual: values.len(),
        });
    };
    let end = date_operand(end)?;
    let start = date_operand(start)?;
    let year_delta = i64::from(end.year()) - i64::from(start.year());
    let difference = match unit {
        DateUnit::Days => (end - start).whole_days(),
        DateUnit::Months => {
            year_delta * 12 + i64::from(u8::from(end.month())) - i64::from(u8::from(start.month()))
        }
        DateUnit::Years => {
            let before_anniversary =
                (u8::from(end.month()), end.day()) < (u8::from(start.month()), start.day());
            year_delta - i64::from(before_anniversary)
        }
    };
    Ok(Value::from(difference))
}

/// Parses a date operand.
fn date_operand(value: &Value) -> Result<time::Date, EvaluationFault> {
    match value {
        Value::String(text) => {
            parse_iso_date(text).ok_or_else(|| EvaluationFault::InvalidDate(text.clone()))
        }
        other => Err(EvaluationFault::InvalidDate(other.to_string())),
    }
}

// ============================================================================
// SECTION: Output Type Enforcement
// ============================================================================

/// Shapes a computed output according to its declaration.
///
/// Numeric outputs are clamped to `min`/`max`, rounded to `precision`, and
/// truncated to an integer for the `eurocent` unit. `string` outputs are
/// rendered as strings. Values that cannot be shaped pass through unchanged.
#[must_use]
pub fn enforce_output(spec: Option<&OutputSpec>, value: Value) -> Value {
    let Some(spec) = spec else {
        return value;
    };
    if spec.value_type.as_deref() == Some("string") {
        return match value {
            Value::String(_) => value,
            other => Value::String(other.to_string()),
        };
    }
    let Some(type_spec) = &spec.type_spec else {
        return value;
    };
    let Value::Number(number) = &value else {
        return value;
    };
    let Some(decimal) = decimal_from_number(number) else {
        return value;
    };
    let mut amount = Amount { value: decimal, fractional: number.is_f64() };
    if let Some(min) = type_spec.min.as_ref().and_then(decimal_from_number)
        && amount.value < min
    {
        amount.value = min;
    }
    if let Some(max) = type_spec.max.as_ref().and_then(decimal_from_number)
        && amount.value > max
    {
        amount.value = max;
    }
    if let Some(precision) = type_spec.precision {
        amount.value = amount.value.round(i64::from(precision));
    }
    if type_spec.unit.as_deref() == Some("eurocent") {
        amount = amount.truncated();
    }
    amount.into_value().unwrap_or(value)
}
