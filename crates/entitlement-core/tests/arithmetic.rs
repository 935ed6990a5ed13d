// crates/entitlement-core/tests/arithmetic.rs
// ============================================================================
// Module: Arithmetic Tests
// Description: Exact decimal folds, date differences, and output shaping.
// Purpose: Pin the truncation and zero-divisor rules amounts depend on.
// ============================================================================

//! Arithmetic semantics tests.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use entitlement_core::ArithmeticOp;
use entitlement_core::DateUnit;
use entitlement_core::EvaluationFault;
use entitlement_core::OutputSpec;
use entitlement_core::TypeSpec;
use entitlement_core::runtime::apply_arithmetic;
use entitlement_core::runtime::enforce_output;
use entitlement_core::runtime::subtract_dates;
use serde_json::Value;
use serde_json::json;

fn apply(op: ArithmeticOp, values: &Value) -> Value {
    let Value::Array(values) = values else {
        panic!("operands must be an array");
    };
    apply_arithmetic(op, values).unwrap()
}

fn output(value_type: Option<&str>, type_spec: Option<TypeSpec>) -> OutputSpec {
    OutputSpec {
        name: "amount".to_string(),
        value_type: value_type.map(str::to_string),
        description: String::new(),
        type_spec,
    }
}

// ============================================================================
// SECTION: Folds
// ============================================================================

#[test]
fn divide_by_zero_yields_zero() {
    assert_eq!(apply(ArithmeticOp::Divide, &json!([100, 0])), json!(0));
    assert_eq!(apply(ArithmeticOp::Divide, &json!([100, 5, 0])), json!(0));
}

#[test]
fn divide_truncates_each_step() {
    assert_eq!(apply(ArithmeticOp::Divide, &json!([7, 2])), json!(3));
    assert_eq!(apply(ArithmeticOp::Divide, &json!([-7, 2])), json!(-3));
    assert_eq!(apply(ArithmeticOp::Divide, &json!([100, 3, 3])), json!(11));
}

#[test]
fn divide_keeps_the_fraction_of_the_first_operand() {
    assert_eq!(apply(ArithmeticOp::Divide, &json!([7.5, 2.5])), json!(3));
    assert_eq!(apply(ArithmeticOp::Divide, &json!([7.9, 0.5])), json!(15));
    assert_eq!(apply(ArithmeticOp::Divide, &json!([10.5, 2, 2])), json!(2));
}

#[test]
fn multiply_truncates_after_fractional_factor_below_one() {
    assert_eq!(apply(ArithmeticOp::Multiply, &json!([1000, 0.21])), json!(210));
    assert_eq!(apply(ArithmeticOp::Multiply, &json!([1001, 0.5])), json!(500));
    assert_eq!(apply(ArithmeticOp::Multiply, &json!([1000, 2])), json!(2000));
}

#[test]
fn multiply_keeps_fraction_for_factors_of_one_or_more() {
    assert_eq!(apply(ArithmeticOp::Multiply, &json!([3, 1.5])), json!(4.5));
}

#[test]
fn add_and_subtract_fold_in_order() {
    assert_eq!(apply(ArithmeticOp::Add, &json!([1, 2, 3])), json!(6));
    assert_eq!(apply(ArithmeticOp::Add, &json!([0.1, 0.2])), json!(0.3));
    assert_eq!(apply(ArithmeticOp::Subtract, &json!([10, 3, 2])), json!(5));
}

#[test]
fn min_and_max_pick_extremes() {
    assert_eq!(apply(ArithmeticOp::Min, &json!([5, -2, 9])), json!(-2));
    assert_eq!(apply(ArithmeticOp::Max, &json!([5, -2, 9])), json!(9));
    assert_eq!(apply(ArithmeticOp::Max, &json!([1, 1.5])), json!(1.5));
}

#[test]
fn empty_operands_yield_zero() {
    for op in [ArithmeticOp::Add, ArithmeticOp::Multiply, ArithmeticOp::Divide, ArithmeticOp::Min] {
        assert_eq!(apply(op, &json!([])), json!(0));
    }
}

#[test]
fn booleans_count_as_one_and_zero() {
    assert_eq!(apply(ArithmeticOp::Add, &json!([true, true, false])), json!(2));
}

#[test]
fn non_numeric_operand_is_a_fault() {
    let err = apply_arithmetic(ArithmeticOp::Add, &[json!(1), json!("two")]).unwrap_err();
    assert_eq!(err, EvaluationFault::NonNumericOperand { operation: "ADD", kind: "string" });
}

// ============================================================================
// SECTION: Date Differences
// ============================================================================

#[test]
fn subtract_date_counts_days_months_and_years() {
    let values = [json!("2025-03-01"), json!("2007-03-02")];
    assert_eq!(subtract_dates(&values, DateUnit::Years).unwrap(), json!(17));
    assert_eq!(subtract_dates(&values, DateUnit::Months).unwrap(), json!(216));
    let values = [json!("2025-03-01"), json!("2025-02-01")];
    assert_eq!(subtract_dates(&values, DateUnit::Days).unwrap(), json!(28));
}

#[test]
fn subtract_date_rejects_bad_operands() {
    assert!(matches!(
        subtract_dates(&[json!("2025-01-01")], DateUnit::Days),
        Err(EvaluationFault::OperandCount { expected: 2, actual: 1, .. })
    ));
    assert!(matches!(
        subtract_dates(&[json!("2025-01-01"), json!(12)], DateUnit::Days),
        Err(EvaluationFault::InvalidDate(_))
    ));
}

// ============================================================================
// SECTION: Output Shaping
// ============================================================================

#[test]
fn eurocent_outputs_are_clamped_and_truncated() {
    let spec = output(
        Some("amount"),
        Some(TypeSpec {
            unit: Some("eurocent".to_string()),
            precision: None,
            min: Some(0.into()),
            max: Some(100_000.into()),
        }),
    );
    assert_eq!(enforce_output(Some(&spec), json!(1234.9)), json!(1234));
    assert_eq!(enforce_output(Some(&spec), json!(-50)), json!(0));
    assert_eq!(enforce_output(Some(&spec), json!(250_000)), json!(100_000));
}

#[test]
fn precision_rounds_fractional_outputs() {
    let spec = output(None, Some(TypeSpec { precision: Some(2), ..TypeSpec::default() }));
    assert_eq!(enforce_output(Some(&spec), json!(1.23456)), json!(1.23));
}

#[test]
fn string_outputs_are_rendered() {
    let spec = output(Some("string"), None);
    assert_eq!(enforce_output(Some(&spec), json!(42)), json!("42"));
    assert_eq!(enforce_output(Some(&spec), json!("x")), json!("x"));
    assert_eq!(enforce_output(None, json!(42)), json!(42));
}
