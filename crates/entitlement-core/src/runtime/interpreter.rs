// crates/entitlement-core/src/runtime/interpreter.rs
// ============================================================================
// Module: Rule Interpreter
// Description: Evaluation of requirement trees, operations, and actions.
// Purpose: Turn one compiled rule and one set of facts into a traced decision.
// Dependencies: serde_json, time, tracing, crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! A [`RuleInterpreter`] wraps one immutable rule version. Evaluation walks
//! the requirement list, then the actions, against a fresh
//! [`ResolutionContext`]. Every step returns its result together with the
//! trace node describing it; parents attach children as they go.
//!
//! Evaluation order contract:
//! - Top-level requirements stop at the first one that does not hold; later
//!   requirements are neither evaluated nor traced.
//! - Children of `all` / `or` groups are always evaluated in full and the
//!   aggregate is computed afterward.
//! - Actions run only when every requirement holds, in declaration order.
//!
//! `FOREACH` evaluates its expression once per item with the item's fields in
//! local scope, flattens list results, drops nulls, and folds what remains
//! with its `combine` aggregate. No remaining values yield `0`.
//!
//! Faults never abort an evaluation. A fault inside an operation yields `0`,
//! a fault inside a condition yields `false`, and both are recorded on the
//! trace node where they happened.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bigdecimal::Zero;
use serde_json::Value;
use time::Date;
use tracing::debug;
use tracing::warn;

use crate::core::Action;
use crate::core::Aggregate;
use crate::core::Comparator;
use crate::core::Decision;
use crate::core::EvaluationFault;
use crate::core::Facts;
use crate::core::IfBranch;
use crate::core::LogicalOp;
use crate::core::Operand;
use crate::core::Operation;
use crate::core::Overrides;
use crate::core::RequirementNode;
use crate::core::RuleSpec;
use crate::core::TraceKind;
use crate::core::TraceNode;
use crate::core::override_key;
use crate::core::time::format_iso_date;
use crate::interfaces::AttributeProvider;
use crate::runtime::arithmetic::apply_arithmetic;
use crate::runtime::arithmetic::concat_values;
use crate::runtime::arithmetic::enforce_output;
use crate::runtime::arithmetic::subtract_dates;
use crate::runtime::comparator::decimal_from_number;
use crate::runtime::comparator::evaluate_comparator;
use crate::runtime::context::ResolutionContext;

// ============================================================================
// SECTION: Evaluation Input
// ============================================================================

/// Per-call input of one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    /// Caller facts.
    pub facts: &'a Facts,
    /// Caller overrides keyed `@{service}.{field}`.
    pub overrides: &'a Overrides,
    /// Reference date the rules are evaluated at.
    pub reference_date: Date,
    /// Only compute this output and the outputs it depends on.
    pub requested_output: Option<&'a str>,
    /// Nesting depth (top level is 0).
    pub depth: usize,
}

// ============================================================================
// SECTION: Rule Interpreter
// ============================================================================

/// Compiled, immutable evaluator for one rule version.
///
/// # Invariants
/// - Holds no per-call state; safe to share between concurrent evaluations.
#[derive(Debug)]
pub struct RuleInterpreter {
    /// Rule version being interpreted.
    spec: Arc<RuleSpec>,
    /// Action index by output name.
    action_index: BTreeMap<String, usize>,
    /// Indices of the actions each action reads outputs from.
    action_dependencies: Vec<BTreeSet<usize>>,
}

impl RuleInterpreter {
    /// Compiles a rule version, indexing its actions and their dependencies.
    #[must_use]
    pub fn compile(spec: Arc<RuleSpec>) -> Self {
        let action_index: BTreeMap<String, usize> = spec
            .actions
            .iter()
            .enumerate()
            .map(|(index, action)| (action.output.clone(), index))
            .collect();
        let action_dependencies = spec
            .actions
            .iter()
            .enumerate()
            .map(|(index, action)| {
                action
                    .references()
                    .iter()
                    .filter_map(|symbol| action_index.get(symbol.as_str()).copied())
                    .filter(|dependency| *dependency != index)
                    .collect()
            })
            .collect();
        Self { spec, action_index, action_dependencies }
    }

    /// Returns the interpreted rule version.
    #[must_use]
    pub fn spec(&self) -> &RuleSpec {
        &self.spec
    }

    /// Evaluates the rule for one subject.
    pub async fn evaluate(
        &self,
        provider: &dyn AttributeProvider,
        input: EvaluationInput<'_>,
    ) -> Decision {
        let spec = self.spec.as_ref();
        let mut ctx = ResolutionContext::new(spec, provider, &input);

        let mut root = TraceNode::new(TraceKind::Evaluation, format!("Evaluate {}", spec.law));
        root.set_detail("law", spec.law.as_str());
        root.set_detail("service", spec.service.as_str());
        root.set_detail("reference_date", format_iso_date(input.reference_date));
        root.set_detail("depth", input.depth);
        if let Some(output) = input.requested_output {
            root.set_detail("requested_output", output);
        }

        let (requirements_met, requirements_node) = evaluate_requirements(spec, &mut ctx).await;
        root.push(requirements_node);
        let inputs = ctx.inputs().clone();

        let mut outputs = BTreeMap::new();
        if requirements_met {
            for action in self.selected_actions(input.requested_output) {
                let (value, node) = evaluate_action(spec, action, &mut ctx).await;
                ctx.record_output(&action.output, value.clone());
                outputs.insert(action.output.clone(), value);
                root.push(node);
            }
        }
        root.set_result(Value::Bool(requirements_met));
        debug!(
            law = %spec.law,
            depth = input.depth,
            requirements_met,
            outputs = outputs.len(),
            "evaluation finished"
        );

        Decision {
            rule_uuid: spec.uuid.clone(),
            requirements_met,
            outputs,
            inputs,
            accessed: ctx.into_accessed(),
            trace: root,
        }
    }

    /// Returns the actions to run, in declaration order.
    ///
    /// With a requested output, only that action and the actions it depends
    /// on (transitively) are selected; an unknown output selects nothing.
    fn selected_actions(&self, requested_output: Option<&str>) -> Vec<&Action> {
        let Some(requested) = requested_output else {
            return self.spec.actions.iter().collect();
        };
        let Some(&start) = self.action_index.get(requested) else {
            return Vec::new();
        };
        let mut selected = BTreeSet::new();
        let mut pending = vec![start];
        while let Some(index) = pending.pop() {
            if selected.insert(index) {
                pending.extend(self.action_dependencies[index].iter().copied());
            }
        }
        self.spec
            .actions
            .iter()
            .enumerate()
            .filter(|(index, _)| selected.contains(index))
            .map(|(_, action)| action)
            .collect()
    }
}

// ============================================================================
// SECTION: Requirements
// ============================================================================

/// Boxed future used to break recursion between evaluation steps.
type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Evaluates top-level requirements, stopping at the first that fails.
async fn evaluate_requirements(
    spec: &RuleSpec,
    ctx: &mut ResolutionContext<'_>,
) -> (bool, TraceNode) {
    let mut node = TraceNode::new(TraceKind::Requirement, "Check all requirements");
    let mut met = true;
    for requirement in &spec.requirements {
        let (held, child) = evaluate_requirement(requirement, ctx).await;
        node.push(child);
        if !held {
            met = false;
            break;
        }
    }
    node.set_result(Value::Bool(met));
    (met, node)
}

/// Evaluates one requirement node; composite children run exhaustively.
fn evaluate_requirement<'a, 'c: 'a>(
    requirement: &'a RequirementNode,
    ctx: &'a mut ResolutionContext<'c>,
) -> BoxFuture<'a, (bool, TraceNode)> {
    Box::pin(async move {
        match requirement {
            RequirementNode::All(children) | RequirementNode::Or(children) => {
                let all = matches!(requirement, RequirementNode::All(_));
                let label = if all { "Check ALL conditions" } else { "Check OR conditions" };
                let mut node = TraceNode::new(TraceKind::Requirement, label);
                let mut results = Vec::with_capacity(children.len());
                for child in children {
                    let (held, child_node) = evaluate_requirement(child, ctx).await;
                    node.push(child_node);
                    results.push(held);
                }
                let held = if all {
                    results.iter().all(|held| *held)
                } else {
                    results.iter().any(|held| *held)
                };
                node.set_result(Value::Bool(held));
                (held, node)
            }
            RequirementNode::Condition(operation) => {
                let mut node = TraceNode::new(TraceKind::Requirement, "Test condition");
                let (held, child) = evaluate_condition(operation, ctx).await;
                node.push(child);
                node.set_result(Value::Bool(held));
                (held, node)
            }
        }
    })
}

/// Runs an operation in condition position; faults become `false`.
async fn evaluate_condition(
    operation: &Operation,
    ctx: &mut ResolutionContext<'_>,
) -> (bool, TraceNode) {
    let (result, mut node) = run_operation(operation, ctx).await;
    match result {
        Ok(value) => {
            let held = truthy(&value);
            node.set_result(value);
            (held, node)
        }
        Err(fault) => {
            warn!(
                operation = operation.name(),
                depth = ctx.depth(),
                fault = %fault,
                "condition fault, treating as false"
            );
            node.set_fault(fault.to_string());
            node.set_result(Value::Bool(false));
            (false, node)
        }
    }
}

// ============================================================================
// SECTION: Actions
// ============================================================================

/// Computes one output; an `@{service}.{output}` override replaces it.
async fn evaluate_action(
    spec: &RuleSpec,
    action: &Action,
    ctx: &mut ResolutionContext<'_>,
) -> (Value, TraceNode) {
    let mut node = TraceNode::new(TraceKind::Action, format!("Compute {}", action.output));
    node.set_detail("output", action.output.as_str());
    let overridden = ctx.overrides().get(&override_key(&spec.service, &action.output));
    let value = if let Some(value) = overridden {
        node.set_detail("source", "override");
        value.clone()
    } else {
        value_of(&action.value, ctx, &mut node).await
    };
    let value = enforce_output(spec.output_spec(&action.output), value);
    node.set_result(value.clone());
    (value, node)
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Runs an operation, returning its undegraded result and trace node.
fn run_operation<'a, 'c: 'a>(
    operation: &'a Operation,
    ctx: &'a mut ResolutionContext<'c>,
) -> BoxFuture<'a, (Result<Value, EvaluationFault>, TraceNode)> {
    Box::pin(async move {
        let name = operation.name();
        let mut node = TraceNode::new(TraceKind::Operation, format!("Operation: {name}"));
        node.set_detail("operation", name);
        let result = match operation {
            Operation::Arithmetic { op, values } => {
                let values = values_of(values, ctx, &mut node).await;
                let result = apply_arithmetic(*op, &values);
                node.set_detail("values", values);
                result
            }
            Operation::Compare { comparator, subject, value } => {
                let left = value_of(subject, ctx, &mut node).await;
                let right = value_of(value, ctx, &mut node).await;
                let result = evaluate_comparator(*comparator, &left, &right).map(Value::Bool);
                node.set_detail("subject_value", left);
                node.set_detail("comparison_value", right);
                result
            }
            Operation::If { branches } => Ok(evaluate_branches(branches, ctx, &mut node).await),
            Operation::Logical { op, values } => {
                let values = values_of(values, ctx, &mut node).await;
                let held = logical_fold(*op, &values);
                node.set_detail("values", values);
                Ok(Value::Bool(held))
            }
            Operation::Concat { values } => {
                let mut parts = Vec::with_capacity(values.len());
                for operand in values {
                    parts.push(raw_value_of(operand, ctx, &mut node).await.unwrap_or(Value::Null));
                }
                let result = concat_values(&parts);
                node.set_detail("values", parts);
                Ok(result)
            }
            Operation::Foreach { subject, value, combine } => {
                evaluate_foreach(subject, value, *combine, ctx, &mut node).await
            }
            Operation::In { subject, values } => {
                let subject = raw_value_of(subject, ctx, &mut node).await.unwrap_or(Value::Null);
                let allowed = raw_value_of(values, ctx, &mut node).await.unwrap_or(Value::Null);
                let found = match &allowed {
                    Value::Array(items) => items.iter().any(|item| same_value(&subject, item)),
                    single => same_value(&subject, single),
                };
                node.set_detail("subject_value", subject);
                node.set_detail("allowed_values", allowed);
                Ok(Value::Bool(found))
            }
            Operation::NotNull { subject } => {
                let subject = raw_value_of(subject, ctx, &mut node).await;
                Ok(Value::Bool(subject.is_some()))
            }
            Operation::SubtractDate { values, unit } => {
                let mut dates = Vec::with_capacity(values.len());
                for operand in values {
                    dates.push(raw_value_of(operand, ctx, &mut node).await.unwrap_or(Value::Null));
                }
                let result = subtract_dates(&dates, *unit);
                node.set_detail("values", dates);
                node.set_detail("unit", unit.as_str());
                result
            }
            Operation::Unrecognized { name } => {
                warn!(operation = %name, depth = ctx.depth(), "unrecognized operation, using 0");
                node.set_detail("unrecognized", true);
                Ok(Value::from(0))
            }
        };
        (result, node)
    })
}

/// Evaluates a `FOREACH` body per item and folds the results.
async fn evaluate_foreach(
    subject: &Operand,
    value: &Operand,
    combine: Aggregate,
    ctx: &mut ResolutionContext<'_>,
    parent: &mut TraceNode,
) -> Result<Value, EvaluationFault> {
    let items = match raw_value_of(subject, ctx, parent).await {
        None => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(single) => vec![single],
    };
    parent.set_detail("combine", combine.as_str());
    parent.set_detail("item_count", items.len());
    let mut results = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        let mut node = TraceNode::new(TraceKind::Item, format!("Item {index}"));
        node.set_detail("item", item.clone());
        let outer = ctx.enter_scope(item);
        let result = raw_value_of(value, ctx, &mut node).await;
        ctx.restore_scope(outer);
        node.set_result(result.clone().unwrap_or(Value::Null));
        parent.push(node);
        match result {
            Some(Value::Array(values)) => results.extend(values),
            Some(single) => results.push(single),
            None => {}
        }
    }
    results.retain(|value| !value.is_null());
    parent.set_detail("values", results.clone());
    if results.is_empty() {
        return Ok(Value::from(0));
    }
    match combine {
        Aggregate::Arithmetic(op) => apply_arithmetic(op, &results),
        Aggregate::Logical(op) => Ok(Value::Bool(logical_fold(op, &results))),
        Aggregate::Concat => Ok(concat_values(&results)),
    }
}

/// Evaluates `IF` branches in order; the first true test or `else` wins.
async fn evaluate_branches(
    branches: &[IfBranch],
    ctx: &mut ResolutionContext<'_>,
    parent: &mut TraceNode,
) -> Value {
    for (index, branch) in branches.iter().enumerate() {
        let mut node = TraceNode::new(TraceKind::Branch, format!("Branch {index}"));
        match branch {
            IfBranch::Test { test, then } => {
                let held = evaluate_test(test, ctx, &mut node).await;
                node.set_detail("test_result", held);
                if held {
                    let value = value_of(then, ctx, &mut node).await;
                    node.set_result(value.clone());
                    parent.push(node);
                    return value;
                }
                parent.push(node);
            }
            IfBranch::Else(otherwise) => {
                node.set_detail("else", true);
                let value = value_of(otherwise, ctx, &mut node).await;
                node.set_result(value.clone());
                parent.push(node);
                return value;
            }
        }
    }
    Value::from(0)
}

/// Evaluates an `IF` test operand in condition position.
///
/// A faulting test counts as false and its fault is also recorded on the
/// branch, so later branches are still tried.
async fn evaluate_test(
    test: &Operand,
    ctx: &mut ResolutionContext<'_>,
    parent: &mut TraceNode,
) -> bool {
    if let Operand::Operation(operation) = test {
        let (held, node) = evaluate_condition(operation, ctx).await;
        if let Some(fault) = &node.fault {
            parent.set_fault(fault.clone());
        }
        parent.push(node);
        return held;
    }
    raw_value_of(test, ctx, parent).await.as_ref().is_some_and(truthy)
}

// ============================================================================
// SECTION: Operands
// ============================================================================

/// Evaluates operands in value position.
async fn values_of(
    operands: &[Operand],
    ctx: &mut ResolutionContext<'_>,
    parent: &mut TraceNode,
) -> Vec<Value> {
    let mut values = Vec::with_capacity(operands.len());
    for operand in operands {
        values.push(value_of(operand, ctx, parent).await);
    }
    values
}

/// Evaluates an operand in value position; null degrades to `0`.
async fn value_of(
    operand: &Operand,
    ctx: &mut ResolutionContext<'_>,
    parent: &mut TraceNode,
) -> Value {
    raw_value_of(operand, ctx, parent).await.unwrap_or_else(|| Value::from(0))
}

/// Evaluates an operand, keeping null as `None`.
async fn raw_value_of(
    operand: &Operand,
    ctx: &mut ResolutionContext<'_>,
    parent: &mut TraceNode,
) -> Option<Value> {
    let (value, nodes) = evaluate_operand(operand, ctx).await;
    parent.children.extend(nodes);
    value
}

/// Evaluates an operand, returning its value and any trace nodes produced.
fn evaluate_operand<'a, 'c: 'a>(
    operand: &'a Operand,
    ctx: &'a mut ResolutionContext<'c>,
) -> BoxFuture<'a, (Option<Value>, Vec<TraceNode>)> {
    Box::pin(async move {
        match operand {
            Operand::Literal(value) => ((!value.is_null()).then(|| value.clone()), Vec::new()),
            Operand::Reference(symbol) => {
                let (value, node) = ctx.resolve(symbol).await;
                (value, vec![node])
            }
            Operand::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                let mut nodes = Vec::new();
                for item in items {
                    let (value, item_nodes) = evaluate_operand(item, ctx).await;
                    values.push(value.unwrap_or(Value::Null));
                    nodes.extend(item_nodes);
                }
                (Some(Value::Array(values)), nodes)
            }
            Operand::Operation(operation) => {
                let (result, mut node) = run_operation(operation, ctx).await;
                let value = match result {
                    Ok(value) => value,
                    Err(fault) => {
                        warn!(
                            operation = operation.name(),
                            depth = ctx.depth(),
                            fault = %fault,
                            "operation fault, using 0"
                        );
                        node.set_fault(fault.to_string());
                        Value::from(0)
                    }
                };
                node.set_result(value.clone());
                (Some(value), vec![node])
            }
        }
    })
}

// ============================================================================
// SECTION: Value Helpers
// ============================================================================

/// Truthiness of a resolved value.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => {
            decimal_from_number(number).is_some_and(|number| !number.is_zero())
        }
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Boolean fold over resolved values.
fn logical_fold(op: LogicalOp, values: &[Value]) -> bool {
    match op {
        LogicalOp::And => values.iter().all(truthy),
        LogicalOp::Or => values.iter().any(truthy),
    }
}

/// Membership equality, decimal-aware for numbers and dates.
fn same_value(left: &Value, right: &Value) -> bool {
    evaluate_comparator(Comparator::Equals, left, right).unwrap_or(false)
}
