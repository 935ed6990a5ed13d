// crates/entitlement-core/src/core/spec.rs
// ============================================================================
// Module: Rule Specification Model
// Description: Typed form of a law's rule document.
// Purpose: Parse requirement trees, operations, and actions into closed enums.
// Dependencies: serde, serde_json, smallvec, thiserror, time
// ============================================================================

//! ## Overview
//! A rule document declares definitions, input properties that map symbols to
//! external service fields, a requirement tree, and the actions that compute
//! outputs. Documents arrive as YAML or JSON; operations and operands are
//! parsed from generic JSON values so that one model serves both formats.
//!
//! Operation names form a closed set. A name outside that set is kept as
//! [`Operation::Unrecognized`] rather than rejected, so a document written
//! for a newer engine still evaluates (the operation yields `0` / `false`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::de::Error as _;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value;
use smallvec::SmallVec;
use thiserror::Error;
use time::Date;

use crate::core::fault::json_kind;
use crate::core::identifiers::LawId;
use crate::core::identifiers::ServiceName;
use crate::core::identifiers::Symbol;
use crate::core::time::deserialize_date;

// ============================================================================
// SECTION: Shape Errors
// ============================================================================

/// Rule document fragment that does not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed rule document: {0}")]
pub struct SpecShapeError(pub String);

impl SpecShapeError {
    /// Creates a shape error with the provided message.
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

// ============================================================================
// SECTION: Rule Specification
// ============================================================================

/// One version of a law's rules.
///
/// # Invariants
/// - Immutable once loaded; shared read-only between evaluations.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuleSpec {
    /// Unique identifier of this rule version.
    #[serde(default)]
    pub uuid: String,
    /// Human readable rule name.
    #[serde(default)]
    pub name: String,
    /// Law this rule version implements.
    pub law: LawId,
    /// Service that owns the law.
    pub service: ServiceName,
    /// First reference date this version applies to.
    #[serde(deserialize_with = "deserialize_date")]
    pub valid_from: Date,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Definitions and property declarations.
    #[serde(default)]
    pub properties: Properties,
    /// Ordered top-level requirements.
    #[serde(default)]
    pub requirements: Vec<RequirementNode>,
    /// Ordered output actions.
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl RuleSpec {
    /// Returns the property declaration for a symbol, if any.
    #[must_use]
    pub fn property(&self, symbol: &Symbol) -> Option<&PropertySpec> {
        self.properties.input.iter().find(|property| &property.name == symbol)
    }

    /// Returns the output declaration for an output name, if any.
    #[must_use]
    pub fn output_spec(&self, name: &str) -> Option<&OutputSpec> {
        self.properties.output.iter().find(|output| output.name == name)
    }
}

/// Definitions and property declarations of a rule.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Properties {
    /// Constants available to every evaluation, keyed by bare symbol.
    #[serde(default)]
    pub definitions: BTreeMap<String, Value>,
    /// Symbols sourced from external services or other laws.
    #[serde(default)]
    pub input: Vec<PropertySpec>,
    /// Output declarations with optional type enforcement.
    #[serde(default)]
    pub output: Vec<OutputSpec>,
}

/// Declaration of an externally sourced symbol.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PropertySpec {
    /// Symbol the rule uses for this property.
    pub name: Symbol,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Where the value comes from.
    #[serde(default)]
    pub service_reference: Option<ServiceReference>,
}

/// Pointer to a field owned by another service, optionally through a law.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceReference {
    /// Service that owns the field.
    pub service: ServiceName,
    /// Field name within that service.
    pub field: String,
    /// Law that computes the field, when it is itself rule-derived.
    #[serde(default)]
    pub law: Option<LawId>,
    /// Facts added to (or replaced in) the request sent to the service.
    #[serde(default)]
    pub parameters: Vec<ServiceParameter>,
}

/// One fact passed to a service, such as the subject to ask about.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceParameter {
    /// Fact name as seen by the service.
    pub name: String,
    /// Literal or `$` reference supplying the value.
    #[serde(deserialize_with = "deserialize_parameter_reference")]
    pub reference: Operand,
}

/// Accepts literals, references, and lists of those; rejects operations.
fn deserialize_parameter_reference<'de, D>(deserializer: D) -> Result<Operand, D::Error>
where
    D: Deserializer<'de>,
{
    let operand = Operand::deserialize(deserializer)?;
    if operand.contains_operation() {
        return Err(D::Error::custom("service parameter reference cannot be an operation"));
    }
    Ok(operand)
}

/// Declaration of one output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutputSpec {
    /// Output name.
    pub name: String,
    /// Declared value type (`amount`, `boolean`, `string`, ...).
    #[serde(default, rename = "type")]
    pub value_type: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Optional numeric constraints.
    #[serde(default)]
    pub type_spec: Option<TypeSpec>,
}

/// Numeric constraints applied to an output after it is computed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TypeSpec {
    /// Unit; `eurocent` forces integer results.
    #[serde(default)]
    pub unit: Option<String>,
    /// Decimal places to round to.
    #[serde(default)]
    pub precision: Option<u32>,
    /// Lower bound.
    #[serde(default)]
    pub min: Option<Number>,
    /// Upper bound.
    #[serde(default)]
    pub max: Option<Number>,
}

// ============================================================================
// SECTION: Requirements
// ============================================================================

/// Requirement tree node.
///
/// # Invariants
/// - Composite children are evaluated exhaustively and aggregated afterward.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum RequirementNode {
    /// Holds when every child holds.
    All(SmallVec<[Box<Self>; 4]>),
    /// Holds when at least one child holds.
    Or(SmallVec<[Box<Self>; 4]>),
    /// Leaf condition.
    Condition(Operation),
}

impl TryFrom<Value> for RequirementNode {
    type Error = SpecShapeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(SpecShapeError::new(format!(
                    "requirement must be a mapping, got {}",
                    json_kind(&other)
                )));
            }
        };
        if let Some(children) = map.remove("all") {
            return Ok(Self::All(requirement_children("all", children)?));
        }
        if let Some(children) = map.remove("or") {
            return Ok(Self::Or(requirement_children("or", children)?));
        }
        Operation::try_from(Value::Object(map)).map(Self::Condition)
    }
}

/// Parses the children of an `all` / `or` group.
fn requirement_children(
    group: &str,
    value: Value,
) -> Result<SmallVec<[Box<RequirementNode>; 4]>, SpecShapeError> {
    let Value::Array(items) = value else {
        return Err(SpecShapeError::new(format!("`{group}` must hold a list of requirements")));
    };
    items.into_iter().map(|item| RequirementNode::try_from(item).map(Box::new)).collect()
}

// ============================================================================
// SECTION: Operators
// ============================================================================

/// Numeric fold operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    /// Sum of all operands.
    Add,
    /// First operand minus the rest.
    Subtract,
    /// Product with truncation after fractional factors below one.
    Multiply,
    /// Integer-truncating quotient.
    Divide,
    /// Smallest operand.
    Min,
    /// Largest operand.
    Max,
}

impl ArithmeticOp {
    /// Returns the document name of the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Subtract => "SUBTRACT",
            Self::Multiply => "MULTIPLY",
            Self::Divide => "DIVIDE",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// Values are equal.
    Equals,
    /// Values differ.
    NotEquals,
    /// Left is greater than right.
    GreaterThan,
    /// Left is less than right.
    LessThan,
    /// Left is greater than or equal to right.
    GreaterOrEqual,
    /// Left is less than or equal to right.
    LessOrEqual,
}

impl Comparator {
    /// Returns the document name of the comparator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "EQUALS",
            Self::NotEquals => "NOT_EQUALS",
            Self::GreaterThan => "GREATER_THAN",
            Self::LessThan => "LESS_THAN",
            Self::GreaterOrEqual => "GREATER_OR_EQUAL",
            Self::LessOrEqual => "LESS_OR_EQUAL",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean folds over values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// Every value is truthy.
    And,
    /// Some value is truthy.
    Or,
}

impl LogicalOp {
    /// Returns the document name of the fold.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Fold combining the per-item results of a `FOREACH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    /// Numeric fold.
    Arithmetic(ArithmeticOp),
    /// Boolean fold.
    Logical(LogicalOp),
    /// Text concatenation.
    Concat,
}

impl Aggregate {
    /// Looks up an aggregate by document name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let aggregate = match name {
            "AND" => Self::Logical(LogicalOp::And),
            "OR" => Self::Logical(LogicalOp::Or),
            "CONCAT" => Self::Concat,
            other => Self::Arithmetic(arithmetic_op(other)?),
        };
        Some(aggregate)
    }

    /// Returns the document name of the aggregate.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Arithmetic(op) => op.as_str(),
            Self::Logical(op) => op.as_str(),
            Self::Concat => "CONCAT",
        }
    }
}

/// Unit of a date difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    /// Whole days.
    Days,
    /// Calendar months, ignoring the day of month.
    Months,
    /// Completed years.
    Years,
}

impl DateUnit {
    /// Returns the document name of the unit.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Days => "days",
            Self::Months => "months",
            Self::Years => "years",
        }
    }
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// One operation node of a rule document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum Operation {
    /// Numeric fold over operands.
    Arithmetic {
        /// Fold to apply.
        op: ArithmeticOp,
        /// Ordered operands.
        values: Vec<Operand>,
    },
    /// Binary comparison.
    Compare {
        /// Comparator to apply.
        comparator: Comparator,
        /// Left operand.
        subject: Operand,
        /// Right operand.
        value: Operand,
    },
    /// First matching branch wins.
    If {
        /// Ordered branches.
        branches: Vec<IfBranch>,
    },
    /// Boolean fold over operands.
    Logical {
        /// Fold to apply.
        op: LogicalOp,
        /// Ordered operands.
        values: Vec<Operand>,
    },
    /// Subject is a member of a list.
    In {
        /// Value to look up.
        subject: Operand,
        /// List (or single value) to search.
        values: Operand,
    },
    /// Subject resolves to a non-null value.
    NotNull {
        /// Value to test.
        subject: Operand,
    },
    /// Text concatenation of non-null operands.
    Concat {
        /// Ordered operands.
        values: Vec<Operand>,
    },
    /// Evaluates `value` once per item of `subject` and folds the results.
    Foreach {
        /// List (or single value) to iterate.
        subject: Operand,
        /// Expression evaluated with the item's fields in local scope.
        value: Operand,
        /// Fold over the per-item results.
        combine: Aggregate,
    },
    /// Difference between two ISO dates, end first.
    SubtractDate {
        /// End date and start date.
        values: Vec<Operand>,
        /// Unit of the difference.
        unit: DateUnit,
    },
    /// Operation name this engine does not know.
    Unrecognized {
        /// Name as written in the document.
        name: String,
    },
}

impl Operation {
    /// Returns the document name of the operation.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Arithmetic { op, .. } => op.as_str(),
            Self::Compare { comparator, .. } => comparator.as_str(),
            Self::If { .. } => "IF",
            Self::Logical { op, .. } => op.as_str(),
            Self::Concat { .. } => "CONCAT",
            Self::Foreach { .. } => "FOREACH",
            Self::In { .. } => "IN",
            Self::NotNull { .. } => "NOT_NULL",
            Self::SubtractDate { .. } => "SUBTRACT_DATE",
            Self::Unrecognized { name } => name,
        }
    }

    /// Collects every symbol referenced anywhere inside this operation.
    pub fn collect_references(&self, out: &mut BTreeSet<Symbol>) {
        match self {
            Self::Arithmetic { values, .. }
            | Self::Logical { values, .. }
            | Self::Concat { values }
            | Self::SubtractDate { values, .. } => {
                values.iter().for_each(|operand| operand.collect_references(out));
            }
            Self::Compare { subject, value, .. }
            | Self::In { subject, values: value }
            | Self::Foreach { subject, value, .. } => {
                subject.collect_references(out);
                value.collect_references(out);
            }
            Self::If { branches } => {
                for branch in branches {
                    match branch {
                        IfBranch::Test { test, then } => {
                            test.collect_references(out);
                            then.collect_references(out);
                        }
                        IfBranch::Else(otherwise) => otherwise.collect_references(out),
                    }
                }
            }
            Self::NotNull { subject } => subject.collect_references(out),
            Self::Unrecognized { .. } => {}
        }
    }
}

impl TryFrom<Value> for Operation {
    type Error = SpecShapeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(SpecShapeError::new(format!(
                    "operation must be a mapping, got {}",
                    json_kind(&other)
                )));
            }
        };
        let name = match map.remove("operation") {
            Some(Value::String(name)) => name,
            Some(other) => {
                return Err(SpecShapeError::new(format!(
                    "operation name must be a string, got {}",
                    json_kind(&other)
                )));
            }
            None => return Err(SpecShapeError::new("missing `operation` key")),
        };
        parse_operation(name, &mut map)
    }
}

/// Builds an operation from its name and remaining keys.
fn parse_operation(
    name: String,
    map: &mut Map<String, Value>,
) -> Result<Operation, SpecShapeError> {
    if let Some(op) = arithmetic_op(&name) {
        return Ok(Operation::Arithmetic { op, values: operand_list(map)? });
    }
    let comparator = match name.as_str() {
        "EQUALS" => Some(Comparator::Equals),
        "NOT_EQUALS" => Some(Comparator::NotEquals),
        "GREATER_THAN" => Some(Comparator::GreaterThan),
        "LESS_THAN" => Some(Comparator::LessThan),
        "GREATER_OR_EQUAL" => Some(Comparator::GreaterOrEqual),
        "LESS_OR_EQUAL" => Some(Comparator::LessOrEqual),
        _ => None,
    };
    if let Some(comparator) = comparator {
        let (subject, value) = comparison_operands(comparator, map)?;
        return Ok(Operation::Compare { comparator, subject, value });
    }
    match name.as_str() {
        "IF" => Ok(Operation::If { branches: if_branches(map)? }),
        "AND" => Ok(Operation::Logical { op: LogicalOp::And, values: operand_list(map)? }),
        "OR" => Ok(Operation::Logical { op: LogicalOp::Or, values: operand_list(map)? }),
        "CONCAT" => Ok(Operation::Concat { values: operand_list(map)? }),
        "FOREACH" => foreach(map),
        "IN" => Ok(Operation::In {
            subject: required_operand("IN", "subject", map)?,
            values: map
                .remove("values")
                .map_or(Ok(Operand::List(Vec::new())), Operand::try_from)?,
        }),
        "NOT_NULL" => {
            Ok(Operation::NotNull { subject: required_operand("NOT_NULL", "subject", map)? })
        }
        "SUBTRACT_DATE" => Ok(Operation::SubtractDate {
            values: operand_list(map)?,
            unit: date_unit(map.remove("unit"))?,
        }),
        _ => Ok(Operation::Unrecognized { name }),
    }
}

/// Maps an arithmetic document name to its fold.
fn arithmetic_op(name: &str) -> Option<ArithmeticOp> {
    match name {
        "ADD" => Some(ArithmeticOp::Add),
        "SUBTRACT" => Some(ArithmeticOp::Subtract),
        "MULTIPLY" => Some(ArithmeticOp::Multiply),
        "DIVIDE" => Some(ArithmeticOp::Divide),
        "MIN" => Some(ArithmeticOp::Min),
        "MAX" => Some(ArithmeticOp::Max),
        _ => None,
    }
}

/// Parses a `FOREACH`; a list-valued `value` contributes its first item.
fn foreach(map: &mut Map<String, Value>) -> Result<Operation, SpecShapeError> {
    let subject = required_operand("FOREACH", "subject", map)?;
    let value = match map.remove("value") {
        Some(Value::Array(items)) => items
            .into_iter()
            .next()
            .ok_or_else(|| SpecShapeError::new("FOREACH `value` list is empty"))?,
        Some(value) => value,
        None => return Err(SpecShapeError::new("FOREACH requires `value`")),
    };
    let combine = match map.remove("combine") {
        Some(Value::String(name)) => Aggregate::from_name(&name)
            .ok_or_else(|| SpecShapeError::new(format!("unknown FOREACH combine `{name}`")))?,
        Some(other) => {
            return Err(SpecShapeError::new(format!(
                "FOREACH combine must be a string, got {}",
                json_kind(&other)
            )));
        }
        None => return Err(SpecShapeError::new("FOREACH requires `combine`")),
    };
    Ok(Operation::Foreach { subject, value: Operand::try_from(value)?, combine })
}

/// Parses the `values` key as an ordered operand list.
fn operand_list(map: &mut Map<String, Value>) -> Result<Vec<Operand>, SpecShapeError> {
    match map.remove("values") {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items.into_iter().map(Operand::try_from).collect(),
        Some(single) => Ok(vec![Operand::try_from(single)?]),
    }
}

/// Removes and parses a mandatory operand key.
fn required_operand(
    operation: &str,
    key: &str,
    map: &mut Map<String, Value>,
) -> Result<Operand, SpecShapeError> {
    let value = map
        .remove(key)
        .ok_or_else(|| SpecShapeError::new(format!("{operation} requires `{key}`")))?;
    Operand::try_from(value)
}

/// Reads comparison operands from `subject`/`value` or a two-item `values`.
fn comparison_operands(
    comparator: Comparator,
    map: &mut Map<String, Value>,
) -> Result<(Operand, Operand), SpecShapeError> {
    if map.contains_key("subject") {
        let subject = required_operand(comparator.as_str(), "subject", map)?;
        let value = required_operand(comparator.as_str(), "value", map)?;
        return Ok((subject, value));
    }
    let mut values = operand_list(map)?.into_iter();
    match (values.next(), values.next(), values.next()) {
        (Some(subject), Some(value), None) => Ok((subject, value)),
        _ => Err(SpecShapeError::new(format!(
            "{comparator} requires `subject` and `value` or exactly two `values`"
        ))),
    }
}

/// Parses the `conditions` list of an `IF` operation.
fn if_branches(map: &mut Map<String, Value>) -> Result<Vec<IfBranch>, SpecShapeError> {
    let Some(Value::Array(items)) = map.remove("conditions") else {
        return Err(SpecShapeError::new("IF requires a `conditions` list"));
    };
    items.into_iter().map(IfBranch::try_from).collect()
}

/// Parses a `SUBTRACT_DATE` unit, defaulting to days.
fn date_unit(value: Option<Value>) -> Result<DateUnit, SpecShapeError> {
    match value {
        None => Ok(DateUnit::Days),
        Some(Value::String(unit)) => match unit.as_str() {
            "days" => Ok(DateUnit::Days),
            "months" => Ok(DateUnit::Months),
            "years" => Ok(DateUnit::Years),
            other => Err(SpecShapeError::new(format!("unknown date unit `{other}`"))),
        },
        Some(other) => Err(SpecShapeError::new(format!(
            "date unit must be a string, got {}",
            json_kind(&other)
        ))),
    }
}

// ============================================================================
// SECTION: Branches
// ============================================================================

/// One entry in the `conditions` list of an `IF` operation.
#[derive(Debug, Clone, PartialEq)]
pub enum IfBranch {
    /// Returns `then` when `test` holds.
    Test {
        /// Condition to test.
        test: Operand,
        /// Result when the test holds.
        then: Operand,
    },
    /// Unconditional fallback.
    Else(Operand),
}

impl TryFrom<Value> for IfBranch {
    type Error = SpecShapeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(SpecShapeError::new(format!(
                    "IF condition must be a mapping, got {}",
                    json_kind(&other)
                )));
            }
        };
        if let Some(test) = map.remove("test") {
            let then = map.remove("then").unwrap_or(Value::Null);
            return Ok(Self::Test {
                test: Operand::try_from(test)?,
                then: Operand::try_from(then)?,
            });
        }
        map.remove("else")
            .map(|otherwise| Operand::try_from(otherwise).map(Self::Else))
            .unwrap_or_else(|| Err(SpecShapeError::new("IF condition needs `test` or `else`")))
    }
}

// ============================================================================
// SECTION: Operands
// ============================================================================

/// Operand of an operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum Operand {
    /// Literal value, used as written.
    Literal(Value),
    /// `$`-prefixed symbol reference.
    Reference(Symbol),
    /// List whose items are operands themselves.
    List(Vec<Self>),
    /// Nested operation.
    Operation(Box<Operation>),
}

impl Operand {
    /// Collects every symbol referenced by this operand.
    pub fn collect_references(&self, out: &mut BTreeSet<Symbol>) {
        match self {
            Self::Literal(_) => {}
            Self::Reference(symbol) => {
                out.insert(symbol.clone());
            }
            Self::List(items) => items.iter().for_each(|item| item.collect_references(out)),
            Self::Operation(operation) => operation.collect_references(out),
        }
    }

    /// Returns true when an operation appears anywhere in this operand.
    #[must_use]
    pub fn contains_operation(&self) -> bool {
        match self {
            Self::Literal(_) | Self::Reference(_) => false,
            Self::List(items) => items.iter().any(Self::contains_operation),
            Self::Operation(_) => true,
        }
    }
}

impl TryFrom<Value> for Operand {
    type Error = SpecShapeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(text) => Ok(Symbol::from_reference(&text)
                .map_or(Self::Literal(Value::String(text)), Self::Reference)),
            Value::Array(items) => {
                items.into_iter().map(Self::try_from).collect::<Result<_, _>>().map(Self::List)
            }
            Value::Object(map) if map.contains_key("operation") => Operation::try_from(
                Value::Object(map),
            )
            .map(|operation| Self::Operation(Box::new(operation))),
            other => Ok(Self::Literal(other)),
        }
    }
}

// ============================================================================
// SECTION: Actions
// ============================================================================

/// Computation of one output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct Action {
    /// Output name.
    pub output: String,
    /// Expression producing the output.
    pub value: Operand,
}

impl Action {
    /// Returns the symbols this action reads.
    #[must_use]
    pub fn references(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.value.collect_references(&mut out);
        out
    }
}

impl TryFrom<Value> for Action {
    type Error = SpecShapeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(SpecShapeError::new(format!(
                    "action must be a mapping, got {}",
                    json_kind(&other)
                )));
            }
        };
        let output = match map.remove("output") {
            Some(Value::String(output)) => output,
            _ => return Err(SpecShapeError::new("action requires a string `output`")),
        };
        let value = if map.contains_key("operation") {
            Operand::Operation(Box::new(Operation::try_from(Value::Object(map))?))
        } else {
            let value = map.remove("value").ok_or_else(|| {
                SpecShapeError::new(format!("action `{output}` has no value or operation"))
            })?;
            Operand::try_from(value)?
        };
        Ok(Self { output, value })
    }
}
