// crates/entitlement-core/src/runtime/context.rs
// ============================================================================
// Module: Resolution Context
// Description: Per-evaluation symbol resolution with memoization.
// Purpose: Resolve `$` references through ordered tiers, fetching each
//          external attribute at most once per evaluation.
// Dependencies: serde_json, time, tracing, crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! A [`ResolutionContext`] is created for one evaluation and dropped with it.
//! It owns the values cache and the accessed-symbol set, so concurrent
//! evaluations sharing one compiled interpreter never observe each other.
//!
//! Resolution tiers, first hit wins:
//! 1. fields of the current `FOREACH` item
//! 2. rule definitions
//! 3. temporal built-ins derived from the reference date
//! 4. caller facts
//! 5. outputs computed earlier in this evaluation
//! 6. the values cache
//! 7. caller overrides keyed `@{service}.{field}` (cached)
//! 8. the attribute provider (cached, errors become null)
//!
//! A symbol that reaches none of them resolves to null.
//!
//! Service parameters are resolved before the cache is consulted. They are
//! merged into the facts sent with the attribute request and are part of the
//! cache key, so one property asked about two subjects is fetched twice.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use time::Date;
use tracing::debug;
use tracing::warn;

use crate::core::Facts;
use crate::core::Operand;
use crate::core::Overrides;
use crate::core::RuleSpec;
use crate::core::ServiceParameter;
use crate::core::Symbol;
use crate::core::TraceKind;
use crate::core::TraceNode;
use crate::core::override_key;
use crate::core::time::format_iso_date;
use crate::core::time::temporal_builtin;
use crate::interfaces::AttributeProvider;
use crate::interfaces::AttributeRequest;
use crate::runtime::interpreter::EvaluationInput;

// ============================================================================
// SECTION: Resolution Tiers
// ============================================================================

/// Tier that answered a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// Fields of the current `FOREACH` item.
    Local,
    /// Rule definitions.
    Definition,
    /// Temporal built-in symbol.
    Temporal,
    /// Caller facts.
    Fact,
    /// Output computed earlier in the evaluation.
    Output,
    /// Values cache.
    Cache,
    /// Caller override.
    Override,
    /// Attribute provider.
    Provider,
    /// No tier held the symbol.
    Unresolved,
}

impl ResolutionTier {
    /// Returns the stable trace label of the tier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Definition => "definition",
            Self::Temporal => "temporal",
            Self::Fact => "fact",
            Self::Output => "output",
            Self::Cache => "cache",
            Self::Override => "override",
            Self::Provider => "provider",
            Self::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one tier walk.
struct Resolution {
    /// Resolved value; `None` stands for null.
    value: Option<Value>,
    /// Tier that answered.
    tier: ResolutionTier,
    /// Provider failure, when one occurred.
    fault: Option<String>,
    /// Trace nodes of service parameter resolutions.
    children: Vec<TraceNode>,
}

impl Resolution {
    /// Successful resolution from `tier`.
    fn found(tier: ResolutionTier, value: &Value) -> Self {
        Self { value: non_null(value), tier, fault: None, children: Vec::new() }
    }

    /// Attaches parameter trace nodes.
    fn with_children(mut self, children: Vec<TraceNode>) -> Self {
        self.children = children;
        self
    }
}

/// Boxed future used for parameters that reference other symbols.
type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Cache key: symbol plus the serialized service parameters.
type CacheKey = (Symbol, String);

/// Treats JSON null as absent.
fn non_null(value: &Value) -> Option<Value> {
    if value.is_null() { None } else { Some(value.clone()) }
}

// ============================================================================
// SECTION: Resolution Context
// ============================================================================

/// Mutable state of one evaluation.
///
/// # Invariants
/// - Each symbol and parameter set is looked up through the provider at most
///   once.
/// - Every symbol passed to [`ResolutionContext::resolve`] is recorded as accessed.
pub struct ResolutionContext<'a> {
    /// Rule being evaluated.
    spec: &'a RuleSpec,
    /// Attribute source for the provider tier.
    provider: &'a dyn AttributeProvider,
    /// Caller facts.
    facts: &'a Facts,
    /// Caller overrides.
    overrides: &'a Overrides,
    /// Reference date.
    reference_date: Date,
    /// Nesting depth (top level is 0).
    depth: usize,
    /// Current `FOREACH` item, if any.
    local: Option<Value>,
    /// Memoized override and provider results; null marks a known miss.
    cache: BTreeMap<CacheKey, Value>,
    /// Latest externally resolved value per symbol.
    inputs: BTreeMap<Symbol, Value>,
    /// Outputs computed so far.
    outputs: BTreeMap<String, Value>,
    /// Every symbol resolution attempted.
    accessed: BTreeSet<Symbol>,
}

impl<'a> ResolutionContext<'a> {
    /// Creates a fresh context for one evaluation.
    #[must_use]
    pub fn new(
        spec: &'a RuleSpec,
        provider: &'a dyn AttributeProvider,
        input: &EvaluationInput<'a>,
    ) -> Self {
        Self {
            spec,
            provider,
            facts: input.facts,
            overrides: input.overrides,
            reference_date: input.reference_date,
            depth: input.depth,
            local: None,
            cache: BTreeMap::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            accessed: BTreeSet::new(),
        }
    }

    /// Returns the nesting depth of this evaluation.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the caller overrides.
    #[must_use]
    pub const fn overrides(&self) -> &'a Overrides {
        self.overrides
    }

    /// Returns the externally resolved values so far.
    #[must_use]
    pub const fn inputs(&self) -> &BTreeMap<Symbol, Value> {
        &self.inputs
    }

    /// Makes `item` the local scope, returning the scope it replaces.
    ///
    /// Hand the returned scope to [`ResolutionContext::restore_scope`] once
    /// the item is done.
    #[must_use]
    pub fn enter_scope(&mut self, item: Value) -> Option<Value> {
        self.local.replace(item)
    }

    /// Reinstates a scope returned by [`ResolutionContext::enter_scope`].
    pub fn restore_scope(&mut self, outer: Option<Value>) {
        self.local = outer;
    }

    /// Consumes the context, returning the accessed-symbol set.
    #[must_use]
    pub fn into_accessed(self) -> BTreeSet<Symbol> {
        self.accessed
    }

    /// Makes a computed output resolvable by later actions.
    pub fn record_output(&mut self, name: &str, value: Value) {
        self.outputs.insert(name.to_string(), value);
    }

    /// Resolves a symbol and returns its value with the trace node describing
    /// the lookup. Null and unresolved symbols yield `None`.
    pub async fn resolve(&mut self, symbol: &Symbol) -> (Option<Value>, TraceNode) {
        self.accessed.insert(symbol.clone());
        let resolution = self.lookup(symbol).await;

        let mut node = TraceNode::new(TraceKind::Resolve, format!("Resolve ${symbol}"));
        node.set_detail("symbol", symbol.as_str());
        node.set_detail("tier", resolution.tier.as_str());
        node.set_result(resolution.value.clone().unwrap_or(Value::Null));
        if let Some(fault) = resolution.fault {
            node.set_fault(fault);
        }
        node.children = resolution.children;
        match resolution.tier {
            ResolutionTier::Unresolved => {
                warn!(symbol = %symbol, depth = self.depth, "symbol could not be resolved");
            }
            tier => {
                debug!(symbol = %symbol, tier = %tier, depth = self.depth, "resolved symbol");
            }
        }
        (resolution.value, node)
    }

    /// Boxed [`ResolutionContext::resolve`] for recursive parameter lookups.
    fn resolve_boxed<'b>(
        &'b mut self,
        symbol: &'b Symbol,
    ) -> BoxFuture<'b, (Option<Value>, TraceNode)>
    where
        'a: 'b,
    {
        Box::pin(self.resolve(symbol))
    }

    /// Walks the resolution tiers in order.
    async fn lookup(&mut self, symbol: &Symbol) -> Resolution {
        let spec = self.spec;
        let name = symbol.as_str();
        if let Some(Value::Object(fields)) = &self.local
            && let Some(value) = fields.get(name)
        {
            return Resolution::found(ResolutionTier::Local, value);
        }
        if let Some(value) = spec.properties.definitions.get(name) {
            return Resolution::found(ResolutionTier::Definition, value);
        }
        if let Some(value) = temporal_builtin(name, self.reference_date) {
            return Resolution::found(ResolutionTier::Temporal, &value);
        }
        if let Some(value) = self.facts.get(name) {
            return Resolution::found(ResolutionTier::Fact, value);
        }
        if let Some(value) = self.outputs.get(name) {
            return Resolution::found(ResolutionTier::Output, value);
        }

        let Some(reference) =
            spec.property(symbol).and_then(|property| property.service_reference.as_ref())
        else {
            return Resolution {
                value: None,
                tier: ResolutionTier::Unresolved,
                fault: None,
                children: Vec::new(),
            };
        };

        let (parameters, children) = self.resolve_parameters(&reference.parameters).await;
        let key = (symbol.clone(), parameter_key(&parameters));
        if let Some(value) = self.cache.get(&key) {
            return Resolution::found(ResolutionTier::Cache, value).with_children(children);
        }

        if let Some(value) = self.overrides.get(&override_key(&reference.service, &reference.field))
        {
            self.remember(key, value.clone());
            return Resolution::found(ResolutionTier::Override, value).with_children(children);
        }

        let facts = if parameters.is_empty() {
            Cow::Borrowed(self.facts)
        } else {
            let mut merged = self.facts.clone();
            merged.extend(parameters);
            Cow::Owned(merged)
        };
        let request = AttributeRequest {
            service: &reference.service,
            field: &reference.field,
            law: reference.law.as_ref(),
            facts: facts.as_ref(),
            overrides: self.overrides,
            reference_date: self.reference_date,
            depth: self.depth,
        };
        match self.provider.get_value(&request).await {
            Ok(value) => {
                let value = value.unwrap_or(Value::Null);
                self.remember(key, value.clone());
                Resolution::found(ResolutionTier::Provider, &value).with_children(children)
            }
            Err(err) => {
                warn!(
                    symbol = %symbol,
                    service = %reference.service,
                    field = %reference.field,
                    reference_date = %format_iso_date(self.reference_date),
                    depth = self.depth,
                    error = %err,
                    "attribute lookup failed, using null"
                );
                self.remember(key, Value::Null);
                Resolution {
                    value: None,
                    tier: ResolutionTier::Provider,
                    fault: Some(err.to_string()),
                    children,
                }
            }
        }
    }

    /// Records an external result in the cache and the inputs.
    fn remember(&mut self, key: CacheKey, value: Value) {
        self.inputs.insert(key.0.clone(), value.clone());
        self.cache.insert(key, value);
    }

    /// Resolves service parameters into facts, with their trace nodes.
    async fn resolve_parameters(
        &mut self,
        parameters: &[ServiceParameter],
    ) -> (Facts, Vec<TraceNode>) {
        let mut resolved = Facts::new();
        let mut nodes = Vec::new();
        for parameter in parameters {
            let value = self.parameter_value(&parameter.reference, &mut nodes).await;
            resolved.insert(parameter.name.clone(), value);
        }
        (resolved, nodes)
    }

    /// Evaluates one parameter operand; a list resolves each of its items.
    async fn parameter_value(&mut self, operand: &Operand, nodes: &mut Vec<TraceNode>) -> Value {
        match operand {
            Operand::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.scalar_parameter(item, nodes).await);
                }
                Value::Array(values)
            }
            scalar => self.scalar_parameter(scalar, nodes).await,
        }
    }

    /// Evaluates a literal or reference parameter; anything else is null.
    async fn scalar_parameter(&mut self, operand: &Operand, nodes: &mut Vec<TraceNode>) -> Value {
        match operand {
            Operand::Literal(value) => value.clone(),
            Operand::Reference(symbol) => {
                let (value, node) = self.resolve_boxed(symbol).await;
                nodes.push(node);
                value.unwrap_or(Value::Null)
            }
            Operand::List(_) | Operand::Operation(_) => Value::Null,
        }
    }
}

/// Renders resolved parameters as a stable cache key component.
fn parameter_key(parameters: &Facts) -> String {
    if parameters.is_empty() {
        return String::new();
    }
    serde_json::to_string(parameters).unwrap_or_default()
}
