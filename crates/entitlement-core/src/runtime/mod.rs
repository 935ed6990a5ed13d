// crates/entitlement-core/src/runtime/mod.rs
// ============================================================================
// Module: Entitlement Runtime
// Description: Value semantics, resolution, interpretation, and orchestration.
// Purpose: Execute rule specifications against caller facts.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The runtime layers, leaves first: comparator and arithmetic value
//! semantics, the per-call [`ResolutionContext`], the [`RuleInterpreter`],
//! the in-memory [`RuleCatalog`], and the [`Orchestrator`] that ties them
//! together.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod arithmetic;
pub mod catalog;
pub mod comparator;
pub mod context;
pub mod interpreter;
pub mod orchestrator;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use arithmetic::apply_arithmetic;
pub use arithmetic::concat_values;
pub use arithmetic::enforce_output;
pub use arithmetic::subtract_dates;
pub use catalog::RuleCatalog;
pub use comparator::evaluate_comparator;
pub use context::ResolutionContext;
pub use context::ResolutionTier;
pub use interpreter::EvaluationInput;
pub use interpreter::RuleInterpreter;
pub use orchestrator::CompiledKey;
pub use orchestrator::DEFAULT_MAX_NESTING_DEPTH;
pub use orchestrator::EngineError;
pub use orchestrator::EvaluationRequest;
pub use orchestrator::Orchestrator;
pub use orchestrator::OrchestratorConfig;
