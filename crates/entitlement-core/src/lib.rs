// crates/entitlement-core/src/lib.rs
// ============================================================================
// Module: Entitlement Core
// Description: Rule model, interpreter, and orchestration for entitlement rules.
// Purpose: Evaluate declarative eligibility rules into decisions with audit traces.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Entitlement core evaluates time-versioned rule specifications ("is this
//! person entitled, and to how much") against caller facts and lazily
//! resolved external attributes. Every evaluation returns the decision
//! together with a trace tree that explains it without re-running logic.
//!
//! Invariants:
//! - Compiled interpreters are immutable and shared; all per-call state lives
//!   in a [`runtime::ResolutionContext`] owned by one evaluation.
//! - A symbol is fetched from an attribute provider at most once per call.
//! - Faults inside conditions and operations degrade to `false` / `0` and are
//!   recorded in the trace; only configuration failures surface as errors.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::Action;
pub use crate::core::Aggregate;
pub use crate::core::ArithmeticOp;
pub use crate::core::Comparator;
pub use crate::core::DateUnit;
pub use crate::core::Decision;
pub use crate::core::EvaluationFault;
pub use crate::core::Facts;
pub use crate::core::IfBranch;
pub use crate::core::LawId;
pub use crate::core::LogicalOp;
pub use crate::core::Operand;
pub use crate::core::Operation;
pub use crate::core::OutputSpec;
pub use crate::core::Overrides;
pub use crate::core::Properties;
pub use crate::core::PropertySpec;
pub use crate::core::RequirementNode;
pub use crate::core::RuleSpec;
pub use crate::core::ServiceParameter;
pub use crate::core::ServiceName;
pub use crate::core::ServiceReference;
pub use crate::core::SpecShapeError;
pub use crate::core::Symbol;
pub use crate::core::TraceKind;
pub use crate::core::TraceNode;
pub use crate::core::TypeSpec;
pub use crate::core::override_key;
pub use crate::interfaces::AttributeError;
pub use crate::interfaces::AttributeProvider;
pub use crate::interfaces::AttributeRequest;
pub use crate::interfaces::NoExternalSources;
pub use crate::interfaces::RuleSource;
pub use crate::interfaces::RuleSourceError;
pub use crate::runtime::CompiledKey;
pub use crate::runtime::EngineError;
pub use crate::runtime::EvaluationInput;
pub use crate::runtime::EvaluationRequest;
pub use crate::runtime::Orchestrator;
pub use crate::runtime::OrchestratorConfig;
pub use crate::runtime::ResolutionContext;
pub use crate::runtime::ResolutionTier;
pub use crate::runtime::RuleCatalog;
pub use crate::runtime::RuleInterpreter;
