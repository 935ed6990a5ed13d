// crates/entitlement-core/src/core/mod.rs
// ============================================================================
// Module: Entitlement Core Types
// Description: Data model shared by the interpreter and its collaborators.
// Purpose: Group identifiers, rule documents, traces, faults, and decisions.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! Pure data types: rule specifications as loaded from documents, the trace
//! tree produced by evaluation, evaluation faults, and the decision returned
//! to callers. Nothing here performs I/O or resolution.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod decision;
pub mod fault;
pub mod identifiers;
pub mod spec;
pub mod time;
pub mod trace;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use decision::Decision;
pub use decision::Facts;
pub use decision::Overrides;
pub use decision::override_key;
pub use fault::EvaluationFault;
pub use fault::json_kind;
pub use identifiers::LawId;
pub use identifiers::ServiceName;
pub use identifiers::Symbol;
pub use spec::Action;
pub use spec::Aggregate;
pub use spec::ArithmeticOp;
pub use spec::Comparator;
pub use spec::DateUnit;
pub use spec::IfBranch;
pub use spec::LogicalOp;
pub use spec::Operand;
pub use spec::Operation;
pub use spec::OutputSpec;
pub use spec::Properties;
pub use spec::PropertySpec;
pub use spec::RequirementNode;
pub use spec::RuleSpec;
pub use spec::ServiceParameter;
pub use spec::ServiceReference;
pub use spec::SpecShapeError;
pub use spec::TypeSpec;
pub use trace::TraceKind;
pub use trace::TraceNode;
