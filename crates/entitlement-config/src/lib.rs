// crates/entitlement-config/src/lib.rs
// ============================================================================
// Module: Entitlement Config Library
// Description: Engine configuration model, validation, and rule loading.
// Purpose: Single source of truth for entitlement.toml semantics.
// Dependencies: entitlement-core, entitlement-providers, serde, toml, walkdir
// ============================================================================

//! ## Overview
//! `entitlement-config` defines the engine configuration file and loads the
//! rule documents it points at. Loading is strict and fails closed: oversized
//! or non UTF-8 inputs, malformed documents, and duplicate rule versions are
//! rejected rather than skipped.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod rules;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use rules::load_rule_directory;
pub use rules::parse_rule_document;
