// crates/entitlement-providers/src/lib.rs
// ============================================================================
// Module: Entitlement Providers
// Description: Attribute provider registry and file-backed fixture provider.
// Purpose: Supply external attributes to the engine by owning service.
// Dependencies: entitlement-core, async-trait, serde, serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! This crate ships a registry that routes attribute requests by service name
//! under an allowlist/denylist policy, and a fixture provider that answers
//! requests from a YAML or JSON data file keyed by a subject fact.
//! Invariants:
//! - Attribute requests are routed via [`ProviderRegistry`] by service name.
//! - Fixture data is bounded in size and parsed once at load time.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod fixture;
pub mod registry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use fixture::FixtureError;
pub use fixture::FixtureProvider;
pub use fixture::FixtureProviderConfig;
pub use registry::ProviderAccessPolicy;
pub use registry::ProviderRegistry;
