// crates/entitlement-providers/src/registry.rs
// ============================================================================
// Module: Provider Registry
// Description: Registry of attribute providers keyed by owning service.
// Purpose: Route attribute requests by service name with policy checks.
// Dependencies: entitlement-core, async-trait, tracing
// ============================================================================

//! ## Overview
//! The provider registry resolves attribute requests by the service named in
//! the property's service reference and enforces allowlist and denylist
//! policies. It implements the core [`AttributeProvider`] interface so an
//! orchestrator can use it as its external source directly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use entitlement_core::AttributeError;
use entitlement_core::AttributeProvider;
use entitlement_core::AttributeRequest;
use entitlement_core::ServiceName;
use serde_json::Value;
use tracing::debug;

// ============================================================================
// SECTION: Access Policy
// ============================================================================

/// Access policy controlling which services may be queried.
///
/// # Invariants
/// - `denylist` overrides `allowlist` when both are present.
/// - If `allowlist` is `None`, all services are allowed unless denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAccessPolicy {
    /// Optional allowlist of service names.
    pub allowlist: Option<BTreeSet<String>>,
    /// Explicit denylist of service names.
    pub denylist: BTreeSet<String>,
}

impl ProviderAccessPolicy {
    /// Returns a policy that permits all services.
    #[must_use]
    pub const fn allow_all() -> Self {
        Self { allowlist: None, denylist: BTreeSet::new() }
    }

    /// Returns true when the service is allowed by policy.
    #[must_use]
    pub fn is_allowed(&self, service: &str) -> bool {
        if self.denylist.contains(service) {
            return false;
        }
        if let Some(allowlist) = &self.allowlist {
            return allowlist.contains(service);
        }
        true
    }
}

impl Default for ProviderAccessPolicy {
    fn default() -> Self {
        Self::allow_all()
    }
}

// ============================================================================
// SECTION: Provider Registry
// ============================================================================

/// Attribute provider registry with policy enforcement.
///
/// # Invariants
/// - Service names are unique within the registry.
/// - Access policy is enforced on every request, before any provider runs.
pub struct ProviderRegistry {
    /// Provider implementations keyed by service name.
    providers: BTreeMap<ServiceName, Arc<dyn AttributeProvider>>,
    /// Access control policy for provider usage.
    policy: ProviderAccessPolicy,
}

impl ProviderRegistry {
    /// Creates an empty registry with the provided policy.
    #[must_use]
    pub const fn new(policy: ProviderAccessPolicy) -> Self {
        Self { providers: BTreeMap::new(), policy }
    }

    /// Registers a provider for one service.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeError::Provider`] when the service already has a
    /// provider.
    pub fn register_provider(
        &mut self,
        service: ServiceName,
        provider: Arc<dyn AttributeProvider>,
    ) -> Result<(), AttributeError> {
        if self.providers.contains_key(&service) {
            return Err(AttributeError::Provider(format!(
                "provider already registered: {service}"
            )));
        }
        self.providers.insert(service, provider);
        Ok(())
    }

    /// Returns the configured policy.
    #[must_use]
    pub const fn policy(&self) -> &ProviderAccessPolicy {
        &self.policy
    }

    /// Iterates over registered services in name order.
    pub fn services(&self) -> impl Iterator<Item = &ServiceName> {
        self.providers.keys()
    }
}

#[async_trait]
impl AttributeProvider for ProviderRegistry {
    async fn get_value(
        &self,
        request: &AttributeRequest<'_>,
    ) -> Result<Option<Value>, AttributeError> {
        let service = request.service.as_str();
        if !self.policy.is_allowed(service) {
            return Err(AttributeError::Blocked(service.to_string()));
        }
        let Some(provider) = self.providers.get(request.service) else {
            return Err(AttributeError::UnknownService(service.to_string()));
        };
        debug!(service, field = request.field, depth = request.depth, "routing attribute request");
        provider.get_value(request).await
    }
}
