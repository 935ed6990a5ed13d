// crates/entitlement-core/src/runtime/catalog.rs
// ============================================================================
// Module: Rule Catalog
// Description: In-memory store of time-versioned rule specifications.
// Purpose: Select the rule version of a law that applies on a reference date.
// Dependencies: time, crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The catalog keeps every version of every law, ordered by `valid_from`.
//! The version applying on a date is the one with the latest `valid_from`
//! that is not after that date.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use time::Date;

use crate::core::LawId;
use crate::core::RuleSpec;
use crate::core::time::format_iso_date;
use crate::interfaces::RuleSource;
use crate::interfaces::RuleSourceError;

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Versioned rule specifications keyed by law.
///
/// # Invariants
/// - Versions of one law are keyed by `valid_from`; inserting a version with
///   an existing `valid_from` replaces it.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    /// Versions per law, ordered by `valid_from`.
    laws: BTreeMap<LawId, BTreeMap<Date, Arc<RuleSpec>>>,
}

impl RuleCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule version, returning the version it replaced.
    pub fn insert(&mut self, spec: RuleSpec) -> Option<Arc<RuleSpec>> {
        self.laws.entry(spec.law.clone()).or_default().insert(spec.valid_from, Arc::new(spec))
    }

    /// Adds a rule version and returns the catalog.
    #[must_use]
    pub fn with_spec(mut self, spec: RuleSpec) -> Self {
        self.insert(spec);
        self
    }

    /// Iterates over known laws in name order.
    pub fn laws(&self) -> impl Iterator<Item = &LawId> {
        self.laws.keys()
    }

    /// Iterates over the versions of a law, oldest first.
    pub fn versions(&self, law: &LawId) -> impl Iterator<Item = &Arc<RuleSpec>> {
        self.laws.get(law).into_iter().flat_map(BTreeMap::values)
    }

    /// Returns the total number of rule versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.laws.values().map(BTreeMap::len).sum()
    }

    /// Returns true when the catalog holds no rule versions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.laws.is_empty()
    }
}

impl RuleSource for RuleCatalog {
    fn load(&self, law: &LawId, reference_date: Date) -> Result<Arc<RuleSpec>, RuleSourceError> {
        let versions = self.laws.get(law).ok_or_else(|| RuleSourceError::UnknownLaw(law.clone()))?;
        versions
            .range(..=reference_date)
            .next_back()
            .map(|(_, spec)| Arc::clone(spec))
            .ok_or_else(|| RuleSourceError::NoValidVersion {
                law: law.clone(),
                date: format_iso_date(reference_date),
            })
    }

    fn contains_law(&self, law: &LawId) -> bool {
        self.laws.contains_key(law)
    }
}
