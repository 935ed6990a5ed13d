// crates/entitlement-core/tests/support/mod.rs
// ============================================================================
// Module: Test Support
// Description: Shared fixtures for entitlement core integration tests.
// ============================================================================
//! ## Overview
//! Rule document parsing, date helpers, and a call-recording attribute
//! provider shared by the integration tests.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    dead_code,
    reason = "Test-only helpers; not every test binary uses every helper."
)]

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use entitlement_core::AttributeError;
use entitlement_core::AttributeProvider;
use entitlement_core::AttributeRequest;
use entitlement_core::Facts;
use entitlement_core::RuleSpec;
use serde_json::Value;
use time::Date;
use time::Month;

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds a calendar date.
pub fn date(year: i32, month: u8, day: u8) -> Date {
    Date::from_calendar_date(year, Month::try_from(month).unwrap(), day).unwrap()
}

/// Parses a YAML rule document.
pub fn rule(yaml: &str) -> RuleSpec {
    serde_yaml::from_str(yaml).unwrap()
}

/// Builds a facts map from a JSON object literal.
pub fn facts(value: Value) -> Facts {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        other => panic!("facts must be an object, got {other}"),
    }
}

// ============================================================================
// SECTION: Recording Provider
// ============================================================================

/// Attribute provider with canned answers that records every call.
#[derive(Clone, Default)]
pub struct RecordingProvider {
    /// Answers keyed by `service.field`.
    responses: BTreeMap<String, Value>,
    /// Answers keyed by `service.field`, then the `bsn` fact of the request.
    subject_responses: BTreeMap<String, BTreeMap<String, Value>>,
    /// Keys that fail with a provider error.
    errors: BTreeSet<String>,
    /// Keys requested, in call order.
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingProvider {
    /// Creates a provider with no answers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an answer for `service.field`.
    pub fn with_value(mut self, service: &str, field: &str, value: Value) -> Self {
        self.responses.insert(format!("{service}.{field}"), value);
        self
    }

    /// Adds an answer for `service.field` about the subject with `bsn`.
    pub fn with_subject_value(
        mut self,
        service: &str,
        field: &str,
        bsn: &str,
        value: Value,
    ) -> Self {
        self.subject_responses
            .entry(format!("{service}.{field}"))
            .or_default()
            .insert(bsn.to_string(), value);
        self
    }

    /// Makes `service.field` fail.
    pub fn with_error(mut self, service: &str, field: &str) -> Self {
        self.errors.insert(format!("{service}.{field}"));
        self
    }

    /// Returns the recorded calls.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns how often `service.field` was requested.
    pub fn call_count(&self, service: &str, field: &str) -> usize {
        let key = format!("{service}.{field}");
        self.calls().iter().filter(|call| **call == key).count()
    }
}

#[async_trait]
impl AttributeProvider for RecordingProvider {
    async fn get_value(
        &self,
        request: &AttributeRequest<'_>,
    ) -> Result<Option<Value>, AttributeError> {
        let key = format!("{}.{}", request.service, request.field);
        self.calls.lock().unwrap().push(key.clone());
        if self.errors.contains(&key) {
            return Err(AttributeError::Provider(format!("{key} unavailable")));
        }
        let by_subject = self.subject_responses.get(&key).and_then(|subjects| {
            let bsn = request.facts.get("bsn").and_then(Value::as_str)?;
            subjects.get(bsn)
        });
        Ok(by_subject.or_else(|| self.responses.get(&key)).cloned())
    }
}
