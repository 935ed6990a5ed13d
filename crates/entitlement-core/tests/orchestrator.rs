// crates/entitlement-core/tests/orchestrator.rs
// ============================================================================
// Module: Orchestrator Tests
// Description: Compiled cache, version selection, and cross-law resolution.
// Purpose: Ensure laws compile once and nested evaluations stay bounded.
// ============================================================================

//! Orchestrator and rule catalog tests.

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
    reason = "Test-only assertions and helpers are permitted."
)]

mod support;

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use entitlement_core::EngineError;
use entitlement_core::EvaluationRequest;
use entitlement_core::LawId;
use entitlement_core::Orchestrator;
use entitlement_core::OrchestratorConfig;
use entitlement_core::RuleCatalog;
use entitlement_core::RuleSource;
use entitlement_core::RuleSourceError;
use entitlement_core::RuleSpec;
use entitlement_core::ServiceName;
use entitlement_core::Symbol;
use serde_json::json;
use support::RecordingProvider;
use support::date;
use support::facts;
use support::rule;
use time::Date;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Rule source that counts loads.
struct CountingSource {
    catalog: RuleCatalog,
    loads: AtomicUsize,
}

impl CountingSource {
    fn new(catalog: RuleCatalog) -> Self {
        Self { catalog, loads: AtomicUsize::new(0) }
    }
}

impl RuleSource for CountingSource {
    fn load(&self, law: &LawId, reference_date: Date) -> Result<Arc<RuleSpec>, RuleSourceError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.catalog.load(law, reference_date)
    }

    fn contains_law(&self, law: &LawId) -> bool {
        self.catalog.contains_law(law)
    }
}

const ZORGTOESLAG: &str = r"
uuid: zorgtoeslag-2025
law: zorgtoeslagwet
service: TOESLAGEN
valid_from: 2025-01-01
properties:
  input:
    - name: INSURED
      service_reference:
        service: RVZ
        field: is_insured
        law: zorgverzekeringswet
    - name: INCOME
      service_reference:
        service: BELASTINGDIENST
        field: income
requirements:
  - subject: $INSURED
    operation: EQUALS
    value: true
actions:
  - output: amount
    operation: SUBTRACT
    values: [2000, $INCOME]
";

const ZORGVERZEKERING: &str = r"
uuid: zvw-2024
law: zorgverzekeringswet
service: RVZ
valid_from: 2024-01-01
requirements:
  - subject: $age
    operation: GREATER_OR_EQUAL
    value: 18
actions:
  - output: is_insured
    value: true
  - output: premium
    value: 1500
";

fn catalog() -> RuleCatalog {
    RuleCatalog::new().with_spec(rule(ZORGTOESLAG)).with_spec(rule(ZORGVERZEKERING))
}

fn orchestrator(source: Arc<dyn RuleSource>, provider: RecordingProvider) -> Orchestrator {
    Orchestrator::new(source, Arc::new(provider), OrchestratorConfig::default())
}

fn request(law: &str) -> EvaluationRequest {
    EvaluationRequest::new(LawId::new(law), date(2025, 6, 1))
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

#[test]
fn catalog_selects_latest_version_not_after_reference_date() {
    let base = "law: x\nservice: S\n";
    let catalog = RuleCatalog::new()
        .with_spec(rule(&format!("{base}uuid: v2024\nvalid_from: 2024-01-01\n")))
        .with_spec(rule(&format!("{base}uuid: v2025\nvalid_from: 2025-01-01\n")))
        .with_spec(rule(&format!("{base}uuid: v2026\nvalid_from: 2026-01-01\n")));
    let law = LawId::new("x");
    assert_eq!(catalog.load(&law, date(2025, 6, 1)).unwrap().uuid, "v2025");
    assert_eq!(catalog.load(&law, date(2025, 1, 1)).unwrap().uuid, "v2025");
    assert_eq!(catalog.load(&law, date(2024, 12, 31)).unwrap().uuid, "v2024");
    assert!(matches!(
        catalog.load(&law, date(2023, 1, 1)),
        Err(RuleSourceError::NoValidVersion { .. })
    ));
    assert!(matches!(
        catalog.load(&LawId::new("y"), date(2025, 1, 1)),
        Err(RuleSourceError::UnknownLaw(_))
    ));
    assert_eq!(catalog.len(), 3);
    assert_eq!(catalog.versions(&law).count(), 3);
}

// ============================================================================
// SECTION: Compiled Cache
// ============================================================================

#[tokio::test]
async fn each_law_and_date_compiles_once() {
    let source = Arc::new(CountingSource::new(catalog()));
    let engine = orchestrator(source.clone(), RecordingProvider::new());
    let request = request("zorgverzekeringswet").with_facts(facts(json!({"age": 30})));
    for _ in 0 .. 3 {
        engine.evaluate(&request).await.unwrap();
    }
    assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    assert_eq!(engine.compiled_count(), 1);

    let later = EvaluationRequest { reference_date: date(2025, 7, 1), ..request };
    engine.evaluate(&later).await.unwrap();
    assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    assert_eq!(engine.compiled_count(), 2);
}

#[tokio::test]
async fn concurrent_evaluations_share_one_compiled_interpreter() {
    let source = Arc::new(CountingSource::new(catalog()));
    let engine = Arc::new(orchestrator(source.clone(), RecordingProvider::new()));
    let mut handles = Vec::new();
    for age in 10 .. 30 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            let request = request("zorgverzekeringswet").with_facts(facts(json!({"age": age})));
            engine.evaluate(&request).await.map(|decision| (age, decision.requirements_met))
        }));
    }
    for handle in handles {
        let (age, met) = handle.await.unwrap().unwrap();
        assert_eq!(met, age >= 18);
    }
    assert_eq!(source.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_law_is_a_hard_error() {
    let engine = orchestrator(Arc::new(catalog()), RecordingProvider::new());
    let err = engine.evaluate(&request("onbekendewet")).await.unwrap_err();
    assert!(matches!(err, EngineError::Rules(RuleSourceError::UnknownLaw(_))));
    assert_eq!(err.to_string(), "no rules found for law: onbekendewet");
}

#[tokio::test]
async fn owning_service_mismatch_is_a_hard_error() {
    let engine = orchestrator(Arc::new(catalog()), RecordingProvider::new());
    let owned = request("zorgtoeslagwet").with_service(ServiceName::new("UWV"));
    let err = engine.evaluate(&owned).await.unwrap_err();
    assert!(matches!(err, EngineError::ServiceMismatch { .. }));

    let configured = Orchestrator::new(
        Arc::new(catalog()),
        Arc::new(RecordingProvider::new()),
        OrchestratorConfig {
            service: Some(ServiceName::new("RVZ")),
            ..OrchestratorConfig::default()
        },
    );
    assert!(configured.evaluate(&request("zorgtoeslagwet")).await.is_err());
    assert!(
        configured
            .evaluate(&request("zorgverzekeringswet").with_facts(facts(json!({"age": 40}))))
            .await
            .is_ok()
    );
}

// ============================================================================
// SECTION: Nested Laws
// ============================================================================

#[tokio::test]
async fn rule_derived_attributes_come_from_nested_evaluation() {
    let provider = RecordingProvider::new().with_value("BELASTINGDIENST", "income", json!(500));
    let engine = orchestrator(Arc::new(catalog()), provider.clone());

    let adult = request("zorgtoeslagwet").with_facts(facts(json!({"age": 30})));
    let decision = engine.evaluate(&adult).await.unwrap();
    assert!(decision.requirements_met);
    assert_eq!(decision.output("amount"), Some(&json!(1500)));
    assert_eq!(decision.inputs.get(&Symbol::new("INSURED")), Some(&json!(true)));
    assert_eq!(provider.calls(), vec!["BELASTINGDIENST.income".to_string()]);
    assert_eq!(engine.compiled_count(), 2);

    let minor = request("zorgtoeslagwet").with_facts(facts(json!({"age": 12})));
    let decision = engine.evaluate(&minor).await.unwrap();
    assert!(!decision.requirements_met);
    assert_eq!(decision.inputs.get(&Symbol::new("INSURED")), Some(&json!(null)));
}

#[tokio::test]
async fn overrides_short_circuit_nested_laws() {
    let engine = orchestrator(Arc::new(catalog()), RecordingProvider::new());
    let request = request("zorgtoeslagwet")
        .with_facts(facts(json!({"age": 12})))
        .with_overrides([("@RVZ.is_insured".to_string(), json!(true))].into());
    let decision = engine.evaluate(&request).await.unwrap();
    assert!(decision.requirements_met);
    assert_eq!(engine.compiled_count(), 1);
}

#[tokio::test]
async fn service_parameters_reach_nested_evaluations() {
    let household = r"
law: gezinstoets
service: TOESLAGEN
valid_from: 2025-01-01
properties:
  input:
    - name: INSURED
      service_reference:
        service: RVZ
        field: is_insured
        law: zorgverzekeringswet
    - name: PARTNER_INSURED
      service_reference:
        service: RVZ
        field: is_insured
        law: zorgverzekeringswet
        parameters:
          - name: age
            reference: $partner_age
actions:
  - output: insured
    operation: NOT_NULL
    subject: $INSURED
  - output: partner_insured
    operation: NOT_NULL
    subject: $PARTNER_INSURED
";
    let engine =
        orchestrator(Arc::new(catalog().with_spec(rule(household))), RecordingProvider::new());
    let decision = engine
        .evaluate(&request("gezinstoets").with_facts(facts(json!({"age": 40, "partner_age": 12}))))
        .await
        .unwrap();
    assert_eq!(decision.output("insured"), Some(&json!(true)));
    assert_eq!(decision.output("partner_insured"), Some(&json!(false)));
    assert_eq!(decision.inputs.get(&Symbol::new("INSURED")), Some(&json!(true)));
    assert_eq!(decision.inputs.get(&Symbol::new("PARTNER_INSURED")), Some(&json!(null)));
}

#[tokio::test]
async fn nested_service_mismatch_resolves_to_null() {
    let mismatched = r"
law: aanvraag
service: TOESLAGEN
valid_from: 2025-01-01
properties:
  input:
    - name: INSURED
      service_reference:
        service: UWV
        field: is_insured
        law: zorgverzekeringswet
actions:
  - output: insured
    value: $INSURED
";
    let engine = orchestrator(
        Arc::new(catalog().with_spec(rule(mismatched))),
        RecordingProvider::new(),
    );
    let decision = engine
        .evaluate(&request("aanvraag").with_facts(facts(json!({"age": 40}))))
        .await
        .unwrap();
    assert_eq!(decision.output("insured"), Some(&json!(0)));
    assert!(decision.trace.has_fault());
}

#[tokio::test]
async fn self_referencing_law_stops_at_nesting_limit() {
    let recursive = r"
law: loop
service: LOOP
valid_from: 2025-01-01
properties:
  input:
    - name: NEXT
      service_reference:
        service: LOOP
        field: value
        law: loop
actions:
  - output: value
    operation: ADD
    values: [$NEXT, 1]
";
    let bounded = |limit| {
        Orchestrator::new(
            Arc::new(RuleCatalog::new().with_spec(rule(recursive))),
            Arc::new(RecordingProvider::new()),
            OrchestratorConfig { service: None, max_nesting_depth: limit },
        )
    };

    let decision = bounded(3).evaluate(&request("loop")).await.unwrap();
    assert_eq!(decision.output("value"), Some(&json!(4)));
    assert!(!decision.trace.has_fault());

    let decision = bounded(0).evaluate(&request("loop")).await.unwrap();
    assert_eq!(decision.output("value"), Some(&json!(1)));
    let faults: Vec<&str> =
        decision.trace.walk().filter_map(|node| node.fault.as_deref()).collect();
    assert_eq!(faults, vec!["nested evaluation depth 1 exceeds limit 0"]);
}
