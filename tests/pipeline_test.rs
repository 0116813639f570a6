//! Planning and Execution Pipeline Integration Tests
//!
//! End-to-end runs of the decompose → reason → reflect → criticize →
//! execute → feedback pipeline, plus property tests over the graph and
//! confidence invariants.

use async_trait::async_trait;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nexus_core::execution::{ExecutionEngine, ExecutionOptions, StepOutcome};
use nexus_core::planning::{
    CriticismEngine, CriticismSeverity, Plan, PlanOrchestrator, ReasoningEngine, ReflectionEngine,
    Subgoal,
};
use nexus_core::{
    CapabilityError, CapabilityProvider, CapabilityRequest, CapabilityResponse, FailureKind,
    FeedbackCollector, FeedbackType, NexusError, SqliteStore, StaticCapabilityProvider,
};

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn orchestrator_with(provider: Arc<dyn CapabilityProvider>) -> PlanOrchestrator {
    init_tracing();
    let store = SqliteStore::new().expect("in-memory store");
    PlanOrchestrator::new(provider, Arc::new(store))
}

fn default_provider() -> Arc<StaticCapabilityProvider> {
    Arc::new(
        StaticCapabilityProvider::new()
            .register("web_search", &["research", "gather", "find"])
            .register("doc_writer", &["summarize", "outline", "plan", "clarify"])
            .register("task_runner", &["carry out", "verify", "execute"]),
    )
}

fn plan_of(subgoals: Vec<Subgoal>) -> Plan {
    Plan {
        id: uuid::Uuid::new_v4().to_string(),
        objective: "manufactured plan".to_string(),
        estimated_steps: subgoals.len(),
        subgoals,
        thoughts: vec![],
        reflections: vec![],
        criticisms: vec![],
        capabilities_required: vec![],
        created_at: chrono::Utc::now().timestamp(),
    }
}

fn fast_options() -> ExecutionOptions {
    ExecutionOptions {
        timeout_per_step: Duration::from_millis(500),
        retry_count: 0,
        initial_backoff: Duration::from_millis(1),
        ..ExecutionOptions::default()
    }
}

/// Counts invocations and records their order.
struct RecordingProvider {
    order: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl RecordingProvider {
    fn new() -> Self {
        Self {
            order: Mutex::new(vec![]),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CapabilityProvider for RecordingProvider {
    fn has_capability(&self, name: &str) -> bool {
        name == "recorder"
    }

    fn select_capabilities_for_task(&self, _text: &str) -> Vec<String> {
        vec!["recorder".to_string()]
    }

    async fn invoke(
        &self,
        name: &str,
        request: CapabilityRequest,
    ) -> Result<CapabilityResponse, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.order.lock().unwrap().push(request.subgoal_id.clone());
        Ok(CapabilityResponse::text(name, "recorded".to_string()))
    }
}

/// Always outlives the step timeout.
struct SlowProvider;

#[async_trait]
impl CapabilityProvider for SlowProvider {
    fn has_capability(&self, name: &str) -> bool {
        name == "slow"
    }

    fn select_capabilities_for_task(&self, _text: &str) -> Vec<String> {
        vec!["slow".to_string()]
    }

    async fn invoke(
        &self,
        name: &str,
        _request: CapabilityRequest,
    ) -> Result<CapabilityResponse, CapabilityError> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(CapabilityResponse::text(name, "too late".to_string()))
    }
}

// --- Scenario: well-formed objective plans cleanly ---

#[tokio::test]
async fn test_product_launch_objective_plans_cleanly() {
    let orchestrator = orchestrator_with(default_provider());
    let plan = orchestrator
        .create_plan("Plan a product launch")
        .await
        .expect("planning should succeed");

    assert!(plan.subgoals.len() >= 3);
    assert!(!plan.thoughts.is_empty());
    assert!(!plan.capabilities_required.is_empty());

    // Objective terms are embedded in the subgoals, so no coverage criticism.
    assert!(!plan
        .criticisms
        .iter()
        .any(|c| c.content.contains("not addressed")));
    assert!(!plan
        .criticisms
        .iter()
        .any(|c| c.severity == CriticismSeverity::High));

    // Reflections only for thoughts at or below the high-confidence gate.
    for reflection in &plan.reflections {
        assert!(plan.thoughts.iter().any(|t| t.id == reflection.thought_id));
    }

    let graph = plan.export_graph();
    for subgoal in &plan.subgoals {
        assert!(graph.contains(&format!("node subgoal {}", subgoal.id)));
    }
}

// --- Scenario: concurrent execution respects dependencies ---

#[tokio::test]
async fn test_concurrent_execution_is_topological() {
    let provider = Arc::new(RecordingProvider::new());
    let orchestrator = orchestrator_with(provider.clone());
    let plan = orchestrator
        .create_plan("Research and compare three vector databases for the search service")
        .await
        .unwrap();

    let engine = ExecutionEngine::new(provider.clone());
    let options = ExecutionOptions {
        max_concurrent_steps: 2,
        ..fast_options()
    };
    let result = engine.run(&plan, &options).await.unwrap();

    assert_eq!(result.steps_completed, plan.subgoals.len());

    let order = provider.order.lock().unwrap();
    let position = |id: &str| order.iter().position(|o| o == id).expect("step ran");
    for subgoal in &plan.subgoals {
        for dep in &subgoal.dependencies {
            assert!(
                position(dep) < position(&subgoal.id),
                "dependency must run before dependent"
            );
        }
    }
}

// --- Scenario: timeout failure is adapted and fed back ---

#[tokio::test]
async fn test_timeout_produces_adaptation_and_feedback() {
    let provider: Arc<dyn CapabilityProvider> = Arc::new(SlowProvider);
    let orchestrator = orchestrator_with(provider.clone());
    let plan = orchestrator.create_plan("Summarize the incident report").await.unwrap();

    let engine = ExecutionEngine::new(provider);
    let options = ExecutionOptions {
        timeout_per_step: Duration::from_millis(50),
        retry_count: 0,
        continue_on_error: true,
        initial_backoff: Duration::from_millis(1),
        ..ExecutionOptions::default()
    };
    let result = engine.run(&plan, &options).await.unwrap();

    assert_eq!(result.steps_completed, 0);
    assert_eq!(result.adaptations.len(), plan.subgoals.len());
    for adaptation in &result.adaptations {
        assert!(adaptation.adaptation.starts_with("Simplified the subgoal"));
    }
    for outcome in result.step_results.values() {
        match outcome {
            StepOutcome::Failure { error, adaptation } => {
                assert_eq!(FailureKind::classify(error), FailureKind::Timeout);
                assert!(adaptation.is_some());
            }
            StepOutcome::Success { .. } => panic!("expected timeout failure"),
        }
    }

    let items = FeedbackCollector::new().collect(&plan, &result);
    assert_eq!(items[0].feedback_type, FeedbackType::Error);
    assert!(items
        .iter()
        .any(|i| i.feedback_type == FeedbackType::Improvement));

    let insights = FeedbackCollector::new().extract_insights(&items);
    assert!(!insights.is_empty());
}

// --- Scenario: cyclic plans are refused outright ---

#[tokio::test]
async fn test_cyclic_plan_criticized_and_refused() {
    init_tracing();
    let mut a = Subgoal::new("Collect the upstream data needed by the report");
    let mut b = Subgoal::new("Render the report from the collected data");
    let c = Subgoal::new("Publish the rendered report to the shared drive");
    b.dependencies.push(a.id.clone());
    a.dependencies.push(b.id.clone());
    let subgoals = vec![a, b, c];

    let thoughts = ReasoningEngine::new().generate(&subgoals);
    let criticisms = CriticismEngine::new().evaluate("publish report", &subgoals, &thoughts, &[]);
    let high: Vec<_> = criticisms
        .iter()
        .filter(|c| c.severity == CriticismSeverity::High)
        .collect();
    assert_eq!(high.len(), 1);
    assert!(high[0].content.contains("circular"));

    let mut plan = plan_of(subgoals);
    plan.criticisms = criticisms;

    let provider = Arc::new(RecordingProvider::new());
    let engine = ExecutionEngine::new(provider.clone());
    let err = engine.run(&plan, &fast_options()).await.unwrap_err();
    assert!(matches!(err, NexusError::InvalidPlan(_)));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

    // Structural validation also stands alone: same refusal with the
    // criticism list stripped.
    let mut bare = plan.clone();
    bare.criticisms.clear();
    let err = engine.run(&bare, &fast_options()).await.unwrap_err();
    assert!(matches!(err, NexusError::InvalidPlan(_)));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

// --- Feedback completeness ---

#[tokio::test]
async fn test_feedback_always_has_overall_item() {
    let provider = default_provider();
    let orchestrator = orchestrator_with(provider.clone());
    let plan = orchestrator.create_plan("Organize the offsite").await.unwrap();

    let engine = ExecutionEngine::new(provider);
    let result = engine.run(&plan, &fast_options()).await.unwrap();

    let items = FeedbackCollector::new().collect(&plan, &result);
    assert!(!items.is_empty());
    assert!(items[0].metrics.is_some());
}

// --- Property tests ---

/// Forward-only dependency structure: node i may only depend on nodes < i.
fn forward_graph(deps: &[Vec<prop::sample::Index>]) -> Vec<Subgoal> {
    let mut subgoals: Vec<Subgoal> = Vec::with_capacity(deps.len());
    for (i, picks) in deps.iter().enumerate() {
        let mut sg = Subgoal::new(&format!("Structurally generated subgoal number {}", i));
        if i > 0 {
            for pick in picks {
                let dep_id = subgoals[pick.index(i)].id.clone();
                if !sg.dependencies.contains(&dep_id) {
                    sg.dependencies.push(dep_id);
                }
            }
        }
        subgoals.push(sg);
    }
    subgoals
}

proptest! {
    #[test]
    fn prop_forward_only_graphs_are_never_cycle_flagged(
        deps in prop::collection::vec(
            prop::collection::vec(any::<prop::sample::Index>(), 0..3),
            1..12,
        )
    ) {
        let subgoals = forward_graph(&deps);
        prop_assert!(nexus_core::planning::dag::find_cycle(&subgoals).is_none());
    }

    #[test]
    fn prop_injected_back_edge_is_always_flagged(
        deps in prop::collection::vec(
            prop::collection::vec(any::<prop::sample::Index>(), 0..3),
            2..12,
        ),
        from in any::<prop::sample::Index>(),
        to in any::<prop::sample::Index>(),
    ) {
        let mut subgoals = forward_graph(&deps);
        let n = subgoals.len();

        // Edge from an earlier node back to a strictly later one closes a
        // cycle with the chain of forward edges only if a path exists, so
        // instead make it unconditional: j depends on k with k > j, and k
        // depends (transitively via an added direct edge) on j.
        let j = from.index(n - 1);
        let k = j + 1 + to.index(n - 1 - j);
        let (j_id, k_id) = (subgoals[j].id.clone(), subgoals[k].id.clone());
        subgoals[j].dependencies.push(k_id);
        if !subgoals[k].dependencies.contains(&j_id) {
            subgoals[k].dependencies.push(j_id);
        }

        prop_assert!(nexus_core::planning::dag::find_cycle(&subgoals).is_some());
    }

    #[test]
    fn prop_improvement_is_monotone_and_capped(confidence in 0.0f64..1.0f64) {
        let engine = ReflectionEngine::new();
        let subgoals = vec![Subgoal::new("A subgoal used to mint a single thought")];
        let mut thoughts = ReasoningEngine::new().generate(&subgoals);
        thoughts.truncate(1);
        thoughts[0].confidence = confidence;

        let reflections = ReflectionEngine::new().process(&thoughts);
        let improved = engine.improve_thoughts(&thoughts, &reflections);

        prop_assert!(improved[0].confidence >= confidence);
        prop_assert!(improved[0].confidence <= 0.95f64.max(confidence));
    }

    #[test]
    fn prop_step_outcome_serde_round_trip(success in any::<bool>(), text in "[a-z ]{1,40}") {
        let outcome = if success {
            StepOutcome::Success { capability_results: vec![], summary: text.clone() }
        } else {
            StepOutcome::Failure { error: text.clone(), adaptation: None }
        };
        let value = serde_json::to_value(&outcome).unwrap();
        let back: StepOutcome = serde_json::from_value(value).unwrap();
        prop_assert_eq!(back.is_success(), success);
    }
}

// --- Persistence across the pipeline ---

#[tokio::test]
async fn test_plan_and_execution_are_persisted() {
    let provider = default_provider();
    let store = Arc::new(SqliteStore::new().unwrap());
    let orchestrator = PlanOrchestrator::new(provider.clone(), store.clone());
    let plan = orchestrator
        .create_plan("Gather requirements for the migration")
        .await
        .unwrap();

    let engine = ExecutionEngine::new(provider).with_store(store.clone());
    let result = engine.run(&plan, &fast_options()).await.unwrap();

    use nexus_core::DurableStore;
    let stored_plan = store.get("plans", &plan.id).await.unwrap().unwrap();
    assert_eq!(stored_plan["objective"], serde_json::json!(plan.objective));

    let stored_run = store.get("executions", &result.id).await.unwrap().unwrap();
    assert_eq!(stored_run["plan_id"], serde_json::json!(plan.id));

    let _unused: HashMap<String, StepOutcome> =
        serde_json::from_value(stored_run["step_results"].clone()).unwrap();
}
