//! Execution Engine
//!
//! Runs a plan's subgoals in dependency order with bounded concurrency.
//! Each step gets a per-attempt timeout and a retry budget with exponential
//! backoff; terminal failures are classified into an adaptation record.
//! Step failures never surface as errors from `run`: the caller always gets
//! an `ExecutionResult`, partial if scheduling was halted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::{CapabilityError, FailureKind, NexusError};
use crate::planning::dag;
use crate::planning::decomposer::Subgoal;
use crate::planning::orchestrator::Plan;
use crate::provider::{CapabilityProvider, CapabilityRequest};
use crate::store::DurableStore;

/// Knobs for one execution run. Only the retry count is a guarantee; the
/// backoff fields shape timing between attempts.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Upper bound on concurrently running steps
    pub max_concurrent_steps: usize,
    /// Time budget per attempt
    pub timeout_per_step: Duration,
    /// Re-attempts after the first failure (total attempts = retry_count + 1)
    pub retry_count: usize,
    /// Keep scheduling subgoals after a step fails terminally
    pub continue_on_error: bool,
    /// Delay before the first re-attempt
    pub initial_backoff: Duration,
    /// Backoff growth factor between re-attempts
    pub backoff_multiplier: f64,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_concurrent_steps: 1,
            timeout_per_step: Duration::from_secs(30),
            retry_count: 1,
            continue_on_error: false,
            initial_backoff: Duration::from_millis(200),
            backoff_multiplier: 2.0,
        }
    }
}

/// Result of one capability invocation within a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub capability: String,
    pub content: String,
    pub data: Option<serde_json::Value>,
}

/// Terminal outcome of one subgoal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StepOutcome {
    Success {
        capability_results: Vec<CapabilityResult>,
        summary: String,
    },
    Failure {
        error: String,
        adaptation: Option<String>,
    },
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Record of a strategy change made in response to a step failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adaptation {
    /// Subgoal id the adaptation applies to
    pub step: String,
    /// The failure that triggered it
    pub reason: String,
    /// What was changed
    pub adaptation: String,
}

/// Outcome of a whole run. Partial when scheduling was halted early.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub id: String,
    pub plan_id: String,
    /// Subgoals that reached `Success`
    pub steps_completed: usize,
    /// Terminal outcome per subgoal that ran
    pub step_results: HashMap<String, StepOutcome>,
    pub adaptations: Vec<Adaptation>,
    pub started_at: i64,
    pub finished_at: i64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl StepState {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Runs plans against a capability provider.
pub struct ExecutionEngine {
    provider: Arc<dyn CapabilityProvider>,
    store: Option<Arc<dyn DurableStore>>,
}

impl ExecutionEngine {
    pub fn new(provider: Arc<dyn CapabilityProvider>) -> Self {
        Self {
            provider,
            store: None,
        }
    }

    /// Persist every `ExecutionResult` to the `executions` collection.
    pub fn with_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Execute a plan. Rejects plans whose subgoal graph is cyclic or that
    /// carry a blocking criticism, before any subgoal starts.
    pub async fn run(
        &self,
        plan: &Plan,
        options: &ExecutionOptions,
    ) -> Result<ExecutionResult, NexusError> {
        if plan.has_blocking_criticism() {
            return Err(NexusError::InvalidPlan(
                "plan carries a blocking criticism".to_string(),
            ));
        }
        if let Some(cycle) = dag::find_cycle(&plan.subgoals) {
            return Err(NexusError::InvalidPlan(format!(
                "subgoal dependency cycle: {}",
                cycle.join(" -> ")
            )));
        }

        info!(
            "Executing plan {} ({} subgoals, {} concurrent)",
            plan.id,
            plan.subgoals.len(),
            options.max_concurrent_steps.max(1)
        );
        let started_at = chrono::Utc::now().timestamp();
        let clock = std::time::Instant::now();

        let mut states: HashMap<String, StepState> = plan
            .subgoals
            .iter()
            .map(|s| (s.id.clone(), StepState::Pending))
            .collect();
        let mut step_results: HashMap<String, StepOutcome> = HashMap::new();
        let mut adaptations: Vec<Adaptation> = Vec::new();
        let mut tasks: JoinSet<(String, StepOutcome, Option<Adaptation>)> = JoinSet::new();
        let mut halted = false;

        loop {
            if !halted {
                while tasks.len() < options.max_concurrent_steps.max(1) {
                    let Some(subgoal) =
                        Self::next_eligible(plan, &states, options.continue_on_error)
                    else {
                        break;
                    };
                    states.insert(subgoal.id.clone(), StepState::Running);
                    debug!("Starting subgoal {}", subgoal.id);

                    let provider = Arc::clone(&self.provider);
                    let subgoal = subgoal.clone();
                    let options = options.clone();
                    tasks.spawn(async move { Self::run_step(provider, subgoal, options).await });
                }
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let (subgoal_id, outcome, adaptation) =
                joined.map_err(|e| NexusError::Execution {
                    subgoal_id: "<task>".to_string(),
                    attempts: 0,
                    message: e.to_string(),
                })?;

            match &outcome {
                StepOutcome::Success { .. } => {
                    states.insert(subgoal_id.clone(), StepState::Succeeded);
                }
                StepOutcome::Failure { error, .. } => {
                    states.insert(subgoal_id.clone(), StepState::Failed);
                    warn!("Subgoal {} failed: {}", subgoal_id, error);
                    if !options.continue_on_error {
                        halted = true;
                    }
                }
            }
            if let Some(adaptation) = adaptation {
                adaptations.push(adaptation);
            }
            step_results.insert(subgoal_id, outcome);
        }

        let steps_completed = step_results.values().filter(|o| o.is_success()).count();
        let finished_at = chrono::Utc::now().timestamp();
        let result = ExecutionResult {
            id: uuid::Uuid::new_v4().to_string(),
            plan_id: plan.id.clone(),
            steps_completed,
            step_results,
            adaptations,
            started_at,
            finished_at,
            duration_ms: clock.elapsed().as_millis() as u64,
        };

        if let Some(store) = &self.store {
            let record = serde_json::to_value(&result)?;
            store.put("executions", record).await?;
        }

        info!(
            "Plan {} finished: {}/{} subgoals completed, {} adaptation(s)",
            plan.id,
            result.steps_completed,
            plan.subgoals.len(),
            result.adaptations.len()
        );
        Ok(result)
    }

    /// First pending subgoal whose dependencies are all satisfied. Under
    /// `continue_on_error` a failed dependency still unblocks its dependents;
    /// otherwise only `Succeeded` counts. Dependencies on ids outside the
    /// plan are ignored.
    fn next_eligible<'a>(
        plan: &'a Plan,
        states: &HashMap<String, StepState>,
        continue_on_error: bool,
    ) -> Option<&'a Subgoal> {
        plan.subgoals.iter().find(|subgoal| {
            if states.get(&subgoal.id) != Some(&StepState::Pending) {
                return false;
            }
            subgoal.dependencies.iter().all(|dep| {
                match states.get(dep) {
                    Some(state) if continue_on_error => state.is_terminal(),
                    Some(state) => *state == StepState::Succeeded,
                    None => true,
                }
            })
        })
    }

    async fn run_step(
        provider: Arc<dyn CapabilityProvider>,
        subgoal: Subgoal,
        options: ExecutionOptions,
    ) -> (String, StepOutcome, Option<Adaptation>) {
        let attempts = options.retry_count + 1;
        let mut backoff = options.initial_backoff;
        let mut last_error: Option<(String, FailureKind)> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                sleep(backoff).await;
                backoff = backoff.mul_f64(options.backoff_multiplier);
                debug!(
                    "Retrying subgoal {} (attempt {}/{})",
                    subgoal.id,
                    attempt + 1,
                    attempts
                );
            }

            match timeout(
                options.timeout_per_step,
                Self::attempt(provider.as_ref(), &subgoal),
            )
            .await
            {
                Ok(Ok(outcome)) => return (subgoal.id.clone(), outcome, None),
                Ok(Err(err)) => {
                    last_error = Some((err.to_string(), err.kind));
                }
                Err(_) => {
                    last_error = Some((
                        format!(
                            "step timed out after {} ms",
                            options.timeout_per_step.as_millis()
                        ),
                        FailureKind::Timeout,
                    ));
                }
            }
        }

        let (message, kind) = last_error
            .unwrap_or_else(|| ("no attempt was made".to_string(), FailureKind::Generic));
        let adaptation = Adaptation {
            step: subgoal.id.clone(),
            reason: message.clone(),
            adaptation: kind.adaptation().to_string(),
        };
        let outcome = StepOutcome::Failure {
            error: message,
            adaptation: Some(kind.adaptation().to_string()),
        };
        (subgoal.id.clone(), outcome, Some(adaptation))
    }

    /// One attempt at a subgoal: select capabilities for its description and
    /// invoke each. A subgoal matching no capability succeeds as a no-op.
    async fn attempt(
        provider: &dyn CapabilityProvider,
        subgoal: &Subgoal,
    ) -> Result<StepOutcome, CapabilityError> {
        let selected: Vec<String> = provider
            .select_capabilities_for_task(&subgoal.description)
            .into_iter()
            .filter(|name| provider.has_capability(name))
            .collect();

        if selected.is_empty() {
            return Ok(StepOutcome::Success {
                capability_results: vec![],
                summary: format!(
                    "No capability matched '{}'; completed as a no-op",
                    subgoal.description
                ),
            });
        }

        let mut capability_results = Vec::with_capacity(selected.len());
        for name in &selected {
            let request = CapabilityRequest::new(&subgoal.id, &subgoal.description);
            let response = provider.invoke(name, request).await?;
            capability_results.push(CapabilityResult {
                capability: response.capability,
                content: response.content,
                data: response.data,
            });
        }

        let summary = format!(
            "Completed via {} capability invocation(s): {}",
            capability_results.len(),
            selected.join(", ")
        );
        Ok(StepOutcome::Success {
            capability_results,
            summary,
        })
    }
}
