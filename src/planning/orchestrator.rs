//! Plan Orchestrator
//!
//! Drives the full planning pipeline: decompose the objective, reason over the
//! subgoals, reflect and improve the thoughts, criticize the candidate, match
//! capabilities, then persist and return an immutable Plan. Nothing partial is
//! ever persisted: a failure anywhere aborts before the store is touched.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::NexusError;
use crate::planning::criticism::{Criticism, CriticismEngine};
use crate::planning::dag;
use crate::planning::decomposer::{Subgoal, SubgoalDecomposer};
use crate::planning::reasoning::{ReasoningEngine, Thought};
use crate::planning::reflection::{Reflection, ReflectionEngine};
use crate::provider::CapabilityProvider;
use crate::store::DurableStore;

/// A complete, immutable plan for one objective.
///
/// `thoughts` holds the improved set (post-reflection); criticisms were
/// evaluated against that same set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub objective: String,
    pub subgoals: Vec<Subgoal>,
    pub thoughts: Vec<Thought>,
    pub reflections: Vec<Reflection>,
    pub criticisms: Vec<Criticism>,
    /// Capability names relevant to this plan, provider-ranked
    pub capabilities_required: Vec<String>,
    pub created_at: i64,
    pub estimated_steps: usize,
}

impl Plan {
    /// Textual node/edge listing of the subgoal and thought graph, for
    /// external graph tooling.
    pub fn export_graph(&self) -> String {
        dag::export_graph(&self.subgoals, &self.thoughts)
    }

    /// Whether any criticism marks the plan as unexecutable.
    pub fn has_blocking_criticism(&self) -> bool {
        self.criticisms.iter().any(|c| c.blocks_execution())
    }
}

/// Coordinates the planning engines and the plan store.
pub struct PlanOrchestrator {
    provider: Arc<dyn CapabilityProvider>,
    store: Arc<dyn DurableStore>,
    decomposer: SubgoalDecomposer,
    reasoning: ReasoningEngine,
    reflection: ReflectionEngine,
    criticism: CriticismEngine,
}

impl PlanOrchestrator {
    pub fn new(provider: Arc<dyn CapabilityProvider>, store: Arc<dyn DurableStore>) -> Self {
        Self {
            provider,
            store,
            decomposer: SubgoalDecomposer::new(),
            reasoning: ReasoningEngine::new(),
            reflection: ReflectionEngine::new(),
            criticism: CriticismEngine::new(),
        }
    }

    /// Swap in a differently configured decomposer.
    pub fn with_decomposer(mut self, decomposer: SubgoalDecomposer) -> Self {
        self.decomposer = decomposer;
        self
    }

    /// Run the full pipeline for an objective and persist the resulting plan.
    pub async fn create_plan(&self, objective: &str) -> Result<Plan, NexusError> {
        info!("Creating plan for objective: {}", objective);

        let subgoals = self.decomposer.decompose(objective)?;
        if subgoals.is_empty() {
            return Err(NexusError::Planning(
                "decomposition produced no subgoals".to_string(),
            ));
        }

        let thoughts = self.reasoning.generate(&subgoals);
        let reflections = self.reflection.process(&thoughts);
        let thoughts = self.reflection.improve_thoughts(&thoughts, &reflections);

        // Criticisms judge the plan as it will execute, so they run against
        // the improved thought set.
        let criticisms = self
            .criticism
            .evaluate(objective, &subgoals, &thoughts, &reflections);

        let selection_text = std::iter::once(objective.to_string())
            .chain(subgoals.iter().map(|s| s.description.clone()))
            .collect::<Vec<_>>()
            .join(" ");
        let capabilities_required = self.provider.select_capabilities_for_task(&selection_text);

        let estimated_steps = subgoals.len();
        let plan = Plan {
            id: uuid::Uuid::new_v4().to_string(),
            objective: objective.trim().to_string(),
            subgoals,
            thoughts,
            reflections,
            criticisms,
            capabilities_required,
            created_at: chrono::Utc::now().timestamp(),
            estimated_steps,
        };

        let record = serde_json::to_value(&plan)?;
        self.store.put("plans", record).await?;

        debug!(
            "Plan {} created: {} subgoals, {} thoughts, {} criticisms",
            plan.id,
            plan.subgoals.len(),
            plan.thoughts.len(),
            plan.criticisms.len()
        );
        Ok(plan)
    }

    /// Load a previously persisted plan.
    pub async fn load_plan(&self, plan_id: &str) -> Result<Option<Plan>, NexusError> {
        match self.store.get("plans", plan_id).await? {
            Some(record) => Ok(Some(serde_json::from_value(record)?)),
            None => Ok(None),
        }
    }
}
