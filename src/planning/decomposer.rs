//! Subgoal Decomposition
//!
//! Turns a free-form objective into a dependency-ordered set of subgoals.
//! Dependencies only ever point at earlier subgoals, so the produced graph is
//! acyclic by construction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::NexusError;

/// One decomposed unit of work contributing to an objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subgoal {
    /// Unique subgoal ID
    pub id: String,
    /// What this subgoal accomplishes
    pub description: String,
    /// Urgency (1-10, higher = more urgent)
    pub priority: u8,
    /// Owning subgoal when produced by refinement (non-owning back-reference)
    pub parent_goal_id: Option<String>,
    /// Estimated complexity (1-10)
    pub estimated_complexity: u8,
    /// Ids of subgoals that must complete first
    pub dependencies: Vec<String>,
    /// Free-form annotations
    pub metadata: HashMap<String, String>,
}

impl Subgoal {
    /// Create a new subgoal
    pub fn new(description: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.to_string(),
            priority: 5,
            parent_goal_id: None,
            estimated_complexity: 5,
            dependencies: vec![],
            metadata: HashMap::new(),
        }
    }

    /// Set priority (clamped to 1-10)
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 10);
        self
    }

    /// Set estimated complexity (clamped to 1-10)
    pub fn with_complexity(mut self, complexity: u8) -> Self {
        self.estimated_complexity = complexity.clamp(1, 10);
        self
    }

    /// Add a dependency on another subgoal
    pub fn depends_on(mut self, subgoal_id: &str) -> Self {
        if subgoal_id != self.id {
            self.dependencies.push(subgoal_id.to_string());
        }
        self
    }

    /// Annotate with a metadata entry
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Decomposer configuration
#[derive(Debug, Clone)]
pub struct DecomposerConfig {
    /// Maximum subgoals produced per objective
    pub max_subgoals: usize,
    /// Priority assigned to the first phase; later phases count down from here
    pub base_priority: u8,
}

impl Default for DecomposerConfig {
    fn default() -> Self {
        Self {
            max_subgoals: 6,
            base_priority: 10,
        }
    }
}

/// Hints that an objective needs an information-gathering phase
const RESEARCH_HINTS: &[&str] = &["research", "find", "investigate", "learn", "gather", "compare"];

/// Hints that an objective benefits from an explicit outlining phase
const DESIGN_HINTS: &[&str] = &["plan", "build", "create", "design", "launch", "implement", "organize"];

/// Decomposes objectives into subgoal graphs.
#[derive(Debug, Clone, Default)]
pub struct SubgoalDecomposer {
    config: DecomposerConfig,
}

impl SubgoalDecomposer {
    pub fn new() -> Self {
        Self::with_config(DecomposerConfig::default())
    }

    pub fn with_config(config: DecomposerConfig) -> Self {
        Self { config }
    }

    /// Decompose an objective into a dependency-ordered subgoal set.
    ///
    /// Fails with `NexusError::Decomposition` when the objective is empty.
    pub fn decompose(&self, objective: &str) -> Result<Vec<Subgoal>, NexusError> {
        let objective = objective.trim();
        if objective.is_empty() {
            return Err(NexusError::Decomposition("objective is empty".to_string()));
        }

        let lower = objective.to_lowercase();
        let word_count = objective.split_whitespace().count();
        let base = ((word_count / 4) + 3).clamp(2, 9) as u8;

        // Phase list: (tag, description, complexity). Descriptions embed the
        // objective so coverage checks can match its terms.
        let mut phases: Vec<(&str, String, u8)> = Vec::new();

        phases.push((
            "clarify",
            format!("Clarify the intended outcome and constraints of: {}", objective),
            base.saturating_sub(1).max(1),
        ));

        if RESEARCH_HINTS.iter().any(|h| lower.contains(h)) {
            phases.push((
                "gather",
                format!("Gather the background information needed for: {}", objective),
                base,
            ));
        }

        if word_count > 12 || DESIGN_HINTS.iter().any(|h| lower.contains(h)) {
            phases.push((
                "outline",
                format!("Outline the approach and ordering for: {}", objective),
                base,
            ));
        }

        let core_index = phases.len();
        phases.push((
            "execute",
            format!("Carry out the core work required by: {}", objective),
            (base + 1).min(10),
        ));
        phases.push((
            "verify",
            format!("Verify the results against the original objective: {}", objective),
            base,
        ));
        phases.push((
            "summarize",
            format!("Summarize outcomes and open risks for: {}", objective),
            base.saturating_sub(1).max(1),
        ));

        phases.truncate(self.config.max_subgoals);

        let mut subgoals: Vec<Subgoal> = Vec::with_capacity(phases.len());
        for (i, (tag, description, complexity)) in phases.into_iter().enumerate() {
            let priority = self.config.base_priority.saturating_sub(i as u8).max(1);
            let mut subgoal = Subgoal::new(&description)
                .with_priority(priority)
                .with_complexity(complexity)
                .with_metadata("phase", tag);

            // Chain on the previous phase; only backward references exist.
            if i > 0 {
                subgoal = subgoal.depends_on(&subgoals[i - 1].id);
            }
            subgoals.push(subgoal);
        }

        // The summary phase also waits on the core work directly, giving the
        // graph a join node rather than a bare chain.
        if let Some(last) = subgoals.len().checked_sub(1) {
            if core_index < last && last > core_index + 1 {
                let core_id = subgoals[core_index].id.clone();
                let tail = &mut subgoals[last];
                if !tail.dependencies.contains(&core_id) {
                    tail.dependencies.push(core_id);
                }
            }
        }

        debug!("Decomposed objective into {} subgoals", subgoals.len());
        Ok(subgoals)
    }

    /// Refine one subgoal into finer-grained children, reparented under the
    /// original subgoal's id. Children only depend on each other.
    pub fn decompose_further(&self, subgoal: &Subgoal) -> Vec<Subgoal> {
        let child_complexity = subgoal.estimated_complexity.saturating_sub(2).max(1);

        let templates = [
            format!("Prepare the inputs and preconditions for: {}", subgoal.description),
            format!("Do the central work of: {}", subgoal.description),
            format!("Check the result of: {}", subgoal.description),
        ];

        let mut children: Vec<Subgoal> = Vec::with_capacity(templates.len());
        for (i, description) in templates.into_iter().enumerate() {
            let mut child = Subgoal::new(&description)
                .with_priority(subgoal.priority)
                .with_complexity(child_complexity)
                .with_metadata("refined_from", &subgoal.id);
            child.parent_goal_id = Some(subgoal.id.clone());

            if i > 0 {
                child = child.depends_on(&children[i - 1].id);
            }
            children.push(child);
        }

        children
    }
}
