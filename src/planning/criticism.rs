//! Criticism Engine
//!
//! Static analysis over a candidate plan: subgoal coverage, dependency
//! cycles, objective coverage, vagueness, overcomplexity, weak or
//! disconnected thoughts. Each check is independent and all of them run.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::planning::dag;
use crate::planning::decomposer::Subgoal;
use crate::planning::reasoning::Thought;
use crate::planning::reflection::Reflection;

/// Severity of a criticism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriticismSeverity {
    Low,
    Medium,
    High,
}

/// What a criticism is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum CriticismTarget {
    /// The plan as a whole
    Plan,
    Subgoal(String),
    Thought(String),
    Reflection(String),
}

/// A structural or qualitative flaw found during plan analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Criticism {
    pub id: String,
    pub target: CriticismTarget,
    pub content: String,
    pub severity: CriticismSeverity,
    pub suggested_improvement: Option<String>,
    pub created_at: i64,
}

impl Criticism {
    fn new(
        target: CriticismTarget,
        severity: CriticismSeverity,
        content: String,
        suggested_improvement: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            target,
            content,
            severity,
            suggested_improvement,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Whether this criticism marks the plan as structurally unexecutable.
    pub fn blocks_execution(&self) -> bool {
        self.severity == CriticismSeverity::High && self.content.contains("circular")
    }
}

/// Criticism thresholds.
#[derive(Debug, Clone)]
pub struct CriticismConfig {
    /// Plans with fewer subgoals than this draw a coverage criticism
    pub min_subgoals: usize,
    /// Objective words longer than this must appear in subgoal descriptions
    pub coverage_token_len: usize,
    /// Descriptions shorter than this are considered vague
    pub min_description_len: usize,
    /// Complexity above this suggests further decomposition
    pub max_complexity: u8,
    /// Thoughts below this confidence draw a criticism
    pub min_confidence: f64,
    /// Reflections on one thought at or above this count signal churn
    pub churn_threshold: usize,
}

impl Default for CriticismConfig {
    fn default() -> Self {
        Self {
            min_subgoals: 3,
            coverage_token_len: 4,
            min_description_len: 20,
            max_complexity: 8,
            min_confidence: 0.6,
            churn_threshold: 3,
        }
    }
}

/// Statically evaluates candidate plans.
#[derive(Debug, Clone, Default)]
pub struct CriticismEngine {
    config: CriticismConfig,
}

impl CriticismEngine {
    pub fn new() -> Self {
        Self::with_config(CriticismConfig::default())
    }

    pub fn with_config(config: CriticismConfig) -> Self {
        Self { config }
    }

    /// Run every check against the candidate plan parts.
    pub fn evaluate(
        &self,
        objective: &str,
        subgoals: &[Subgoal],
        thoughts: &[Thought],
        reflections: &[Reflection],
    ) -> Vec<Criticism> {
        let mut criticisms = Vec::new();

        self.check_coverage(subgoals, &mut criticisms);
        self.check_cycles(subgoals, &mut criticisms);
        self.check_dangling_dependencies(subgoals, &mut criticisms);
        self.check_objective_coverage(objective, subgoals, &mut criticisms);
        self.check_subgoal_quality(subgoals, &mut criticisms);
        self.check_thoughts(thoughts, &mut criticisms);
        self.check_reflection_churn(thoughts, reflections, &mut criticisms);

        debug!("Evaluation produced {} criticisms", criticisms.len());
        criticisms
    }

    fn check_coverage(&self, subgoals: &[Subgoal], out: &mut Vec<Criticism>) {
        if subgoals.len() < self.config.min_subgoals {
            out.push(Criticism::new(
                CriticismTarget::Plan,
                CriticismSeverity::Medium,
                format!(
                    "Plan has only {} subgoal(s); objectives usually decompose into at least {}",
                    subgoals.len(),
                    self.config.min_subgoals
                ),
                Some("Decompose the objective into more granular subgoals".to_string()),
            ));
        }
    }

    fn check_cycles(&self, subgoals: &[Subgoal], out: &mut Vec<Criticism>) {
        if let Some(cycle) = dag::find_cycle(subgoals) {
            out.push(Criticism::new(
                CriticismTarget::Plan,
                CriticismSeverity::High,
                format!(
                    "Subgoal graph contains circular dependencies: {}",
                    cycle.join(" -> ")
                ),
                Some("Remove or reverse one dependency edge along the cycle".to_string()),
            ));
        }
    }

    /// Cycle detection skips dependency ids that are not in the plan; they
    /// get flagged here instead.
    fn check_dangling_dependencies(&self, subgoals: &[Subgoal], out: &mut Vec<Criticism>) {
        let ids: HashSet<&str> = subgoals.iter().map(|s| s.id.as_str()).collect();

        for subgoal in subgoals {
            for dep in &subgoal.dependencies {
                if !ids.contains(dep.as_str()) {
                    out.push(Criticism::new(
                        CriticismTarget::Subgoal(subgoal.id.clone()),
                        CriticismSeverity::Medium,
                        format!("Dependency '{}' does not refer to any subgoal in the plan", dep),
                        Some("Remove the dependency or add the missing subgoal".to_string()),
                    ));
                }
            }
        }
    }

    fn check_objective_coverage(
        &self,
        objective: &str,
        subgoals: &[Subgoal],
        out: &mut Vec<Criticism>,
    ) {
        let combined: String = subgoals
            .iter()
            .map(|s| s.description.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        let missing: Vec<String> = objective
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > self.config.coverage_token_len)
            .filter(|w| !combined.contains(w))
            .map(str::to_string)
            .collect();

        if !missing.is_empty() {
            out.push(Criticism::new(
                CriticismTarget::Plan,
                CriticismSeverity::Medium,
                format!(
                    "Objective terms not addressed by any subgoal: {}",
                    missing.join(", ")
                ),
                Some("Add subgoals covering the missing terms or reword existing ones".to_string()),
            ));
        }
    }

    fn check_subgoal_quality(&self, subgoals: &[Subgoal], out: &mut Vec<Criticism>) {
        for subgoal in subgoals {
            let vague = subgoal.description.len() < self.config.min_description_len
                || subgoal.description.contains("etc")
                || subgoal.description.contains("...");

            if vague {
                out.push(Criticism::new(
                    CriticismTarget::Subgoal(subgoal.id.clone()),
                    CriticismSeverity::Medium,
                    format!("Subgoal description is vague: '{}'", subgoal.description),
                    Some("Replace with a concrete, self-contained description".to_string()),
                ));
            }

            if subgoal.estimated_complexity > self.config.max_complexity {
                out.push(Criticism::new(
                    CriticismTarget::Subgoal(subgoal.id.clone()),
                    CriticismSeverity::Medium,
                    format!(
                        "Subgoal complexity {} exceeds {}; it is unlikely to succeed as one step",
                        subgoal.estimated_complexity, self.config.max_complexity
                    ),
                    Some("Decompose this subgoal into smaller children".to_string()),
                ));
            }
        }
    }

    fn check_thoughts(&self, thoughts: &[Thought], out: &mut Vec<Criticism>) {
        // Generation index of each thought within its subgoal's chain.
        let mut chain_position: HashMap<&str, usize> = HashMap::new();

        for thought in thoughts {
            let position = chain_position
                .entry(thought.subgoal_id.as_str())
                .and_modify(|p| *p += 1)
                .or_insert(0);

            if thought.confidence < self.config.min_confidence {
                out.push(Criticism::new(
                    CriticismTarget::Thought(thought.id.clone()),
                    CriticismSeverity::Medium,
                    format!(
                        "Thought confidence {:.2} is below {:.2}",
                        thought.confidence, self.config.min_confidence
                    ),
                    Some("Ground this thought in an earlier one or gather more context".to_string()),
                ));
            }

            if thought.dependencies.is_empty() && *position >= 2 {
                out.push(Criticism::new(
                    CriticismTarget::Thought(thought.id.clone()),
                    CriticismSeverity::Low,
                    "Thought is disconnected: no dependencies despite appearing late in its chain"
                        .to_string(),
                    Some("Link it to the thought it builds on".to_string()),
                ));
            }
        }
    }

    fn check_reflection_churn(
        &self,
        thoughts: &[Thought],
        reflections: &[Reflection],
        out: &mut Vec<Criticism>,
    ) {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for reflection in reflections {
            *counts.entry(reflection.thought_id.as_str()).or_insert(0) += 1;
        }

        for thought in thoughts {
            let count = counts.get(thought.id.as_str()).copied().unwrap_or(0);
            if count >= self.config.churn_threshold {
                out.push(Criticism::new(
                    CriticismTarget::Thought(thought.id.clone()),
                    CriticismSeverity::Low,
                    format!(
                        "Thought attracted {} reflections; reasoning may be circling instead of converging",
                        count
                    ),
                    Some("Rewrite the thought rather than reflecting on it again".to_string()),
                ));
            }
        }
    }
}
