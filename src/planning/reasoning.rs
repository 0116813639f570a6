//! Reasoning Engine
//!
//! Walks subgoals in priority order and produces a chain of thoughts per
//! subgoal. Confidence is a pure function of chain position and subgoal
//! complexity, so the same plan always reasons the same way: grounding
//! thoughts score high, later synthesis thoughts score lower.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::planning::decomposer::Subgoal;
use crate::provider::{CompletionOptions, LanguageModelProvider, Message};

/// One step of reasoning attached to a subgoal. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thought {
    pub id: String,
    pub content: String,
    pub subgoal_id: String,
    /// Earlier thoughts this one builds on (same subgoal's chain only)
    pub dependencies: Vec<String>,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub created_at: i64,
}

impl Thought {
    fn new(subgoal_id: &str, content: String, confidence: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content,
            subgoal_id: subgoal_id.to_string(),
            dependencies: vec![],
            confidence,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Reasoning configuration
#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    /// Confidence of the first (grounding) thought in a chain
    pub base_confidence: f64,
    /// Confidence lost per chain position
    pub position_step: f64,
    /// Confidence lost per point of subgoal complexity above 1
    pub complexity_penalty: f64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            base_confidence: 0.95,
            position_step: 0.12,
            complexity_penalty: 0.01,
        }
    }
}

/// Chain templates by position. Position 0 grounds the subgoal; later
/// positions build on the previous thought.
const CHAIN_TEMPLATES: &[&str] = &[
    "Grounding: what must be true once '{desc}' is done, and what inputs does it assume?",
    "Approach: the most direct way to advance '{desc}' given its dependencies.",
    "Risks: what is most likely to go wrong while working on '{desc}'?",
    "Synthesis: combining the approach and risks into a working stance on '{desc}'.",
];

/// Produces thought chains for subgoal sets.
#[derive(Debug, Clone, Default)]
pub struct ReasoningEngine {
    config: ReasoningConfig,
}

impl ReasoningEngine {
    pub fn new() -> Self {
        Self::with_config(ReasoningConfig::default())
    }

    pub fn with_config(config: ReasoningConfig) -> Self {
        Self { config }
    }

    /// Chain length scales with subgoal complexity.
    fn chain_len(complexity: u8) -> usize {
        match complexity {
            0..=3 => 2,
            4..=7 => 3,
            _ => 4,
        }
    }

    /// Confidence for a chain position. Pure: same position and complexity
    /// always yield the same score.
    fn confidence_at(&self, position: usize, complexity: u8) -> f64 {
        let penalty = self.config.complexity_penalty * complexity.saturating_sub(1) as f64;
        (self.config.base_confidence - self.config.position_step * position as f64 - penalty)
            .clamp(0.1, 1.0)
    }

    /// Generate thought chains for the given subgoals, highest priority
    /// first (stable tie-break by input order). Thought dependencies stay
    /// within each subgoal's own chain.
    pub fn generate(&self, subgoals: &[Subgoal]) -> Vec<Thought> {
        let mut ordered: Vec<&Subgoal> = subgoals.iter().collect();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut thoughts = Vec::new();
        for subgoal in ordered {
            let len = Self::chain_len(subgoal.estimated_complexity);
            let mut previous_id: Option<String> = None;

            for position in 0..len {
                let template = CHAIN_TEMPLATES[position.min(CHAIN_TEMPLATES.len() - 1)];
                let content = template.replace("{desc}", &subgoal.description);
                let confidence = self.confidence_at(position, subgoal.estimated_complexity);

                let mut thought = Thought::new(&subgoal.id, content, confidence);
                if let Some(prev) = previous_id.take() {
                    thought.dependencies.push(prev);
                }
                previous_id = Some(thought.id.clone());
                thoughts.push(thought);
            }
        }

        debug!("Generated {} thoughts for {} subgoals", thoughts.len(), subgoals.len());
        thoughts
    }

    /// Like `generate`, but the thought content is phrased by the language
    /// model. Structure and confidence are identical to the deterministic
    /// path; a provider error falls back to the template for that thought.
    pub async fn generate_with_model(
        &self,
        subgoals: &[Subgoal],
        model: &dyn LanguageModelProvider,
    ) -> Vec<Thought> {
        let options = CompletionOptions::default();
        let mut thoughts = self.generate(subgoals);

        for thought in &mut thoughts {
            let messages = [
                Message::system("Rephrase the following reasoning step in one concise sentence."),
                Message::user(&thought.content),
            ];
            match model.complete(&messages, &options).await {
                Ok(content) if !content.trim().is_empty() => {
                    thought.content = content.trim().to_string();
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Model rephrasing failed, keeping template: {}", e);
                }
            }
        }

        thoughts
    }
}
