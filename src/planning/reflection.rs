//! Reflection Engine
//!
//! Emits self-evaluation follow-ups for thoughts, gated by confidence. The
//! clarification/extension choice is a hash of the thought id rather than a
//! random draw, so reflection output is reproducible.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::planning::reasoning::Thought;

/// Kinds of reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReflectionType {
    Verification,
    Clarification,
    Extension,
    Alternative,
    Critique,
}

impl ReflectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verification => "verification",
            Self::Clarification => "clarification",
            Self::Extension => "extension",
            Self::Alternative => "alternative",
            Self::Critique => "critique",
        }
    }
}

/// A self-generated follow-up evaluating one thought.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reflection {
    pub id: String,
    pub thought_id: String,
    pub content: String,
    pub reflection_type: ReflectionType,
    pub priority: u8,
    pub created_at: i64,
}

impl Reflection {
    fn new(thought: &Thought, reflection_type: ReflectionType, priority: u8, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thought_id: thought.id.clone(),
            content,
            reflection_type,
            priority,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Reflection thresholds and improvement policy.
#[derive(Debug, Clone)]
pub struct ReflectionConfig {
    /// Above this confidence a thought needs no reflection
    pub high_confidence: f64,
    /// Below this confidence a thought gets the verification + alternative pair
    pub low_confidence: f64,
    /// Confidence added to a thought that received at least one reflection
    pub improvement_boost: f64,
    /// Hard ceiling for improved confidence
    pub confidence_cap: f64,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            high_confidence: 0.9,
            low_confidence: 0.7,
            improvement_boost: 0.1,
            confidence_cap: 0.95,
        }
    }
}

/// Produces reflections and improved thought sets.
#[derive(Debug, Clone, Default)]
pub struct ReflectionEngine {
    config: ReflectionConfig,
}

impl ReflectionEngine {
    pub fn new() -> Self {
        Self::with_config(ReflectionConfig::default())
    }

    pub fn with_config(config: ReflectionConfig) -> Self {
        Self { config }
    }

    /// Deterministic clarification/extension pick: SHA-256 of the thought id,
    /// first byte parity.
    fn mid_band_choice(thought: &Thought) -> ReflectionType {
        let digest = Sha256::digest(thought.id.as_bytes());
        if digest[0] % 2 == 0 {
            ReflectionType::Clarification
        } else {
            ReflectionType::Extension
        }
    }

    /// Apply the confidence rule table to every thought.
    pub fn process(&self, thoughts: &[Thought]) -> Vec<Reflection> {
        let mut reflections = Vec::new();

        for thought in thoughts {
            if thought.confidence > self.config.high_confidence {
                continue;
            }

            if thought.confidence < self.config.low_confidence {
                reflections.push(Reflection::new(
                    thought,
                    ReflectionType::Verification,
                    9,
                    format!("Verify the claim before relying on it: {}", thought.content),
                ));
                reflections.push(Reflection::new(
                    thought,
                    ReflectionType::Alternative,
                    8,
                    format!("Propose an alternative line of reasoning to: {}", thought.content),
                ));
                continue;
            }

            let (reflection_type, priority, content) = match Self::mid_band_choice(thought) {
                ReflectionType::Clarification => (
                    ReflectionType::Clarification,
                    7,
                    format!("Clarify the ambiguous parts of: {}", thought.content),
                ),
                _ => (
                    ReflectionType::Extension,
                    6,
                    format!("Extend this reasoning one step further: {}", thought.content),
                ),
            };
            reflections.push(Reflection::new(thought, reflection_type, priority, content));
        }

        debug!("Emitted {} reflections for {} thoughts", reflections.len(), thoughts.len());
        reflections
    }

    /// Return a new thought set where thoughts with at least one reflection
    /// have their confidence boosted, capped, and never decreased. Originals
    /// are untouched.
    pub fn improve_thoughts(&self, thoughts: &[Thought], reflections: &[Reflection]) -> Vec<Thought> {
        thoughts
            .iter()
            .map(|thought| {
                let mut improved = thought.clone();
                let reflected = reflections.iter().any(|r| r.thought_id == thought.id);
                if reflected {
                    let boosted = (thought.confidence + self.config.improvement_boost)
                        .min(self.config.confidence_cap);
                    improved.confidence = boosted.max(thought.confidence);
                }
                improved
            })
            .collect()
    }
}
