//! Planning pipeline
//!
//! Turns a free-form objective into an immutable, criticized Plan:
//! - Subgoal decomposition (dependency-ordered, acyclic by construction)
//! - Chain-of-thought reasoning with position-derived confidence
//! - Confidence-gated reflection and thought improvement
//! - Static criticism of the candidate plan
//! - Orchestration and persistence of the final Plan

pub mod criticism;
pub mod dag;
pub mod decomposer;
pub mod orchestrator;
pub mod reasoning;
pub mod reflection;

pub use criticism::{Criticism, CriticismEngine, CriticismSeverity, CriticismTarget};
pub use decomposer::{Subgoal, SubgoalDecomposer};
pub use orchestrator::{Plan, PlanOrchestrator};
pub use reasoning::{ReasoningEngine, Thought};
pub use reflection::{Reflection, ReflectionEngine, ReflectionType};
