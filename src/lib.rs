//! Nexus Core
//!
//! Goal decomposition and plan execution for autonomous agents.
//!
//! # Features
//!
//! - **Subgoal Decomposition**: objective → dependency-ordered subgoal DAG
//! - **Chain-of-Thought Reasoning**: per-subgoal thought chains with
//!   position-derived confidence
//! - **Reflection**: confidence-gated self-evaluation and thought improvement
//! - **Criticism**: static plan analysis (coverage, cycles, vagueness)
//! - **Execution**: concurrent dependency-ordered runs with timeout, retry
//!   and failure adaptation
//! - **Feedback**: structured post-run feedback and failure-pattern mining
//!
//! # Architecture
//!
//! ```text
//! Objective ──► Decomposer ──► Reasoning ──► Reflection ──► Criticism
//!                                  │
//!                            PlanOrchestrator ──► Plan (immutable)
//!                                  │
//!                           ExecutionEngine ──► ExecutionResult
//!                                  │
//!                          FeedbackCollector ──► FeedbackItems
//! ```
//!
//! External effects go through three traits: `CapabilityProvider` (tools),
//! `LanguageModelProvider` (text oracle) and `DurableStore` (persistence).

pub mod config;
pub mod error;
pub mod execution;
pub mod planning;
pub mod provider;
pub mod store;

pub use config::CoreConfig;
pub use error::{CapabilityError, FailureKind, NexusError};
pub use execution::{
    ExecutionEngine, ExecutionOptions, ExecutionResult, FeedbackCollector, FeedbackItem,
    FeedbackSeverity, FeedbackType, StepOutcome,
};
pub use planning::{
    Criticism, CriticismEngine, CriticismSeverity, Plan, PlanOrchestrator, ReasoningEngine,
    Reflection, ReflectionEngine, Subgoal, SubgoalDecomposer, Thought,
};
pub use provider::{
    CapabilityProvider, CapabilityRequest, CapabilityResponse, LanguageModelProvider,
    StaticCapabilityProvider,
};
pub use store::{DurableStore, SqliteStore};
