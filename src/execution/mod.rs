//! Plan execution
//!
//! Concurrent, dependency-ordered execution of plans plus feedback mining
//! over the results.

pub mod engine;
pub mod feedback;

pub use engine::{
    Adaptation, CapabilityResult, ExecutionEngine, ExecutionOptions, ExecutionResult, StepOutcome,
};
pub use feedback::{
    FeedbackCollector, FeedbackItem, FeedbackSeverity, FeedbackSource, FeedbackType,
};
