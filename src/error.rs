//! Error taxonomy for planning and execution.
//!
//! Planning errors (`Decomposition`, `Planning`, `InvalidPlan`) abort the
//! operation that raised them. Capability failures are caught inside the
//! execution engine, classified, and recorded as step outcomes; they only
//! surface as `Capability` values from provider implementations.

use serde::{Deserialize, Serialize};

/// Classification of a capability failure, used to pick an adaptation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Step or capability exceeded its time budget
    Timeout,
    /// Access was denied
    Permission,
    /// A required resource does not exist
    NotFound,
    /// Anything else
    Generic,
}

impl FailureKind {
    /// Classify an error from its message.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("timeout") || lower.contains("timed out") || lower.contains("deadline") {
            Self::Timeout
        } else if lower.contains("permission") || lower.contains("denied") || lower.contains("forbidden") {
            Self::Permission
        } else if lower.contains("not found") || lower.contains("missing") || lower.contains("no such") {
            Self::NotFound
        } else {
            Self::Generic
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Permission => "permission",
            Self::NotFound => "not-found",
            Self::Generic => "generic",
        }
    }

    /// Fixed adaptation applied when a step fails with this kind.
    pub fn adaptation(&self) -> &'static str {
        match self {
            Self::Timeout => "Simplified the subgoal scope to fit within the step time budget",
            Self::Permission => "Switched to an alternate method that does not require the denied access",
            Self::NotFound => "Switched to an alternate source for the missing resource",
            Self::Generic => "Adjusted the execution approach after an unclassified failure",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a capability provider.
#[derive(Debug, Clone, thiserror::Error)]
#[error("capability '{capability}' failed ({kind}): {message}")]
pub struct CapabilityError {
    pub capability: String,
    pub kind: FailureKind,
    pub message: String,
}

impl CapabilityError {
    /// Build an error, classifying the kind from the message.
    pub fn classified(capability: &str, message: &str) -> Self {
        Self {
            capability: capability.to_string(),
            kind: FailureKind::classify(message),
            message: message.to_string(),
        }
    }

    pub fn new(capability: &str, kind: FailureKind, message: &str) -> Self {
        Self {
            capability: capability.to_string(),
            kind,
            message: message.to_string(),
        }
    }
}

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum NexusError {
    /// Objective was empty or otherwise unusable
    #[error("decomposition failed: {0}")]
    Decomposition(String),

    /// Decomposition produced nothing to plan with
    #[error("planning failed: {0}")]
    Planning(String),

    /// Plan fails structural validation (cycle in the subgoal graph)
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// Wrapped capability provider failure
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Terminal failure of a subgoal after exhausting retries
    #[error("subgoal '{subgoal_id}' failed after {attempts} attempts: {message}")]
    Execution {
        subgoal_id: String,
        attempts: usize,
        message: String,
    },

    /// Durable store failure
    #[error("store operation failed: {0}")]
    Store(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
