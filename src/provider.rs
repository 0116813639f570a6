//! External collaborator contracts.
//!
//! The planning and execution core never talks to the outside world directly;
//! it goes through two traits:
//! - `CapabilityProvider`: invocable tools/actions selected per task
//! - `LanguageModelProvider`: opaque text-generation oracle
//!
//! Both are object-safe so callers can hand in `Arc<dyn ...>` adapters around
//! whatever SDK they use.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::CapabilityError;

/// Request passed to a capability invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityRequest {
    /// Subgoal this invocation serves
    pub subgoal_id: String,
    /// What the capability should accomplish
    pub description: String,
    /// Free-form parameters, provider-defined
    pub params: Value,
}

impl CapabilityRequest {
    pub fn new(subgoal_id: &str, description: &str) -> Self {
        Self {
            subgoal_id: subgoal_id.to_string(),
            description: description.to_string(),
            params: Value::Object(Default::default()),
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// Response from a capability invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityResponse {
    /// Capability that produced this response
    pub capability: String,
    /// Human-readable result content
    pub content: String,
    /// Structured result data, if any
    pub data: Option<Value>,
}

impl CapabilityResponse {
    pub fn text(capability: &str, content: String) -> Self {
        Self {
            capability: capability.to_string(),
            content,
            data: None,
        }
    }
}

/// Contract for the external tool/action provider.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Whether a capability with this name is registered and invocable.
    fn has_capability(&self, name: &str) -> bool;

    /// Rank/select capability names relevant to a task description.
    /// Selection strategy is the provider's concern; an empty result is a
    /// valid answer, not an error.
    fn select_capabilities_for_task(&self, text: &str) -> Vec<String>;

    /// Invoke one capability.
    async fn invoke(
        &self,
        name: &str,
        request: CapabilityRequest,
    ) -> Result<CapabilityResponse, CapabilityError>;
}

/// Chat role for language model messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: &str) -> Self {
        Self { role: Role::System, content: content.to_string() }
    }

    pub fn user(content: &str) -> Self {
        Self { role: Role::User, content: content.to_string() }
    }
}

/// Options for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: usize,
    pub stop: Option<Vec<String>>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 512,
            stop: None,
        }
    }
}

/// Contract for the external language model. The core treats its output as an
/// opaque oracle; nothing downstream depends on what it says, only that it
/// says something.
#[async_trait]
pub trait LanguageModelProvider: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> anyhow::Result<String>;

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// In-process capability provider that selects by keyword match.
///
/// Mainly a reference implementation and a test double; real deployments wrap
/// their tool runtime in the trait instead.
#[derive(Debug, Default, Clone)]
pub struct StaticCapabilityProvider {
    /// capability name -> lowercase trigger keywords (BTreeMap keeps selection
    /// order stable)
    capabilities: BTreeMap<String, Vec<String>>,
}

impl StaticCapabilityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability with the keywords that trigger its selection.
    pub fn register(mut self, name: &str, keywords: &[&str]) -> Self {
        self.capabilities.insert(
            name.to_string(),
            keywords.iter().map(|k| k.to_lowercase()).collect(),
        );
        self
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

#[async_trait]
impl CapabilityProvider for StaticCapabilityProvider {
    fn has_capability(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    fn select_capabilities_for_task(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        self.capabilities
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k.as_str())))
            .map(|(name, _)| name.clone())
            .collect()
    }

    async fn invoke(
        &self,
        name: &str,
        request: CapabilityRequest,
    ) -> Result<CapabilityResponse, CapabilityError> {
        if !self.has_capability(name) {
            return Err(CapabilityError::new(
                name,
                crate::error::FailureKind::NotFound,
                "capability is not registered",
            ));
        }

        Ok(CapabilityResponse::text(
            name,
            format!("executed '{}' for: {}", name, request.description),
        ))
    }
}
