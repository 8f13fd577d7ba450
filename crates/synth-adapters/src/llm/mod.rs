//! Completion providers used by the generation and judge steps.

mod http;

pub use http::{HttpCompletionClient, ProviderSettings};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider {provider} is not configured: set {var}")]
    MissingSetting { provider: String, var: String },
    #[error("http request failed: {0}")]
    RequestFailed(String),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("cannot parse provider response: {0}")]
    Parse(String),
}

/// A single-prompt completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub provider: String,
    pub model: String,
    pub prompt: String,
    /// Ask the provider for a JSON object answer.
    pub json: bool,
}

impl CompletionRequest {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self { provider: provider.into(),
               model: model.into(),
               prompt: prompt.into(),
               json: false }
    }

    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

/// Something that turns a prompt into text. Implementations must be usable
/// from several threads at once: executors fan calls out with rayon.
pub trait CompletionClient: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// Chat message of the OpenAI-compatible wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(),
               content: content.into() }
    }
}
