//! LLM client trait and response types

use crate::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Response from an LLM completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated text
    pub content: String,
    /// Model that generated the response
    pub model: String,
    /// Input tokens used
    pub input_tokens: Option<u32>,
    /// Output tokens generated
    pub output_tokens: Option<u32>,
    /// Stop reason (if available)
    pub stop_reason: Option<String>,
}

/// Trait for LLM clients
///
/// This trait provides a unified interface for different LLM providers.
/// Implementations handle provider-specific API details.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete a single prompt
    async fn complete(&self, prompt: &str) -> Result<LlmResponse, LlmError>;

    /// Check if the client is configured and ready
    fn is_configured(&self) -> bool;

    /// Get the model ID being used
    fn model_id(&self) -> &str;
}
