//! LLM configuration types

use serde::{Deserialize, Serialize};

/// LLM provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LlmProvider {
    /// Anthropic Claude models
    #[default]
    Anthropic,
    /// OpenAI GPT models
    OpenAi,
}

/// Model identifier for each provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ModelId {
    /// Claude 3.5 Sonnet (default for Anthropic)
    #[default]
    Claude35Sonnet,
    /// Claude 3.5 Haiku (fastest)
    Claude35Haiku,

    /// GPT-4o (default for OpenAI)
    Gpt4o,
    /// GPT-4o mini
    Gpt4oMini,

    /// Custom model ID string
    Custom(String),
}

impl ModelId {
    /// Get the API model string for this model
    pub fn api_name(&self) -> &str {
        match self {
            ModelId::Claude35Sonnet => "claude-3-5-sonnet-20241022",
            ModelId::Claude35Haiku => "claude-3-5-haiku-20241022",
            ModelId::Gpt4o => "gpt-4o",
            ModelId::Gpt4oMini => "gpt-4o-mini",
            ModelId::Custom(s) => s,
        }
    }

    /// Get the provider for this model
    pub fn provider(&self) -> LlmProvider {
        match self {
            ModelId::Claude35Sonnet | ModelId::Claude35Haiku => LlmProvider::Anthropic,
            ModelId::Gpt4o | ModelId::Gpt4oMini => LlmProvider::OpenAi,
            ModelId::Custom(s) if s.starts_with("claude") => LlmProvider::Anthropic,
            ModelId::Custom(_) => LlmProvider::OpenAi,
        }
    }

    /// Parse a model name, mapping unknown names to `Custom`
    pub fn parse(s: &str) -> Self {
        match s {
            "claude-3-5-sonnet-20241022" => ModelId::Claude35Sonnet,
            "claude-3-5-haiku-20241022" => ModelId::Claude35Haiku,
            "gpt-4o" => ModelId::Gpt4o,
            "gpt-4o-mini" => ModelId::Gpt4oMini,
            other => ModelId::Custom(other.to_string()),
        }
    }
}

/// LLM client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key (or will be read from environment)
    pub api_key: Option<String>,
    /// Model to use
    pub model: ModelId,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature (0.0 - 1.0)
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: ModelId::default(),
            max_tokens: 4096,
            // Low temperature: template synthesis wants stable output
            temperature: 0.1,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// Create a new config with the given model
    pub fn with_model(model: ModelId) -> Self {
        Self {
            model,
            ..Default::default()
        }
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Get the provider for this config
    pub fn provider(&self) -> LlmProvider {
        self.model.provider()
    }

    /// Get API key from config or environment
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| match self.provider() {
            LlmProvider::Anthropic => std::env::var("ANTHROPIC_API_KEY").ok(),
            LlmProvider::OpenAi => std::env::var("OPENAI_API_KEY").ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn models_map_to_their_provider() {
        assert_eq!(ModelId::Claude35Sonnet.provider(), LlmProvider::Anthropic);
        assert_eq!(ModelId::Gpt4oMini.provider(), LlmProvider::OpenAi);
        assert_eq!(
            ModelId::Custom("claude-next".to_string()).provider(),
            LlmProvider::Anthropic
        );
        assert_eq!(
            ModelId::Custom("o3-mini".to_string()).provider(),
            LlmProvider::OpenAi
        );
    }

    #[test]
    fn parse_round_trips_known_names() {
        for model in [ModelId::Claude35Sonnet, ModelId::Gpt4o] {
            assert_eq!(ModelId::parse(model.api_name()), model);
        }
        assert_eq!(
            ModelId::parse("gpt-5"),
            ModelId::Custom("gpt-5".to_string())
        );
    }

    #[test]
    fn explicit_key_takes_priority() {
        let config = LlmConfig::default().with_api_key("sk-test");
        assert_eq!(config.get_api_key().as_deref(), Some("sk-test"));
    }
}
