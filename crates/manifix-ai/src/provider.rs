//! Provider-specific LLM client implementations

use crate::client::{LlmClient, LlmResponse};
use crate::config::{LlmConfig, LlmProvider};
use crate::LlmError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Create a client for the provider selected by `config`.
pub fn create_client(config: LlmConfig) -> Result<Box<dyn LlmClient>, LlmError> {
    match config.provider() {
        LlmProvider::Anthropic => Ok(Box::new(AnthropicClient::new(config)?)),
        LlmProvider::OpenAi => Ok(Box::new(OpenAiClient::new(config)?)),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LlmError::NetworkError(e.to_string()))
}

fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(LlmError::AuthError(format!("HTTP {status}")));
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(LlmError::RateLimited {
            retry_after_secs: retry_after_secs(&response),
        });
    }
    let body = response.text().await.unwrap_or_default();
    Err(LlmError::RequestFailed(format!("HTTP {status}: {body}")))
}

// ---------------------------------------------------------------------------
// Anthropic
// ---------------------------------------------------------------------------

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    config: LlmConfig,
    api_key: String,
    model_name: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    model: String,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

impl AnthropicClient {
    /// Create a client; fails with `NotConfigured` when no key is available.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.get_api_key().ok_or(LlmError::NotConfigured)?;
        let model_name = config.model.api_name().to_string();
        Ok(Self {
            config,
            api_key,
            model_name,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<LlmResponse, LlmError> {
        let client = http_client(self.config.timeout_secs)?;
        debug!(model = %self.model_name, "sending Anthropic completion request");

        let response = client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&serde_json::json!({
                "model": self.model_name,
                "max_tokens": self.config.max_tokens,
                "temperature": self.config.temperature,
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await?;
        let response = check_status(response).await?;

        let data: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;
        let content = data
            .content
            .first()
            .map(|c| c.text.clone())
            .unwrap_or_default();
        Ok(LlmResponse {
            content,
            model: data.model,
            input_tokens: data.usage.as_ref().and_then(|u| u.input_tokens),
            output_tokens: data.usage.as_ref().and_then(|u| u.output_tokens),
            stop_reason: data.stop_reason,
        })
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn model_id(&self) -> &str {
        &self.model_name
    }
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

/// Client for the OpenAI Chat Completions API.
pub struct OpenAiClient {
    config: LlmConfig,
    api_key: String,
    model_name: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    model: String,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

impl OpenAiClient {
    /// Create a client; fails with `NotConfigured` when no key is available.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.get_api_key().ok_or(LlmError::NotConfigured)?;
        let model_name = config.model.api_name().to_string();
        Ok(Self {
            config,
            api_key,
            model_name,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<LlmResponse, LlmError> {
        let client = http_client(self.config.timeout_secs)?;
        debug!(model = %self.model_name, "sending OpenAI completion request");

        let response = client
            .post(OPENAI_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": self.model_name,
                "max_tokens": self.config.max_tokens,
                "temperature": self.config.temperature,
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await?;
        let response = check_status(response).await?;

        let data: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ParseError("response contained no choices".to_string()))?;
        Ok(LlmResponse {
            content: choice.message.content,
            model: data.model,
            input_tokens: data.usage.as_ref().and_then(|u| u.prompt_tokens),
            output_tokens: data.usage.as_ref().and_then(|u| u.completion_tokens),
            stop_reason: choice.finish_reason,
        })
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn model_id(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelId;

    #[test]
    fn clients_require_an_api_key() {
        if std::env::var("ANTHROPIC_API_KEY").is_ok() {
            return; // environment provides a key, nothing to assert
        }
        let config = LlmConfig::default();
        assert!(matches!(
            AnthropicClient::new(config),
            Err(LlmError::NotConfigured)
        ));
    }

    #[test]
    fn create_client_matches_provider() {
        let config = LlmConfig::with_model(ModelId::Gpt4o).with_api_key("sk-test");
        let client = create_client(config).unwrap();
        assert_eq!(client.model_id(), "gpt-4o");
        assert!(client.is_configured());
    }
}
