// Crate-level lint configuration for pedantic clippy
#![allow(clippy::must_use_candidate)] // Builder methods and getters don't need must_use
#![allow(clippy::missing_const_for_fn)] // const fn optimization is minor
#![allow(clippy::doc_markdown)] // Missing backticks - low priority
#![allow(clippy::missing_errors_doc)] // Error docs are implementation details
#![allow(clippy::uninlined_format_args)] // Named args in format strings are clearer
#![allow(clippy::module_name_repetitions)] // proposer::LlmProposer is clear

//! LLM template proposer for the Manifix repair engine
//!
//! When the repair bank misses, the controller may ask a language model to
//! propose a patch template and hole space for the observed violations.
//! This crate provides:
//!
//! - a provider-agnostic [`LlmClient`] trait with Anthropic and OpenAI
//!   implementations over HTTP
//! - [`LlmConfig`] for model and key selection (keys come from config or
//!   the `ANTHROPIC_API_KEY`/`OPENAI_API_KEY` environment variables)
//! - [`LlmProposer`], the [`manifix_core::TemplateProposer`] implementation
//!   that prompts the model once and parses the transport document
//!
//! The proposer is strictly one-shot and best-effort: any failure — network,
//! authentication, or a malformed response — surfaces as a
//! [`manifix_core::ProposerError`] and the controller falls back to the
//! domain default template.

mod client;
mod config;
mod proposer;
mod prompt;
mod provider;

pub use client::{LlmClient, LlmResponse};
pub use config::{LlmConfig, LlmProvider, ModelId};
pub use proposer::LlmProposer;
pub use provider::{create_client, AnthropicClient, OpenAiClient};

/// Error type for LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Invalid API key or authentication failure
    #[error("authentication failed: {0}")]
    AuthError(String),

    /// Rate limit exceeded
    #[error("rate limit exceeded, retry after {retry_after_secs:?}s")]
    RateLimited {
        /// Seconds to wait before retrying, if the server said
        retry_after_secs: Option<u64>,
    },

    /// Response parsing error
    #[error("failed to parse response: {0}")]
    ParseError(String),

    /// Network error
    #[error("network error: {0}")]
    NetworkError(String),

    /// No API key available for the selected provider
    #[error("LLM provider not configured. Set ANTHROPIC_API_KEY or OPENAI_API_KEY")]
    NotConfigured,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::NetworkError(err.to_string())
    }
}
