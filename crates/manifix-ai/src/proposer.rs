//! The LLM-backed template proposer
//!
//! One call per repair: build a prompt from the manifest and violations,
//! ask the model, parse the transport document. Anything that goes wrong is
//! surfaced as a [`ProposerError`] and the controller falls back to the
//! domain default template.

use crate::client::LlmClient;
use crate::config::LlmConfig;
use crate::prompt::build_repair_prompt;
use crate::{create_client, LlmError};
use async_trait::async_trait;
use manifix_core::{ProposerError, TemplateProposal, TemplateProposer, Violation};
use manifix_k8s::K8sArtifact;
use tracing::{debug, info};

/// Proposes repair templates by prompting a language model once.
pub struct LlmProposer {
    client: Box<dyn LlmClient>,
}

impl LlmProposer {
    /// Wrap an existing client
    pub fn new(client: Box<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// Create a proposer from configuration.
    ///
    /// Fails with [`LlmError::NotConfigured`] when no API key is available
    /// for the selected provider.
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: create_client(config)?,
        })
    }

    /// The model this proposer will call
    pub fn model_id(&self) -> &str {
        self.client.model_id()
    }
}

#[async_trait]
impl TemplateProposer<K8sArtifact> for LlmProposer {
    async fn propose(
        &self,
        artifact: &K8sArtifact,
        violations: &[Violation],
    ) -> Result<TemplateProposal, ProposerError> {
        let prompt = build_repair_prompt(artifact, violations);
        debug!(chars = prompt.len(), model = self.client.model_id(), "built repair prompt");

        let response = self.client.complete(&prompt).await.map_err(|e| match e {
            LlmError::NotConfigured => ProposerError::Unavailable(e.to_string()),
            LlmError::ParseError(msg) => ProposerError::Malformed(msg),
            other => ProposerError::RequestFailed(other.to_string()),
        })?;
        info!(
            model = %response.model,
            output_tokens = response.output_tokens,
            "received template proposal"
        );

        parse_proposal(&response.content)
    }
}

/// Parse the proposer transport document.
///
/// The document must carry `template` and `hole_space`; hole references use
/// the `{"$hole": "name"}` sentinel. A JSON object is extracted from
/// surrounding prose or markdown fences if the model added any.
pub(crate) fn parse_proposal(text: &str) -> Result<TemplateProposal, ProposerError> {
    let json = extract_json_object(text)
        .ok_or_else(|| ProposerError::Malformed("response contains no JSON object".to_string()))?;

    let proposal: TemplateProposal = serde_json::from_str(json)
        .map_err(|e| ProposerError::Malformed(format!("invalid transport document: {e}")))?;

    // A template hole absent from the supplied hole space is malformed and
    // triggers the default-template fallback upstream.
    proposal.validate()?;
    Ok(proposal)
}

/// The outermost `{...}` span of the text, if any.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
