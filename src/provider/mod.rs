//! Backing model service seam and its HTTP implementations.

pub mod http;
pub mod schema;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "azure")]
pub mod azure;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::ShimConfig;
use crate::error::ShimError;
use crate::types::{
    message::AgentToolCall, FinishReason, GenerationSettings, ModelMessage, ResponseFormat,
    TextStreamDelta, Usage,
};

/// A request sent to a model provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    pub messages: Vec<ModelMessage>,
    pub settings: GenerationSettings,
    pub tools: Option<Vec<ToolDefinition>>,
    pub response_format: Option<ResponseFormat>,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Terminal (non-streaming) response from a provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub text: String,
    pub usage: Usage,
    pub tool_calls: Vec<AgentToolCall>,
    pub finish_reason: Option<FinishReason>,
}

/// The backing model service.
///
/// Implementations must be safe to share between sessions: one instance
/// serves every agent built from the same configuration.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai", "azure").
    fn provider_name(&self) -> &str;
    /// The model or deployment this provider instance serves.
    fn model_id(&self) -> &str;

    /// Generate one terminal answer.
    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse, ShimError>;

    /// Generate a stream of fragments ending in a `Done` delta.
    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta, ShimError>>, ShimError>;
}

/// Create the provider selected by `config`.
///
/// An Azure endpoint takes precedence; otherwise the OpenAI section is used.
pub fn create_provider(config: &ShimConfig) -> Result<Arc<dyn ModelProvider>, ShimError> {
    #[cfg(feature = "azure")]
    {
        if let Some(endpoint) = config.azure.endpoint.clone() {
            let api_key = config.azure.api_key.clone().ok_or_else(|| {
                ShimError::Authentication("Missing AZURE_OPENAI_API_KEY".into())
            })?;
            let deployment = config.azure.deployment.clone().ok_or_else(|| {
                ShimError::Configuration("Missing AZURE_OPENAI_CHAT_DEPLOYMENT_NAME".into())
            })?;
            return Ok(Arc::new(azure::AzureOpenAiProvider::new(
                endpoint,
                deployment,
                api_key,
                config.azure.api_version.clone(),
            )));
        }
    }
    openai_from_config(config)
}

#[cfg(feature = "openai")]
fn openai_from_config(config: &ShimConfig) -> Result<Arc<dyn ModelProvider>, ShimError> {
    let api_key = config
        .openai
        .api_key
        .clone()
        .ok_or_else(|| ShimError::Authentication("Missing OPENAI_API_KEY".into()))?;
    Ok(Arc::new(openai::OpenAiProvider::new(
        config.openai.model.clone(),
        api_key,
        config.openai.base_url.clone(),
    )))
}

#[cfg(not(feature = "openai"))]
fn openai_from_config(_config: &ShimConfig) -> Result<Arc<dyn ModelProvider>, ShimError> {
    Err(ShimError::Configuration(
        "No provider feature enabled (build with `openai` or `azure`)".into(),
    ))
}
