//! Azure OpenAI provider.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::ShimError;
use crate::types::TextStreamDelta;

use super::http::AuthStyle;
use super::openai::OpenAiProvider;
use super::{ModelProvider, ProviderRequest, ProviderResponse};

/// Azure OpenAI Service deployment.
#[derive(Debug)]
pub struct AzureOpenAiProvider {
    inner: OpenAiProvider,
}

impl AzureOpenAiProvider {
    /// `endpoint`: e.g. "https://myresource.openai.azure.com";
    /// `deployment`: e.g. "gpt-4o"; `api_version`: e.g. "2024-10-21".
    pub fn new(endpoint: String, deployment: String, api_key: String, api_version: String) -> Self {
        let url = chat_completions_url(&endpoint, &deployment, &api_version);
        Self {
            inner: OpenAiProvider::with_endpoint(
                "azure",
                deployment,
                api_key,
                url,
                AuthStyle::ApiKeyHeader,
            ),
        }
    }

    pub fn url(&self) -> &str {
        self.inner.url()
    }
}

fn chat_completions_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        api_version
    )
}

#[async_trait]
impl ModelProvider for AzureOpenAiProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse, ShimError> {
        self.inner.generate_text(request).await
    }

    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta, ShimError>>, ShimError> {
        self.inner.stream_text(request).await
    }
}
