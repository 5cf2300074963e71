//! The agent: backing service, instructions, tools and optional output schema.

use std::sync::Arc;
use std::time::Duration;

use bon::Builder;

use crate::config::{RuntimeSettings, ShimConfig};
use crate::error::ShimError;
use crate::output::OutputSchema;
use crate::provider::{self, ModelProvider, ProviderRequest};
use crate::tools::{ToolErrorPolicy, ToolRegistry};
use crate::types::*;
use crate::util::RetryPolicy;

use super::thread::AgentThread;

/// Bounds applied to every turn an agent runs.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentLimits {
    /// Deadline for one non-streaming provider call.
    pub request_timeout: Duration,
    /// Longest wait for the next streamed fragment.
    pub fragment_timeout: Duration,
    pub max_tool_iterations: usize,
    pub tool_error_policy: ToolErrorPolicy,
    pub retry: RetryPolicy,
}

impl Default for AgentLimits {
    fn default() -> Self {
        Self::from(&RuntimeSettings::default())
    }
}

impl From<&RuntimeSettings> for AgentLimits {
    fn from(runtime: &RuntimeSettings) -> Self {
        Self {
            request_timeout: runtime.request_timeout(),
            fragment_timeout: runtime.fragment_timeout(),
            max_tool_iterations: runtime.max_tool_iterations.max(1),
            tool_error_policy: runtime.tool_error_policy,
            retry: RetryPolicy::with_max_attempts(runtime.retry_max_attempts),
        }
    }
}

/// A chat agent bound to one backing service.
///
/// Agents are immutable once built and cheap to clone; conversation state
/// lives in [`AgentThread`] values passed in and out of each turn.
///
/// ```rust,no_run
/// use agent_shim::agent::ChatAgent;
/// use agent_shim::config::ShimConfig;
/// use agent_shim::tools::{builtin::WeatherPlugin, ToolRegistry};
///
/// # fn build() -> agent_shim::error::Result<ChatAgent> {
/// let agent = ChatAgent::from_config(&ShimConfig::from_env()?)?
///     .name("Host")
///     .instructions("You are a helpful assistant.")
///     .tools(ToolRegistry::new().with_plugin(&WeatherPlugin)?)
///     .build();
/// # Ok(agent)
/// # }
/// ```
#[derive(Clone, Builder)]
pub struct ChatAgent {
    #[builder(into)]
    name: String,
    #[builder(into)]
    instructions: String,
    provider: Arc<dyn ModelProvider>,
    #[builder(into, default)]
    tools: Arc<ToolRegistry>,
    output_schema: Option<OutputSchema>,
    #[builder(default)]
    settings: GenerationSettings,
    #[builder(default)]
    limits: AgentLimits,
}

impl ChatAgent {
    /// Builder with the provider and limits taken from `config`.
    pub fn from_config(
        config: &ShimConfig,
    ) -> Result<ChatAgentBuilder<chat_agent_builder::SetLimits<chat_agent_builder::SetProvider>>, ShimError>
    {
        let provider = provider::create_provider(config)?;
        Ok(Self::builder()
            .provider(provider)
            .limits(AgentLimits::from(&config.runtime)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn output_schema(&self) -> Option<&OutputSchema> {
        self.output_schema.as_ref()
    }

    pub fn limits(&self) -> &AgentLimits {
        &self.limits
    }

    /// Instructions, prior dialogue, then the new user message.
    pub(crate) fn request_messages(
        &self,
        thread: Option<&AgentThread>,
        user: &ModelMessage,
    ) -> Vec<ModelMessage> {
        let history = thread.map(AgentThread::messages).unwrap_or_default();
        let mut messages = Vec::with_capacity(history.len() + 2);
        if !self.instructions.is_empty() {
            messages.push(ModelMessage::system(self.instructions.clone()));
        }
        messages.extend(history.iter().cloned());
        messages.push(user.clone());
        messages
    }

    pub(crate) fn provider_request(&self, messages: &[ModelMessage]) -> ProviderRequest {
        ProviderRequest {
            messages: messages.to_vec(),
            settings: self.settings.clone(),
            tools: self.tools.definitions(),
            response_format: self
                .output_schema
                .as_ref()
                .map(OutputSchema::response_format)
                .or_else(|| self.settings.response_format.clone()),
        }
    }
}

impl std::fmt::Debug for ChatAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatAgent")
            .field("name", &self.name)
            .field("provider", &self.provider.provider_name())
            .field("model", &self.provider.model_id())
            .field("tools", &self.tools.names())
            .field("output_schema", &self.output_schema.as_ref().map(OutputSchema::name))
            .finish()
    }
}
