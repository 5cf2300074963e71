//! One-shot structured run.

use std::sync::Arc;

use crate::error::ShimError;
use crate::output::OutputSchema;
use crate::provider::ModelProvider;
use crate::tools::ToolRegistry;
use crate::types::Usage;

use super::agent::{AgentLimits, ChatAgent};

/// Name given to agents built by [`run`].
pub const DEFAULT_AGENT_NAME: &str = "Assistant";

/// Terminal answer of a one-shot run.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalAnswer {
    pub text: String,
    /// Present exactly when an output schema was given.
    pub structured: Option<serde_json::Map<String, serde_json::Value>>,
    pub usage: Usage,
}

/// Build an agent, send one message, return one answer.
pub async fn run(
    provider: Arc<dyn ModelProvider>,
    instructions: impl Into<String>,
    tools: impl Into<Arc<ToolRegistry>>,
    output_schema: Option<OutputSchema>,
    user_message: impl Into<String>,
) -> Result<FinalAnswer, ShimError> {
    run_with_limits(
        provider,
        instructions,
        tools,
        output_schema,
        user_message,
        AgentLimits::default(),
    )
    .await
}

/// [`run`] with explicit limits.
pub async fn run_with_limits(
    provider: Arc<dyn ModelProvider>,
    instructions: impl Into<String>,
    tools: impl Into<Arc<ToolRegistry>>,
    output_schema: Option<OutputSchema>,
    user_message: impl Into<String>,
    limits: AgentLimits,
) -> Result<FinalAnswer, ShimError> {
    let agent = ChatAgent::builder()
        .name(DEFAULT_AGENT_NAME)
        .instructions(instructions)
        .provider(provider)
        .tools(tools)
        .maybe_output_schema(output_schema)
        .limits(limits)
        .build();

    let response = agent.get_response(user_message, None).await?;
    Ok(FinalAnswer {
        text: response.text(),
        structured: response.structured,
        usage: response.usage,
    })
}
