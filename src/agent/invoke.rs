//! Non-streaming turns with the tool loop.

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::ShimError;
use crate::types::*;
use crate::util::with_timeout;

use super::agent::ChatAgent;
use super::thread::AgentThread;

/// Result of one completed turn.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The final assistant message.
    pub content: ModelMessage,
    /// Thread to pass into the next turn.
    pub thread: AgentThread,
    /// Usage summed over every provider call of the turn.
    pub usage: Usage,
    /// Coerced object, when the agent has an output schema.
    pub structured: Option<serde_json::Map<String, serde_json::Value>>,
}

impl AgentResponse {
    pub fn text(&self) -> String {
        self.content.text()
    }
}

impl ChatAgent {
    /// Send one user message and wait for the terminal answer.
    ///
    /// Tool calls requested by the model are dispatched internally and their
    /// results folded back into the conversation until the model answers
    /// without tools. With an output schema the answer is coerced, and a
    /// reply that does not fit fails with [`ShimError::SchemaViolation`].
    pub async fn get_response(
        &self,
        message: impl Into<String>,
        thread: Option<&AgentThread>,
    ) -> Result<AgentResponse, ShimError> {
        let user = ModelMessage::user(message);
        let mut messages = self.request_messages(thread, &user);
        let mut turn = vec![user];
        let mut usage = Usage::default();
        let limits = self.limits();

        for iteration in 0..limits.max_tool_iterations {
            let request = self.provider_request(&messages);
            debug!(agent = %self.name(), iteration, "get_response: calling provider");
            let response = limits
                .retry
                .execute(|| {
                    with_timeout(limits.request_timeout, self.provider().generate_text(&request))
                })
                .await?;
            usage.merge(&response.usage);

            if response.tool_calls.is_empty() {
                let content = ModelMessage::assistant(response.text).with_name(self.name());
                let structured = match self.output_schema() {
                    Some(schema) => Some(schema.coerce(&content.text())?),
                    None => None,
                };
                turn.push(content.clone());
                let thread = thread.cloned().unwrap_or_default().extended(turn);
                info!(agent = %self.name(), iterations = iteration + 1, "turn completed");
                return Ok(AgentResponse {
                    content,
                    thread,
                    usage,
                    structured,
                });
            }

            let assistant = ModelMessage::assistant_tool_calls(response.text, &response.tool_calls)
                .with_name(self.name());
            messages.push(assistant.clone());
            turn.push(assistant);

            for call in &response.tool_calls {
                let result = self
                    .tools()
                    .invoke_for_model(call, limits.tool_error_policy)
                    .await?;
                let message =
                    ModelMessage::tool_result(result.tool_call_id, result.result, result.is_error);
                messages.push(message.clone());
                turn.push(message);
            }
        }

        Err(ShimError::ToolLoopLimit(limits.max_tool_iterations))
    }

    /// Like [`get_response`](Self::get_response), deserializing the coerced
    /// answer into `T`. Requires an output schema.
    pub async fn get_response_as<T: DeserializeOwned>(
        &self,
        message: impl Into<String>,
        thread: Option<&AgentThread>,
    ) -> Result<(T, AgentResponse), ShimError> {
        if self.output_schema().is_none() {
            return Err(ShimError::InvalidState(format!(
                "agent '{}' has no output schema",
                self.name()
            )));
        }
        let response = self.get_response(message, thread).await?;
        let object = response.structured.clone().unwrap_or_default();
        let value = serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| ShimError::SchemaViolation(format!("answer does not fit the target type: {e}")))?;
        Ok((value, response))
    }
}
