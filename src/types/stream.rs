//! Streaming types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ShimError;

use super::generation::FinishReason;
use super::message::AgentToolCall;
use super::usage::Usage;

/// A delta emitted by a provider during streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextStreamDelta {
    /// The incremental text chunk.
    pub text: String,
    /// Event type.
    pub event_type: StreamEventType,
    /// Partial tool call (only on `ToolCallDelta` events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallDelta>,
    /// Finish reason (only on the final delta).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Usage (typically only on the final delta).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl TextStreamDelta {
    /// A plain text fragment.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            event_type: StreamEventType::TextDelta,
            tool_call: None,
            finish_reason: None,
            usage: None,
        }
    }

    /// A piece of a tool call being assembled.
    pub fn tool_call(delta: ToolCallDelta) -> Self {
        Self {
            text: String::new(),
            event_type: StreamEventType::ToolCallDelta,
            tool_call: Some(delta),
            finish_reason: None,
            usage: None,
        }
    }

    /// The terminal delta of a stream.
    pub fn done(finish_reason: FinishReason, usage: Option<Usage>) -> Self {
        Self {
            text: String::new(),
            event_type: StreamEventType::Done,
            tool_call: None,
            finish_reason: Some(finish_reason),
            usage,
        }
    }
}

/// Type of stream event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventType {
    /// Incremental text content.
    TextDelta,
    /// Tool call being built.
    ToolCallDelta,
    /// Stream finished.
    Done,
    /// Error during stream.
    Error,
}

/// One slice of a streamed tool call.
///
/// Providers send the id and name on the first slice for a given `index` and
/// argument text in later slices; consumers concatenate `arguments` per index.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolCallDelta {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: String,
}

/// Assemble streamed tool-call slices into complete calls, ordered by index.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    calls: BTreeMap<u32, (String, String, String)>,
}

impl ToolCallAssembler {
    pub fn push(&mut self, delta: &ToolCallDelta) {
        let entry = self.calls.entry(delta.index).or_default();
        if let Some(ref id) = delta.id {
            entry.0.clone_from(id);
        }
        if let Some(ref name) = delta.name {
            entry.1.push_str(name);
        }
        entry.2.push_str(&delta.arguments);
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Finish assembly. Argument text that is not JSON is passed through as a
    /// string so tool dispatch can report it as invalid arguments.
    pub fn finish(self) -> Result<Vec<AgentToolCall>, ShimError> {
        self.calls
            .into_values()
            .map(|(id, name, arguments)| {
                if name.is_empty() {
                    return Err(ShimError::MalformedResponse(
                        "streamed tool call without a name".into(),
                    ));
                }
                let arguments = if arguments.trim().is_empty() {
                    serde_json::Value::Object(Default::default())
                } else {
                    serde_json::from_str(&arguments)
                        .unwrap_or(serde_json::Value::String(arguments))
                };
                Ok(AgentToolCall {
                    id,
                    name,
                    arguments,
                })
            })
            .collect()
    }
}
