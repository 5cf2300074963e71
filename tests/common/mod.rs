//! Shared test helpers: scripted provider and recording outbound message.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::sync::Notify;

use agent_shim::agent::{AgentLimits, ChatAgent};
use agent_shim::error::ShimError;
use agent_shim::provider::{ModelProvider, ProviderRequest, ProviderResponse};
use agent_shim::session::OutboundMessage;
use agent_shim::tools::ToolRegistry;
use agent_shim::types::*;

/// One scripted provider call.
pub enum Scripted {
    /// Answer with these fragments (joined for non-streaming calls).
    Text(Vec<String>),
    /// Request these tool calls.
    ToolCalls(Vec<AgentToolCall>),
    /// Fail before producing anything.
    Fail(u16, String),
    /// Produce fragments, then fail mid-stream.
    FailAfter(Vec<String>, String),
    /// Produce fragments, then never produce another.
    Stall(Vec<String>),
    /// Produce `before`, wait for the gate, then produce `after` and finish.
    Gated {
        before: Vec<String>,
        gate: Arc<Notify>,
        after: Vec<String>,
    },
}

/// A provider that plays back queued calls in order and records requests.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, step: Scripted) -> &Self {
        self.script.lock().unwrap().push_back(step);
        self
    }

    pub fn queue_text(&self, text: &str) -> &Self {
        self.push(Scripted::Text(vec![text.to_string()]))
    }

    pub fn queue_fragments(&self, fragments: &[&str]) -> &Self {
        self.push(Scripted::Text(strings(fragments)))
    }

    pub fn queue_tool_call(&self, id: &str, name: &str, args: serde_json::Value) -> &Self {
        self.push(Scripted::ToolCalls(vec![AgentToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: args,
        }]))
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }

    fn next(&self, request: &ProviderRequest) -> Result<Scripted, ShimError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ShimError::InvalidState("script exhausted".into()))
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn usage() -> Usage {
    Usage {
        input_tokens: 10,
        output_tokens: 20,
        total_tokens: 30,
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse, ShimError> {
        match self.next(request)? {
            Scripted::Text(fragments) => Ok(ProviderResponse {
                text: fragments.concat(),
                usage: usage(),
                tool_calls: vec![],
                finish_reason: Some(FinishReason::Stop),
            }),
            Scripted::ToolCalls(calls) => Ok(ProviderResponse {
                text: String::new(),
                usage: usage(),
                tool_calls: calls,
                finish_reason: Some(FinishReason::ToolCalls),
            }),
            Scripted::Fail(status, message) => Err(ShimError::api(status, message)),
            Scripted::FailAfter(_, message) => Err(ShimError::Stream(message)),
            Scripted::Stall(_) => futures::future::pending().await,
            Scripted::Gated { before, gate, after } => {
                gate.notified().await;
                Ok(ProviderResponse {
                    text: [before, after].concat().concat(),
                    usage: usage(),
                    tool_calls: vec![],
                    finish_reason: Some(FinishReason::Stop),
                })
            }
        }
    }

    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta, ShimError>>, ShimError> {
        let step = self.next(request)?;
        let stream = async_stream::stream! {
            match step {
                Scripted::Text(fragments) => {
                    for fragment in fragments {
                        yield Ok(TextStreamDelta::text(fragment));
                    }
                    yield Ok(TextStreamDelta::done(FinishReason::Stop, Some(usage())));
                }
                Scripted::ToolCalls(calls) => {
                    for (index, call) in calls.into_iter().enumerate() {
                        let index = index as u32;
                        let arguments = call.arguments.to_string();
                        let (head, tail) = arguments.split_at(arguments.len() / 2);
                        yield Ok(TextStreamDelta::tool_call(ToolCallDelta {
                            index,
                            id: Some(call.id),
                            name: Some(call.name),
                            arguments: head.to_string(),
                        }));
                        yield Ok(TextStreamDelta::tool_call(ToolCallDelta {
                            index,
                            id: None,
                            name: None,
                            arguments: tail.to_string(),
                        }));
                    }
                    yield Ok(TextStreamDelta::done(FinishReason::ToolCalls, Some(usage())));
                }
                Scripted::Fail(status, message) => {
                    yield Err(ShimError::api(status, message));
                }
                Scripted::FailAfter(fragments, message) => {
                    for fragment in fragments {
                        yield Ok(TextStreamDelta::text(fragment));
                    }
                    yield Err(ShimError::Stream(message));
                }
                Scripted::Stall(fragments) => {
                    for fragment in fragments {
                        yield Ok(TextStreamDelta::text(fragment));
                    }
                    futures::future::pending::<()>().await;
                }
                Scripted::Gated { before, gate, after } => {
                    for fragment in before {
                        yield Ok(TextStreamDelta::text(fragment));
                    }
                    gate.notified().await;
                    for fragment in after {
                        yield Ok(TextStreamDelta::text(fragment));
                    }
                    yield Ok(TextStreamDelta::done(FinishReason::Stop, Some(usage())));
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

/// Limits that never retry, so scripted failures surface immediately.
pub fn test_limits() -> AgentLimits {
    AgentLimits {
        retry: agent_shim::util::RetryPolicy::none(),
        ..AgentLimits::default()
    }
}

/// Agent over a scripted provider.
pub fn agent(name: &str, provider: Arc<ScriptedProvider>, tools: ToolRegistry) -> ChatAgent {
    ChatAgent::builder()
        .name(name)
        .instructions("You are a helpful assistant")
        .provider(provider)
        .tools(tools)
        .limits(test_limits())
        .build()
}

/// Outbound message that records everything the driver does to it.
#[derive(Debug, Default)]
pub struct RecordingOutbound {
    pub tokens: Vec<String>,
    pub content: String,
    pub sent: bool,
    pub failed: Option<String>,
}

#[async_trait]
impl OutboundMessage for RecordingOutbound {
    async fn stream_token(&mut self, token: &str) -> Result<(), ShimError> {
        self.tokens.push(token.to_string());
        self.content.push_str(token);
        Ok(())
    }

    async fn send(&mut self) -> Result<(), ShimError> {
        self.sent = true;
        Ok(())
    }

    async fn fail(&mut self, error: &ShimError) -> Result<(), ShimError> {
        self.failed = Some(error.to_string());
        Ok(())
    }

    fn content(&self) -> &str {
        &self.content
    }
}
