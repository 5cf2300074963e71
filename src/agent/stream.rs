//! Streaming turns.

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::error::ShimError;
use crate::types::*;
use crate::util::with_timeout;

use super::agent::ChatAgent;
use super::thread::AgentThread;

/// One item of a streamed turn.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentStreamItem {
    /// Incremental assistant text, in production order.
    Fragment(String),
    /// Terminal item carrying the updated thread.
    Completed {
        message: ModelMessage,
        thread: AgentThread,
        usage: Usage,
    },
}

impl ChatAgent {
    /// Stream the reply to one user message.
    ///
    /// The stream yields [`AgentStreamItem::Fragment`]s as the backing
    /// service produces them and ends with exactly one
    /// [`AgentStreamItem::Completed`], or with one error. Tool calls are
    /// assembled from the stream, dispatched, and the conversation resumed
    /// in a new provider call. A gap longer than the fragment timeout ends
    /// the stream with [`ShimError::Timeout`]. Dropping the stream abandons
    /// the in-flight call.
    pub fn invoke_stream(
        &self,
        message: impl Into<String>,
        thread: Option<AgentThread>,
    ) -> BoxStream<'static, Result<AgentStreamItem, ShimError>> {
        let agent = self.clone();
        let user = ModelMessage::user(message);
        let base = thread.unwrap_or_default();

        let stream = async_stream::stream! {
            let limits = agent.limits().clone();
            let fragment_ms = limits.fragment_timeout.as_millis() as u64;
            let mut messages = agent.request_messages(Some(&base), &user);
            let mut turn = vec![user.clone()];
            let mut usage = Usage::default();

            for iteration in 0..limits.max_tool_iterations {
                let request = agent.provider_request(&messages);
                debug!(agent = %agent.name(), iteration, "invoke_stream: opening provider stream");

                // Retries only cover opening the stream; nothing has been
                // forwarded yet at this point.
                let opened = limits
                    .retry
                    .execute(|| {
                        with_timeout(limits.fragment_timeout, agent.provider().stream_text(&request))
                    })
                    .await;
                let mut deltas = match opened {
                    Ok(deltas) => deltas,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                let mut text = String::new();
                let mut assembler = ToolCallAssembler::default();
                let mut finished = false;

                loop {
                    let next = match tokio::time::timeout(limits.fragment_timeout, deltas.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            warn!(agent = %agent.name(), timeout_ms = fragment_ms, "no fragment within timeout");
                            yield Err(ShimError::Timeout(fragment_ms));
                            return;
                        }
                    };
                    let delta = match next {
                        Some(Ok(delta)) => delta,
                        Some(Err(e)) => {
                            yield Err(e);
                            return;
                        }
                        None => break,
                    };
                    match delta.event_type {
                        StreamEventType::TextDelta => {
                            if !delta.text.is_empty() {
                                text.push_str(&delta.text);
                                yield Ok(AgentStreamItem::Fragment(delta.text));
                            }
                        }
                        StreamEventType::ToolCallDelta => {
                            if let Some(ref call) = delta.tool_call {
                                assembler.push(call);
                            }
                        }
                        StreamEventType::Done => {
                            if let Some(ref u) = delta.usage {
                                usage.merge(u);
                            }
                            finished = true;
                            break;
                        }
                        StreamEventType::Error => {
                            yield Err(ShimError::Stream(delta.text));
                            return;
                        }
                    }
                }

                if !finished {
                    yield Err(ShimError::Stream("stream ended before completion".into()));
                    return;
                }

                if assembler.is_empty() {
                    if let Some(schema) = agent.output_schema() {
                        if let Err(e) = schema.coerce(&text) {
                            yield Err(e);
                            return;
                        }
                    }
                    let message = ModelMessage::assistant(text).with_name(agent.name());
                    turn.push(message.clone());
                    let thread = base.extended(turn);
                    yield Ok(AgentStreamItem::Completed { message, thread, usage });
                    return;
                }

                let calls = match assembler.finish() {
                    Ok(calls) => calls,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                let assistant = ModelMessage::assistant_tool_calls(text, &calls).with_name(agent.name());
                messages.push(assistant.clone());
                turn.push(assistant);

                for call in &calls {
                    let result = match agent.tools().invoke_for_model(call, limits.tool_error_policy).await {
                        Ok(result) => result,
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    };
                    let message = ModelMessage::tool_result(result.tool_call_id, result.result, result.is_error);
                    messages.push(message.clone());
                    turn.push(message);
                }
            }

            yield Err(ShimError::ToolLoopLimit(limits.max_tool_iterations));
        };

        Box::pin(stream)
    }
}
