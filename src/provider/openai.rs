//! OpenAI Chat Completions API provider.
//!
//! Also serves as the wire implementation for Azure OpenAI deployments, which
//! speak the same protocol behind a different URL and auth header.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ShimError;
use crate::types::*;

use super::http::{
    auth_headers, parse_sse_data, shared_client, status_to_error, take_line, AuthStyle,
};
use super::schema::normalize_schema_for_provider;
use super::{ModelProvider, ProviderRequest, ProviderResponse};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    provider_name: &'static str,
    model: String,
    api_key: String,
    url: String,
    auth: AuthStyle,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl OpenAiProvider {
    /// OpenAI (or any OpenAI-compatible server) at `base_url`.
    pub fn new(model: String, api_key: String, base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        Self::with_endpoint("openai", model, api_key, url, AuthStyle::Bearer)
    }

    /// Chat-completions wire protocol at an explicit endpoint URL.
    pub(crate) fn with_endpoint(
        provider_name: &'static str,
        model: String,
        api_key: String,
        url: String,
        auth: AuthStyle,
    ) -> Self {
        Self {
            provider_name,
            model,
            api_key,
            url,
            auth,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_request_body(&self, request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let messages = request
            .messages
            .iter()
            .map(message_to_openai)
            .collect::<Vec<_>>();

        let mut obj = serde_json::Map::new();
        obj.insert("model".into(), self.model.clone().into());
        obj.insert("messages".into(), messages.into());
        obj.insert("stream".into(), stream.into());
        if stream {
            obj.insert(
                "stream_options".into(),
                serde_json::json!({ "include_usage": true }),
            );
        }

        let settings = &request.settings;
        if let Some(max) = settings.max_tokens {
            obj.insert("max_tokens".into(), max.into());
        }
        if let Some(temp) = settings.temperature {
            obj.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = settings.top_p {
            obj.insert("top_p".into(), top_p.into());
        }
        if let Some(ref stops) = settings.stop_sequences {
            obj.insert("stop".into(), serde_json::json!(stops));
        }
        if let Some(seed) = settings.seed {
            obj.insert("seed".into(), seed.into());
        }
        if let Some(ref user) = settings.user {
            obj.insert("user".into(), user.clone().into());
        }

        if let Some(ref tools) = request.tools {
            if !tools.is_empty() {
                let tool_defs: Vec<serde_json::Value> = tools
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect();
                obj.insert("tools".into(), tool_defs.into());
            }
        }

        let format = request
            .response_format
            .as_ref()
            .or(settings.response_format.as_ref());
        match format {
            Some(ResponseFormat::JsonObject) => {
                obj.insert(
                    "response_format".into(),
                    serde_json::json!({ "type": "json_object" }),
                );
            }
            Some(ResponseFormat::JsonSchema { schema, name }) => {
                obj.insert(
                    "response_format".into(),
                    serde_json::json!({
                        "type": "json_schema",
                        "json_schema": {
                            "name": name,
                            "schema": normalize_schema_for_provider(schema, self.provider_name),
                            "strict": true,
                        }
                    }),
                );
            }
            Some(ResponseFormat::Text) | None => {}
        }

        serde_json::Value::Object(obj)
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response, ShimError> {
        let resp = shared_client()
            .post(&self.url)
            .headers(auth_headers(&self.api_key, self.auth))
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = resp.text().await.unwrap_or_default();
            warn!(provider = self.provider_name, status, "chat completions request failed");
            return Err(status_to_error(status, &body_text));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        self.provider_name
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse, ShimError> {
        let body = self.build_request_body(request, false);
        debug!(provider = self.provider_name, model = %self.model, "generate_text");

        let resp = self.post(&body).await?;
        let raw = resp.text().await?;
        let data: OpenAiChatResponse = serde_json::from_str(&raw)
            .map_err(|e| ShimError::MalformedResponse(format!("chat completion: {e}")))?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ShimError::MalformedResponse("no choices in response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| message::AgentToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::Value::String(tc.function.arguments)),
            })
            .collect();

        Ok(ProviderResponse {
            text: choice.message.content.unwrap_or_default(),
            usage: data.usage.map(Usage::from).unwrap_or_default(),
            tool_calls,
            finish_reason: choice.finish_reason.as_deref().and_then(parse_finish_reason),
        })
    }

    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta, ShimError>>, ShimError> {
        let body = self.build_request_body(request, true);
        debug!(provider = self.provider_name, model = %self.model, "stream_text");

        let resp = self.post(&body).await?;
        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            let mut finish: Option<FinishReason> = None;
            let mut usage: Option<Usage> = None;
            let mut saw_done = false;
            futures::pin_mut!(byte_stream);

            'read: while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(ShimError::Network(e));
                        return;
                    }
                };

                buffer.extend_from_slice(&chunk);

                while let Some(line) = take_line(&mut buffer) {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    };

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }
                    if is_done_marker(&line) {
                        saw_done = true;
                        break 'read;
                    }
                    let Some(data) = parse_sse_data(&line) else {
                        continue;
                    };

                    let parsed = match serde_json::from_str::<OpenAiStreamChunk>(data) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            yield Err(ShimError::MalformedResponse(format!("stream chunk: {e}")));
                            return;
                        }
                    };
                    if let Some(err) = parsed.error {
                        yield Err(ShimError::Stream(err.message));
                        return;
                    }
                    if let Some(u) = parsed.usage {
                        usage = Some(Usage::from(u));
                    }
                    for choice in parsed.choices {
                        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                            yield Ok(TextStreamDelta::text(text));
                        }
                        for tc in choice.delta.tool_calls.unwrap_or_default() {
                            let (name, arguments) = match tc.function {
                                Some(f) => (f.name, f.arguments.unwrap_or_default()),
                                None => (None, String::new()),
                            };
                            yield Ok(TextStreamDelta::tool_call(ToolCallDelta {
                                index: tc.index,
                                id: tc.id,
                                name,
                                arguments,
                            }));
                        }
                        if let Some(reason) = choice.finish_reason.as_deref() {
                            finish = parse_finish_reason(reason).or(Some(FinishReason::Stop));
                        }
                    }
                }
            }

            match finish {
                Some(reason) => yield Ok(TextStreamDelta::done(reason, usage)),
                None if saw_done => yield Ok(TextStreamDelta::done(FinishReason::Stop, usage)),
                None => yield Err(ShimError::Stream("stream ended before completion".into())),
            }
        };

        Ok(Box::pin(stream))
    }
}

fn is_done_marker(line: &str) -> bool {
    line.strip_prefix("data:").map(str::trim) == Some("[DONE]")
}

fn parse_finish_reason(s: &str) -> Option<FinishReason> {
    match s {
        "stop" => Some(FinishReason::Stop),
        "length" => Some(FinishReason::Length),
        "tool_calls" | "function_call" => Some(FinishReason::ToolCalls),
        "content_filter" => Some(FinishReason::ContentFilter),
        _ => None,
    }
}

fn message_to_openai(msg: &ModelMessage) -> serde_json::Value {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    if let Some(ContentPart::ToolResult(tr)) = msg.content.first() {
        let content = match &tr.result {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return serde_json::json!({
            "role": "tool",
            "tool_call_id": tr.tool_call_id,
            "content": content,
        });
    }

    let mut obj = serde_json::Map::new();
    obj.insert("role".into(), role.into());

    let tool_calls = msg.tool_calls();
    let text = msg.text();
    if tool_calls.is_empty() {
        obj.insert("content".into(), text.into());
    } else {
        let tc_json: Vec<serde_json::Value> = tool_calls
            .iter()
            .map(|tc| {
                serde_json::json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.name,
                        "arguments": tc.arguments.to_string(),
                    }
                })
            })
            .collect();
        let content = if text.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::Value::String(text)
        };
        obj.insert("content".into(), content);
        obj.insert("tool_calls".into(), tc_json.into());
    }

    if let Some(ref name) = msg.name {
        obj.insert("name".into(), name.clone().into());
    }
    serde_json::Value::Object(obj)
}

// Chat completions wire types (internal)

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunction,
}

#[derive(Deserialize)]
struct OpenAiFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<OpenAiUsage> for Usage {
    fn from(u: OpenAiUsage) -> Self {
        Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    usage: Option<OpenAiUsage>,
    error: Option<OpenAiErrorBody>,
}

#[derive(Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct OpenAiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiStreamToolCall {
    index: u32,
    id: Option<String>,
    function: Option<OpenAiStreamFunction>,
}

#[derive(Deserialize)]
struct OpenAiStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}
