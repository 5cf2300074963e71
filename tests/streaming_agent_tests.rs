//! Tests for streamed agent turns.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;

use agent_shim::agent::{AgentLimits, AgentStreamItem, ChatAgent};
use agent_shim::error::ShimError;
use agent_shim::output::{FieldType, OutputSchema};
use agent_shim::tools::builtin::WeatherPlugin;
use agent_shim::tools::ToolRegistry;
use agent_shim::types::*;

use common::{agent, strings, test_limits, Scripted, ScriptedProvider};

fn weather_tools() -> ToolRegistry {
    ToolRegistry::new().with_plugin(&WeatherPlugin).unwrap()
}

async fn collect(agent: &ChatAgent, message: &str) -> Vec<Result<AgentStreamItem, ShimError>> {
    agent.invoke_stream(message, None).collect().await
}

fn fragments(items: &[Result<AgentStreamItem, ShimError>]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| match item {
            Ok(AgentStreamItem::Fragment(text)) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn fragments_arrive_in_order_then_completion() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.queue_fragments(&["The ", "price ", "is $9.99"]);
    let agent = agent("Host", provider, ToolRegistry::new());

    let items = collect(&agent, "What is the price?").await;
    assert_eq!(fragments(&items), strings(&["The ", "price ", "is $9.99"]));
    assert_eq!(items.len(), 4);

    match items.last().unwrap() {
        Ok(AgentStreamItem::Completed {
            message,
            thread,
            usage,
        }) => {
            assert_eq!(message.text(), "The price is $9.99");
            assert_eq!(message.name.as_deref(), Some("Host"));
            assert_eq!(thread.len(), 2);
            assert_eq!(thread.messages()[0].text(), "What is the price?");
            assert_eq!(usage.total_tokens, 30);
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test]
async fn streamed_tool_calls_are_dispatched() {
    let provider = Arc::new(ScriptedProvider::new());
    provider
        .queue_tool_call("call_1", "Weather-get_weather", json!({ "city": "Paris" }))
        .queue_fragments(&["It is ", "sunny in Paris."]);
    let agent = agent("Host", provider.clone(), weather_tools());

    let items = collect(&agent, "What's the weather in Paris?").await;
    assert_eq!(fragments(&items), strings(&["It is ", "sunny in Paris."]));

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    let tool_message = requests[1]
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .cloned()
        .unwrap();
    match &tool_message.content[0] {
        ContentPart::ToolResult(result) => {
            assert_eq!(result.tool_call_id, "call_1");
            assert_eq!(result.result, json!("The weather in Paris is 20°C and sunny."));
        }
        other => panic!("unexpected part {other:?}"),
    }

    match items.last().unwrap() {
        Ok(AgentStreamItem::Completed { thread, usage, .. }) => {
            // user, assistant(tool call), tool result, assistant
            assert_eq!(thread.len(), 4);
            assert_eq!(usage.total_tokens, 60);
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test]
async fn thread_continues_across_turns() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.queue_text("Hi there.").queue_text("Still here.");
    let agent = agent("Host", provider.clone(), ToolRegistry::new());

    let first = collect(&agent, "Hello").await;
    let Some(Ok(AgentStreamItem::Completed { thread, .. })) = first.last() else {
        panic!("first turn did not complete");
    };

    let second: Vec<_> = agent
        .invoke_stream("Are you there?", Some(thread.clone()))
        .collect()
        .await;
    let Some(Ok(AgentStreamItem::Completed { thread: next, .. })) = second.last() else {
        panic!("second turn did not complete");
    };
    assert_eq!(next.id(), thread.id());
    assert_eq!(next.len(), 4);

    let texts: Vec<String> = provider.requests()[1]
        .messages
        .iter()
        .map(ModelMessage::text)
        .collect();
    assert_eq!(
        texts,
        strings(&["You are a helpful assistant", "Hello", "Hi there.", "Are you there?"])
    );
}

#[tokio::test]
async fn mid_stream_failure_ends_with_one_error() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push(Scripted::FailAfter(strings(&["The ", "pri"]), "connection reset".into()));
    let agent = agent("Host", provider, ToolRegistry::new());

    let items = collect(&agent, "Price?").await;
    assert_eq!(fragments(&items), strings(&["The ", "pri"]));
    assert_eq!(items.len(), 3);
    let err = items.last().unwrap().as_ref().unwrap_err();
    assert!(matches!(err, ShimError::Stream(_)));
    assert!(err.is_backing_service_failure());
}

#[tokio::test(start_paused = true)]
async fn stalled_stream_times_out() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push(Scripted::Stall(strings(&["The "])));
    let agent = ChatAgent::builder()
        .name("Host")
        .instructions("You are a helpful assistant")
        .provider(provider)
        .limits(AgentLimits {
            fragment_timeout: Duration::from_secs(2),
            ..test_limits()
        })
        .build();

    let items = collect(&agent, "Price?").await;
    assert_eq!(fragments(&items), strings(&["The "]));
    assert!(matches!(items.last().unwrap(), Err(ShimError::Timeout(2000))));
}

#[tokio::test]
async fn open_failure_yields_no_fragments() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push(Scripted::Fail(500, "boom".into()));
    let agent = agent("Host", provider, ToolRegistry::new());

    let items = collect(&agent, "Hi").await;
    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(ShimError::Api { status: 500, .. })));
}

#[tokio::test]
async fn schema_is_checked_on_the_streamed_answer() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.queue_fragments(&["{\"price\": ", "9.99}"]);
    let agent = ChatAgent::builder()
        .name("Host")
        .instructions("You are a helpful assistant")
        .provider(provider)
        .output_schema(
            OutputSchema::new("MenuItem")
                .field("price", FieldType::Number)
                .field("name", FieldType::String),
        )
        .limits(test_limits())
        .build();

    let items = collect(&agent, "Price?").await;
    assert_eq!(fragments(&items).concat(), "{\"price\": 9.99}");
    assert!(matches!(items.last().unwrap(), Err(ShimError::SchemaViolation(_))));
}
