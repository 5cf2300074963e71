//! Explicit tool registry and plugin grouping.
//!
//! Tools are registered by explicit calls at startup; nothing is discovered
//! by reflection. A [`Plugin`] bundles related tools under a plugin name and
//! registers each one as `<plugin>-<tool>`.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, warn};

use super::arguments::ToolArguments;
use super::tool::{Tool, ToolExecutionContext};
use super::types::{AgentToolParameters, ToolDescriptor};
use super::validation::validate_arguments;
use crate::error::ShimError;
use crate::provider::ToolDefinition;
use crate::types::{AgentToolCall, AgentToolResult};

/// Separator between plugin name and tool name.
pub const PLUGIN_SEPARATOR: char = '-';

/// A named group of tools.
pub trait Plugin: Send + Sync {
    /// Plugin name, used as the prefix of every tool it contributes.
    fn name(&self) -> &str;

    /// Tools this plugin contributes, with unqualified names.
    fn tools(&self) -> Vec<Arc<dyn Tool>>;
}

/// What the agent does when a tool call fails.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolErrorPolicy {
    /// Hand the error to the model as the tool result and keep going.
    #[default]
    ReportToModel,
    /// Fail the whole turn with the tool error.
    Abort,
}

/// Ordered set of tools, unique by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single tool under its own name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ShimError> {
        let name = tool.name().to_string();
        if name.is_empty() {
            return Err(ShimError::Configuration("tool name must not be empty".into()));
        }
        if self.index.contains_key(&name) {
            return Err(ShimError::Configuration(format!(
                "tool '{name}' is already registered"
            )));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Register every tool of a plugin as `<plugin>-<tool>`.
    pub fn register_plugin(&mut self, plugin: &dyn Plugin) -> Result<(), ShimError> {
        for tool in plugin.tools() {
            self.register(Arc::new(QualifiedTool::new(plugin.name(), tool)))?;
        }
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Result<Self, ShimError> {
        self.register(tool)?;
        Ok(self)
    }

    /// Builder form of [`register_plugin`](Self::register_plugin).
    pub fn with_plugin(mut self, plugin: &dyn Plugin) -> Result<Self, ShimError> {
        self.register_plugin(plugin)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    /// Tool definitions for a provider request, or `None` when empty.
    pub fn definitions(&self) -> Option<Vec<ToolDefinition>> {
        if self.tools.is_empty() {
            return None;
        }
        Some(
            self.tools
                .iter()
                .map(|t| ToolDefinition {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters().schema.clone(),
                })
                .collect(),
        )
    }

    /// Execute one tool call.
    ///
    /// Unknown tools and malformed arguments fail before the tool runs; a
    /// tool that errors or panics yields [`ShimError::ToolExecution`].
    pub async fn invoke(&self, call: &AgentToolCall) -> Result<serde_json::Value, ShimError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ShimError::ToolNotFound(call.name.clone()))?;

        let args = ToolArguments::parse(&call.arguments)
            .map_err(|message| ShimError::invalid_tool_arguments(&call.name, message))?;
        validate_arguments(args.raw(), &tool.parameters().schema)
            .map_err(|message| ShimError::invalid_tool_arguments(&call.name, message))?;

        let ctx = ToolExecutionContext {
            tool_call_id: Some(call.id.clone()),
            tool_name: Some(call.name.clone()),
        };

        debug!(tool = %call.name, call_id = %call.id, "dispatching tool call");
        match AssertUnwindSafe(tool.execute(&args, &ctx)).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(ShimError::InvalidArgument(message))) => {
                Err(ShimError::invalid_tool_arguments(&call.name, message))
            }
            Ok(Err(err @ ShimError::ToolExecution { .. })) => Err(err),
            Ok(Err(err)) => Err(ShimError::tool_execution(&call.name, err.to_string())),
            Err(panic) => Err(ShimError::tool_execution(
                &call.name,
                format!("tool panicked: {}", panic_message(panic.as_ref())),
            )),
        }
    }

    /// Execute a call and turn the outcome into a result for the model.
    ///
    /// Under [`ToolErrorPolicy::Abort`] a failure is returned as `Err`; under
    /// [`ToolErrorPolicy::ReportToModel`] it becomes an error result.
    pub async fn invoke_for_model(
        &self,
        call: &AgentToolCall,
        policy: ToolErrorPolicy,
    ) -> Result<AgentToolResult, ShimError> {
        match self.invoke(call).await {
            Ok(result) => Ok(AgentToolResult {
                tool_call_id: call.id.clone(),
                result,
                is_error: false,
            }),
            Err(err) => {
                warn!(tool = %call.name, error = %err, "tool call failed");
                match policy {
                    ToolErrorPolicy::Abort => Err(err),
                    ToolErrorPolicy::ReportToModel => Ok(AgentToolResult {
                        tool_call_id: call.id.clone(),
                        result: serde_json::json!({ "error": err.to_string() }),
                        is_error: true,
                    }),
                }
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Exposes a plugin's tool under its qualified name.
struct QualifiedTool {
    name: String,
    inner: Arc<dyn Tool>,
}

impl QualifiedTool {
    fn new(plugin: &str, inner: Arc<dyn Tool>) -> Self {
        Self {
            name: format!("{plugin}{PLUGIN_SEPARATOR}{}", inner.name()),
            inner,
        }
    }
}

#[async_trait]
impl Tool for QualifiedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters(&self) -> &AgentToolParameters {
        self.inner.parameters()
    }

    fn returns(&self) -> Option<&str> {
        self.inner.returns()
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, ShimError> {
        self.inner.execute(args, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::AgentTool;
    use serde_json::json;

    fn echo_tool(name: &str) -> Arc<dyn Tool> {
        Arc::new(AgentTool::new(
            name,
            "Echoes its input",
            AgentToolParameters::object()
                .string("text", "Text to echo", true)
                .build(),
            |args, _ctx| async move { Ok(json!(args.get_str("text")?)) },
        ))
    }

    struct EchoPlugin;

    impl Plugin for EchoPlugin {
        fn name(&self) -> &str {
            "Echo"
        }

        fn tools(&self) -> Vec<Arc<dyn Tool>> {
            vec![echo_tool("say"), echo_tool("shout")]
        }
    }

    fn call(name: &str, arguments: serde_json::Value) -> AgentToolCall {
        AgentToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments,
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("say")).unwrap();

        let err = registry.register(echo_tool("say")).unwrap_err();
        assert!(matches!(err, ShimError::Configuration(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn plugin_tools_are_qualified_in_order() {
        let registry = ToolRegistry::new().with_plugin(&EchoPlugin).unwrap();
        assert_eq!(registry.names(), vec!["Echo-say", "Echo-shout"]);
        assert!(registry.get("say").is_none());
    }

    #[test]
    fn definitions_are_none_when_empty() {
        assert!(ToolRegistry::new().definitions().is_none());
    }

    #[tokio::test]
    async fn invoke_runs_tool_with_string_arguments() {
        let registry = ToolRegistry::new().with_tool(echo_tool("say")).unwrap();
        let value = registry
            .invoke(&call("say", json!("{\"text\":\"hi\"}")))
            .await
            .unwrap();
        assert_eq!(value, json!("hi"));
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let err = registry.invoke(&call("missing", json!({}))).await.unwrap_err();
        assert!(matches!(err, ShimError::ToolNotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn schema_violation_is_invalid_arguments() {
        let registry = ToolRegistry::new().with_tool(echo_tool("say")).unwrap();
        let err = registry
            .invoke(&call("say", json!({ "text": 5 })))
            .await
            .unwrap_err();
        assert!(matches!(err, ShimError::InvalidToolArguments { .. }));
    }

    #[tokio::test]
    async fn panicking_tool_becomes_execution_error() {
        let panicky: Arc<dyn Tool> = Arc::new(AgentTool::new(
            "panicky",
            "Always panics",
            AgentToolParameters::empty(),
            |_args, _ctx| async move {
                if true {
                    panic!("kitchen on fire");
                }
                Ok(json!(null))
            },
        ));
        let registry = ToolRegistry::new().with_tool(panicky).unwrap();

        let err = registry.invoke(&call("panicky", json!({}))).await.unwrap_err();
        match err {
            ShimError::ToolExecution { tool_name, message } => {
                assert_eq!(tool_name, "panicky");
                assert!(message.contains("kitchen on fire"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn report_policy_turns_failure_into_error_result() {
        let registry = ToolRegistry::new();
        let result = registry
            .invoke_for_model(&call("missing", json!({})), ToolErrorPolicy::ReportToModel)
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.result["error"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn abort_policy_propagates_failure() {
        let registry = ToolRegistry::new();
        let err = registry
            .invoke_for_model(&call("missing", json!({})), ToolErrorPolicy::Abort)
            .await
            .unwrap_err();
        assert!(matches!(err, ShimError::ToolNotFound(_)));
    }
}
