//! Convenience re-exports for common use.

pub use crate::agent::{AgentResponse, AgentStreamItem, AgentThread, ChatAgent, FinalAnswer};
pub use crate::config::ShimConfig;
pub use crate::error::{Result, ShimError};
pub use crate::output::{FieldType, OutputSchema};
pub use crate::provider::{create_provider, ModelProvider};
pub use crate::session::{OutboundMessage, SessionDriver, TurnPolicy};
pub use crate::tools::{AgentTool, AgentToolParameters, Plugin, Tool, ToolArguments, ToolRegistry};
pub use crate::types::{ModelMessage, Role, TextStreamDelta, Usage};
