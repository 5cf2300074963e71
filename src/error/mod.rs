//! Error types for agent-shim.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all agent-shim operations.
#[derive(Error, Debug)]
pub enum ShimError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Malformed response from backing service: {0}")]
    MalformedResponse(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid arguments for tool {tool_name}: {message}")]
    InvalidToolArguments { tool_name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Tool loop exceeded {0} iterations")]
    ToolLoopLimit(usize),

    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("Session {session_id} already has a turn in flight")]
    ConcurrentTurn { session_id: String },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already active: {0}")]
    SessionExists(String),

    #[error("Turn canceled")]
    Canceled,

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ShimError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool_execution(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-arguments error for a tool call.
    pub fn invalid_tool_arguments(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidToolArguments {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) | Self::ConfigFile(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::Stream(_) | Self::MalformedResponse(_) => ErrorCategory::Server,
            Self::ToolNotFound(_) | Self::InvalidToolArguments { .. } => {
                ErrorCategory::ToolArguments
            }
            Self::ToolExecution { .. } | Self::ToolLoopLimit(_) => ErrorCategory::ToolExecution,
            Self::SchemaViolation(_) => ErrorCategory::Schema,
            Self::ConcurrentTurn { .. } | Self::SessionNotFound(_) | Self::SessionExists(_) => {
                ErrorCategory::Session
            }
            Self::Canceled => ErrorCategory::Canceled,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error came from the backing model service (outage,
    /// timeout, malformed reply) rather than from tools, schemas or sessions.
    pub fn is_backing_service_failure(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Authentication
                | ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
                | ErrorCategory::Api
        )
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Network(_) | Self::Timeout(_)
        ) || matches!(self, Self::Api { status, .. } if (500..=599).contains(status))
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Network => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Server => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::ToolExecution | ErrorCategory::ToolArguments => {
                RecoverySuggestion::CheckToolImplementation
            }
            ErrorCategory::Schema => RecoverySuggestion::RephraseRequest,
            ErrorCategory::Session => RecoverySuggestion::WaitForTurn,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ShimError>;
