//! Configuration system (layered: code > env > config file > defaults).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ShimError;
use crate::session::TurnPolicy;
use crate::tools::ToolErrorPolicy;

/// Default OpenAI chat model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
/// Default Azure OpenAI REST API version.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";

/// Layered configuration for agent-shim.
///
/// Resolution order (later wins):
/// 1. Built-in defaults
/// 2. TOML file (`~/.agent-shim/config.toml` unless a path is given)
/// 3. Environment variables (a `.env` file is loaded first if present)
/// 4. Whatever the caller sets on the returned value
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    pub openai: OpenAiSettings,
    pub azure: AzureSettings,
    pub runtime: RuntimeSettings,
}

/// OpenAI (or OpenAI-compatible) backing service.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: DEFAULT_OPENAI_MODEL.to_string(),
        }
    }
}

/// Azure OpenAI deployment. Selected whenever `endpoint` is set.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureSettings {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub deployment: Option<String>,
    pub api_version: String,
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            deployment: None,
            api_version: DEFAULT_AZURE_API_VERSION.to_string(),
        }
    }
}

/// Timeouts, tool-loop bounds and session policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Deadline for a whole non-streaming request.
    pub request_timeout_ms: u64,
    /// Longest gap allowed between two streamed fragments.
    pub fragment_timeout_ms: u64,
    pub max_tool_iterations: usize,
    pub turn_policy: TurnPolicy,
    pub tool_error_policy: ToolErrorPolicy,
    pub retry_max_attempts: u32,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 120_000,
            fragment_timeout_ms: 60_000,
            max_tool_iterations: 20,
            turn_policy: TurnPolicy::Reject,
            tool_error_policy: ToolErrorPolicy::ReportToModel,
            retry_max_attempts: 3,
        }
    }
}

impl RuntimeSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn fragment_timeout(&self) -> Duration {
        Duration::from_millis(self.fragment_timeout_ms)
    }
}

fn redact(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "[redacted]")
}

impl fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl fmt::Debug for AzureSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureSettings")
            .field("api_key", &redact(&self.api_key))
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl fmt::Debug for ShimConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShimConfig")
            .field("openai", &self.openai)
            .field("azure", &self.azure)
            .field("runtime", &self.runtime)
            .finish()
    }
}

impl ShimConfig {
    /// Load defaults, the default config file (if present), `.env` and the
    /// process environment.
    pub fn load() -> Result<Self, ShimError> {
        match Self::default_path().filter(|p| p.is_file()) {
            Some(path) => Self::load_from(&path),
            None => Self::from_env(),
        }
    }

    /// Like [`load`](Self::load) with an explicit config file.
    pub fn load_from(path: &Path) -> Result<Self, ShimError> {
        let mut config = Self::from_file(path)?;
        let _ = dotenvy::dotenv();
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults plus environment, no config file.
    pub fn from_env() -> Result<Self, ShimError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Parse a TOML config file. Missing sections and keys take defaults.
    pub fn from_file(path: &Path) -> Result<Self, ShimError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ShimError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(toml::from_str(&raw)?)
    }

    /// `~/.agent-shim/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        directories::UserDirs::new().map(|dirs| dirs.home_dir().join(".agent-shim/config.toml"))
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ShimError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`; empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ShimError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai.api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.openai.base_url = Some(v);
        }
        if let Some(v) = get("OPENAI_CHAT_MODEL_ID") {
            self.openai.model = v;
        }

        if let Some(v) = get("AZURE_OPENAI_API_KEY") {
            self.azure.api_key = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_ENDPOINT") {
            self.azure.endpoint = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_CHAT_DEPLOYMENT_NAME") {
            self.azure.deployment = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_API_VERSION") {
            self.azure.api_version = v;
        }

        let runtime = &mut self.runtime;
        if let Some(v) = get("AGENT_SHIM_REQUEST_TIMEOUT_MS") {
            runtime.request_timeout_ms = parse_env("AGENT_SHIM_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("AGENT_SHIM_FRAGMENT_TIMEOUT_MS") {
            runtime.fragment_timeout_ms = parse_env("AGENT_SHIM_FRAGMENT_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("AGENT_SHIM_MAX_TOOL_ITERATIONS") {
            runtime.max_tool_iterations = parse_env("AGENT_SHIM_MAX_TOOL_ITERATIONS", &v)?;
        }
        if let Some(v) = get("AGENT_SHIM_TURN_POLICY") {
            runtime.turn_policy = parse_env("AGENT_SHIM_TURN_POLICY", &v)?;
        }
        Ok(())
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, ShimError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ShimError::Configuration(format!("{key}={value:?}: {e}")))
}
