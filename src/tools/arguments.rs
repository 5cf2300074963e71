//! Typed access to tool call arguments.

use crate::error::ShimError;

/// Wrapper around tool call arguments providing typed extraction.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Parse raw arguments as sent by a provider.
    ///
    /// Providers deliver arguments either as a JSON object or as a string
    /// holding one; an empty string means "no arguments".
    pub fn parse(raw: &serde_json::Value) -> Result<Self, String> {
        match raw {
            serde_json::Value::String(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(Self::new(serde_json::json!({})));
                }
                serde_json::from_str::<serde_json::Value>(trimmed)
                    .map(Self::new)
                    .map_err(|e| format!("arguments are not valid JSON: {e}"))
            }
            serde_json::Value::Null => Ok(Self::new(serde_json::json!({}))),
            other => Ok(Self::new(other.clone())),
        }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, ShimError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ShimError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get an integer argument.
    pub fn get_i64(&self, key: &str) -> Result<i64, ShimError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ShimError::InvalidArgument(format!("Missing integer argument: {key}")))
    }

    /// Get a float argument.
    pub fn get_f64(&self, key: &str) -> Result<f64, ShimError> {
        self.value
            .get(key)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| ShimError::InvalidArgument(format!("Missing float argument: {key}")))
    }

    /// Get a boolean argument.
    pub fn get_bool(&self, key: &str) -> Result<bool, ShimError> {
        self.value
            .get(key)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| ShimError::InvalidArgument(format!("Missing boolean argument: {key}")))
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, ShimError> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            ShimError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}
