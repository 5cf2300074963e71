//! Structured output: declared field schemas and coercion of model answers.
//!
//! An [`OutputSchema`] is a flat `{field → primitive type}` contract. Every
//! field is required and no other fields are allowed. The agent sends it to
//! the backing service as a strict JSON schema response format and then runs
//! the reply through [`OutputSchema::coerce`]; anything that cannot be
//! coerced is a [`ShimError::SchemaViolation`], never a partial object.

mod coerce;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ShimError;
use crate::types::ResponseFormat;

pub use coerce::strip_code_fences;

/// Primitive type of an output field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
}

/// Declared shape of a structured answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    name: String,
    fields: Vec<(String, FieldType)>,
}

impl OutputSchema {
    /// Start an empty schema; `name` is reported to the provider.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Declare a field. Redeclaring a name replaces its type.
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = field_type,
            None => self.fields.push((name, field_type)),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[(String, FieldType)] {
        &self.fields
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }

    /// JSON Schema form: all fields required, no additional properties.
    pub fn to_json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        for (name, field_type) in &self.fields {
            properties.insert(name.clone(), serde_json::json!({ "type": field_type.to_string() }));
        }
        let required: Vec<&str> = self.fields.iter().map(|(n, _)| n.as_str()).collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Response format requesting this schema from the provider.
    pub fn response_format(&self) -> ResponseFormat {
        ResponseFormat::JsonSchema {
            schema: self.to_json_schema(),
            name: self.name.clone(),
        }
    }

    /// Coerce a raw model reply into an object matching this schema.
    pub fn coerce(&self, text: &str) -> Result<serde_json::Map<String, serde_json::Value>, ShimError> {
        let body = strip_code_fences(text);
        let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            ShimError::SchemaViolation(format!("{} reply is not valid JSON: {e}", self.name))
        })?;
        self.coerce_value(value)
    }

    /// Coerce an already-parsed JSON value.
    pub fn coerce_value(
        &self,
        value: serde_json::Value,
    ) -> Result<serde_json::Map<String, serde_json::Value>, ShimError> {
        coerce::coerce_object(self, value)
    }

    /// Coerce and deserialize into a caller type.
    pub fn deserialize<T: DeserializeOwned>(&self, text: &str) -> Result<T, ShimError> {
        let object = self.coerce(text)?;
        serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
            ShimError::SchemaViolation(format!("{} does not fit the target type: {e}", self.name))
        })
    }
}
