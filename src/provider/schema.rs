//! Schema normalization for strict structured output.

use serde_json::Value;

/// Normalize a JSON schema for a specific provider.
///
/// OpenAI-family strict mode rejects object schemas that leave
/// `additionalProperties` open, so every nested object schema gets `false`.
pub fn normalize_schema_for_provider(schema: &Value, provider_name: &str) -> Value {
    match provider_name {
        "openai" | "azure" => ensure_additional_properties_false(schema),
        _ => schema.clone(),
    }
}

fn ensure_additional_properties_false(schema: &Value) -> Value {
    match schema {
        Value::Object(obj) => {
            let mut normalized = serde_json::Map::new();
            for (key, value) in obj {
                let next = match key.as_str() {
                    "properties" => normalize_properties(value),
                    _ => ensure_additional_properties_false(value),
                };
                normalized.insert(key.clone(), next);
            }
            if is_object_schema(schema) {
                normalized
                    .entry("additionalProperties")
                    .or_insert(Value::Bool(false));
            }
            Value::Object(normalized)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(ensure_additional_properties_false)
                .collect(),
        ),
        _ => schema.clone(),
    }
}

// Property names are user keys, not schema keywords.
fn normalize_properties(properties: &Value) -> Value {
    match properties {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), ensure_additional_properties_false(v)))
                .collect(),
        ),
        other => ensure_additional_properties_false(other),
    }
}

fn is_object_schema(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("object")
        || schema.get("properties").is_some()
}
