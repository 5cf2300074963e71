use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Number, Value};

use super::{FieldType, OutputSchema};
use crate::error::ShimError;
use crate::tools::validation::json_type_name;

fn numeric_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("numeric pattern is valid"))
}

/// Strip a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => strip_inline_tag(rest),
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
        .to_string()
}

/// Drop a language tag from a one-line fence ("json {...}").
fn strip_inline_tag(rest: &str) -> &str {
    let tag_len = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let after = &rest[tag_len..];
    if tag_len > 0 && matches!(after.trim_start().chars().next(), Some('{' | '[')) {
        after
    } else {
        rest
    }
}

pub(super) fn coerce_object(
    schema: &OutputSchema,
    value: Value,
) -> Result<Map<String, Value>, ShimError> {
    let mut object = match value {
        Value::Object(object) => object,
        other => {
            return Err(ShimError::SchemaViolation(format!(
                "{} expected an object, got {}",
                schema.name(),
                json_type_name(&other)
            )))
        }
    };

    if let Some(unknown) = object.keys().find(|k| schema.field_type(k).is_none()) {
        return Err(ShimError::SchemaViolation(format!(
            "{} has unexpected field '{unknown}'",
            schema.name()
        )));
    }

    let mut coerced = Map::new();
    for (name, field_type) in schema.fields() {
        let raw = object.remove(name).ok_or_else(|| {
            ShimError::SchemaViolation(format!(
                "{} is missing required field '{name}'",
                schema.name()
            ))
        })?;
        let value = coerce_field(&raw, *field_type).ok_or_else(|| {
            ShimError::SchemaViolation(format!(
                "{} field '{name}' expected {field_type}, got {}",
                schema.name(),
                describe(&raw)
            ))
        })?;
        coerced.insert(name.clone(), value);
    }
    Ok(coerced)
}

fn coerce_field(value: &Value, field_type: FieldType) -> Option<Value> {
    match field_type {
        FieldType::String => value.as_str().map(|s| Value::String(s.to_string())),
        FieldType::Number => match value {
            Value::Number(_) => Some(value.clone()),
            Value::String(s) => parse_number(s)
                .and_then(Number::from_f64)
                .map(Value::Number),
            _ => None,
        },
        FieldType::Integer => {
            let n = match value {
                Value::Number(n) => n.as_f64()?,
                Value::String(s) => parse_number(s)?,
                _ => return None,
            };
            if let Some(i) = value.as_i64() {
                return Some(Value::from(i));
            }
            (n.fract() == 0.0 && n.abs() < i64::MAX as f64).then(|| Value::from(n as i64))
        }
        FieldType::Boolean => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
            Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
            _ => None,
        },
    }
}

/// Extract the single number embedded in `text` ("$9.99", "1,299 USD").
fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != ',' && *c != '_').collect();
    let mut matches = numeric_pattern().find_iter(&cleaned);
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    let value: f64 = first.as_str().parse().ok()?;
    // "-$9.99": the sign sits in front of the currency symbol.
    let prefix = cleaned[..first.start()]
        .trim_end_matches(|c: char| c.is_whitespace() || is_currency_symbol(c));
    if value > 0.0 && prefix.ends_with('-') {
        return Some(-value);
    }
    Some(value)
}

fn is_currency_symbol(c: char) -> bool {
    matches!(c, '$' | '€' | '£' | '¥' | '₹' | '₩')
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{s}\""),
        other => json_type_name(other).to_string(),
    }
}
