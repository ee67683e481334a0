//! Input resolution using minijinja templates.
//!
//! Step inputs are rendered against the execution context, then the rendered
//! strings are coerced to typed values according to the step's input schema.
//!
//! # Flow
//! 1. Template resolution: `HashMap<String, String>` → rendered strings
//! 2. Schema coercion: rendered strings → typed `serde_json::Value` object
//!
//! # Template context
//! Templates see the context as produced by
//! [`ExecutionContext::to_value`](stepwise_workflow::ExecutionContext::to_value):
//! ```json
//! { "recipient": "{{ results.fetch_user.email }}", "greeting": "Hello {{ input.name | title }}!" }
//! ```

use std::collections::HashMap;

use minijinja::{Environment, UndefinedBehavior, Value};
use stepwise_workflow::MapperError;

/// JSON Schema type definitions for input coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
  String,
  Number,
  Integer,
  Boolean,
  Null,
  Array,
  Object,
}

/// Extract property types from a JSON Schema object.
///
/// Only simple object schemas with `properties` are understood; anything
/// else (anyOf, oneOf, ...) leaves the property typed as a string.
pub fn extract_schema_types(json_schema: &serde_json::Value) -> HashMap<String, SchemaType> {
  let Some(properties) = json_schema.get("properties").and_then(|p| p.as_object()) else {
    return HashMap::new();
  };

  properties
    .iter()
    .filter_map(|(name, prop_schema)| {
      let type_str = prop_schema.get("type").and_then(|t| t.as_str())?;
      let schema_type = match type_str {
        "number" => SchemaType::Number,
        "integer" => SchemaType::Integer,
        "boolean" => SchemaType::Boolean,
        "null" => SchemaType::Null,
        "array" => SchemaType::Array,
        "object" => SchemaType::Object,
        _ => SchemaType::String,
      };
      Some((name.clone(), schema_type))
    })
    .collect()
}

/// Template environment shared by inputs, conditions and output expressions.
///
/// Lookups chain through undefined values: a step that was skipped has no
/// result, and `results.skipped.field` must render empty rather than fail.
pub(crate) fn environment() -> Environment<'static> {
  let mut env = Environment::new();
  env.set_undefined_behavior(UndefinedBehavior::Chainable);
  env
}

/// Render every input template against `context`.
pub fn resolve_inputs(
  inputs: &HashMap<String, String>,
  context: &serde_json::Value,
) -> Result<HashMap<String, String>, MapperError> {
  let env = environment();
  let ctx_value = Value::from_serialize(context);

  inputs
    .iter()
    .map(|(key, template)| {
      env
        .render_str(template, ctx_value.clone())
        .map(|rendered| (key.clone(), rendered))
        .map_err(|e| MapperError::new(format!("failed to resolve input '{}': {}", key, e)))
    })
    .collect()
}

/// Coerce rendered inputs to typed JSON values. Keys missing from `schema`
/// stay strings.
pub fn coerce_inputs(
  resolved: &HashMap<String, String>,
  schema: &HashMap<String, SchemaType>,
) -> Result<serde_json::Value, MapperError> {
  let mut result = serde_json::Map::new();

  for (key, value) in resolved {
    let schema_type = schema.get(key).copied().unwrap_or(SchemaType::String);
    result.insert(key.clone(), coerce_value(key, value, schema_type)?);
  }

  Ok(serde_json::Value::Object(result))
}

fn coerce_value(
  input_key: &str,
  value: &str,
  schema_type: SchemaType,
) -> Result<serde_json::Value, MapperError> {
  let mismatch = |expected: &str| {
    MapperError::new(format!(
      "input '{}' expected {}, got '{}'",
      input_key, expected, value
    ))
  };

  match schema_type {
    SchemaType::String => Ok(serde_json::Value::String(value.to_string())),

    SchemaType::Number => value
      .trim()
      .parse::<f64>()
      .ok()
      .and_then(serde_json::Number::from_f64)
      .map(serde_json::Value::Number)
      .ok_or_else(|| mismatch("number")),

    SchemaType::Integer => value
      .trim()
      .parse::<i64>()
      .map(|n| serde_json::Value::Number(n.into()))
      .map_err(|_| mismatch("integer")),

    SchemaType::Boolean => match value.trim().to_lowercase().as_str() {
      "true" => Ok(serde_json::Value::Bool(true)),
      "false" => Ok(serde_json::Value::Bool(false)),
      _ => Err(mismatch("boolean")),
    },

    SchemaType::Null => match value.trim() {
      "" | "null" | "none" => Ok(serde_json::Value::Null),
      _ => Err(mismatch("null")),
    },

    SchemaType::Array | SchemaType::Object => {
      let parsed: serde_json::Value = serde_json::from_str(value).map_err(|e| {
        MapperError::new(format!("input '{}' is not valid JSON: {}", input_key, e))
      })?;
      let matches = match schema_type {
        SchemaType::Array => parsed.is_array(),
        _ => parsed.is_object(),
      };
      if matches {
        Ok(parsed)
      } else if schema_type == SchemaType::Array {
        Err(mismatch("array"))
      } else {
        Err(mismatch("object"))
      }
    }
  }
}
