use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::enums::ErrorPolicy;
use crate::input::InputValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
  pub step_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  /// Tool reference, resolved by the tool invoker at run time.
  pub tool: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub depends_on: Vec<String>,
  /// Condition expression, e.g. `results.fetch.ok and input.notify`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub when: Option<String>,
  /// Input templates. When empty the run input is passed to the tool unchanged.
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub inputs: HashMap<String, InputValue>,
  /// JSON schema used to coerce rendered inputs.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub input_schema: Option<serde_json::Value>,
  /// Output expression evaluated against `{ output }`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub output: Option<String>,
  #[serde(default)]
  pub optional: bool,
  #[serde(default)]
  pub on_error: ErrorPolicy,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub retries: Option<u32>,
}
