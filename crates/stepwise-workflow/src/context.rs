use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Per-run state handed to conditions and mappers.
///
/// `input` is fixed for the run. `results` is append-only: every key is
/// written once, by the step that owns it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
  input: serde_json::Value,
  results: HashMap<String, serde_json::Value>,
  metadata: HashMap<String, serde_json::Value>,
  current_step_id: Option<String>,
}

impl ExecutionContext {
  pub fn new(input: serde_json::Value) -> Self {
    Self {
      input,
      ..Self::default()
    }
  }

  /// Attach a metadata entry (builder form).
  pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
    self.metadata.insert(key.into(), value);
    self
  }

  pub fn input(&self) -> &serde_json::Value {
    &self.input
  }

  pub fn results(&self) -> &HashMap<String, serde_json::Value> {
    &self.results
  }

  /// Stored output of a completed step.
  pub fn result(&self, step_id: &str) -> Option<&serde_json::Value> {
    self.results.get(step_id)
  }

  pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
    &self.metadata
  }

  pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
    self.metadata.insert(key.into(), value);
  }

  pub fn current_step_id(&self) -> Option<&str> {
    self.current_step_id.as_deref()
  }

  pub fn set_current_step(&mut self, step_id: Option<String>) {
    self.current_step_id = step_id;
  }

  /// Store a step result. Returns `false` (and keeps the first value) if the
  /// step already has one.
  pub fn record_result(&mut self, step_id: impl Into<String>, output: serde_json::Value) -> bool {
    match self.results.entry(step_id.into()) {
      std::collections::hash_map::Entry::Occupied(_) => false,
      std::collections::hash_map::Entry::Vacant(slot) => {
        slot.insert(output);
        true
      }
    }
  }

  /// Consume the context, returning its results.
  pub fn into_results(self) -> HashMap<String, serde_json::Value> {
    self.results
  }

  /// The context as a JSON object: `{ input, results, metadata, step }`.
  ///
  /// This is the shape templates and expressions are rendered against.
  pub fn to_value(&self) -> serde_json::Value {
    serde_json::json!({
      "input": self.input,
      "results": self.results,
      "metadata": self.metadata,
      "step": self.current_step_id,
    })
  }
}
