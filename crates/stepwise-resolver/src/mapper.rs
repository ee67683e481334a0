//! Step callables backed by minijinja.
//!
//! Templates and expressions are stored as source and compiled per
//! evaluation, so the callables own no borrowed environment state.

use std::collections::HashMap;

use minijinja::{Value, context};
use stepwise_workflow::{
  Condition, ErrorHandler, ExecutionContext, InputMapper, MapperError, OutputMapper, StepError,
};
use tracing::warn;

use crate::input::{
  SchemaType, coerce_inputs, environment, extract_schema_types, resolve_inputs,
};

/// Renders input templates against the context and coerces them through
/// the step's input schema.
#[derive(Debug, Clone)]
pub struct TemplateInput {
  inputs: HashMap<String, String>,
  schema: HashMap<String, SchemaType>,
}

impl TemplateInput {
  pub fn new(inputs: HashMap<String, String>, input_schema: Option<&serde_json::Value>) -> Self {
    Self {
      inputs,
      schema: input_schema.map(extract_schema_types).unwrap_or_default(),
    }
  }
}

impl InputMapper for TemplateInput {
  fn map_input(&self, ctx: &ExecutionContext) -> Result<serde_json::Value, MapperError> {
    let resolved = resolve_inputs(&self.inputs, &ctx.to_value())?;
    coerce_inputs(&resolved, &self.schema)
  }
}

/// A `when` expression, e.g. `results.fetch.ok and input.notify`.
///
/// Undefined names are falsy, so a condition on a skipped step's result
/// simply evaluates to `false`, even through nested lookups.
#[derive(Debug, Clone)]
pub struct ExpressionCondition {
  source: String,
}

impl ExpressionCondition {
  pub fn new(source: impl Into<String>) -> Self {
    Self {
      source: source.into(),
    }
  }
}

impl Condition for ExpressionCondition {
  fn evaluate(&self, ctx: &ExecutionContext) -> Result<bool, MapperError> {
    let env = environment();
    let expr = env
      .compile_expression(&self.source)
      .map_err(|e| MapperError::new(e.to_string()))?;
    let value = expr
      .eval(Value::from_serialize(ctx.to_value()))
      .map_err(|e| MapperError::new(e.to_string()))?;
    Ok(value.is_true())
  }
}

/// An `output` expression evaluated against `{ output }`.
#[derive(Debug, Clone)]
pub struct ExpressionOutput {
  source: String,
}

impl ExpressionOutput {
  pub fn new(source: impl Into<String>) -> Self {
    Self {
      source: source.into(),
    }
  }
}

impl OutputMapper for ExpressionOutput {
  fn map_output(&self, output: serde_json::Value) -> Result<serde_json::Value, MapperError> {
    let env = environment();
    let expr = env
      .compile_expression(&self.source)
      .map_err(|e| MapperError::new(e.to_string()))?;
    let value = expr
      .eval(context! { output => Value::from_serialize(&output) })
      .map_err(|e| MapperError::new(e.to_string()))?;
    serde_json::to_value(&value).map_err(|e| MapperError::new(e.to_string()))
  }
}

/// `on_error: continue`. Logs the failure and recovers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinueOnError;

impl ErrorHandler for ContinueOnError {
  fn handle(&self, ctx: &ExecutionContext, error: StepError) -> Result<(), StepError> {
    warn!(
      step_id = %error.step_id(),
      current_step = ?ctx.current_step_id(),
      error = %error,
      "step_error_ignored"
    );
    Ok(())
  }
}
