//! Step callables.
//!
//! Each callable is a single-method trait so steps can hold them as
//! `Arc<dyn _>`. Closures implement the traits directly, which keeps whatever
//! they capture alive for as long as the step is.
//!
//! Callables run on the scheduling path and must not block.

use crate::context::ExecutionContext;
use crate::error::{MapperError, StepError};

/// Decides whether a step runs.
pub trait Condition: Send + Sync {
  fn evaluate(&self, ctx: &ExecutionContext) -> Result<bool, MapperError>;
}

impl<F> Condition for F
where
  F: Fn(&ExecutionContext) -> bool + Send + Sync,
{
  fn evaluate(&self, ctx: &ExecutionContext) -> Result<bool, MapperError> {
    Ok(self(ctx))
  }
}

/// Derives the tool input from the context.
pub trait InputMapper: Send + Sync {
  fn map_input(&self, ctx: &ExecutionContext) -> Result<serde_json::Value, MapperError>;
}

impl<F> InputMapper for F
where
  F: Fn(&ExecutionContext) -> serde_json::Value + Send + Sync,
{
  fn map_input(&self, ctx: &ExecutionContext) -> Result<serde_json::Value, MapperError> {
    Ok(self(ctx))
  }
}

/// Transforms the raw tool output into the stored result.
pub trait OutputMapper: Send + Sync {
  fn map_output(&self, output: serde_json::Value) -> Result<serde_json::Value, MapperError>;
}

impl<F> OutputMapper for F
where
  F: Fn(serde_json::Value) -> serde_json::Value + Send + Sync,
{
  fn map_output(&self, output: serde_json::Value) -> Result<serde_json::Value, MapperError> {
    Ok(self(output))
  }
}

/// Gets the last word on a failed step.
///
/// `Ok(())` recovers: the run continues without a result for the step.
/// `Err` is fatal to the run; handlers usually return the error they were
/// given, possibly rewritten.
pub trait ErrorHandler: Send + Sync {
  fn handle(&self, ctx: &ExecutionContext, error: StepError) -> Result<(), StepError>;
}

impl<F> ErrorHandler for F
where
  F: Fn(&ExecutionContext, StepError) -> Result<(), StepError> + Send + Sync,
{
  fn handle(&self, ctx: &ExecutionContext, error: StepError) -> Result<(), StepError> {
    self(ctx, error)
  }
}
