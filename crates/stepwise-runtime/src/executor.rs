//! Single-step execution.

use std::sync::Arc;
use std::time::Duration;

use stepwise_tool::{ToolError, ToolInvoker};
use stepwise_workflow::{ExecutionContext, Step, StepError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::config::RuntimeConfig;

/// What became of a step that did not fail the run.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
  /// The tool ran; holds the mapped output to store.
  Completed(serde_json::Value),
  /// The condition was false.
  Skipped,
  /// The step failed but was optional or its error handler recovered.
  Recovered { error: StepError },
}

/// Runs one step against an execution context.
#[derive(Clone)]
pub struct StepExecutor {
  invoker: Arc<dyn ToolInvoker>,
  config: RuntimeConfig,
}

impl StepExecutor {
  pub fn new(invoker: Arc<dyn ToolInvoker>, config: RuntimeConfig) -> Self {
    Self { invoker, config }
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  /// Run a step.
  ///
  /// `Err` means the failure is fatal to the run: either the step was
  /// cancelled, or it failed and neither optionality nor its error handler
  /// recovered it.
  #[instrument(
    name = "step_execute",
    skip(self, step, ctx, cancel),
    fields(step_id = %step.id, tool = %step.tool)
  )]
  pub async fn run_step(
    &self,
    step: &Step,
    ctx: &ExecutionContext,
    cancel: &CancellationToken,
  ) -> Result<StepOutcome, StepError> {
    if cancel.is_cancelled() {
      return Err(StepError::Cancelled {
        step_id: step.id.clone(),
      });
    }

    if let Some(condition) = &step.condition {
      match condition.evaluate(ctx) {
        Ok(true) => {}
        Ok(false) => {
          debug!("condition false, skipping");
          return Ok(StepOutcome::Skipped);
        }
        Err(e) => {
          let error = StepError::Condition {
            step_id: step.id.clone(),
            message: e.message,
          };
          return self.recover(step, ctx, error);
        }
      }
    }

    match self.attempt(step, ctx, cancel).await {
      Ok(output) => Ok(StepOutcome::Completed(output)),
      Err(e) if e.is_cancelled() => Err(e),
      Err(e) => self.recover(step, ctx, e),
    }
  }

  /// Map input, invoke the tool and map its output.
  async fn attempt(
    &self,
    step: &Step,
    ctx: &ExecutionContext,
    cancel: &CancellationToken,
  ) -> Result<serde_json::Value, StepError> {
    let input = match &step.input_mapper {
      Some(mapper) => mapper
        .map_input(ctx)
        .map_err(|e| StepError::InputMapping {
          step_id: step.id.clone(),
          message: e.message,
        })?,
      None => ctx.input().clone(),
    };

    let output = self.invoke_with_retries(step, input, cancel).await?;

    match &step.output_mapper {
      Some(mapper) => mapper
        .map_output(output)
        .map_err(|e| StepError::OutputMapping {
          step_id: step.id.clone(),
          message: e.message,
        }),
      None => Ok(output),
    }
  }

  async fn invoke_with_retries(
    &self,
    step: &Step,
    input: serde_json::Value,
    cancel: &CancellationToken,
  ) -> Result<serde_json::Value, StepError> {
    let timeout = step.effective_timeout(self.config.default_step_timeout);
    let mut attempt = 0;

    loop {
      match self.invoke_once(step, input.clone(), timeout, cancel).await {
        Ok(output) => return Ok(output),
        Err(e) if e.is_retryable() && attempt < step.retries => {
          attempt += 1;
          warn!(attempt, retries = step.retries, error = %e, "step_retrying");
          tokio::select! {
            _ = tokio::time::sleep(self.config.retry_delay) => {}
            _ = cancel.cancelled() => {
              return Err(StepError::Cancelled { step_id: step.id.clone() });
            }
          }
        }
        Err(e) => return Err(e),
      }
    }
  }

  async fn invoke_once(
    &self,
    step: &Step,
    input: serde_json::Value,
    timeout: Duration,
    cancel: &CancellationToken,
  ) -> Result<serde_json::Value, StepError> {
    let invocation = tokio::time::timeout(
      timeout,
      self.invoker.invoke(&step.tool, input, cancel.clone()),
    );

    tokio::select! {
      biased;
      _ = cancel.cancelled() => Err(StepError::Cancelled { step_id: step.id.clone() }),
      result = invocation => match result {
        Err(_) => Err(StepError::Timeout {
          step_id: step.id.clone(),
          timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
        Ok(Ok(output)) => Ok(output),
        Ok(Err(ToolError::Cancelled)) if cancel.is_cancelled() => {
          Err(StepError::Cancelled { step_id: step.id.clone() })
        }
        Ok(Err(source)) => Err(StepError::Tool {
          step_id: step.id.clone(),
          tool: step.tool.clone(),
          source,
        }),
      },
    }
  }

  /// Apply the optional flag and error handler to a failed step.
  fn recover(
    &self,
    step: &Step,
    ctx: &ExecutionContext,
    error: StepError,
  ) -> Result<StepOutcome, StepError> {
    if step.optional {
      warn!(error = %error, "optional_step_failed");
      return Ok(StepOutcome::Recovered { error });
    }

    match &step.error_handler {
      Some(handler) => {
        handler.handle(ctx, error.clone()).map_err(|e| match e {
          // Only the run's token may cancel a run.
          StepError::Cancelled { step_id } => {
            StepError::failed(step_id, "error handler returned a cancellation")
          }
          other => other,
        })?;
        warn!(error = %error, "step_error_recovered");
        Ok(StepOutcome::Recovered { error })
      }
      None => Err(error),
    }
  }
}
