use stepwise_tool::ToolError;
use thiserror::Error;

/// Configuration errors, detected before any step runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
  #[error("duplicate step id: {step_id}")]
  DuplicateStepId { step_id: String },

  #[error("step '{step_id}' depends on unknown step '{dependency}'")]
  UnknownDependency { step_id: String, dependency: String },

  #[error("dependency cycle detected: {}", cycle.join(" -> "))]
  CycleDetected { cycle: Vec<String> },
}

/// Failure reported by a condition or mapper callable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct MapperError {
  pub message: String,
}

impl MapperError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

/// Errors raised while running a single step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepError {
  /// The tool invoker reported a failure.
  #[error("step '{step_id}' tool '{tool}' failed: {source}")]
  Tool {
    step_id: String,
    tool: String,
    #[source]
    source: ToolError,
  },

  /// The invocation exceeded the step timeout.
  #[error("step '{step_id}' timed out after {timeout_ms}ms")]
  Timeout { step_id: String, timeout_ms: u64 },

  /// The condition could not be evaluated.
  #[error("condition failed for step '{step_id}': {message}")]
  Condition { step_id: String, message: String },

  /// The tool input could not be derived.
  #[error("input mapping failed for step '{step_id}': {message}")]
  InputMapping { step_id: String, message: String },

  /// The tool output could not be transformed.
  #[error("output mapping failed for step '{step_id}': {message}")]
  OutputMapping { step_id: String, message: String },

  /// Failure raised by an error handler or other caller code.
  #[error("step '{step_id}' failed: {message}")]
  Failed { step_id: String, message: String },

  /// The step observed cancellation.
  #[error("step '{step_id}' cancelled")]
  Cancelled { step_id: String },
}

impl StepError {
  pub fn failed(step_id: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Failed {
      step_id: step_id.into(),
      message: message.into(),
    }
  }

  /// The id of the step this error belongs to.
  pub fn step_id(&self) -> &str {
    match self {
      Self::Tool { step_id, .. }
      | Self::Timeout { step_id, .. }
      | Self::Condition { step_id, .. }
      | Self::InputMapping { step_id, .. }
      | Self::OutputMapping { step_id, .. }
      | Self::Failed { step_id, .. }
      | Self::Cancelled { step_id } => step_id,
    }
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, Self::Cancelled { .. })
  }

  /// Tool failures and timeouts may be retried; everything else is final.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Tool { .. } | Self::Timeout { .. })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cycle_display() {
    let err = WorkflowError::CycleDetected {
      cycle: vec!["a".to_string(), "b".to_string(), "a".to_string()],
    };
    assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> a");
  }

  #[test]
  fn test_step_error_classification() {
    let tool = StepError::Tool {
      step_id: "s".to_string(),
      tool: "echo".to_string(),
      source: ToolError::failed("boom"),
    };
    assert_eq!(tool.step_id(), "s");
    assert!(tool.is_retryable());
    assert!(!tool.is_cancelled());

    let cancelled = StepError::Cancelled {
      step_id: "s".to_string(),
    };
    assert!(cancelled.is_cancelled());
    assert!(!cancelled.is_retryable());
    assert!(!StepError::failed("s", "nope").is_retryable());
  }
}
