use stepwise_workflow::WorkflowError;
use thiserror::Error;

/// Errors that can occur during workflow resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// The step graph is invalid (duplicate ids, unknown dependencies, cycles).
  #[error(transparent)]
  Workflow(#[from] WorkflowError),

  /// The step names a tool the host does not provide.
  #[error("step '{step_id}' references unknown tool '{tool}'")]
  UnknownTool { step_id: String, tool: String },

  /// An input template does not parse.
  #[error("invalid template for input '{input}' of step '{step_id}': {message}")]
  InvalidTemplate {
    step_id: String,
    input: String,
    message: String,
  },

  /// A `when` or `output` expression does not parse.
  #[error("invalid {field} expression for step '{step_id}': {message}")]
  InvalidExpression {
    step_id: String,
    field: &'static str,
    message: String,
  },

  #[error("max_workers must be at least 1")]
  InvalidMaxWorkers,
}
