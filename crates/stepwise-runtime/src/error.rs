//! Runtime error types.

use stepwise_workflow::WorkflowError;

/// Errors that prevent a run from starting.
///
/// Step failures and cancellation are not errors at this level; they are
/// reported through [`RunOutcome`](crate::RunOutcome).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
  /// The workflow is misconfigured (duplicate ids, unknown dependencies, cycles).
  #[error(transparent)]
  Workflow(#[from] WorkflowError),

  /// A single-step invocation named a step the workflow does not have.
  #[error("step '{step_id}' not found in workflow")]
  StepNotFound { step_id: String },
}
