use stepwise_workflow::WorkflowError;

use crate::record::ExecutionState;

/// Errors returned by registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
  #[error("execution not found: {execution_id}")]
  NotFound { execution_id: String },

  /// Pause or resume requested from a state that does not allow it.
  #[error("cannot {action} execution {execution_id} in state {state}")]
  InvalidTransition {
    execution_id: String,
    action: &'static str,
    state: ExecutionState,
  },

  /// Eviction of a run that has not finished.
  #[error("execution {execution_id} is still {state}")]
  NotTerminal {
    execution_id: String,
    state: ExecutionState,
  },

  /// The submitted workflow failed validation; no run was started.
  #[error(transparent)]
  Workflow(#[from] WorkflowError),
}
