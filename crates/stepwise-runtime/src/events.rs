//! Execution events and notifiers for observability.
//!
//! Events are emitted during workflow execution so consumers can observe
//! progress, update run records, stream to UIs, etc.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// Workflow execution has started.
  RunStarted {
    execution_id: String,
    workflow_id: String,
  },

  /// A step has been dispatched.
  StepStarted {
    execution_id: String,
    step_id: String,
  },

  /// A step has completed and its result was stored.
  StepCompleted {
    execution_id: String,
    step_id: String,
    output: serde_json::Value,
  },

  /// A step's condition evaluated to false.
  StepSkipped {
    execution_id: String,
    step_id: String,
  },

  /// A step failed but the run continues (optional step or error handler).
  StepRecovered {
    execution_id: String,
    step_id: String,
    error: String,
  },

  /// A step failed fatally.
  StepFailed {
    execution_id: String,
    step_id: String,
    error: String,
  },

  /// Workflow execution has completed successfully.
  RunCompleted { execution_id: String },

  /// Workflow execution has failed.
  RunFailed { execution_id: String, error: String },

  /// Workflow execution stopped on cancellation.
  RunCancelled { execution_id: String },
}

impl ExecutionEvent {
  pub fn execution_id(&self) -> &str {
    match self {
      Self::RunStarted { execution_id, .. }
      | Self::StepStarted { execution_id, .. }
      | Self::StepCompleted { execution_id, .. }
      | Self::StepSkipped { execution_id, .. }
      | Self::StepRecovered { execution_id, .. }
      | Self::StepFailed { execution_id, .. }
      | Self::RunCompleted { execution_id }
      | Self::RunFailed { execution_id, .. }
      | Self::RunCancelled { execution_id } => execution_id,
    }
  }
}

/// Trait for receiving execution events.
///
/// The runtime calls `notify` for each event, synchronously and from the
/// scheduling task. Implementations decide what to do with them and must
/// not block.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls scheduling. Volume is a few
  // events per step.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
