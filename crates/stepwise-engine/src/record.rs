//! Execution records.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stepwise_runtime::RunStatus;

/// Lifecycle state of an asynchronous run.
///
/// `Pending → Running → {Completed | Failed | Cancelled}`, plus
/// `Running ⇄ Paused`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
  Pending,
  Running,
  Paused,
  Completed,
  Failed,
  Cancelled,
}

impl ExecutionState {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Running => "running",
      Self::Paused => "paused",
      Self::Completed => "completed",
      Self::Failed => "failed",
      Self::Cancelled => "cancelled",
    }
  }
}

impl fmt::Display for ExecutionState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl From<RunStatus> for ExecutionState {
  fn from(status: RunStatus) -> Self {
    match status {
      RunStatus::Succeeded => Self::Completed,
      RunStatus::Failed => Self::Failed,
      RunStatus::Cancelled => Self::Cancelled,
    }
  }
}

/// Snapshot of an asynchronous run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
  pub execution_id: String,
  pub workflow_id: String,
  pub state: ExecutionState,
  /// Most recently dispatched step, cleared when the run ends.
  pub current_step: Option<String>,
  /// Completed step ids in completion order.
  pub completed_steps: Vec<String>,
  pub results: HashMap<String, serde_json::Value>,
  pub started_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
  pub error: Option<String>,
}

impl ExecutionRecord {
  pub(crate) fn new(execution_id: String, workflow_id: String) -> Self {
    Self {
      execution_id,
      workflow_id,
      state: ExecutionState::Pending,
      current_step: None,
      completed_steps: Vec::new(),
      results: HashMap::new(),
      started_at: Utc::now(),
      completed_at: None,
      error: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_terminal_states() {
    assert!(!ExecutionState::Pending.is_terminal());
    assert!(!ExecutionState::Running.is_terminal());
    assert!(!ExecutionState::Paused.is_terminal());
    assert!(ExecutionState::Completed.is_terminal());
    assert!(ExecutionState::Failed.is_terminal());
    assert!(ExecutionState::Cancelled.is_terminal());
  }

  #[test]
  fn test_record_serializes_state_snake_case() {
    let record = ExecutionRecord::new("e1".to_string(), "wf".to_string());
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["state"], "pending");
    assert!(value["completed_at"].is_null());
  }
}
