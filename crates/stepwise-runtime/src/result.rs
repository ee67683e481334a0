//! Run outcome types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use stepwise_workflow::StepError;

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Succeeded,
  Failed,
  Cancelled,
}

/// Why a run did not succeed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RunError {
  /// The first fatal step failure.
  #[error(transparent)]
  Step(#[from] StepError),

  #[error("execution cancelled")]
  Cancelled,
}

impl RunError {
  /// The failing step, if the run failed on one.
  pub fn step_id(&self) -> Option<&str> {
    match self {
      Self::Step(e) => Some(e.step_id()),
      Self::Cancelled => None,
    }
  }
}

/// Result of a complete workflow run.
///
/// Failed and cancelled runs still carry everything that completed before
/// the run stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
  pub execution_id: String,
  pub status: RunStatus,
  /// Stored step outputs, keyed by step id.
  pub results: HashMap<String, serde_json::Value>,
  /// Completed step ids in completion order.
  pub steps_completed: Vec<String>,
  /// Present iff the run did not succeed.
  pub error: Option<RunError>,
  pub duration_ms: u64,
}

impl RunOutcome {
  pub fn success(&self) -> bool {
    self.status == RunStatus::Succeeded
  }
}
