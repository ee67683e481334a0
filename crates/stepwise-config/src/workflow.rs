use serde::{Deserialize, Serialize};

use crate::step::StepDef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub workflow_id: String,
  pub name: String,
  /// Upper bound on concurrently running steps within a batch.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_workers: Option<usize>,
  pub steps: Vec<StepDef>,
}
