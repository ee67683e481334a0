use serde::{Deserialize, Serialize};

/// What happens when a step fails and is not optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
  /// The failure aborts the run.
  #[default]
  Fail,
  /// The failure is recovered and the run continues without a result.
  Continue,
}
