use std::time::Duration;

/// Configuration for the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
  /// Timeout for steps that do not set their own.
  pub default_step_timeout: Duration,
  /// Pause between retry attempts.
  pub retry_delay: Duration,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      default_step_timeout: Duration::from_secs(30),
      retry_delay: Duration::from_millis(100),
    }
  }
}
