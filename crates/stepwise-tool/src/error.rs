//! Tool invocation errors.

/// Errors reported by a tool or by the invoker resolving it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
  /// No tool is registered under the reference.
  #[error("tool not found: {tool}")]
  NotFound { tool: String },

  /// The tool rejected its input.
  #[error("invalid tool input: {message}")]
  InvalidInput { message: String },

  /// The tool ran and failed.
  #[error("tool failed: {message}")]
  Failed { message: String },

  /// The invocation observed cancellation before finishing.
  #[error("tool invocation cancelled")]
  Cancelled,
}

impl ToolError {
  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
    }
  }

  pub fn invalid_input(message: impl Into<String>) -> Self {
    Self::InvalidInput {
      message: message.into(),
    }
  }
}
