//! Invoker and tool traits.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;

/// Capability the engine calls to perform the work a step delegates.
///
/// The `cancel` token is the run's (or batch's) cancellation signal.
/// Implementations should stop early when it fires, but the engine does not
/// rely on it: an invocation that ignores the token is simply abandoned.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
  async fn invoke(
    &self,
    tool: &str,
    input: serde_json::Value,
    cancel: CancellationToken,
  ) -> Result<serde_json::Value, ToolError>;
}

/// A single tool that can be registered on a [`ToolRegistry`](crate::ToolRegistry).
#[async_trait]
pub trait Tool: Send + Sync {
  async fn call(
    &self,
    input: serde_json::Value,
    cancel: CancellationToken,
  ) -> Result<serde_json::Value, ToolError>;
}
