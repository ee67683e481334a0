//! Built-in tools available to every host.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;
use crate::invoker::Tool;

pub const ECHO: &str = "echo";
pub const SLEEP: &str = "sleep";
pub const FAIL: &str = "fail";

/// Returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Echo;

#[async_trait]
impl Tool for Echo {
  async fn call(
    &self,
    input: serde_json::Value,
    _cancel: CancellationToken,
  ) -> Result<serde_json::Value, ToolError> {
    Ok(input)
  }
}

/// Waits `ms` milliseconds, then returns its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sleep;

#[async_trait]
impl Tool for Sleep {
  async fn call(
    &self,
    input: serde_json::Value,
    cancel: CancellationToken,
  ) -> Result<serde_json::Value, ToolError> {
    let ms = input
      .get("ms")
      .and_then(|v| v.as_u64())
      .ok_or_else(|| ToolError::invalid_input("sleep expects an integer 'ms' field"))?;

    tokio::select! {
      _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(input),
      _ = cancel.cancelled() => Err(ToolError::Cancelled),
    }
  }
}

/// Always fails, with `message` from the input when present.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fail;

#[async_trait]
impl Tool for Fail {
  async fn call(
    &self,
    input: serde_json::Value,
    _cancel: CancellationToken,
  ) -> Result<serde_json::Value, ToolError> {
    let message = input
      .get("message")
      .and_then(|v| v.as_str())
      .unwrap_or("fail tool invoked");
    Err(ToolError::failed(message))
  }
}
