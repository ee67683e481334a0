//! Explicit tool registry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::builtin;
use crate::error::ToolError;
use crate::invoker::{Tool, ToolInvoker};

/// Adapts an async closure into a [`Tool`].
pub struct FnTool<F> {
  f: F,
}

impl<F> FnTool<F> {
  pub fn new(f: F) -> Self {
    Self { f }
  }
}

#[async_trait]
impl<F, Fut> Tool for FnTool<F>
where
  F: Fn(serde_json::Value, CancellationToken) -> Fut + Send + Sync,
  Fut: Future<Output = Result<serde_json::Value, ToolError>> + Send,
{
  async fn call(
    &self,
    input: serde_json::Value,
    cancel: CancellationToken,
  ) -> Result<serde_json::Value, ToolError> {
    (self.f)(input, cancel).await
  }
}

/// Maps tool references to registered tools.
///
/// Built by the host at startup and shared with the runtime as an
/// `Arc<dyn ToolInvoker>`.
#[derive(Clone, Default)]
pub struct ToolRegistry {
  tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
  /// Create an empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a registry pre-populated with the [`builtin`] tools.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    registry.register(builtin::ECHO, builtin::Echo);
    registry.register(builtin::SLEEP, builtin::Sleep);
    registry.register(builtin::FAIL, builtin::Fail);
    registry
  }

  /// Register a tool, replacing any tool previously registered under `name`.
  pub fn register(&mut self, name: impl Into<String>, tool: impl Tool + 'static) -> &mut Self {
    self.tools.insert(name.into(), Arc::new(tool));
    self
  }

  /// Register an async closure as a tool.
  pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F) -> &mut Self
  where
    F: Fn(serde_json::Value, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, ToolError>> + Send + 'static,
  {
    self.register(name, FnTool::new(f))
  }

  /// Check whether a tool is registered.
  pub fn contains(&self, name: &str) -> bool {
    self.tools.contains_key(name)
  }

  /// Names of all registered tools, sorted.
  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.tools.keys().cloned().collect();
    names.sort();
    names
  }
}

#[async_trait]
impl ToolInvoker for ToolRegistry {
  #[instrument(name = "tool_invoke", skip(self, input, cancel))]
  async fn invoke(
    &self,
    tool: &str,
    input: serde_json::Value,
    cancel: CancellationToken,
  ) -> Result<serde_json::Value, ToolError> {
    let handler = self.tools.get(tool).ok_or_else(|| ToolError::NotFound {
      tool: tool.to_string(),
    })?;

    debug!(input = %input, "tool call");
    handler.call(input, cancel).await
  }
}
