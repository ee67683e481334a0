use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::callable::{Condition, ErrorHandler, InputMapper, OutputMapper};
use crate::context::ExecutionContext;
use crate::error::StepError;

/// One tool invocation within a workflow.
///
/// Steps are immutable once a run starts. Callables are stored behind `Arc`
/// so cloning a step shares them instead of copying.
#[derive(Clone)]
pub struct Step {
  pub id: String,
  pub name: String,
  /// Tool reference, opaque to the engine.
  pub tool: String,
  pub depends_on: Vec<String>,
  /// Absent means "always run".
  pub condition: Option<Arc<dyn Condition>>,
  /// A failing optional step never aborts the run.
  pub optional: bool,
  /// `None` or zero means the runtime default.
  pub timeout: Option<Duration>,
  /// Extra attempts after a tool failure or timeout.
  pub retries: u32,
  /// Absent means the run input is passed through unchanged.
  pub input_mapper: Option<Arc<dyn InputMapper>>,
  pub output_mapper: Option<Arc<dyn OutputMapper>>,
  pub error_handler: Option<Arc<dyn ErrorHandler>>,
}

impl Step {
  /// Create a step invoking `tool`. The name defaults to the id.
  pub fn new(id: impl Into<String>, tool: impl Into<String>) -> Self {
    let id = id.into();
    Self {
      name: id.clone(),
      id,
      tool: tool.into(),
      depends_on: Vec::new(),
      condition: None,
      optional: false,
      timeout: None,
      retries: 0,
      input_mapper: None,
      output_mapper: None,
      error_handler: None,
    }
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn depends_on<I, S>(mut self, ids: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.depends_on.extend(ids.into_iter().map(Into::into));
    self
  }

  pub fn optional(mut self) -> Self {
    self.optional = true;
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  pub fn retries(mut self, retries: u32) -> Self {
    self.retries = retries;
    self
  }

  pub fn when<F>(self, condition: F) -> Self
  where
    F: Fn(&ExecutionContext) -> bool + Send + Sync + 'static,
  {
    self.with_condition(condition)
  }

  pub fn with_condition(mut self, condition: impl Condition + 'static) -> Self {
    self.condition = Some(Arc::new(condition));
    self
  }

  pub fn map_input<F>(self, mapper: F) -> Self
  where
    F: Fn(&ExecutionContext) -> serde_json::Value + Send + Sync + 'static,
  {
    self.with_input_mapper(mapper)
  }

  pub fn with_input_mapper(mut self, mapper: impl InputMapper + 'static) -> Self {
    self.input_mapper = Some(Arc::new(mapper));
    self
  }

  pub fn map_output<F>(self, mapper: F) -> Self
  where
    F: Fn(serde_json::Value) -> serde_json::Value + Send + Sync + 'static,
  {
    self.with_output_mapper(mapper)
  }

  pub fn with_output_mapper(mut self, mapper: impl OutputMapper + 'static) -> Self {
    self.output_mapper = Some(Arc::new(mapper));
    self
  }

  pub fn on_error<F>(self, handler: F) -> Self
  where
    F: Fn(&ExecutionContext, StepError) -> Result<(), StepError> + Send + Sync + 'static,
  {
    self.with_error_handler(handler)
  }

  pub fn with_error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
    self.error_handler = Some(Arc::new(handler));
    self
  }

  /// The timeout to apply, falling back to `default` when unset or zero.
  pub fn effective_timeout(&self, default: Duration) -> Duration {
    match self.timeout {
      Some(timeout) if !timeout.is_zero() => timeout,
      _ => default,
    }
  }
}

impl fmt::Debug for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Step")
      .field("id", &self.id)
      .field("name", &self.name)
      .field("tool", &self.tool)
      .field("depends_on", &self.depends_on)
      .field("has_condition", &self.condition.is_some())
      .field("optional", &self.optional)
      .field("timeout", &self.timeout)
      .field("retries", &self.retries)
      .field("has_input_mapper", &self.input_mapper.is_some())
      .field("has_output_mapper", &self.output_mapper.is_some())
      .field("has_error_handler", &self.error_handler.is_some())
      .finish()
  }
}
