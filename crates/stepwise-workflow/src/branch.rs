use std::fmt;
use std::sync::Arc;

use crate::callable::Condition;
use crate::context::ExecutionContext;
use crate::error::MapperError;
use crate::step::Step;

/// Two-armed conditional: exactly one arm (or none) runs.
#[derive(Clone)]
pub struct Branch {
  pub condition: Arc<dyn Condition>,
  pub if_true: Step,
  pub if_false: Option<Step>,
}

impl Branch {
  pub fn new<F>(condition: F, if_true: Step) -> Self
  where
    F: Fn(&ExecutionContext) -> bool + Send + Sync + 'static,
  {
    Self::with_condition(condition, if_true)
  }

  pub fn with_condition(condition: impl Condition + 'static, if_true: Step) -> Self {
    Self {
      condition: Arc::new(condition),
      if_true,
      if_false: None,
    }
  }

  /// Set the arm that runs when the condition is false.
  pub fn otherwise(mut self, if_false: Step) -> Self {
    self.if_false = Some(if_false);
    self
  }

  /// Evaluate the condition once and pick the arm to run.
  pub fn select(&self, ctx: &ExecutionContext) -> Result<Option<&Step>, MapperError> {
    if self.condition.evaluate(ctx)? {
      Ok(Some(&self.if_true))
    } else {
      Ok(self.if_false.as_ref())
    }
  }
}

impl fmt::Debug for Branch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Branch")
      .field("if_true", &self.if_true)
      .field("if_false", &self.if_false)
      .finish_non_exhaustive()
  }
}
