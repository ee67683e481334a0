use crate::error::WorkflowError;
use crate::graph::Graph;
use crate::plan::{Plan, plan};
use crate::step::Step;

/// An executable workflow.
///
/// Steps keep their declaration order, which is also the dispatch order
/// within a batch.
#[derive(Debug, Clone)]
pub struct Workflow {
  pub workflow_id: String,
  pub name: String,
  pub steps: Vec<Step>,
  /// Concurrency bound within a batch. `None` means 1.
  pub max_workers: Option<usize>,
}

impl Workflow {
  pub fn new(workflow_id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      name: name.into(),
      steps: Vec::new(),
      max_workers: None,
    }
  }

  /// Append a step (builder form).
  pub fn step(mut self, step: Step) -> Self {
    self.steps.push(step);
    self
  }

  pub fn with_max_workers(mut self, max_workers: usize) -> Self {
    self.max_workers = Some(max_workers);
    self
  }

  /// Effective concurrency bound, never below 1.
  pub fn max_workers(&self) -> usize {
    self.max_workers.unwrap_or(1).max(1)
  }

  /// Get a step by ID.
  pub fn get_step(&self, step_id: &str) -> Option<&Step> {
    self.steps.iter().find(|s| s.id == step_id)
  }

  /// Build the graph structure for traversal.
  pub fn graph(&self) -> Graph {
    Graph::new(&self.steps)
  }

  /// Compute the execution plan, validating the workflow on the way.
  pub fn plan(&self) -> Result<Plan, WorkflowError> {
    plan(self)
  }
}
