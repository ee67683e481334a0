//! Dependency planning.
//!
//! A [`Plan`] is an ordered list of batches. Steps inside a batch have no
//! dependency on each other; every dependency of a step in batch `n` lives in
//! an earlier batch. Within a batch, steps keep their declaration order.

use std::collections::{HashMap, HashSet};

use crate::error::WorkflowError;
use crate::workflow::Workflow;

/// Ordered batches of step ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
  batches: Vec<Vec<String>>,
}

impl Plan {
  /// A single batch holding exactly the given steps.
  pub fn single(step_ids: Vec<String>) -> Self {
    if step_ids.is_empty() {
      return Self::default();
    }
    Self {
      batches: vec![step_ids],
    }
  }

  pub fn batches(&self) -> &[Vec<String>] {
    &self.batches
  }

  pub fn len(&self) -> usize {
    self.batches.len()
  }

  pub fn is_empty(&self) -> bool {
    self.batches.is_empty()
  }

  /// Total number of steps across all batches.
  pub fn step_count(&self) -> usize {
    self.batches.iter().map(Vec::len).sum()
  }
}

/// Validate a workflow and compute its batches.
///
/// Fails on duplicate step ids, dependencies naming unknown steps, and
/// dependency cycles (including a step depending on itself).
pub fn plan(workflow: &Workflow) -> Result<Plan, WorkflowError> {
  let mut ids = HashSet::new();
  for step in &workflow.steps {
    if !ids.insert(step.id.as_str()) {
      return Err(WorkflowError::DuplicateStepId {
        step_id: step.id.clone(),
      });
    }
  }

  for step in &workflow.steps {
    for dep in &step.depends_on {
      if !ids.contains(dep.as_str()) {
        return Err(WorkflowError::UnknownDependency {
          step_id: step.id.clone(),
          dependency: dep.clone(),
        });
      }
    }
  }

  let graph = workflow.graph();
  if let Some(cycle) = graph.find_cycle() {
    return Err(WorkflowError::CycleDetected { cycle });
  }

  // Acyclic from here on, so the level recursion terminates.
  fn level_of<'a>(
    step_id: &'a str,
    graph: &'a crate::graph::Graph,
    levels: &mut HashMap<&'a str, usize>,
  ) -> usize {
    if let Some(level) = levels.get(step_id) {
      return *level;
    }
    let level = graph
      .upstream(step_id)
      .iter()
      .map(|dep| level_of(dep, graph, levels) + 1)
      .max()
      .unwrap_or(0);
    levels.insert(step_id, level);
    level
  }

  let mut levels = HashMap::new();
  let mut batches: Vec<Vec<String>> = Vec::new();
  for step in &workflow.steps {
    let level = level_of(&step.id, &graph, &mut levels);
    if batches.len() <= level {
      batches.resize_with(level + 1, Vec::new);
    }
    batches[level].push(step.id.clone());
  }

  Ok(Plan { batches })
}
