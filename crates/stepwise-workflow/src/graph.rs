use std::collections::HashMap;

use crate::step::Step;

/// Dependency graph of a workflow's steps.
///
/// Edges point from a dependency to its dependents. References to unknown
/// steps are kept out of the adjacency lists; [`plan`](crate::plan) reports
/// them.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Step ids in declaration order.
  order: Vec<String>,
  /// Adjacency list: step_id -> list of dependent step_ids.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: step_id -> list of dependency step_ids.
  reverse_adjacency: HashMap<String, Vec<String>>,
  /// Steps with no dependencies.
  entry_points: Vec<String>,
}

impl Graph {
  /// Build a graph from steps.
  pub fn new(steps: &[Step]) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for step in steps {
      adjacency.entry(step.id.clone()).or_default();
      reverse_adjacency.entry(step.id.clone()).or_default();
    }

    for step in steps {
      for dep in &step.depends_on {
        if !adjacency.contains_key(dep) {
          continue;
        }
        let upstream = reverse_adjacency.entry(step.id.clone()).or_default();
        if upstream.contains(dep) {
          continue;
        }
        upstream.push(dep.clone());
        adjacency.entry(dep.clone()).or_default().push(step.id.clone());
      }
    }

    let order: Vec<String> = steps.iter().map(|s| s.id.clone()).collect();

    let entry_points = order
      .iter()
      .filter(|id| reverse_adjacency.get(*id).is_none_or(|v| v.is_empty()))
      .cloned()
      .collect();

    Self {
      order,
      adjacency,
      reverse_adjacency,
      entry_points,
    }
  }

  /// Get entry points (steps with no dependencies), in declaration order.
  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  /// Get the steps that depend on a given step.
  pub fn downstream(&self, step_id: &str) -> &[String] {
    self
      .adjacency
      .get(step_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get the dependencies of a given step.
  pub fn upstream(&self, step_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(step_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Find a dependency cycle, if any.
  ///
  /// Returns the cycle as a path that starts and ends on the same step,
  /// following dependency edges.
  pub fn find_cycle(&self) -> Option<Vec<String>> {
    // DFS with coloring: 0 = white (unvisited), 1 = gray (in progress), 2 = black (done)
    fn dfs<'a>(
      node: &'a str,
      graph: &'a Graph,
      color: &mut HashMap<&'a str, u8>,
      path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
      color.insert(node, 1);
      path.push(node);

      for neighbor in graph.upstream(node) {
        match color.get(neighbor.as_str()) {
          Some(1) => {
            let start = path.iter().position(|n| *n == neighbor.as_str()).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(neighbor.clone());
            return Some(cycle);
          }
          Some(0) => {
            if let Some(cycle) = dfs(neighbor, graph, color, path) {
              return Some(cycle);
            }
          }
          _ => {}
        }
      }

      path.pop();
      color.insert(node, 2);
      None
    }

    let mut color: HashMap<&str, u8> = self.order.iter().map(|id| (id.as_str(), 0u8)).collect();
    let mut path = Vec::new();

    for step_id in &self.order {
      if color.get(step_id.as_str()) == Some(&0) {
        if let Some(cycle) = dfs(step_id, self, &mut color, &mut path) {
          return Some(cycle);
        }
      }
    }

    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_adjacency() {
    let steps = vec![
      Step::new("a", "echo"),
      Step::new("b", "echo").depends_on(["a"]),
      Step::new("c", "echo").depends_on(["a", "b", "b"]),
    ];
    let graph = Graph::new(&steps);

    assert_eq!(graph.entry_points(), ["a".to_string()]);
    assert_eq!(graph.downstream("a"), ["b".to_string(), "c".to_string()]);
    assert_eq!(graph.upstream("c"), ["a".to_string(), "b".to_string()]);
    assert!(graph.upstream("missing").is_empty());
    assert!(graph.find_cycle().is_none());
  }

  #[test]
  fn test_find_cycle_path() {
    let steps = vec![
      Step::new("a", "echo").depends_on(["c"]),
      Step::new("b", "echo").depends_on(["a"]),
      Step::new("c", "echo").depends_on(["b"]),
    ];
    let cycle = Graph::new(&steps).find_cycle().unwrap();

    assert_eq!(cycle.first(), cycle.last());
    assert_eq!(cycle.len(), 4);
  }
}
