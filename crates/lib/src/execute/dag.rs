//! The resolved execution plan and its dependency graph.
//!
//! Execution itself is sequential, but the plan can also be viewed as a DAG
//! and grouped into levels of targets with no path between them. Levels are
//! what a parallel scheduler would dispatch together.

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::target::Target;

/// Targets in the order they will run. Each target appears exactly once.
#[derive(Debug, Clone)]
pub struct ExecutionPlan<'r> {
  targets: Vec<&'r Target>,
}

impl<'r> ExecutionPlan<'r> {
  pub(crate) fn new(targets: Vec<&'r Target>) -> Self {
    Self { targets }
  }

  pub fn targets(&self) -> &[&'r Target] {
    &self.targets
  }

  pub fn iter(&self) -> impl Iterator<Item = &'r Target> + '_ {
    self.targets.iter().copied()
  }

  pub fn names(&self) -> Vec<&'r str> {
    self.targets.iter().map(|t| t.name()).collect()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.targets.iter().any(|t| t.name() == name)
  }

  pub fn len(&self) -> usize {
    self.targets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.targets.is_empty()
  }

  /// Build the prerequisite graph of the plan.
  ///
  /// Nodes are added in plan order; edges run from prerequisite to dependent.
  pub fn graph(&self) -> DiGraph<&'r str, ()> {
    let mut graph = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

    for target in &self.targets {
      let idx = graph.add_node(target.name());
      nodes.insert(target.name(), idx);
    }

    for target in &self.targets {
      let dependent_idx = nodes[target.name()];
      for prerequisite in target.prerequisites() {
        // Every prerequisite of a planned target is planned too.
        if let Some(&dep_idx) = nodes.get(prerequisite.as_str()) {
          graph.update_edge(dep_idx, dependent_idx, ());
        }
      }
    }

    graph
  }

  /// Group the plan into levels.
  ///
  /// Level 0 holds targets without prerequisites; every other target sits one
  /// level after its deepest prerequisite. Targets inside a level keep plan order.
  pub fn levels(&self) -> Vec<Vec<&'r Target>> {
    let graph = self.graph();

    // Kahn's algorithm, one level per round
    let mut in_degree: HashMap<NodeIndex, usize> = graph
      .node_indices()
      .map(|idx| (idx, graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();
    let mut node_level: HashMap<NodeIndex, usize> = HashMap::new();
    let mut remaining: HashSet<NodeIndex> = graph.node_indices().collect();
    let mut current_level = 0;

    while !remaining.is_empty() {
      let ready: Vec<NodeIndex> = remaining.iter().filter(|&&idx| in_degree[&idx] == 0).copied().collect();

      // A plan is acyclic by construction; bail out rather than spin.
      if ready.is_empty() {
        break;
      }

      for &idx in &ready {
        node_level.insert(idx, current_level);
        remaining.remove(&idx);

        for neighbor in graph.neighbors_directed(idx, Direction::Outgoing) {
          if let Some(deg) = in_degree.get_mut(&neighbor) {
            *deg = deg.saturating_sub(1);
          }
        }
      }

      current_level += 1;
    }

    let mut levels: Vec<Vec<&'r Target>> = vec![Vec::new(); current_level];
    for idx in graph.node_indices() {
      if let Some(&level) = node_level.get(&idx) {
        levels[level].push(self.targets[idx.index()]);
      }
    }

    levels.retain(|level| !level.is_empty());
    levels
  }

  /// Render the plan graph in Graphviz dot format.
  pub fn to_dot(&self) -> String {
    let graph = self.graph();
    format!("{:?}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
  }
}
