//! Dependency resolution.
//!
//! Expands one or more requested targets into a single execution plan where
//! every prerequisite precedes the targets that declare it. Traversal is
//! depth-first in declaration order, so the resulting order is a deterministic
//! function of the registry and the requested roots.

use std::collections::HashSet;

use thiserror::Error;
use tracing::debug;

use super::dag::ExecutionPlan;
use crate::target::{Target, TargetRegistry};

/// Errors raised before any target runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
  /// A requested root or a prerequisite names a target that is not registered.
  #[error("unknown target '{name}'{}", required_by_suffix(.required_by))]
  UnknownTarget { name: String, required_by: Option<String> },

  /// The prerequisite graph loops. Members are listed along the loop and the
  /// first member is repeated at the end.
  #[error("dependency cycle detected: {}", .members.join(" -> "))]
  Cycle { members: Vec<String> },
}

fn required_by_suffix(required_by: &Option<String>) -> String {
  required_by
    .as_ref()
    .map(|parent| format!(" (required by '{parent}')"))
    .unwrap_or_default()
}

/// Computes execution plans against a registry.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'r> {
  registry: &'r TargetRegistry,
}

/// Traversal state shared across every root of one resolution.
#[derive(Default)]
struct Walk<'r> {
  order: Vec<&'r Target>,
  done: HashSet<&'r str>,
  on_stack: HashSet<&'r str>,
  path: Vec<&'r str>,
}

impl<'r> Resolver<'r> {
  pub fn new(registry: &'r TargetRegistry) -> Self {
    Self { registry }
  }

  /// Resolve a single root.
  pub fn resolve(&self, root: &str) -> Result<ExecutionPlan<'r>, ResolveError> {
    self.resolve_all([root])
  }

  /// Resolve several roots into one plan.
  ///
  /// De-duplication is global: a target required by two roots appears once,
  /// at the position where it was first required.
  pub fn resolve_all<I, S>(&self, roots: I) -> Result<ExecutionPlan<'r>, ResolveError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut walk = Walk::default();
    for root in roots {
      self.visit(root.as_ref(), None, &mut walk)?;
    }

    debug!(
      order = ?walk.order.iter().map(|t| t.name()).collect::<Vec<_>>(),
      "resolved execution order"
    );
    Ok(ExecutionPlan::new(walk.order))
  }

  fn visit(&self, name: &str, required_by: Option<&str>, walk: &mut Walk<'r>) -> Result<(), ResolveError> {
    if walk.done.contains(name) {
      return Ok(());
    }

    if walk.on_stack.contains(name) {
      let start = walk.path.iter().position(|member| *member == name).unwrap_or(0);
      let mut members: Vec<String> = walk.path[start..].iter().map(|m| m.to_string()).collect();
      members.push(name.to_string());
      return Err(ResolveError::Cycle { members });
    }

    let target = self
      .registry
      .lookup(name)
      .map_err(|_| ResolveError::UnknownTarget {
        name: name.to_string(),
        required_by: required_by.map(str::to_string),
      })?;

    walk.on_stack.insert(target.name());
    walk.path.push(target.name());

    for prerequisite in target.prerequisites() {
      self.visit(prerequisite, Some(target.name()), walk)?;
    }

    walk.path.pop();
    walk.on_stack.remove(target.name());
    walk.done.insert(target.name());
    walk.order.push(target);

    Ok(())
  }
}
