//! The catalog of declared targets.

use indexmap::IndexMap;
use indexmap::map::Entry;
use thiserror::Error;
use tracing::debug;

use super::types::Target;
use crate::execute::resolver::{ResolveError, Resolver};

/// Errors raised while building or querying the registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
  #[error("target names must not be empty")]
  EmptyName,

  #[error("target '{0}' is already registered")]
  DuplicateName(String),

  #[error("unknown target '{0}'")]
  UnknownTarget(String),
}

/// All declared targets, in registration order.
///
/// Built once at startup; read-only afterwards.
#[derive(Debug, Default)]
pub struct TargetRegistry {
  targets: IndexMap<String, Target>,
}

impl TargetRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a target.
  ///
  /// # Errors
  ///
  /// `EmptyName` for an empty name, `DuplicateName` if the name is taken.
  pub fn register(&mut self, target: Target) -> Result<(), RegistryError> {
    if target.name().is_empty() {
      return Err(RegistryError::EmptyName);
    }

    match self.targets.entry(target.name().to_string()) {
      Entry::Occupied(entry) => Err(RegistryError::DuplicateName(entry.key().clone())),
      Entry::Vacant(entry) => {
        debug!(name = %entry.key(), prerequisites = ?target.prerequisites(), "registered target");
        entry.insert(target);
        Ok(())
      }
    }
  }

  /// Find a target by name.
  pub fn lookup(&self, name: &str) -> Result<&Target, RegistryError> {
    self
      .targets
      .get(name)
      .ok_or_else(|| RegistryError::UnknownTarget(name.to_string()))
  }

  /// Every registered name, in registration order.
  pub fn all_names(&self) -> Vec<&str> {
    self.targets.keys().map(String::as_str).collect()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Target> {
    self.targets.values()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.targets.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.targets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.targets.is_empty()
  }

  /// Check that every target resolves: no unknown prerequisites, no cycles.
  pub fn validate(&self) -> Result<(), ResolveError> {
    let resolver = Resolver::new(self);
    for name in self.targets.keys() {
      resolver.resolve(name)?;
    }
    Ok(())
  }
}
