//! Types describing a single build target.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::context::{BuildContext, ContextError};
use crate::gate::{Environment, Gate};
use crate::platform::HostPlatform;
use crate::process::CmdError;

/// Errors a target body can report. Any of them marks the target Failed.
#[derive(Debug, Error)]
pub enum TargetError {
  /// The body explicitly reported failure.
  #[error("{0}")]
  Failed(String),

  /// A context read or write failed (e.g. a key that was never set).
  #[error(transparent)]
  Context(#[from] ContextError),

  /// An external command failed, timed out, or could not be spawned.
  #[error(transparent)]
  Cmd(#[from] CmdError),

  /// Filesystem work inside the body failed.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl TargetError {
  pub fn failed(reason: impl Into<String>) -> Self {
    Self::Failed(reason.into())
  }
}

/// The body of a target.
pub type TargetFn = dyn Fn(&mut TargetContext<'_>) -> Result<(), TargetError>;

/// What a body sees while it runs: its own name, the host, and the shared context.
pub struct TargetContext<'a> {
  name: &'a str,
  context: &'a mut BuildContext,
  env: &'a dyn Environment,
}

impl<'a> TargetContext<'a> {
  pub fn new(name: &'a str, context: &'a mut BuildContext, env: &'a dyn Environment) -> Self {
    Self { name, context, env }
  }

  /// Name of the running target.
  pub fn name(&self) -> &str {
    self.name
  }

  pub fn platform(&self) -> &HostPlatform {
    self.env.platform()
  }

  /// Read an environment variable through the same source gates use.
  pub fn env_var(&self, name: &str) -> Option<String> {
    self.env.var(name)
  }

  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, ContextError> {
    self.context.get(key)
  }

  pub fn get_str(&self, key: &str) -> Result<&str, ContextError> {
    self.context.get_str(key)
  }

  pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<(), ContextError> {
    self.context.set(key, value)
  }

  pub fn has(&self, key: &str) -> bool {
    self.context.has(key)
  }

  pub fn context(&self) -> &BuildContext {
    &*self.context
  }
}

/// A named unit of release work.
pub struct Target {
  name: String,
  description: Option<String>,
  prerequisites: Vec<String>,
  gates: Vec<Gate>,
  body: Box<TargetFn>,
}

impl Target {
  pub fn new<F>(name: impl Into<String>, body: F) -> Self
  where
    F: Fn(&mut TargetContext<'_>) -> Result<(), TargetError> + 'static,
  {
    Self {
      name: name.into(),
      description: None,
      prerequisites: Vec::new(),
      gates: Vec::new(),
      body: Box::new(body),
    }
  }

  /// Append prerequisites. Declaration order is the resolution order.
  pub fn depends_on<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.prerequisites.extend(names.into_iter().map(Into::into));
    self
  }

  /// Attach a gate. All gates must pass for the target to run.
  pub fn gated(mut self, gate: Gate) -> Self {
    self.gates.push(gate);
    self
  }

  pub fn describe(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn description(&self) -> Option<&str> {
    self.description.as_deref()
  }

  pub fn prerequisites(&self) -> &[String] {
    &self.prerequisites
  }

  pub fn gates(&self) -> &[Gate] {
    &self.gates
  }

  /// Invoke the body.
  pub fn invoke(&self, ctx: &mut TargetContext<'_>) -> Result<(), TargetError> {
    (self.body)(ctx)
  }

  pub fn summary(&self) -> TargetSummary<'_> {
    TargetSummary {
      name: &self.name,
      description: self.description.as_deref(),
      prerequisites: &self.prerequisites,
      gates: &self.gates,
    }
  }
}

impl fmt::Debug for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Target")
      .field("name", &self.name)
      .field("prerequisites", &self.prerequisites)
      .field("gates", &self.gates)
      .finish_non_exhaustive()
  }
}

/// Serializable view of a target declaration.
#[derive(Debug, Clone, Serialize)]
pub struct TargetSummary<'a> {
  pub name: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<&'a str>,
  pub prerequisites: &'a [String],
  pub gates: &'a [Gate],
}
