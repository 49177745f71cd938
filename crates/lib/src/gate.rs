//! Run-time eligibility predicates attached to targets.
//!
//! A gate never fails a target: when any gate on a target evaluates false the
//! target is skipped and the run carries on.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::platform::{BuildPlatform, HostPlatform};

/// The ambient state gates are evaluated against.
pub trait Environment {
  fn platform(&self) -> &HostPlatform;

  /// Observed value of an environment variable, `None` when unset.
  fn var(&self, name: &str) -> Option<String>;
}

/// The real host: detected platform plus the process environment.
#[derive(Debug, Clone)]
pub struct SystemEnvironment {
  platform: HostPlatform,
}

impl SystemEnvironment {
  pub fn new(platform: HostPlatform) -> Self {
    Self { platform }
  }

  /// Detect the running host. `None` on unsupported OS/arch combinations.
  pub fn detect() -> Option<Self> {
    HostPlatform::current().map(Self::new)
  }
}

impl Environment for SystemEnvironment {
  fn platform(&self) -> &HostPlatform {
    &self.platform
  }

  fn var(&self, name: &str) -> Option<String> {
    std::env::var(name).ok()
  }
}

/// A fixed platform with an explicit variable table.
#[derive(Debug, Clone)]
pub struct StaticEnvironment {
  platform: HostPlatform,
  vars: BTreeMap<String, String>,
}

impl StaticEnvironment {
  pub fn new(platform: HostPlatform) -> Self {
    Self {
      platform,
      vars: BTreeMap::new(),
    }
  }

  pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.vars.insert(name.into(), value.into());
    self
  }

  /// Snapshot the current process environment under a substitute platform.
  pub fn from_process(platform: HostPlatform) -> Self {
    Self {
      platform,
      vars: std::env::vars().collect(),
    }
  }
}

impl Environment for StaticEnvironment {
  fn platform(&self) -> &HostPlatform {
    &self.platform
  }

  fn var(&self, name: &str) -> Option<String> {
    self.vars.get(name).cloned()
  }
}

/// What an environment gate expects of its variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvExpectation {
  /// Unset or empty.
  Unset,
  /// Set and non-empty.
  Present,
  /// Set to exactly this string. An empty string matches a variable that is
  /// set but empty.
  Equals(String),
}

/// A predicate deciding whether a target may run on this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Gate {
  /// Host must belong to at least one of the listed platforms.
  Platform { allowed: Vec<BuildPlatform> },
  /// An environment variable must meet an expectation.
  Env { var: String, expect: EnvExpectation },
}

impl Gate {
  pub fn platforms(allowed: impl IntoIterator<Item = BuildPlatform>) -> Self {
    Self::Platform {
      allowed: allowed.into_iter().collect(),
    }
  }

  pub fn env_unset(var: impl Into<String>) -> Self {
    Self::Env {
      var: var.into(),
      expect: EnvExpectation::Unset,
    }
  }

  pub fn env_present(var: impl Into<String>) -> Self {
    Self::Env {
      var: var.into(),
      expect: EnvExpectation::Present,
    }
  }

  pub fn env_equals(var: impl Into<String>, value: impl Into<String>) -> Self {
    Self::Env {
      var: var.into(),
      expect: EnvExpectation::Equals(value.into()),
    }
  }
}

impl fmt::Display for Gate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Gate::Platform { allowed } => {
        let names: Vec<_> = allowed.iter().map(BuildPlatform::as_str).collect();
        write!(f, "platform in [{}]", names.join(", "))
      }
      Gate::Env { var, expect } => match expect {
        EnvExpectation::Unset => write!(f, "${var} unset"),
        EnvExpectation::Present => write!(f, "${var} set"),
        EnvExpectation::Equals(value) => write!(f, "${var} == '{value}'"),
      },
    }
  }
}

/// Outcome of checking every gate on a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
  Eligible,
  /// Reason names the first gate that failed.
  Blocked(String),
}

impl GateVerdict {
  pub fn is_eligible(&self) -> bool {
    matches!(self, GateVerdict::Eligible)
  }
}

/// Evaluate a single gate.
pub fn evaluate(gate: &Gate, env: &dyn Environment) -> bool {
  match gate {
    Gate::Platform { allowed } => allowed.iter().any(|p| p.matches(env.platform())),
    Gate::Env { var, expect } => {
      let observed = env.var(var);
      // Empty counts as unset for presence checks only.
      let present = observed.as_deref().is_some_and(|v| !v.is_empty());
      match expect {
        EnvExpectation::Unset => !present,
        EnvExpectation::Present => present,
        EnvExpectation::Equals(expected) => observed.as_deref() == Some(expected.as_str()),
      }
    }
  }
}

/// Evaluate all gates with AND semantics. No gates means eligible.
pub fn evaluate_all(gates: &[Gate], env: &dyn Environment) -> GateVerdict {
  match gates.iter().find(|gate| !evaluate(gate, env)) {
    None => GateVerdict::Eligible,
    Some(failed) => GateVerdict::Blocked(blocked_reason(failed, env)),
  }
}

fn blocked_reason(gate: &Gate, env: &dyn Environment) -> String {
  match gate {
    Gate::Platform { .. } => format!("requires {gate}, host is {}", env.platform()),
    Gate::Env { var, expect } => match env.var(var) {
      Some(value) if !value.is_empty() || matches!(expect, EnvExpectation::Equals(_)) => {
        format!("requires {gate}, found '{value}'")
      }
      _ => format!("requires {gate}, variable is unset"),
    },
  }
}
