//! Outcome and bookkeeping types for a run.

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

/// Per-target execution record state.
///
/// Every planned target starts `Pending`. `Skipped`, `Succeeded` and `Failed`
/// are terminal. A target left `Pending` at the end of a run was never
/// attempted because an earlier target failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
  Pending,
  Running,
  Succeeded,
  Failed,
  Skipped,
}

impl TargetStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Running => "running",
      Self::Succeeded => "succeeded",
      Self::Failed => "failed",
      Self::Skipped => "skipped",
    }
  }
}

impl fmt::Display for TargetStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// The result one target produced. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
  Success,
  Failure(String),
  Skipped(String),
}

impl TargetOutcome {
  pub fn status(&self) -> TargetStatus {
    match self {
      Self::Success => TargetStatus::Succeeded,
      Self::Failure(_) => TargetStatus::Failed,
      Self::Skipped(_) => TargetStatus::Skipped,
    }
  }

  pub fn reason(&self) -> Option<&str> {
    match self {
      Self::Success => None,
      Self::Failure(reason) | Self::Skipped(reason) => Some(reason),
    }
  }
}

/// Bookkeeping for one planned target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetRecord {
  pub name: String,
  pub status: TargetStatus,
  /// Failure or skip reason.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  /// Time spent in the body; `None` when the body never ran.
  #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
  pub duration: Option<Duration>,
}

impl TargetRecord {
  pub fn pending(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      status: TargetStatus::Pending,
      reason: None,
      duration: None,
    }
  }

  pub(crate) fn finish(&mut self, outcome: TargetOutcome, duration: Option<Duration>) {
    self.status = outcome.status();
    self.reason = outcome.reason().map(str::to_string);
    self.duration = duration;
  }
}

fn serialize_millis<S: Serializer>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
  match duration {
    Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
    None => serializer.serialize_none(),
  }
}

/// The target that halted a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
  pub target: String,
  pub reason: String,
}

impl fmt::Display for RunFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "target '{}' failed: {}", self.target, self.reason)
  }
}

/// Aggregate result of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
  /// One record per planned target, in plan order.
  pub records: Vec<TargetRecord>,

  /// The first (and only) failed target, if any.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub failure: Option<RunFailure>,
}

impl RunReport {
  /// Success iff no target reached `Failed`. Skipped targets do not count against it.
  pub fn is_success(&self) -> bool {
    self.failure.is_none() && !self.records.iter().any(|r| r.status == TargetStatus::Failed)
  }

  pub fn record(&self, name: &str) -> Option<&TargetRecord> {
    self.records.iter().find(|r| r.name == name)
  }

  pub fn status_of(&self, name: &str) -> Option<TargetStatus> {
    self.record(name).map(|r| r.status)
  }

  /// Names of targets in `status`, in plan order.
  pub fn names_with(&self, status: TargetStatus) -> Vec<&str> {
    self
      .records
      .iter()
      .filter(|r| r.status == status)
      .map(|r| r.name.as_str())
      .collect()
  }

  pub fn count(&self, status: TargetStatus) -> usize {
    self.records.iter().filter(|r| r.status == status).count()
  }

  /// Total time spent inside target bodies.
  pub fn total_duration(&self) -> Duration {
    self.records.iter().filter_map(|r| r.duration).sum()
  }
}
