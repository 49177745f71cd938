//! Target execution.
//!
//! This module provides the entry points for running a resolved plan. It handles:
//! - Gate evaluation per target (ineligible targets are skipped, never failed)
//! - Invoking each eligible body exactly once with the shared context
//! - Converting body errors and panics into that target's failure
//! - Halting the whole run on the first failure

pub mod dag;
pub mod resolver;
pub mod types;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::context::BuildContext;
use crate::gate::{Environment, GateVerdict, evaluate_all};
use crate::target::{Target, TargetContext, TargetRegistry};

pub use dag::ExecutionPlan;
pub use resolver::{ResolveError, Resolver};
pub use types::{RunFailure, RunReport, TargetOutcome, TargetRecord, TargetStatus};

/// Runs plans sequentially against one environment.
#[derive(Clone, Copy)]
pub struct Executor<'e> {
  env: &'e dyn Environment,
}

impl<'e> Executor<'e> {
  pub fn new(env: &'e dyn Environment) -> Self {
    Self { env }
  }

  /// Execute `plan` in order.
  ///
  /// Gated-out targets are recorded as skipped and the run continues. The first
  /// target that fails halts the run: every later target stays `Pending`,
  /// whether or not it depends on the failed one.
  pub fn run(&self, plan: &ExecutionPlan<'_>, context: &mut BuildContext) -> RunReport {
    info!(targets = plan.len(), platform = %self.env.platform(), "starting run");

    let mut report = RunReport {
      records: plan.iter().map(|t| TargetRecord::pending(t.name())).collect(),
      failure: None,
    };

    for (record, target) in report.records.iter_mut().zip(plan.iter()) {
      if let GateVerdict::Blocked(reason) = evaluate_all(target.gates(), self.env) {
        warn!(name = %target.name(), reason = %reason, "skipping target");
        record.finish(TargetOutcome::Skipped(reason), None);
        continue;
      }

      record.status = TargetStatus::Running;
      info!(name = %target.name(), "running target");

      let started = Instant::now();
      let outcome = invoke_guarded(target, context, self.env);
      let elapsed = started.elapsed();

      let failed_reason = match &outcome {
        TargetOutcome::Failure(reason) => Some(reason.clone()),
        _ => None,
      };
      record.finish(outcome, Some(elapsed));

      if let Some(reason) = failed_reason {
        error!(name = %target.name(), reason = %reason, "target failed, halting run");
        report.failure = Some(RunFailure {
          target: target.name().to_string(),
          reason,
        });
        break;
      }

      info!(name = %target.name(), duration_ms = elapsed.as_millis() as u64, "target succeeded");
    }

    info!(
      succeeded = report.count(TargetStatus::Succeeded),
      skipped = report.count(TargetStatus::Skipped),
      failed = report.count(TargetStatus::Failed),
      not_run = report.count(TargetStatus::Pending),
      "run complete"
    );

    report
  }
}

/// Resolve `roots` and run the plan.
///
/// Resolution errors are returned before any body executes. Execution errors
/// never surface as `Err`; they are part of the report.
pub fn request_run<S: AsRef<str>>(
  registry: &TargetRegistry,
  roots: &[S],
  context: &mut BuildContext,
  env: &dyn Environment,
) -> Result<RunReport, ResolveError> {
  let plan = Resolver::new(registry).resolve_all(roots)?;
  Ok(Executor::new(env).run(&plan, context))
}

/// Invoke a body, treating a panic like an explicit failure.
fn invoke_guarded(target: &Target, context: &mut BuildContext, env: &dyn Environment) -> TargetOutcome {
  let result = panic::catch_unwind(AssertUnwindSafe(|| {
    let mut ctx = TargetContext::new(target.name(), context, env);
    target.invoke(&mut ctx)
  }));

  match result {
    Ok(Ok(())) => TargetOutcome::Success,
    Ok(Err(err)) => {
      debug!(name = %target.name(), error = ?err, "target body returned an error");
      TargetOutcome::Failure(err.to_string())
    }
    Err(payload) => TargetOutcome::Failure(format!("target panicked: {}", panic_message(payload.as_ref()))),
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message
  } else {
    "unknown panic payload"
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;
  use std::rc::Rc;

  use tracing_test::traced_test;

  use super::*;
  use crate::gate::{Gate, StaticEnvironment};
  use crate::platform::arch::Arch;
  use crate::platform::os::{Distro, Os};
  use crate::platform::{BuildPlatform, HostPlatform};
  use crate::target::TargetError;

  type Calls = Rc<RefCell<Vec<String>>>;

  fn linux() -> StaticEnvironment {
    StaticEnvironment::new(HostPlatform::new(Os::Linux, Some(Distro::Ubuntu), Arch::X86_64))
  }

  fn macos() -> StaticEnvironment {
    StaticEnvironment::new(HostPlatform::new(Os::MacOs, None, Arch::Aarch64))
  }

  /// A target that records its invocation.
  fn tracked(name: &str, calls: &Calls) -> Target {
    let calls = calls.clone();
    let label = name.to_string();
    Target::new(name, move |_| {
      calls.borrow_mut().push(label.clone());
      Ok(())
    })
  }

  fn failing(name: &str, calls: &Calls, reason: &'static str) -> Target {
    let calls = calls.clone();
    let label = name.to_string();
    Target::new(name, move |_| {
      calls.borrow_mut().push(label.clone());
      Err(TargetError::failed(reason))
    })
  }

  /// Init -> Compile -> Package (Linux only)
  fn release_registry(calls: &Calls, compile_fails: bool) -> TargetRegistry {
    let mut registry = TargetRegistry::new();
    registry.register(tracked("Init", calls)).unwrap();
    let compile = if compile_fails {
      failing("Compile", calls, "compiler exited with status 1")
    } else {
      tracked("Compile", calls)
    };
    registry.register(compile.depends_on(["Init"])).unwrap();
    registry
      .register(
        tracked("Package", calls)
          .depends_on(["Compile"])
          .gated(Gate::platforms([BuildPlatform::Linux])),
      )
      .unwrap();
    registry
  }

  #[test]
  fn gated_target_is_skipped_on_other_platform() {
    let calls = Calls::default();
    let registry = release_registry(&calls, false);
    let mut context = BuildContext::new();

    let plan = Resolver::new(&registry).resolve("Package").unwrap();
    assert_eq!(plan.names(), vec!["Init", "Compile", "Package"]);

    let report = Executor::new(&macos()).run(&plan, &mut context);

    assert!(report.is_success());
    assert_eq!(report.status_of("Init"), Some(TargetStatus::Succeeded));
    assert_eq!(report.status_of("Compile"), Some(TargetStatus::Succeeded));
    assert_eq!(report.status_of("Package"), Some(TargetStatus::Skipped));
    assert_eq!(*calls.borrow(), vec!["Init", "Compile"]);
  }

  #[test]
  fn failure_halts_the_run() {
    let calls = Calls::default();
    let registry = release_registry(&calls, true);
    let mut context = BuildContext::new();

    let plan = Resolver::new(&registry).resolve("Package").unwrap();
    assert_eq!(plan.names(), vec!["Init", "Compile", "Package"]);

    let report = Executor::new(&linux()).run(&plan, &mut context);

    assert!(!report.is_success());
    assert_eq!(report.status_of("Init"), Some(TargetStatus::Succeeded));
    assert_eq!(report.status_of("Compile"), Some(TargetStatus::Failed));
    assert_eq!(report.status_of("Package"), Some(TargetStatus::Pending));
    assert_eq!(
      report.failure,
      Some(RunFailure {
        target: "Compile".to_string(),
        reason: "compiler exited with status 1".to_string(),
      })
    );
    assert_eq!(*calls.borrow(), vec!["Init", "Compile"]);
  }

  #[test]
  fn failure_halts_independent_targets_too() {
    let calls = Calls::default();
    let mut registry = TargetRegistry::new();
    registry.register(failing("Badge", &calls, "template missing")).unwrap();
    registry.register(tracked("Tarball", &calls)).unwrap();
    registry
      .register(tracked("Package", &calls).depends_on(["Badge", "Tarball"]))
      .unwrap();

    let mut context = BuildContext::new();
    let report = request_run(&registry, &["Package"], &mut context, &linux()).unwrap();

    assert_eq!(report.status_of("Tarball"), Some(TargetStatus::Pending));
    assert_eq!(*calls.borrow(), vec!["Badge"]);
  }

  #[test]
  fn skipping_does_not_halt() {
    let calls = Calls::default();
    let mut registry = TargetRegistry::new();
    registry
      .register(tracked("GenerateMsi", &calls).gated(Gate::platforms([BuildPlatform::Windows])))
      .unwrap();
    registry
      .register(tracked("GenerateDeb", &calls).gated(Gate::platforms([BuildPlatform::Ubuntu])))
      .unwrap();
    registry
      .register(tracked("GenerateInstaller", &calls).depends_on(["GenerateMsi", "GenerateDeb"]))
      .unwrap();

    let mut context = BuildContext::new();
    let report = request_run(&registry, &["GenerateInstaller"], &mut context, &linux()).unwrap();

    assert!(report.is_success());
    assert_eq!(report.names_with(TargetStatus::Skipped), vec!["GenerateMsi"]);
    assert_eq!(*calls.borrow(), vec!["GenerateDeb", "GenerateInstaller"]);
    assert!(report.record("GenerateMsi").unwrap().duration.is_none());
  }

  #[test]
  fn shared_prerequisite_runs_once_across_roots() {
    let calls = Calls::default();
    let mut registry = TargetRegistry::new();
    registry.register(tracked("Init", &calls)).unwrap();
    registry.register(tracked("Package", &calls).depends_on(["Init"])).unwrap();
    registry.register(tracked("Publish", &calls).depends_on(["Init"])).unwrap();

    let mut context = BuildContext::new();
    let report = request_run(&registry, &["Package", "Publish"], &mut context, &linux()).unwrap();

    assert!(report.is_success());
    assert_eq!(*calls.borrow(), vec!["Init", "Package", "Publish"]);
  }

  #[test]
  fn context_writes_are_visible_downstream() {
    let mut registry = TargetRegistry::new();
    registry
      .register(Target::new("A", |ctx| {
        ctx.set("V", "1.2.3")?;
        Ok(())
      }))
      .unwrap();
    registry
      .register(
        Target::new("B", |ctx| {
          let v: String = ctx.get("V")?;
          ctx.set("Seen", v)?;
          Ok(())
        })
        .depends_on(["A"]),
      )
      .unwrap();

    let mut context = BuildContext::new();
    let report = request_run(&registry, &["B"], &mut context, &linux()).unwrap();

    assert!(report.is_success());
    assert_eq!(context.get_str("Seen").unwrap(), "1.2.3");
  }

  #[test]
  fn reading_before_write_fails_the_reader() {
    let mut registry = TargetRegistry::new();
    registry
      .register(Target::new("Reader", |ctx| {
        let _: String = ctx.get("V")?;
        Ok(())
      }))
      .unwrap();
    registry
      .register(
        Target::new("Writer", |ctx| {
          ctx.set("V", "late")?;
          Ok(())
        })
        .depends_on(["Reader"]),
      )
      .unwrap();

    let mut context = BuildContext::new();
    let report = request_run(&registry, &["Writer"], &mut context, &linux()).unwrap();

    assert!(!report.is_success());
    let failure = report.failure.unwrap();
    assert_eq!(failure.target, "Reader");
    assert_eq!(failure.reason, "context key 'V' was never set");
    assert!(!context.has("V"));
  }

  #[test]
  fn initial_context_is_visible_to_first_target() {
    let mut registry = TargetRegistry::new();
    registry
      .register(Target::new("Init", |ctx| {
        let configuration = ctx.get_str("Configuration")?.to_lowercase();
        ctx.set("ConfigurationLower", configuration)?;
        Ok(())
      }))
      .unwrap();

    let mut context = BuildContext::new();
    context.set("Configuration", "Release").unwrap();
    let report = request_run(&registry, &["Init"], &mut context, &linux()).unwrap();

    assert!(report.is_success());
    assert_eq!(context.get_str("ConfigurationLower").unwrap(), "release");
  }

  #[test]
  fn panic_is_converted_to_failure() {
    let calls = Calls::default();
    let mut registry = TargetRegistry::new();
    registry
      .register(Target::new("Explode", |_| panic!("disk on fire")))
      .unwrap();
    registry
      .register(tracked("After", &calls).depends_on(["Explode"]))
      .unwrap();

    let mut context = BuildContext::new();
    let report = request_run(&registry, &["After"], &mut context, &linux()).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.status_of("Explode"), Some(TargetStatus::Failed));
    assert_eq!(
      report.failure.unwrap().reason,
      "target panicked: disk on fire"
    );
    assert!(calls.borrow().is_empty());
  }

  #[test]
  fn formatted_panic_message_is_kept() {
    let mut registry = TargetRegistry::new();
    let code = 3;
    registry
      .register(Target::new("Explode", move |_| panic!("exit {code}")))
      .unwrap();

    let mut context = BuildContext::new();
    let report = request_run(&registry, &["Explode"], &mut context, &linux()).unwrap();
    assert_eq!(report.failure.unwrap().reason, "target panicked: exit 3");
  }

  #[test]
  fn unknown_target_runs_nothing() {
    let calls = Calls::default();
    let mut registry = TargetRegistry::new();
    registry.register(tracked("Init", &calls)).unwrap();

    let mut context = BuildContext::new();
    let err = request_run(&registry, &["Init", "Deploy"], &mut context, &linux()).unwrap_err();

    assert!(matches!(err, ResolveError::UnknownTarget { ref name, .. } if name == "Deploy"));
    assert!(calls.borrow().is_empty());
  }

  #[test]
  fn cycle_runs_nothing() {
    let calls = Calls::default();
    let mut registry = TargetRegistry::new();
    registry.register(tracked("A", &calls).depends_on(["B"])).unwrap();
    registry.register(tracked("B", &calls).depends_on(["C"])).unwrap();
    registry.register(tracked("C", &calls).depends_on(["A"])).unwrap();

    let mut context = BuildContext::new();
    let err = request_run(&registry, &["A"], &mut context, &linux()).unwrap_err();

    assert!(matches!(err, ResolveError::Cycle { .. }));
    assert!(calls.borrow().is_empty());
  }

  #[test]
  fn env_gate_skips_when_variable_set() {
    let calls = Calls::default();
    let mut registry = TargetRegistry::new();
    registry
      .register(tracked("Package", &calls).gated(Gate::env_unset("SKIP_PACKAGING")))
      .unwrap();

    let env = linux().with_var("SKIP_PACKAGING", "true");
    let mut context = BuildContext::new();
    let report = request_run(&registry, &["Package"], &mut context, &env).unwrap();

    assert!(report.is_success());
    assert_eq!(
      report.record("Package").unwrap().reason.as_deref(),
      Some("requires $SKIP_PACKAGING unset, found 'true'")
    );
    assert!(calls.borrow().is_empty());
  }

  #[test]
  fn succeeded_targets_record_duration() {
    let calls = Calls::default();
    let mut registry = TargetRegistry::new();
    registry.register(tracked("Init", &calls)).unwrap();

    let mut context = BuildContext::new();
    let report = request_run(&registry, &["Init"], &mut context, &linux()).unwrap();
    assert!(report.record("Init").unwrap().duration.is_some());
  }

  #[test]
  #[traced_test]
  fn skip_and_failure_are_logged() {
    let calls = Calls::default();
    let mut registry = TargetRegistry::new();
    registry
      .register(tracked("GenerateMsi", &calls).gated(Gate::platforms([BuildPlatform::Windows])))
      .unwrap();
    registry
      .register(failing("Compile", &calls, "boom").depends_on(["GenerateMsi"]))
      .unwrap();

    let mut context = BuildContext::new();
    request_run(&registry, &["Compile"], &mut context, &linux()).unwrap();

    assert!(logs_contain("skipping target"));
    assert!(logs_contain("target failed, halting run"));
    assert!(logs_contain("run complete"));
  }
}
