//! Implementation of the `relgraph run` command.
//!
//! Resolves the requested targets, executes the plan once, and maps the
//! aggregate report to an exit code.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use relgraph_lib::context::BuildContext;
use relgraph_lib::execute::request_run;
use relgraph_lib::platform::BuildPlatform;

use super::{EXIT_RUN_FAILED, environment, load_config, load_registry};
use crate::output::{OutputFormat, print_info, print_json, print_report};

pub fn cmd_run(
  config: Option<&Path>,
  targets: &[String],
  overrides: &[(String, String)],
  platform: Option<BuildPlatform>,
  output: OutputFormat,
) -> Result<ExitCode> {
  let config = load_config(config)?;
  let env = environment(platform)?;
  let registry = load_registry(config)?;

  let mut context = BuildContext::new();
  for (key, value) in overrides {
    debug!(key = %key, value = %value, "seeding context");
    context.set_value(key.clone(), Value::String(value.clone()));
  }

  if !output.is_json() {
    print_info(&format!("Running {} on {}", targets.join(", "), env.platform()));
  }

  let report =
    request_run(&registry, targets, &mut context, &*env).with_context(|| format!("Failed to resolve {}", targets.join(", ")))?;

  if output.is_json() {
    print_json(&report)?;
  } else {
    print_report(&report);
  }

  if report.is_success() {
    Ok(ExitCode::SUCCESS)
  } else {
    Ok(ExitCode::from(EXIT_RUN_FAILED))
  }
}
