//! Implementation of the `relgraph plan` command.
//!
//! Resolves the requested targets and shows what a run would do on this host
//! without invoking any target body.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use relgraph_lib::execute::Resolver;
use relgraph_lib::gate::{GateVerdict, evaluate_all};
use relgraph_lib::platform::BuildPlatform;

use super::{environment, load_config, load_registry};
use crate::output::{OutputFormat, print_info, print_json, symbols};

#[derive(Serialize)]
struct PlannedTarget<'a> {
  name: &'a str,
  will_run: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  skip_reason: Option<String>,
}

#[derive(Serialize)]
struct PlanOutput<'a> {
  platform: String,
  targets: Vec<PlannedTarget<'a>>,
  levels: Vec<Vec<&'a str>>,
}

pub fn cmd_plan(
  config: Option<&Path>,
  targets: &[String],
  levels: bool,
  dot: bool,
  platform: Option<BuildPlatform>,
  output: OutputFormat,
) -> Result<ExitCode> {
  let config = load_config(config)?;
  let env = environment(platform)?;
  let registry = load_registry(config)?;

  let plan = Resolver::new(&registry)
    .resolve_all(targets)
    .with_context(|| format!("Failed to resolve {}", targets.join(", ")))?;

  if dot {
    print!("{}", plan.to_dot());
    return Ok(ExitCode::SUCCESS);
  }

  let planned: Vec<PlannedTarget<'_>> = plan
    .iter()
    .map(|target| match evaluate_all(target.gates(), &*env) {
      GateVerdict::Eligible => PlannedTarget {
        name: target.name(),
        will_run: true,
        skip_reason: None,
      },
      GateVerdict::Blocked(reason) => PlannedTarget {
        name: target.name(),
        will_run: false,
        skip_reason: Some(reason),
      },
    })
    .collect();

  let waves: Vec<Vec<&str>> = plan
    .levels()
    .iter()
    .map(|level| level.iter().map(|t| t.name()).collect())
    .collect();

  if output.is_json() {
    print_json(&PlanOutput {
      platform: env.platform().to_string(),
      targets: planned,
      levels: waves,
    })?;
    return Ok(ExitCode::SUCCESS);
  }

  print_info(&format!("Plan for {} on {}", targets.join(", "), env.platform()));
  println!();

  if levels {
    for (i, wave) in waves.iter().enumerate() {
      println!("  Level {}: {}", i + 1, wave.join(", "));
    }
    return Ok(ExitCode::SUCCESS);
  }

  for (i, target) in planned.iter().enumerate() {
    match &target.skip_reason {
      None => println!(
        "  {:>2}. {} {}",
        i + 1,
        symbols::ARROW.if_supports_color(Stream::Stdout, |s| s.green()),
        target.name
      ),
      Some(reason) => println!(
        "  {:>2}. {} {} {}",
        i + 1,
        symbols::SKIP.if_supports_color(Stream::Stdout, |s| s.yellow()),
        target.name,
        format!("(skip: {})", reason).if_supports_color(Stream::Stdout, |s| s.dimmed())
      ),
    }
  }

  let runnable = planned.iter().filter(|t| t.will_run).count();
  println!();
  println!("{} of {} target(s) would run", runnable, planned.len());

  Ok(ExitCode::SUCCESS)
}
