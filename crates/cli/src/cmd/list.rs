//! Implementation of the `relgraph list` command.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use owo_colors::{OwoColorize, Stream};

use relgraph_lib::target::TargetSummary;

use super::{load_config, load_registry};
use crate::output::{OutputFormat, print_json};

pub fn cmd_list(config: Option<&Path>, output: OutputFormat) -> Result<ExitCode> {
  let registry = load_registry(load_config(config)?)?;

  if output.is_json() {
    let summaries: Vec<TargetSummary<'_>> = registry.iter().map(|t| t.summary()).collect();
    print_json(&summaries)?;
    return Ok(ExitCode::SUCCESS);
  }

  for target in registry.iter() {
    match target.description() {
      Some(desc) => println!(
        "{:<24} {}",
        target.name().if_supports_color(Stream::Stdout, |s| s.bold()),
        desc
      ),
      None => println!("{}", target.name().if_supports_color(Stream::Stdout, |s| s.bold())),
    }
    if !target.prerequisites().is_empty() {
      println!(
        "  {} {}",
        "after:".if_supports_color(Stream::Stdout, |s| s.dimmed()),
        target.prerequisites().join(", ")
      );
    }
    for gate in target.gates() {
      println!("  {} {}", "only if:".if_supports_color(Stream::Stdout, |s| s.dimmed()), gate);
    }
  }

  Ok(ExitCode::SUCCESS)
}
