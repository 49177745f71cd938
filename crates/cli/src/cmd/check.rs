//! Implementation of the `relgraph check` command.
//!
//! Loads the configuration and resolves every registered target, reporting the
//! first unknown prerequisite or cycle.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};

use super::{load_config, load_registry};
use crate::output::{print_stat, print_success};

pub fn cmd_check(config: Option<&Path>) -> Result<ExitCode> {
  let config = load_config(config)?;
  let version = config.build_version().context("Invalid product version")?;
  let product = config.product.name.clone();
  let registry = load_registry(config)?;

  registry.validate().context("Target graph is invalid")?;

  print_success(&format!("{} target(s), no unknown prerequisites or cycles", registry.len()));
  print_stat("Product", &product);
  print_stat("Version", &version.simple_version());
  Ok(ExitCode::SUCCESS)
}
