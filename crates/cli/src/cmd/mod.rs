//! Subcommand implementations and the setup they share.

mod check;
mod info;
mod list;
mod plan;
mod run;

use std::path::Path;

use anyhow::{Context, Result};

use relgraph_lib::config::ReleaseConfig;
use relgraph_lib::gate::{Environment, StaticEnvironment, SystemEnvironment};
use relgraph_lib::platform::{BuildPlatform, HostPlatform};
use relgraph_lib::release::release_registry;
use relgraph_lib::target::TargetRegistry;

use crate::output::print_warning;

pub use check::cmd_check;
pub use info::cmd_info;
pub use list::cmd_list;
pub use plan::cmd_plan;
pub use run::cmd_run;

/// A target failed during the run.
pub const EXIT_RUN_FAILED: u8 = 1;
/// Configuration, registration or resolution failed before anything ran.
pub const EXIT_SETUP_ERROR: u8 = 2;

pub(crate) fn load_config(path: Option<&Path>) -> Result<ReleaseConfig> {
  match path {
    Some(p) => ReleaseConfig::load(Some(p)).with_context(|| format!("Failed to load config: {}", p.display())),
    None => ReleaseConfig::load(None).context("Failed to load config"),
  }
}

pub(crate) fn load_registry(config: ReleaseConfig) -> Result<TargetRegistry> {
  release_registry(config).context("Failed to register release targets")
}

/// The detected host, or a representative host for `platform` when simulating.
pub(crate) fn environment(platform: Option<BuildPlatform>) -> Result<Box<dyn Environment>> {
  let host = HostPlatform::current().context("Unsupported host platform")?;
  Ok(match platform {
    Some(selector) => {
      let simulated = selector.representative_host(host.arch);
      print_warning(&format!(
        "Evaluating gates as {} (commands still run on {})",
        simulated, host
      ));
      Box::new(StaticEnvironment::from_process(simulated))
    }
    None => Box::new(SystemEnvironment::new(host)),
  })
}
