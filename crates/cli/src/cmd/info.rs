use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};

use relgraph_lib::platform::HostPlatform;

use super::load_config;
use crate::output::{OutputFormat, print_json, print_stat};

pub fn cmd_info(config: Option<&Path>, output: OutputFormat) -> Result<ExitCode> {
  let host = HostPlatform::current().context("Unsupported host platform")?;
  let config = load_config(config)?;
  let distro = host.distro.as_ref().map(|d| d.to_string());

  if output.is_json() {
    print_json(&serde_json::json!({
      "platform": host.triple(),
      "os": host.os.as_str(),
      "distro": distro,
      "arch": host.arch.as_str(),
      "configuration": config.configuration,
      "output_dir": config.output_dir(),
    }))?;
    return Ok(ExitCode::SUCCESS);
  }

  println!("System:");
  print_stat("Platform", &host.triple());
  print_stat("OS", host.os.as_str());
  print_stat("Distribution", distro.as_deref().unwrap_or("-"));
  print_stat("Arch", host.arch.as_str());
  println!();
  println!("Release:");
  print_stat("Configuration", &config.configuration);
  print_stat("Output", &config.output_dir().display().to_string());
  Ok(ExitCode::SUCCESS)
}
