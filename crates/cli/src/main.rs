mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use relgraph_lib::platform::BuildPlatform;

use crate::output::{OutputFormat, print_error};

/// relgraph - Run release targets as a dependency graph
#[derive(Parser)]
#[command(name = "relgraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Path to the release configuration (default: ./relgraph.toml when present)
  #[arg(short, long, global = true, value_name = "PATH")]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Resolve and execute targets
  Run {
    /// Targets to run, in order
    #[arg(required = true)]
    targets: Vec<String>,

    /// Seed a context value before the run
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    set: Vec<(String, String)>,

    /// Pretend to run on this platform when evaluating gates
    #[arg(short, long)]
    platform: Option<BuildPlatform>,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Show the resolved order and gate verdicts without executing
  Plan {
    #[arg(required = true)]
    targets: Vec<String>,

    /// Group targets into levels of mutually independent targets
    #[arg(long, conflicts_with = "dot")]
    levels: bool,

    /// Print the plan graph in Graphviz DOT format
    #[arg(long)]
    dot: bool,

    #[arg(short, long)]
    platform: Option<BuildPlatform>,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// List registered targets
  List {
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Validate the configuration and every target's prerequisites
  Check,

  /// Show the detected host platform
  Info {
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
}

fn parse_key_val(s: &str) -> Result<(String, String)> {
  match s.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
    _ => bail!("expected KEY=VALUE, got '{}'", s),
  }
}

fn init_tracing(verbose: bool) {
  let default_level = if verbose { "info" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let config = cli.config.as_deref();
  let result = match cli.command {
    Commands::Run {
      targets,
      set,
      platform,
      output,
    } => cmd::cmd_run(config, &targets, &set, platform, output),
    Commands::Plan {
      targets,
      levels,
      dot,
      platform,
      output,
    } => cmd::cmd_plan(config, &targets, levels, dot, platform, output),
    Commands::List { output } => cmd::cmd_list(config, output),
    Commands::Check => cmd::cmd_check(config),
    Commands::Info { output } => cmd::cmd_info(config, output),
  };

  match result {
    Ok(code) => code,
    Err(err) => {
      print_error(&format!("{:#}", err));
      ExitCode::from(cmd::EXIT_SETUP_ERROR)
    }
  }
}
