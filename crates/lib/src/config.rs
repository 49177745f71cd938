//! Release configuration.
//!
//! Settings come from three layers, later ones winning:
//! 1. Built-in defaults
//! 2. `relgraph.toml` (explicit path, or the current directory when present)
//! 3. `RELGRAPH_*` environment variables
//!
//! Relative directories are resolved against the directory holding the config
//! file (or the current directory when there is no file).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

use crate::release::version::BuildVersion;

/// File looked up in the current directory when no path is given.
pub const CONFIG_FILE_NAME: &str = "relgraph.toml";

pub const ENV_CONFIGURATION: &str = "RELGRAPH_CONFIGURATION";
pub const ENV_OUTPUT_DIR: &str = "RELGRAPH_OUTPUT_DIR";
pub const ENV_COMMAND_TIMEOUT: &str = "RELGRAPH_COMMAND_TIMEOUT";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid product version '{version}': {source}")]
  InvalidVersion {
    version: String,
    #[source]
    source: semver::Error,
  },

  #[error("invalid command timeout '{value}': {source}")]
  InvalidTimeout {
    value: String,
    #[source]
    source: humantime::DurationError,
  },
}

/// Top-level release settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseConfig {
  /// Build configuration name passed to every script (e.g. "Debug", "Release").
  pub configuration: String,

  /// Deadline applied to every external command, e.g. "30m".
  #[serde(deserialize_with = "deserialize_timeout")]
  pub command_timeout: Option<Duration>,

  pub product: ProductConfig,
  pub dirs: DirsConfig,
  pub commands: CommandsConfig,
  pub scripts: ScriptsConfig,

  /// Directory relative paths are resolved against. Not read from the file.
  #[serde(skip)]
  pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProductConfig {
  pub name: String,
  /// Semantic version; a pre-release part becomes the version suffix.
  pub version: String,
  /// Overrides the pre-release part of `version` when set.
  pub suffix: Option<String>,
  pub commit_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirsConfig {
  pub repo_root: PathBuf,
  pub output: PathBuf,
  /// SVG template for the version badge; a built-in template is used when unset.
  pub badge_template: Option<PathBuf>,
}

/// Commands given as argv arrays.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandsConfig {
  pub compile: Vec<String>,
  /// Invoked once per published file, with the file path appended. Falls back
  /// to `scripts.publish` when empty.
  pub publish: Vec<String>,
}

/// Packaging scripts, relative to the repository root.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptsConfig {
  pub msi: PathBuf,
  pub pkg: PathBuf,
  pub deb: PathBuf,
  pub nuget: PathBuf,
  pub publish: PathBuf,
}

impl Default for ReleaseConfig {
  fn default() -> Self {
    Self {
      configuration: "Debug".to_string(),
      command_timeout: None,
      product: ProductConfig::default(),
      dirs: DirsConfig::default(),
      commands: CommandsConfig::default(),
      scripts: ScriptsConfig::default(),
      base_dir: PathBuf::from("."),
    }
  }
}

impl Default for ProductConfig {
  fn default() -> Self {
    Self {
      name: "relgraph".to_string(),
      version: "0.1.0".to_string(),
      suffix: None,
      commit_count: 0,
    }
  }
}

impl Default for DirsConfig {
  fn default() -> Self {
    Self {
      repo_root: PathBuf::from("."),
      output: PathBuf::from("artifacts"),
      badge_template: None,
    }
  }
}

impl Default for ScriptsConfig {
  fn default() -> Self {
    Self {
      msi: PathBuf::from("packaging/windows/generatemsi.ps1"),
      pkg: PathBuf::from("packaging/osx/package-osx.sh"),
      deb: PathBuf::from("scripts/package/package-debian.sh"),
      nuget: PathBuf::from("packaging/nuget/package.ps1"),
      publish: PathBuf::from("scripts/publish/publish.sh"),
    }
  }
}

fn deserialize_timeout<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
  let raw: Option<String> = Option::deserialize(deserializer)?;
  raw
    .map(|value| humantime::parse_duration(&value).map_err(serde::de::Error::custom))
    .transpose()
}

impl ReleaseConfig {
  /// Load configuration.
  ///
  /// With `path`, the file must exist. Without it, `relgraph.toml` in the
  /// current directory is used when present and defaults otherwise.
  pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
    let candidate = match path {
      Some(p) => Some(p.to_path_buf()),
      None => Some(PathBuf::from(CONFIG_FILE_NAME)).filter(|p| p.is_file()),
    };

    let mut config = match candidate {
      Some(p) => Self::from_file(&p)?,
      None => {
        debug!("no config file found, using defaults");
        Self::default()
      }
    };

    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
  }

  /// Parse a config file without applying environment overrides.
  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let mut config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    config.base_dir = dunce::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf());
    debug!(path = %path.display(), base_dir = %config.base_dir.display(), "loaded config file");
    Ok(config)
  }

  pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(content)
  }

  /// Apply `RELGRAPH_*` overrides from the process environment.
  pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
    if let Some(configuration) = env_non_empty(ENV_CONFIGURATION) {
      self.configuration = configuration;
    }
    if let Some(output) = env_non_empty(ENV_OUTPUT_DIR) {
      self.dirs.output = PathBuf::from(output);
    }
    if let Some(value) = env_non_empty(ENV_COMMAND_TIMEOUT) {
      let timeout = humantime::parse_duration(&value).map_err(|source| ConfigError::InvalidTimeout { value, source })?;
      self.command_timeout = Some(timeout);
    }
    Ok(())
  }

  /// Check settings that can only be verified after all layers are applied.
  pub fn validate(&self) -> Result<(), ConfigError> {
    self.build_version().map(|_| ())
  }

  /// Version record derived from `[product]`.
  pub fn build_version(&self) -> Result<BuildVersion, ConfigError> {
    BuildVersion::from_product(&self.product)
  }

  fn resolve(&self, path: &Path) -> PathBuf {
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.base_dir.join(path)
    }
  }

  pub fn repo_root(&self) -> PathBuf {
    self.resolve(&self.dirs.repo_root)
  }

  pub fn output_dir(&self) -> PathBuf {
    self.resolve(&self.dirs.output)
  }

  /// Resolve a script path against the repository root.
  pub fn script_path(&self, script: &Path) -> PathBuf {
    if script.is_absolute() {
      script.to_path_buf()
    } else {
      self.repo_root().join(script)
    }
  }
}

fn env_non_empty(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.is_empty())
}
