use std::fmt;
use std::path::Path;

/// Operating system families a release can be produced on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "osx",
      Self::Windows => "windows",
    }
  }

  /// Short name used in product monikers (e.g. `relgraph-win-x64.1.0.0`)
  pub fn moniker(&self) -> &'static str {
    match self {
      Self::Windows => "win",
      other => other.as_str(),
    }
  }

  pub fn is_unix(&self) -> bool {
    matches!(self, Self::Linux | Self::MacOs)
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Linux distributions that installers are produced for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Distro {
  Ubuntu,
  Debian,
  CentOs,
  Fedora,
  /// Any other `ID=` value from os-release, kept verbatim.
  Other(String),
}

impl Distro {
  /// Map an os-release `ID` value onto a known distribution
  pub fn from_id(id: &str) -> Self {
    match id.trim().trim_matches('"').to_ascii_lowercase().as_str() {
      "ubuntu" => Self::Ubuntu,
      "debian" => Self::Debian,
      "centos" => Self::CentOs,
      "fedora" => Self::Fedora,
      other => Self::Other(other.to_string()),
    }
  }

  /// Detect the distribution of the running Linux host.
  ///
  /// Returns `None` on non-Linux hosts or when `/etc/os-release` is unreadable.
  pub fn current() -> Option<Self> {
    if Os::current() != Some(Os::Linux) {
      return None;
    }
    Self::from_os_release(Path::new("/etc/os-release"))
  }

  /// Read the `ID=` line of an os-release file
  pub fn from_os_release(path: &Path) -> Option<Self> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_os_release_id(&content).map(|id| Self::from_id(&id))
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::Ubuntu => "ubuntu",
      Self::Debian => "debian",
      Self::CentOs => "centos",
      Self::Fedora => "fedora",
      Self::Other(id) => id,
    }
  }
}

impl fmt::Display for Distro {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

fn parse_os_release_id(content: &str) -> Option<String> {
  content
    .lines()
    .filter_map(|line| line.trim().strip_prefix("ID="))
    .map(|value| value.trim().trim_matches('"').to_string())
    .find(|value| !value.is_empty())
}
