//! Host platform detection and the platform selectors targets are gated on.

pub mod arch;
pub mod os;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use arch::Arch;
use os::{Distro, Os};

/// The platform the harness is running on (e.g. "linux-ubuntu-x64")
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPlatform {
  pub os: Os,
  /// Linux distribution, `None` elsewhere or when undetectable.
  pub distro: Option<Distro>,
  pub arch: Arch,
}

impl HostPlatform {
  /// Create a new platform identifier
  pub fn new(os: Os, distro: Option<Distro>, arch: Arch) -> Self {
    Self { os, distro, arch }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      os: Os::current()?,
      distro: Distro::current(),
      arch: Arch::current()?,
    })
  }

  /// Returns the platform identifier (e.g. "linux-ubuntu-x64", "osx-arm64")
  pub fn triple(&self) -> String {
    match &self.distro {
      Some(distro) => format!("{}-{}-{}", self.os, distro, self.arch),
      None => format!("{}-{}", self.os, self.arch),
    }
  }
}

impl fmt::Display for HostPlatform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

/// A platform selector used by platform gates.
///
/// Selectors overlap on purpose: `Ubuntu` is also `Linux`, and `Linux` is also `Unix`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildPlatform {
  Windows,
  #[serde(rename = "osx")]
  MacOs,
  Linux,
  Ubuntu,
  Debian,
  #[serde(rename = "centos")]
  CentOs,
  Fedora,
  Unix,
}

impl BuildPlatform {
  pub const ALL: [BuildPlatform; 8] = [
    Self::Windows,
    Self::MacOs,
    Self::Linux,
    Self::Ubuntu,
    Self::Debian,
    Self::CentOs,
    Self::Fedora,
    Self::Unix,
  ];

  /// Whether `host` belongs to this selector
  pub fn matches(&self, host: &HostPlatform) -> bool {
    match self {
      Self::Windows => host.os == Os::Windows,
      Self::MacOs => host.os == Os::MacOs,
      Self::Linux => host.os == Os::Linux,
      Self::Unix => host.os.is_unix(),
      Self::Ubuntu => host.os == Os::Linux && host.distro == Some(Distro::Ubuntu),
      Self::Debian => host.os == Os::Linux && host.distro == Some(Distro::Debian),
      Self::CentOs => host.os == Os::Linux && host.distro == Some(Distro::CentOs),
      Self::Fedora => host.os == Os::Linux && host.distro == Some(Distro::Fedora),
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Windows => "windows",
      Self::MacOs => "osx",
      Self::Linux => "linux",
      Self::Ubuntu => "ubuntu",
      Self::Debian => "debian",
      Self::CentOs => "centos",
      Self::Fedora => "fedora",
      Self::Unix => "unix",
    }
  }

  /// The host a selector stands for when simulating it (`--platform`).
  ///
  /// `Unix` resolves to plain Linux.
  pub fn representative_host(&self, arch: Arch) -> HostPlatform {
    let (os, distro) = match self {
      Self::Windows => (Os::Windows, None),
      Self::MacOs => (Os::MacOs, None),
      Self::Linux | Self::Unix => (Os::Linux, None),
      Self::Ubuntu => (Os::Linux, Some(Distro::Ubuntu)),
      Self::Debian => (Os::Linux, Some(Distro::Debian)),
      Self::CentOs => (Os::Linux, Some(Distro::CentOs)),
      Self::Fedora => (Os::Linux, Some(Distro::Fedora)),
    };
    HostPlatform::new(os, distro, arch)
  }
}

impl fmt::Display for BuildPlatform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown platform '{0}' (expected one of: windows, osx, linux, ubuntu, debian, centos, fedora, unix)")]
pub struct UnknownPlatform(pub String);

impl FromStr for BuildPlatform {
  type Err = UnknownPlatform;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "windows" | "win" => Ok(Self::Windows),
      "osx" | "macos" | "darwin" => Ok(Self::MacOs),
      "linux" => Ok(Self::Linux),
      "ubuntu" => Ok(Self::Ubuntu),
      "debian" => Ok(Self::Debian),
      "centos" => Ok(Self::CentOs),
      "fedora" => Ok(Self::Fedora),
      "unix" => Ok(Self::Unix),
      _ => Err(UnknownPlatform(s.to_string())),
    }
  }
}
