use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ProductConfig};
use crate::platform::HostPlatform;
use crate::platform::os::Os;

/// Version of the product being released, stored in the context as `BuildVersion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildVersion {
  pub major: u64,
  pub minor: u64,
  pub patch: u64,
  pub commit_count: u32,
  /// Pre-release label such as "beta"; empty for a stable release.
  pub suffix: String,
}

impl BuildVersion {
  pub fn from_product(product: &ProductConfig) -> Result<Self, ConfigError> {
    let parsed = semver::Version::parse(&product.version).map_err(|source| ConfigError::InvalidVersion {
      version: product.version.clone(),
      source,
    })?;

    let suffix = product
      .suffix
      .clone()
      .unwrap_or_else(|| parsed.pre.as_str().to_string());

    Ok(Self {
      major: parsed.major,
      minor: parsed.minor,
      patch: parsed.patch,
      commit_count: product.commit_count,
      suffix,
    })
  }

  /// Commit count zero-padded to six digits.
  pub fn commit_count_string(&self) -> String {
    format!("{:06}", self.commit_count)
  }

  /// `1.0.0` for stable releases, `1.0.0-beta-001742` otherwise.
  pub fn simple_version(&self) -> String {
    if self.suffix.is_empty() {
      format!("{}.{}.{}", self.major, self.minor, self.patch)
    } else {
      format!(
        "{}.{}.{}-{}-{}",
        self.major,
        self.minor,
        self.patch,
        self.suffix,
        self.commit_count_string()
      )
    }
  }

  /// Four-part numeric version accepted by installer tooling.
  pub fn msi_version(&self) -> String {
    format!("{}.{}.{}.{}", self.major, self.minor, self.patch, self.commit_count)
  }

  /// Artifact base name, e.g. `dotnet-ubuntu-x64.1.0.0-beta-001742`.
  pub fn moniker(&self, product: &str, host: &HostPlatform) -> String {
    format!("{product}-{}-{}.{}", os_moniker(host), host.arch, self.simple_version())
  }
}

impl fmt::Display for BuildVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.simple_version())
  }
}

/// OS part of a product moniker. Linux hosts use their distribution when known.
pub fn os_moniker(host: &HostPlatform) -> String {
  match (&host.os, &host.distro) {
    (Os::Linux, Some(distro)) => distro.as_str().to_string(),
    (os, _) => os.moniker().to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::arch::Arch;
  use crate::platform::os::Distro;

  fn product(version: &str, suffix: Option<&str>) -> ProductConfig {
    ProductConfig {
      name: "dotnet".to_string(),
      version: version.to_string(),
      suffix: suffix.map(str::to_string),
      commit_count: 1742,
    }
  }

  #[test]
  fn prerelease_becomes_suffix() {
    let version = BuildVersion::from_product(&product("1.0.0-beta", None)).unwrap();
    assert_eq!(version.suffix, "beta");
    assert_eq!(version.simple_version(), "1.0.0-beta-001742");
    assert_eq!(version.to_string(), "1.0.0-beta-001742");
  }

  #[test]
  fn explicit_suffix_wins() {
    let version = BuildVersion::from_product(&product("2.1.3-beta", Some("rc2"))).unwrap();
    assert_eq!(version.simple_version(), "2.1.3-rc2-001742");
  }

  #[test]
  fn stable_release_has_plain_version() {
    let version = BuildVersion::from_product(&product("2.1.3", None)).unwrap();
    assert_eq!(version.simple_version(), "2.1.3");
    assert_eq!(version.msi_version(), "2.1.3.1742");
  }

  #[test]
  fn invalid_version_is_rejected() {
    let err = BuildVersion::from_product(&product("1.0", None)).unwrap_err();
    assert!(err.to_string().starts_with("invalid product version '1.0'"));
  }

  #[test]
  fn moniker_uses_platform_names() {
    let version = BuildVersion::from_product(&product("1.0.0-beta", None)).unwrap();

    let windows = HostPlatform::new(Os::Windows, None, Arch::X86_64);
    assert_eq!(version.moniker("dotnet", &windows), "dotnet-win-x64.1.0.0-beta-001742");

    let ubuntu = HostPlatform::new(Os::Linux, Some(Distro::Ubuntu), Arch::X86_64);
    assert_eq!(version.moniker("dotnet", &ubuntu), "dotnet-ubuntu-x64.1.0.0-beta-001742");

    let mac = HostPlatform::new(Os::MacOs, None, Arch::Aarch64);
    assert_eq!(version.moniker("dotnet", &mac), "dotnet-osx-arm64.1.0.0-beta-001742");

    let linux = HostPlatform::new(Os::Linux, None, Arch::X86_64);
    assert_eq!(version.moniker("dotnet", &linux), "dotnet-linux-x64.1.0.0-beta-001742");
  }

  #[test]
  fn round_trips_through_context() {
    let version = BuildVersion::from_product(&product("1.2.3", None)).unwrap();
    let mut ctx = crate::context::BuildContext::new();
    ctx.set("BuildVersion", &version).unwrap();
    assert_eq!(ctx.get::<BuildVersion>("BuildVersion").unwrap(), version);
  }
}
