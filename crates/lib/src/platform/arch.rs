use std::fmt;

/// CPU architecture of a release artifact.
///
/// Release file names follow the .NET runtime identifiers (`x64`, `arm64`)
/// rather than the Rust target names (`x86_64`, `aarch64`), so the moniker
/// in `dotnet-ubuntu-x64.1.0.0.tar.gz` matches what downstream installers
/// already look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  X86_64,
  Aarch64,
}

impl Arch {
  /// Architecture this binary was compiled for.
  pub fn current() -> Option<Self> {
    Self::from_target_arch(std::env::consts::ARCH)
  }

  /// Map a Rust `target_arch` value. Anything without a release moniker is `None`.
  pub fn from_target_arch(target_arch: &str) -> Option<Self> {
    match target_arch {
      "x86_64" => Some(Self::X86_64),
      "aarch64" => Some(Self::Aarch64),
      _ => None,
    }
  }

  /// Name used in artifact monikers.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X86_64 => "x64",
      Self::Aarch64 => "arm64",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn maps_rust_names_to_release_names() {
    assert_eq!(Arch::from_target_arch("x86_64").map(|a| a.as_str()), Some("x64"));
    assert_eq!(Arch::from_target_arch("aarch64").map(|a| a.as_str()), Some("arm64"));
  }

  #[test]
  fn unsupported_architectures_have_no_moniker() {
    assert_eq!(Arch::from_target_arch("x86"), None);
    assert_eq!(Arch::from_target_arch("riscv64"), None);
  }
}
