//! The release catalog: init, compile, package and publish targets.
//!
//! Targets are declared with direct registration calls in a fixed order. Leaf
//! work (archives, installers, uploads) runs through external processes; the
//! aggregate targets (`GenerateInstaller`, `Package`, `Publish`, ...) have no
//! work of their own and exist to pull their prerequisites into a plan.

pub mod steps;
pub mod version;

use std::rc::Rc;

use crate::config::ReleaseConfig;
use crate::gate::Gate;
use crate::platform::BuildPlatform;
use crate::target::{RegistryError, Target, TargetContext, TargetError, TargetRegistry};

pub use version::BuildVersion;

/// Setting this variable to a non-empty value skips the `Package` target.
pub const SKIP_PACKAGING_VAR: &str = "RELGRAPH_SKIP_PACKAGING";

/// Context keys written by `Init`.
pub mod keys {
  pub const BUILD_VERSION: &str = "BuildVersion";
  pub const CONFIGURATION: &str = "Configuration";
  pub const REPO_ROOT: &str = "RepoRoot";
  pub const OUTPUT_DIR: &str = "OutputDir";
  pub const STAGE2_DIR: &str = "Stage2Dir";
  pub const PACKAGES_DIR: &str = "PackagesDir";
  pub const VERSION_BADGE: &str = "VersionBadge";
  pub const COMPRESSED_FILE: &str = "CompressedFile";
  pub const INSTALLER_FILE: &str = "InstallerFile";
}

type StepFn = fn(&ReleaseConfig, &mut TargetContext<'_>) -> Result<(), TargetError>;

fn step(name: &str, config: &Rc<ReleaseConfig>, body: StepFn) -> Target {
  let config = Rc::clone(config);
  Target::new(name, move |ctx| body(&config, ctx))
}

fn aggregate(name: &str) -> Target {
  Target::new(name, |_| Ok(()))
}

/// Build a registry holding the full release catalog.
pub fn release_registry(config: ReleaseConfig) -> Result<TargetRegistry, RegistryError> {
  let mut registry = TargetRegistry::new();
  register_release_targets(&mut registry, config)?;
  Ok(registry)
}

/// Register the release catalog into an existing registry.
pub fn register_release_targets(registry: &mut TargetRegistry, config: ReleaseConfig) -> Result<(), RegistryError> {
  let config = Rc::new(config);
  let windows = || Gate::platforms([BuildPlatform::Windows]);

  registry.register(step("Init", &config, steps::init).describe("Compute version and output paths"))?;
  registry.register(
    step("Compile", &config, steps::compile)
      .depends_on(["Init"])
      .describe("Run the compile command into stage2"),
  )?;

  // packaging
  registry.register(step("InitPackage", &config, steps::init_package).describe("Create the packages directory"))?;
  registry.register(
    step("GenerateVersionBadge", &config, steps::generate_version_badge).describe("Render the version badge SVG"),
  )?;
  registry.register(
    step("GenerateZip", &config, steps::generate_zip)
      .gated(windows())
      .describe("Zip stage2"),
  )?;
  registry.register(
    step("GenerateTarBall", &config, steps::generate_tarball)
      .gated(Gate::platforms([BuildPlatform::Unix]))
      .describe("Tar and gzip stage2"),
  )?;
  registry.register(
    aggregate("GenerateCompressedFile")
      .depends_on(["GenerateZip", "GenerateTarBall"])
      .describe("Produce the platform archive"),
  )?;
  registry.register(
    step("GenerateMsi", &config, steps::generate_msi)
      .gated(windows())
      .describe("Build the Windows installer"),
  )?;
  registry.register(
    step("GeneratePkg", &config, steps::generate_pkg)
      .gated(Gate::platforms([BuildPlatform::MacOs]))
      .describe("Build the macOS installer"),
  )?;
  registry.register(
    step("GenerateDeb", &config, steps::generate_deb)
      .gated(Gate::platforms([BuildPlatform::Ubuntu]))
      .describe("Build the Debian package"),
  )?;
  registry.register(
    aggregate("GenerateInstaller")
      .depends_on(["GenerateMsi", "GeneratePkg", "GenerateDeb"])
      .describe("Produce the platform installer"),
  )?;
  registry.register(
    step("GenerateNugetPackages", &config, steps::generate_nuget_packages)
      .gated(windows())
      .describe("Pack NuGet packages"),
  )?;
  registry.register(
    aggregate("Package")
      .depends_on([
        "Init",
        "Compile",
        "InitPackage",
        "GenerateVersionBadge",
        "GenerateCompressedFile",
        "GenerateInstaller",
        "GenerateNugetPackages",
      ])
      .gated(Gate::env_unset(SKIP_PACKAGING_VAR))
      .describe("Produce every release artifact"),
  )?;

  // publishing
  registry.register(aggregate("InitPublish"))?;
  registry.register(
    step("PublishVersionBadge", &config, steps::publish_version_badge).describe("Upload the version badge"),
  )?;
  registry.register(
    step("PublishCompressedFile", &config, steps::publish_compressed_file).describe("Upload the archive"),
  )?;
  registry.register(
    step("PublishInstallerFile", &config, steps::publish_installer_file)
      .gated(Gate::platforms([
        BuildPlatform::Windows,
        BuildPlatform::MacOs,
        BuildPlatform::Ubuntu,
      ]))
      .describe("Upload the installer"),
  )?;
  registry.register(aggregate("PublishArtifacts").depends_on([
    "PublishVersionBadge",
    "PublishCompressedFile",
    "PublishInstallerFile",
  ]))?;
  registry.register(
    aggregate("Publish")
      .depends_on(["Init", "InitPublish", "PublishArtifacts"])
      .describe("Upload every release artifact"),
  )?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use super::*;
  use crate::context::BuildContext;
  use crate::execute::{Resolver, TargetStatus, request_run};
  use crate::gate::StaticEnvironment;
  use crate::platform::HostPlatform;
  use crate::platform::arch::Arch;
  use crate::platform::os::{Distro, Os};

  fn fedora() -> StaticEnvironment {
    StaticEnvironment::new(HostPlatform::new(Os::Linux, Some(Distro::Fedora), Arch::X86_64))
  }

  fn config_in(dir: &Path) -> ReleaseConfig {
    let mut config = ReleaseConfig::default();
    config.base_dir = dir.to_path_buf();
    config.product.version = "1.0.0-beta".to_string();
    config
  }

  #[test]
  fn catalog_is_registered_in_order() {
    let registry = release_registry(ReleaseConfig::default()).unwrap();
    assert_eq!(
      registry.all_names(),
      vec![
        "Init",
        "Compile",
        "InitPackage",
        "GenerateVersionBadge",
        "GenerateZip",
        "GenerateTarBall",
        "GenerateCompressedFile",
        "GenerateMsi",
        "GeneratePkg",
        "GenerateDeb",
        "GenerateInstaller",
        "GenerateNugetPackages",
        "Package",
        "InitPublish",
        "PublishVersionBadge",
        "PublishCompressedFile",
        "PublishInstallerFile",
        "PublishArtifacts",
        "Publish",
      ]
    );
    assert!(registry.validate().is_ok());
  }

  #[test]
  fn registering_twice_is_rejected() {
    let mut registry = release_registry(ReleaseConfig::default()).unwrap();
    let err = register_release_targets(&mut registry, ReleaseConfig::default()).unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateName(ref name) if name == "Init"));
  }

  #[test]
  fn package_plan_order() {
    let registry = release_registry(ReleaseConfig::default()).unwrap();
    let plan = Resolver::new(&registry).resolve("Package").unwrap();
    assert_eq!(
      plan.names(),
      vec![
        "Init",
        "Compile",
        "InitPackage",
        "GenerateVersionBadge",
        "GenerateZip",
        "GenerateTarBall",
        "GenerateCompressedFile",
        "GenerateMsi",
        "GeneratePkg",
        "GenerateDeb",
        "GenerateInstaller",
        "GenerateNugetPackages",
        "Package",
      ]
    );
  }

  #[test]
  fn publish_plan_order() {
    let registry = release_registry(ReleaseConfig::default()).unwrap();
    let plan = Resolver::new(&registry).resolve("Publish").unwrap();
    assert_eq!(
      plan.names(),
      vec![
        "Init",
        "InitPublish",
        "PublishVersionBadge",
        "PublishCompressedFile",
        "PublishInstallerFile",
        "PublishArtifacts",
        "Publish",
      ]
    );
  }

  #[cfg(unix)]
  #[test]
  fn skip_packaging_variable_skips_only_package() {
    let temp = tempfile::TempDir::new().unwrap();
    let registry = release_registry(config_in(temp.path())).unwrap();
    let env = fedora().with_var(SKIP_PACKAGING_VAR, "1");
    let mut context = BuildContext::new();

    let report = request_run(&registry, &["Package"], &mut context, &env).unwrap();

    assert!(report.is_success(), "{:?}", report.failure);
    assert_eq!(report.status_of("GenerateTarBall"), Some(TargetStatus::Succeeded));
    assert_eq!(report.status_of("Package"), Some(TargetStatus::Skipped));
    assert_eq!(
      report.record("Package").unwrap().reason.as_deref(),
      Some("requires $RELGRAPH_SKIP_PACKAGING unset, found '1'")
    );
  }

  #[cfg(unix)]
  #[test]
  fn package_on_plain_linux_builds_tarball_and_badge() {
    let temp = tempfile::TempDir::new().unwrap();
    let mut config = config_in(temp.path());
    config.commands.compile = vec![
      "/bin/sh".to_string(),
      "-c".to_string(),
      "echo \"$PRODUCT_VERSION\" > \"$STAGE2_DIR/version.txt\"".to_string(),
    ];
    let registry = release_registry(config).unwrap();
    let mut context = BuildContext::new();

    let report = request_run(&registry, &["Package"], &mut context, &fedora()).unwrap();

    assert!(report.is_success(), "{:?}", report.failure);
    assert_eq!(
      report.names_with(TargetStatus::Skipped),
      vec!["GenerateZip", "GenerateMsi", "GeneratePkg", "GenerateDeb", "GenerateNugetPackages"]
    );
    assert_eq!(report.status_of("Package"), Some(TargetStatus::Succeeded));

    let stage2 = context.get_str(keys::STAGE2_DIR).unwrap();
    let stamped = std::fs::read_to_string(Path::new(stage2).join("version.txt")).unwrap();
    assert_eq!(stamped.trim(), "1.0.0-beta-000000");

    assert!(Path::new(context.get_str(keys::COMPRESSED_FILE).unwrap()).is_file());
    let badge = std::fs::read_to_string(context.get_str(keys::VERSION_BADGE).unwrap()).unwrap();
    assert!(badge.contains("1.0.0-beta-000000"));
  }

  #[cfg(unix)]
  #[test]
  fn failing_compile_halts_package() {
    let temp = tempfile::TempDir::new().unwrap();
    let mut config = config_in(temp.path());
    config.commands.compile = vec!["/bin/sh".to_string(), "-c".to_string(), "exit 1".to_string()];
    let registry = release_registry(config).unwrap();
    let mut context = BuildContext::new();

    let report = request_run(&registry, &["Package"], &mut context, &fedora()).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.status_of("Init"), Some(TargetStatus::Succeeded));
    assert_eq!(report.status_of("Compile"), Some(TargetStatus::Failed));
    assert_eq!(report.status_of("InitPackage"), Some(TargetStatus::Pending));
    assert_eq!(report.status_of("Package"), Some(TargetStatus::Pending));
  }

  #[cfg(unix)]
  #[test]
  fn publish_hands_each_file_to_the_publish_command() {
    let temp = tempfile::TempDir::new().unwrap();
    let log = temp.path().join("published.log");
    let mut config = config_in(temp.path());
    config.commands.publish = vec![
      "/bin/sh".to_string(),
      "-c".to_string(),
      format!("echo \"$1\" >> '{}'", log.display()),
      "publish".to_string(),
    ];
    let registry = release_registry(config).unwrap();
    let mut context = BuildContext::new();

    let report = request_run(&registry, &["Publish"], &mut context, &fedora()).unwrap();

    assert!(report.is_success(), "{:?}", report.failure);
    assert_eq!(report.status_of("PublishInstallerFile"), Some(TargetStatus::Skipped));

    let published = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<_> = published.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("version_badge.svg"));
    assert!(lines[1].ends_with(".tar.gz"));
  }

  #[test]
  fn running_a_leaf_without_init_fails_loudly() {
    let registry = release_registry(ReleaseConfig::default()).unwrap();
    let mut context = BuildContext::new();

    let report = request_run(&registry, &["PublishVersionBadge"], &mut context, &fedora()).unwrap();

    let failure = report.failure.unwrap();
    assert_eq!(failure.target, "PublishVersionBadge");
    assert_eq!(failure.reason, "context key 'VersionBadge' was never set");
  }
}
