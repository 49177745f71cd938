//! Bodies of the release targets.
//!
//! Every body reads what it needs from the context populated by `Init` and
//! shells out through [`Cmd`] for archive, installer and publish work.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::keys;
use super::version::BuildVersion;
use crate::config::ReleaseConfig;
use crate::platform::os::Os;
use crate::process::Cmd;
use crate::target::{TargetContext, TargetError};

/// Badge used when no template is configured. `ver_number` is replaced with the version.
pub const DEFAULT_BADGE_TEMPLATE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="150" height="20"><linearGradient id="b" x2="0" y2="100%"><stop offset="0" stop-color="#bbb" stop-opacity=".1"/><stop offset="1" stop-opacity=".1"/></linearGradient><rect rx="3" width="150" height="20" fill="#555"/><rect rx="3" x="52" width="98" height="20" fill="#4c1"/><rect rx="3" width="150" height="20" fill="url(#b)"/><g fill="#fff" text-anchor="middle" font-family="DejaVu Sans,Verdana,Geneva,sans-serif" font-size="11"><text x="26" y="14">version</text><text x="100" y="14">ver_number</text></g></svg>
"##;

const BADGE_PLACEHOLDER: &str = "ver_number";

/// Seed a string key from configuration unless the caller already provided it.
fn seed(ctx: &mut TargetContext<'_>, key: &str, default: impl FnOnce() -> String) -> Result<String, TargetError> {
  if ctx.has(key) {
    return Ok(ctx.get_str(key)?.to_string());
  }
  let value = default();
  ctx.set(key, &value)?;
  Ok(value)
}

fn path_string(path: &Path) -> String {
  path.to_string_lossy().into_owned()
}

/// Populate the context with the version record and every well-known path.
///
/// Keys already present (e.g. from `--set`) are kept and later paths are
/// derived from them.
pub fn init(config: &ReleaseConfig, ctx: &mut TargetContext<'_>) -> Result<(), TargetError> {
  if !ctx.has(keys::BUILD_VERSION) {
    let version = config
      .build_version()
      .map_err(|e| TargetError::failed(e.to_string()))?;
    ctx.set(keys::BUILD_VERSION, &version)?;
  }
  let version: BuildVersion = ctx.get(keys::BUILD_VERSION)?;

  let configuration = seed(ctx, keys::CONFIGURATION, || config.configuration.clone())?;
  seed(ctx, keys::REPO_ROOT, || path_string(&config.repo_root()))?;
  let output = PathBuf::from(seed(ctx, keys::OUTPUT_DIR, || path_string(&config.output_dir()))?);
  seed(ctx, keys::STAGE2_DIR, || path_string(&output.join("stage2")))?;
  let packages = PathBuf::from(seed(ctx, keys::PACKAGES_DIR, || path_string(&output.join("packages")))?);

  let host = ctx.platform().clone();
  let moniker = version.moniker(&config.product.name, &host);
  let (archive_ext, installer_ext) = match host.os {
    Os::Windows => ("zip", "msi"),
    Os::MacOs => ("tar.gz", "pkg"),
    Os::Linux => ("tar.gz", "deb"),
  };

  seed(ctx, keys::VERSION_BADGE, || path_string(&packages.join("version_badge.svg")))?;
  seed(ctx, keys::COMPRESSED_FILE, || {
    path_string(&packages.join(format!("{moniker}.{archive_ext}")))
  })?;
  seed(ctx, keys::INSTALLER_FILE, || {
    path_string(&packages.join(format!("{moniker}.{installer_ext}")))
  })?;

  fs::create_dir_all(&output)?;
  info!(version = %version, configuration = %configuration, output = %output.display(), "initialized release");
  Ok(())
}

/// Run the configured compile command and make sure the stage2 directory exists.
pub fn compile(config: &ReleaseConfig, ctx: &mut TargetContext<'_>) -> Result<(), TargetError> {
  let stage2 = ctx.get_str(keys::STAGE2_DIR)?.to_string();
  fs::create_dir_all(&stage2)?;

  match Cmd::from_argv(&config.commands.compile) {
    Some(cmd) => {
      prepare(cmd, config, ctx)?.run()?;
    }
    None => warn!("no compile command configured, using stage2 as-is"),
  }
  Ok(())
}

pub fn init_package(_config: &ReleaseConfig, ctx: &mut TargetContext<'_>) -> Result<(), TargetError> {
  fs::create_dir_all(ctx.get_str(keys::PACKAGES_DIR)?)?;
  Ok(())
}

pub fn generate_version_badge(config: &ReleaseConfig, ctx: &mut TargetContext<'_>) -> Result<(), TargetError> {
  let version: BuildVersion = ctx.get(keys::BUILD_VERSION)?;
  let output = PathBuf::from(ctx.get_str(keys::VERSION_BADGE)?);

  let template = match &config.dirs.badge_template {
    Some(path) => fs::read_to_string(config.script_path(path))?,
    None => DEFAULT_BADGE_TEMPLATE.to_string(),
  };

  if let Some(parent) = output.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(&output, template.replace(BADGE_PLACEHOLDER, &version.simple_version()))?;
  info!(path = %output.display(), "wrote version badge");
  Ok(())
}

pub fn generate_zip(config: &ReleaseConfig, ctx: &mut TargetContext<'_>) -> Result<(), TargetError> {
  let stage2 = ctx.get_str(keys::STAGE2_DIR)?.to_string();
  let zip = PathBuf::from(ctx.get_str(keys::COMPRESSED_FILE)?);

  if zip.exists() {
    fs::remove_file(&zip)?;
  }

  let script = format!(
    "Compress-Archive -Path '{}' -DestinationPath '{}' -CompressionLevel Optimal",
    Path::new(&stage2).join("*").display(),
    zip.display()
  );
  let cmd = Cmd::new("powershell").args(["-NoProfile", "-NoLogo", "-Command"]).arg(script);
  prepare(cmd, config, ctx)?.run()?;
  Ok(())
}

pub fn generate_tarball(config: &ReleaseConfig, ctx: &mut TargetContext<'_>) -> Result<(), TargetError> {
  fs::create_dir_all(ctx.get_str(keys::PACKAGES_DIR)?)?;
  let stage2 = ctx.get_str(keys::STAGE2_DIR)?.to_string();
  let tarball = ctx.get_str(keys::COMPRESSED_FILE)?.to_string();

  let cmd = Cmd::new("tar").args(["-czf", tarball.as_str(), "-C", stage2.as_str(), "."]);
  prepare(cmd, config, ctx)?.run()?;
  Ok(())
}

pub fn generate_msi(config: &ReleaseConfig, ctx: &mut TargetContext<'_>) -> Result<(), TargetError> {
  let stage2 = ctx.get_str(keys::STAGE2_DIR)?.to_string();
  let cmd = script_cmd(&config.script_path(&config.scripts.msi)).arg(stage2);
  prepare(cmd, config, ctx)?.run()?;
  Ok(())
}

pub fn generate_pkg(config: &ReleaseConfig, ctx: &mut TargetContext<'_>) -> Result<(), TargetError> {
  let cmd = script_cmd(&config.script_path(&config.scripts.pkg));
  prepare(cmd, config, ctx)?.run()?;
  Ok(())
}

pub fn generate_deb(config: &ReleaseConfig, ctx: &mut TargetContext<'_>) -> Result<(), TargetError> {
  let cmd = script_cmd(&config.script_path(&config.scripts.deb));
  prepare(cmd, config, ctx)?.run()?;
  Ok(())
}

pub fn generate_nuget_packages(config: &ReleaseConfig, ctx: &mut TargetContext<'_>) -> Result<(), TargetError> {
  let version: BuildVersion = ctx.get(keys::BUILD_VERSION)?;
  let bin = Path::new(ctx.get_str(keys::STAGE2_DIR)?).join("bin");
  let cmd = script_cmd(&config.script_path(&config.scripts.nuget))
    .arg(path_string(&bin))
    .arg(version.suffix);
  prepare(cmd, config, ctx)?.run()?;
  Ok(())
}

pub fn publish_version_badge(config: &ReleaseConfig, ctx: &mut TargetContext<'_>) -> Result<(), TargetError> {
  publish_file(config, ctx, keys::VERSION_BADGE)
}

pub fn publish_compressed_file(config: &ReleaseConfig, ctx: &mut TargetContext<'_>) -> Result<(), TargetError> {
  publish_file(config, ctx, keys::COMPRESSED_FILE)
}

pub fn publish_installer_file(config: &ReleaseConfig, ctx: &mut TargetContext<'_>) -> Result<(), TargetError> {
  publish_file(config, ctx, keys::INSTALLER_FILE)
}

/// Hand the file stored under `key` to the publish command.
fn publish_file(config: &ReleaseConfig, ctx: &TargetContext<'_>, key: &str) -> Result<(), TargetError> {
  let file = ctx.get_str(key)?.to_string();
  let cmd = match Cmd::from_argv(&config.commands.publish) {
    Some(cmd) => cmd,
    None => script_cmd(&config.script_path(&config.scripts.publish)),
  };
  prepare(cmd.arg(file.as_str()), config, ctx)?.run()?;
  info!(file = %file, "published");
  Ok(())
}

/// PowerShell scripts go through `powershell -File`; anything else runs directly.
fn script_cmd(script: &Path) -> Cmd {
  let path = path_string(script);
  if script.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("ps1")) {
    Cmd::new("powershell").args(["-NoProfile", "-NoLogo", "-File"]).arg(path)
  } else {
    Cmd::new(path)
  }
}

/// Attach the working directory, deadline and common environment.
fn prepare(cmd: Cmd, config: &ReleaseConfig, ctx: &TargetContext<'_>) -> Result<Cmd, TargetError> {
  Ok(
    cmd
      .current_dir(ctx.get_str(keys::REPO_ROOT)?)
      .envs(common_env(config, ctx)?)
      .timeout(config.command_timeout),
  )
}

/// Environment every packaging and publish script receives.
pub fn common_env(config: &ReleaseConfig, ctx: &TargetContext<'_>) -> Result<Vec<(&'static str, String)>, TargetError> {
  let version: BuildVersion = ctx.get(keys::BUILD_VERSION)?;
  let host = ctx.platform();

  Ok(vec![
    ("PRODUCT_NAME", config.product.name.clone()),
    ("OSNAME", super::version::os_moniker(host)),
    ("ARCHITECTURE", host.arch.to_string()),
    ("CONFIGURATION", ctx.get_str(keys::CONFIGURATION)?.to_string()),
    ("REPOROOT", ctx.get_str(keys::REPO_ROOT)?.to_string()),
    ("OUTPUT_DIR", ctx.get_str(keys::OUTPUT_DIR)?.to_string()),
    ("STAGE2_DIR", ctx.get_str(keys::STAGE2_DIR)?.to_string()),
    ("PACKAGE_DIR", ctx.get_str(keys::PACKAGES_DIR)?.to_string()),
    ("MAJOR_VERSION", version.major.to_string()),
    ("MINOR_VERSION", version.minor.to_string()),
    ("PATCH_VERSION", version.patch.to_string()),
    ("COMMIT_COUNT_VERSION", version.commit_count_string()),
    ("VERSION_SUFFIX", version.suffix.clone()),
    ("PRODUCT_VERSION", version.simple_version()),
    ("MSI_VERSION", version.msi_version()),
  ])
}
