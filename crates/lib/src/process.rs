//! External command execution for target bodies.
//!
//! The engine treats a command as an opaque side effect that either succeeds or
//! fails. Output is captured on background threads so a chatty child cannot
//! deadlock on a full pipe, and an optional deadline kills the child when it
//! runs too long.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// Errors from spawning or running an external command.
#[derive(Debug, Error)]
pub enum CmdError {
  #[error("failed to spawn '{cmd}': {source}")]
  Spawn {
    cmd: String,
    #[source]
    source: std::io::Error,
  },

  #[error("command failed with exit code {code:?}: {cmd}{}", stderr_suffix(.stderr))]
  Failed {
    cmd: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("command timed out after {}: {cmd}", format_timeout(.timeout))]
  TimedOut { cmd: String, timeout: Duration },

  #[error("io error while running '{cmd}': {source}")]
  Io {
    cmd: String,
    #[source]
    source: std::io::Error,
  },
}

fn format_timeout(timeout: &Duration) -> String {
  humantime::format_duration(*timeout).to_string()
}

fn stderr_suffix(stderr: &str) -> String {
  let last = stderr.lines().rev().find(|line| !line.trim().is_empty());
  match last {
    Some(line) => format!(" ({})", line.trim()),
    None => String::new(),
  }
}

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CmdOutput {
  /// Display form of the command line.
  pub cmd: String,
  pub status: ExitStatus,
  pub stdout: String,
  pub stderr: String,
}

impl CmdOutput {
  pub fn success(&self) -> bool {
    self.status.success()
  }

  /// Turn a non-zero exit into [`CmdError::Failed`].
  pub fn ensure_successful(self) -> Result<Self, CmdError> {
    if self.status.success() {
      Ok(self)
    } else {
      Err(CmdError::Failed {
        cmd: self.cmd,
        code: self.status.code(),
        stderr: self.stderr,
      })
    }
  }
}

/// Builder for an external command.
#[derive(Debug, Clone)]
pub struct Cmd {
  program: String,
  args: Vec<String>,
  env: BTreeMap<String, String>,
  cwd: Option<PathBuf>,
  timeout: Option<Duration>,
}

impl Cmd {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      env: BTreeMap::new(),
      cwd: None,
      timeout: None,
    }
  }

  /// Build from an argv list; `None` when the list is empty.
  pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
    let (program, rest) = argv.split_first()?;
    Some(Self::new(program.as_ref()).args(rest.iter().map(|a| a.as_ref())))
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  /// Add one environment variable on top of the inherited environment.
  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  pub fn envs<I, K, V>(mut self, vars: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    self.env.extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
    self
  }

  pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
    self.cwd = Some(dir.as_ref().to_path_buf());
    self
  }

  /// Kill the child if it has not exited after `timeout`.
  ///
  /// On Unix a command with a deadline runs in its own process group and the
  /// whole group is killed, so grandchildren started by a shell go too. On
  /// Windows only the direct child is killed; the output readers are detached
  /// and finish once the last holder of the pipes exits.
  pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  /// Run to completion and capture output. A non-zero exit is not an error
  /// here; call [`CmdOutput::ensure_successful`] for that.
  pub fn execute(&self) -> Result<CmdOutput, CmdError> {
    let cmd_line = self.to_string();
    info!(cmd = %cmd_line, "executing command");

    let mut command = Command::new(&self.program);
    command
      .args(&self.args)
      .envs(&self.env)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());
    if let Some(cwd) = &self.cwd {
      command.current_dir(cwd);
    }
    #[cfg(unix)]
    {
      use std::os::unix::process::CommandExt;
      if self.timeout.is_some() {
        command.process_group(0);
      }
    }

    debug!(program = %self.program, cwd = ?self.cwd, timeout = ?self.timeout, "spawning process");
    let mut child = command.spawn().map_err(|source| CmdError::Spawn {
      cmd: cmd_line.clone(),
      source,
    })?;

    let io_err = |source| CmdError::Io {
      cmd: cmd_line.clone(),
      source,
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_handle = thread::spawn(move || read_stream(stdout));
    let stderr_handle = thread::spawn(move || read_stream(stderr));

    let status = match self.timeout {
      Some(timeout) => match child.wait_timeout(timeout).map_err(io_err)? {
        Some(status) => status,
        None => {
          warn!(cmd = %cmd_line, timeout_secs = timeout.as_secs(), "command timed out, killing");
          kill_tree(&mut child).map_err(io_err)?;
          child.wait().map_err(io_err)?;
          return Err(CmdError::TimedOut { cmd: cmd_line, timeout });
        }
      },
      None => child.wait().map_err(io_err)?,
    };

    let stdout = join_output(stdout_handle);
    let stderr = join_output(stderr_handle);

    if !stderr.is_empty() {
      debug!(stderr = %stderr, "command stderr");
    }
    debug!(exit_code = ?status.code(), "command finished");

    Ok(CmdOutput {
      cmd: cmd_line,
      status,
      stdout: stdout.trim_end().to_string(),
      stderr,
    })
  }

  /// `execute` followed by `ensure_successful`.
  pub fn run(&self) -> Result<CmdOutput, CmdError> {
    self.execute()?.ensure_successful()
  }
}

impl fmt::Display for Cmd {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      if arg.contains(char::is_whitespace) {
        write!(f, " \"{arg}\"")?;
      } else {
        write!(f, " {arg}")?;
      }
    }
    Ok(())
  }
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) -> std::io::Result<()> {
  use rustix::process::{Pid, Signal, kill_process_group};

  match i32::try_from(child.id()).ok().and_then(Pid::from_raw) {
    Some(pgid) => match kill_process_group(pgid, Signal::KILL) {
      Ok(()) => Ok(()),
      Err(errno) => {
        debug!(error = %errno, "process group kill failed, killing child only");
        child.kill()
      }
    },
    None => child.kill(),
  }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> std::io::Result<()> {
  child.kill()
}

fn read_stream<R: Read>(stream: Option<R>) -> String {
  let mut buf = Vec::new();
  if let Some(mut stream) = stream
    && let Err(e) = stream.read_to_end(&mut buf)
  {
    warn!(error = %e, "failed to read command output");
  }
  String::from_utf8_lossy(&buf).into_owned()
}

fn join_output(handle: thread::JoinHandle<String>) -> String {
  handle.join().unwrap_or_else(|_| {
    warn!("output reader thread panicked");
    String::new()
  })
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;

  #[test]
  fn captures_stdout() {
    let output = Cmd::new("/bin/echo").arg("hello").run().unwrap();
    assert_eq!(output.stdout, "hello");
    assert!(output.success());
  }

  #[test]
  fn passes_environment() {
    let output = Cmd::new("/bin/sh")
      .args(["-c", "echo \"$RELGRAPH_VERSION\""])
      .env("RELGRAPH_VERSION", "1.0.0-beta")
      .run()
      .unwrap();
    assert_eq!(output.stdout, "1.0.0-beta");
  }

  #[test]
  fn runs_in_working_directory() {
    let temp = tempfile::TempDir::new().unwrap();
    let output = Cmd::new("/bin/sh").args(["-c", "pwd"]).current_dir(temp.path()).run().unwrap();
    let expected = dunce::canonicalize(temp.path()).unwrap();
    let actual = dunce::canonicalize(&output.stdout).unwrap();
    assert_eq!(actual, expected);
  }

  #[test]
  fn non_zero_exit_is_failure_with_stderr() {
    let output = Cmd::new("/bin/sh")
      .args(["-c", "echo 'tar: cannot open' >&2; exit 3"])
      .execute()
      .unwrap();
    assert!(!output.success());

    let err = output.ensure_successful().unwrap_err();
    assert!(matches!(err, CmdError::Failed { code: Some(3), .. }));
    assert!(err.to_string().ends_with("(tar: cannot open)"));
  }

  #[test]
  fn missing_program_fails_to_spawn() {
    let err = Cmd::new("/nonexistent/relgraph-tool").run().unwrap_err();
    assert!(matches!(err, CmdError::Spawn { .. }));
  }

  #[test]
  fn timeout_kills_the_child() {
    let err = Cmd::new("/bin/sleep")
      .arg("5")
      .timeout(Some(Duration::from_millis(100)))
      .run()
      .unwrap_err();
    assert!(matches!(err, CmdError::TimedOut { .. }));
    assert_eq!(err.to_string(), "command timed out after 100ms: /bin/sleep 5");
  }

  #[test]
  fn timeout_kills_grandchildren_started_by_a_shell() {
    let temp = tempfile::TempDir::new().unwrap();
    let marker = temp.path().join("late.txt");
    let script = format!("(sleep 1; touch '{}') & sleep 5", marker.display());

    let started = std::time::Instant::now();
    let err = Cmd::new("/bin/sh")
      .args(["-c", script.as_str()])
      .timeout(Some(Duration::from_millis(200)))
      .run()
      .unwrap_err();
    assert!(matches!(err, CmdError::TimedOut { .. }));
    assert!(started.elapsed() < Duration::from_secs(1));

    std::thread::sleep(Duration::from_millis(1500));
    assert!(!marker.exists(), "background job outlived the deadline");
  }

  #[test]
  #[tracing_test::traced_test]
  fn logs_the_command_line() {
    Cmd::new("/bin/echo").arg("logged").run().unwrap();
    assert!(logs_contain("executing command"));
    assert!(logs_contain("/bin/echo logged"));
  }

  #[test]
  fn finishing_within_timeout_succeeds() {
    let output = Cmd::new("/bin/echo")
      .arg("done")
      .timeout(Some(Duration::from_secs(10)))
      .run()
      .unwrap();
    assert_eq!(output.stdout, "done");
  }

  #[test]
  fn from_argv_splits_program() {
    let cmd = Cmd::from_argv(&["cargo", "build", "--release"]).unwrap();
    assert_eq!(cmd.to_string(), "cargo build --release");
    assert!(Cmd::from_argv::<&str>(&[]).is_none());
  }

  #[test]
  fn display_quotes_arguments_with_spaces() {
    let cmd = Cmd::new("tar").args(["-czf", "my archive.tar.gz"]);
    assert_eq!(cmd.to_string(), "tar -czf \"my archive.tar.gz\"");
  }
}
