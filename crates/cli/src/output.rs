//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output including colored status
//! messages, human-readable durations, and per-target status lines.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use relgraph_lib::execute::{RunReport, TargetRecord, TargetStatus};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
  pub const SKIP: &str = "-";
  pub const PENDING: &str = "○";
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// One line per target: symbol, name, then duration or reason.
pub fn print_record(record: &TargetRecord) {
  let detail = match (record.status, &record.reason, record.duration) {
    (_, Some(reason), _) => format!(" ({})", reason),
    (_, None, Some(duration)) => format!(" ({})", format_duration(duration)),
    _ => String::new(),
  };

  match record.status {
    TargetStatus::Succeeded => println!(
      "  {} {}{}",
      symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
      record.name,
      detail.if_supports_color(Stream::Stdout, |s| s.dimmed())
    ),
    TargetStatus::Failed => println!(
      "  {} {}{}",
      symbols::ERROR.if_supports_color(Stream::Stdout, |s| s.red()),
      record.name.if_supports_color(Stream::Stdout, |s| s.red()),
      detail.if_supports_color(Stream::Stdout, |s| s.red())
    ),
    TargetStatus::Skipped => println!(
      "  {} {}{}",
      symbols::SKIP.if_supports_color(Stream::Stdout, |s| s.yellow()),
      record.name,
      detail.if_supports_color(Stream::Stdout, |s| s.dimmed())
    ),
    TargetStatus::Pending | TargetStatus::Running => println!(
      "  {} {}{}",
      symbols::PENDING.if_supports_color(Stream::Stdout, |s| s.dimmed()),
      record.name.if_supports_color(Stream::Stdout, |s| s.dimmed()),
      " (not run)".if_supports_color(Stream::Stdout, |s| s.dimmed())
    ),
  }
}

pub fn print_report(report: &RunReport) {
  for record in &report.records {
    print_record(record);
  }
  println!();

  let summary = format!(
    "{} succeeded, {} skipped, {} failed, {} not run in {}",
    report.count(TargetStatus::Succeeded),
    report.count(TargetStatus::Skipped),
    report.count(TargetStatus::Failed),
    report.count(TargetStatus::Pending),
    format_duration(report.total_duration())
  );

  match &report.failure {
    None => print_success(&summary),
    Some(failure) => {
      print_info(&summary);
      print_error(&failure.to_string());
    }
  }
}
