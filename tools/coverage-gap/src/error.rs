//! Structured error types for the coverage gap reporter.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoverageError {
  #[error("tool invocation: {command}: {reason}")]
  ToolInvocation { command: String, reason: String },

  #[error("timed out: {command} after {}s", .after.as_secs())]
  TimedOut { command: String, after: Duration },

  #[error("report generation: {0}")]
  ReportGeneration(String),

  #[error("parse: {0}")]
  Parse(String),

  #[error("no coverage data: {0}")]
  NoData(String),

  #[error("file read: {path}: {reason}")]
  FileRead { path: String, reason: String },

  #[error("config: {field}: {reason}")]
  Config { field: String, reason: String },

  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl CoverageError {
  pub fn tool(command: &str, reason: impl Into<String>) -> Self {
    Self::ToolInvocation {
      command: command.to_string(),
      reason: reason.into(),
    }
  }

  pub fn timed_out(command: &str, after: Duration) -> Self {
    Self::TimedOut {
      command: command.to_string(),
      after,
    }
  }

  pub fn report(msg: impl Into<String>) -> Self {
    Self::ReportGeneration(msg.into())
  }

  pub fn parse(msg: impl Into<String>) -> Self {
    Self::Parse(msg.into())
  }

  pub fn no_data(msg: impl Into<String>) -> Self {
    Self::NoData(msg.into())
  }

  pub fn file_read(path: &str, reason: impl Into<String>) -> Self {
    Self::FileRead {
      path: path.to_string(),
      reason: reason.into(),
    }
  }

  pub fn config(field: &str, reason: &str) -> Self {
    Self::Config {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  /// Whether this error ends the run. Parse and file-read problems are
  /// recovered where they happen and only ever logged.
  pub fn is_fatal(&self) -> bool {
    !matches!(self, Self::Parse(_) | Self::FileRead { .. })
  }

  /// Message written to the report's `error` field. The orchestrator matches
  /// on these strings, so they stay short and stable; the detail goes to the log.
  pub fn report_message(&self) -> String {
    match self {
      Self::ToolInvocation { .. } | Self::TimedOut { .. } => "Failed to run coverage".to_string(),
      Self::ReportGeneration(_) => "Failed to generate coverage report".to_string(),
      Self::NoData(_) => "No coverage data found".to_string(),
      other => other.to_string(),
    }
  }
}
