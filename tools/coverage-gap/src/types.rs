//! Core types for the coverage gap reporter (JSON contract + internal models).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoverageError;

/// Path → coverage percent, in the order the report listed the files.
pub type CoverageData = IndexMap<String, f64>;

// ---------------------------------------------------------------------------
// Internal models
// ---------------------------------------------------------------------------

/// One file's coverage, keyed by its normalized path (`app/...`).
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageEntry {
  pub file_path: String,
  pub coverage_percent: f64,
}

impl CoverageEntry {
  pub fn new(file_path: impl Into<String>, coverage_percent: f64) -> Self {
    Self {
      file_path: file_path.into(),
      coverage_percent,
    }
  }
}

/// Which parser produced the coverage data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSource {
  Xml,
  Tabular,
}

// ---------------------------------------------------------------------------
// Output types (JSON contract — what the orchestrator reads)
// ---------------------------------------------------------------------------

/// A selected low-coverage file with whatever could be read from disk.
/// `None` content means the file could not be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
  pub filepath: String,
  pub coverage: f64,
  pub content: Option<String>,
  pub existing_test: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
  pub timestamp: String,
  pub total_files: usize,
  pub coverage_data: CoverageData,
  pub lowest_coverage_files: Vec<FileReport>,
}

/// Stand-in for a full report when the run failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorOutput {
  pub error: String,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: message.into(),
    }
  }
}

/// What actually lands in `coverage_report.json`: either the full report or
/// the single-key error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportFile {
  Failure(ErrorOutput),
  Report(AnalysisReport),
}

impl ReportFile {
  pub fn is_error(&self) -> bool {
    matches!(self, Self::Failure(_))
  }
}

impl From<&Result<AnalysisReport, CoverageError>> for ReportFile {
  fn from(outcome: &Result<AnalysisReport, CoverageError>) -> Self {
    match outcome {
      Ok(report) => Self::Report(report.clone()),
      Err(e) => Self::Failure(ErrorOutput::new(e.report_message())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn failure_serializes_as_single_error_key() {
    let outcome: Result<AnalysisReport, CoverageError> =
      Err(CoverageError::tool("coverage run", "not found"));
    let json = serde_json::to_value(ReportFile::from(&outcome)).unwrap();
    assert_eq!(json, serde_json::json!({"error": "Failed to run coverage"}));
  }

  #[test]
  fn report_has_no_error_key_and_null_for_missing_content() {
    let mut coverage_data = CoverageData::new();
    coverage_data.insert("app/a.py".into(), 50.0);
    let report = AnalysisReport {
      timestamp: "2025-01-15T10:30:00+00:00".into(),
      total_files: 1,
      coverage_data,
      lowest_coverage_files: vec![FileReport {
        filepath: "app/a.py".into(),
        coverage: 50.0,
        content: None,
        existing_test: None,
      }],
    };
    let json = serde_json::to_value(ReportFile::Report(report)).unwrap();
    assert!(json.get("error").is_none());
    assert_eq!(json["total_files"], 1);
    assert_eq!(json["coverage_data"]["app/a.py"], 50.0);
    assert!(json["lowest_coverage_files"][0]["content"].is_null());
  }

  #[test]
  fn error_file_reads_back_as_failure() {
    let parsed: ReportFile = serde_json::from_str(r#"{"error": "No coverage data found"}"#).unwrap();
    assert!(parsed.is_error());
  }
}
