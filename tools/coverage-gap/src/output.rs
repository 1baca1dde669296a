//! Writing the report artifact and the console summary.

use std::fs;
use std::path::Path;

use crate::error::CoverageError;
use crate::types::{AnalysisReport, ReportFile};

/// Serialize the outcome to `path` (overwriting it) and return what was written.
pub fn write_report(
  path: &Path,
  outcome: &Result<AnalysisReport, CoverageError>,
) -> Result<ReportFile, CoverageError> {
  let file = ReportFile::from(outcome);
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    fs::create_dir_all(parent)?;
  }
  let mut json = serde_json::to_string_pretty(&file)?;
  json.push('\n');
  fs::write(path, json)?;
  Ok(file)
}

/// 0 for a full report, 1 when the report carries an error.
pub fn exit_code(file: &ReportFile) -> i32 {
  if file.is_error() {
    1
  } else {
    0
  }
}

/// Human-readable lines for stdout.
pub fn summary(file: &ReportFile) -> Vec<String> {
  match file {
    ReportFile::Failure(failure) => vec![format!("Coverage analysis failed: {}", failure.error)],
    ReportFile::Report(report) => {
      let mut lines = vec![format!(
        "Analyzed {} files; {} below full coverage selected:",
        report.total_files,
        report.lowest_coverage_files.len()
      )];
      for f in &report.lowest_coverage_files {
        let test_note = if f.existing_test.is_some() {
          "has tests"
        } else {
          "no tests"
        };
        lines.push(format!("  {:>6.1}%  {} ({})", f.coverage, f.filepath, test_note));
      }
      lines
    }
  }
}
