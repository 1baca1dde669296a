//! Build the final report: attach source and companion test content to each
//! selected entry. Reads are best-effort; a file that can't be read is `None`.

use std::io::ErrorKind;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::config::Config;
use crate::error::CoverageError;
use crate::types::{AnalysisReport, CoverageData, CoverageEntry, FileReport};

/// Companion test path: source root stripped, then `<test_dir>/<test_prefix>`
/// prepended (`app/a.py` -> `tests/test_a.py`).
pub fn test_path_for(file_path: &str, config: &Config) -> String {
  let prefix = config.source_prefix();
  let relative = file_path.strip_prefix(prefix.as_str()).unwrap_or(file_path);
  format!("{}/{}{}", config.test_dir, config.test_prefix, relative)
}

/// Read a file under the working root, or `None` if that fails for any reason.
pub fn read_optional(path: &str, config: &Config) -> Option<String> {
  match std::fs::read_to_string(config.resolve(path)) {
    Ok(content) => Some(content),
    Err(e) => {
      let err = CoverageError::file_read(path, e.to_string());
      if e.kind() == ErrorKind::NotFound {
        debug!("{}", err);
      } else {
        warn!("{}", err);
      }
      None
    }
  }
}

pub fn file_report(entry: &CoverageEntry, config: &Config) -> FileReport {
  let content = read_optional(&entry.file_path, config);
  if content.is_none() {
    warn!("{}: source not readable, reporting without content", entry.file_path);
  }
  let existing_test = read_optional(&test_path_for(&entry.file_path, config), config);

  FileReport {
    filepath: entry.file_path.clone(),
    coverage: entry.coverage_percent,
    content,
    existing_test,
  }
}

pub fn assemble(entries: &[CoverageEntry], data: &CoverageData, config: &Config) -> AnalysisReport {
  assemble_at(entries, data, config, Utc::now())
}

/// [`assemble`] with a fixed clock.
pub fn assemble_at(
  entries: &[CoverageEntry],
  data: &CoverageData,
  config: &Config,
  now: DateTime<Utc>,
) -> AnalysisReport {
  AnalysisReport {
    timestamp: now.to_rfc3339(),
    total_files: data.len(),
    coverage_data: data.clone(),
    lowest_coverage_files: entries.iter().map(|e| file_report(e, config)).collect(),
  }
}
