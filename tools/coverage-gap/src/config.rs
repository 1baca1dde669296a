//! Reporter configuration with sane defaults and environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CoverageError;
use crate::select::clean_path;

/// Everything a run needs to know about where it works. Relative paths are
/// resolved against `work_root`, never against the process working directory.
#[derive(Debug, Clone)]
pub struct Config {
  /// Project root the tool runs in.
  pub work_root: PathBuf,
  /// Tracked source root, relative to `work_root` (also the path prefix of normalized entries).
  pub source_dir: String,
  /// Test root, relative to `work_root`.
  pub test_dir: String,
  /// Executable used for measurement and reporting.
  pub coverage_command: String,
  /// Structured report written by `coverage xml`.
  pub xml_report: PathBuf,
  /// Where the JSON artifact goes.
  pub output_path: PathBuf,
  /// Max entries in `lowest_coverage_files`.
  pub limit: usize,
  /// File extensions that count as source files.
  pub source_extensions: Vec<String>,
  /// Name prefix of companion test files (`test_` + file name).
  pub test_prefix: String,
  /// Wall-clock cap on the measurement pass.
  pub run_timeout: Duration,
  /// Wall-clock cap on each report-generation call.
  pub report_timeout: Duration,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      work_root: PathBuf::from("."),
      source_dir: "app".into(),
      test_dir: "tests".into(),
      coverage_command: "coverage".into(),
      xml_report: PathBuf::from("coverage.xml"),
      output_path: PathBuf::from("coverage_report.json"),
      limit: 5,
      source_extensions: vec![".py".into()],
      test_prefix: "test_".into(),
      run_timeout: Duration::from_secs(300),
      report_timeout: Duration::from_secs(60),
    }
  }
}

impl Config {
  /// Defaults overridden by `COVERAGE_GAP_*` environment variables.
  pub fn from_env() -> Result<Self, CoverageError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Defaults with only `COVERAGE_GAP_ROOT` and `COVERAGE_GAP_OUTPUT` applied.
  /// Never fails, so a run whose other settings are invalid can still write
  /// its error report where the caller expects it.
  pub fn paths_from_env() -> Self {
    Self::paths_from_lookup(|key| std::env::var(key).ok())
  }

  pub fn paths_from_lookup<F>(lookup: F) -> Self
  where
    F: Fn(&str) -> Option<String>,
  {
    let mut config = Self::default();
    if let Some(root) = non_blank(&lookup, "COVERAGE_GAP_ROOT") {
      config.work_root = PathBuf::from(root);
    }
    if let Some(output) = non_blank(&lookup, "COVERAGE_GAP_OUTPUT") {
      config.output_path = PathBuf::from(output);
    }
    config
  }

  /// Same as [`Config::from_env`] with an injectable lookup.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, CoverageError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let mut config = Self::paths_from_lookup(&lookup);

    if let Some(source) = non_blank(&lookup, "COVERAGE_GAP_SOURCE") {
      config.source_dir = relative_dir("COVERAGE_GAP_SOURCE", &source, &config.work_root)?;
    }
    if let Some(tests) = non_blank(&lookup, "COVERAGE_GAP_TESTS") {
      config.test_dir = relative_dir("COVERAGE_GAP_TESTS", &tests, &config.work_root)?;
    }
    if let Some(command) = non_blank(&lookup, "COVERAGE_GAP_COMMAND") {
      config.coverage_command = command;
    }
    if let Some(limit) = non_blank(&lookup, "COVERAGE_GAP_LIMIT") {
      config.limit = match limit.parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
          return Err(CoverageError::config(
            "COVERAGE_GAP_LIMIT",
            "expected a positive integer",
          ))
        }
      };
    }

    Ok(config)
  }

  /// Resolve a path relative to the working root (absolute paths pass through).
  pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.work_root.join(path)
    }
  }

  pub fn xml_report_path(&self) -> PathBuf {
    self.resolve(&self.xml_report)
  }

  pub fn output_file(&self) -> PathBuf {
    self.resolve(&self.output_path)
  }

  /// `app/` style prefix every normalized entry starts with.
  pub fn source_prefix(&self) -> String {
    format!("{}/", self.source_dir)
  }
}

fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
  F: Fn(&str) -> Option<String>,
{
  lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Directory setting in the same form as normalized report paths: relative to
/// `work_root`, forward slashes, no `./` or trailing `/`. Absolute values must
/// sit under `work_root`.
fn relative_dir(field: &str, value: &str, work_root: &Path) -> Result<String, CoverageError> {
  let unified = value.replace('\\', "/");
  let path = Path::new(&unified);
  let relative = if path.is_absolute() {
    match path.strip_prefix(work_root) {
      Ok(rest) => rest.to_string_lossy().into_owned(),
      Err(_) => {
        return Err(CoverageError::config(
          field,
          &format!("absolute path {} is outside the working root {}", value, work_root.display()),
        ))
      }
    }
  } else {
    unified
  };

  let cleaned = clean_path(&relative);
  if cleaned.is_empty() {
    return Err(CoverageError::config(field, "must name a directory under the working root"));
  }
  Ok(cleaned)
}
