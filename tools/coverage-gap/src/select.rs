//! Low-coverage selection: normalize paths under the source root, filter,
//! rank ascending, cap at the limit.

use std::collections::HashSet;

use crate::config::Config;
use crate::types::{CoverageData, CoverageEntry};

/// Clean a relative path for stable comparison:
/// - backslash -> forward slash
/// - collapse repeated slashes
/// - strip leading `./` and `/`, and trailing `/`
pub fn clean_path(path: &str) -> String {
  let s = path.trim().replace('\\', "/");
  let mut out = String::with_capacity(s.len());
  let mut prev_slash = false;
  for ch in s.chars() {
    if ch == '/' {
      if !prev_slash {
        out.push('/');
      }
      prev_slash = true;
    } else {
      prev_slash = false;
      out.push(ch);
    }
  }

  let mut rest = out.as_str();
  loop {
    if let Some(r) = rest.strip_prefix("./") {
      rest = r;
    } else if let Some(r) = rest.strip_prefix('/') {
      rest = r;
    } else {
      break;
    }
  }
  match rest.trim_end_matches('/') {
    "." => String::new(),
    cleaned => cleaned.to_string(),
  }
}

/// Normalize a report path so it resolves under the source root: cleaned
/// with [`clean_path`], then prefixed with `<source_dir>/` unless already
/// there. The source dir goes through the same cleaning.
///
/// Idempotent: a normalized path comes back unchanged.
pub fn normalize_path(path: &str, source_dir: &str) -> String {
  let rest = clean_path(path);
  let source = clean_path(source_dir);
  let prefix = format!("{}/", source);
  if rest.starts_with(&prefix) || rest == source {
    rest
  } else {
    format!("{}{}", prefix, rest)
  }
}

/// Whether the file counts as source for selection purposes.
pub fn is_source_file(path: &str, extensions: &[String]) -> bool {
  extensions.iter().any(|ext| path.ends_with(ext.as_str()))
}

/// The `limit` lowest-covered source files, ascending.
///
/// Only entries strictly between 0% and 100% qualify: 100% has nothing left
/// to improve and 0% usually means the file was never imported by the run.
/// Ties keep input order. When two report paths normalize to the same file,
/// the first one wins.
pub fn select_lowest(data: &CoverageData, limit: usize, config: &Config) -> Vec<CoverageEntry> {
  let mut seen = HashSet::new();
  let mut candidates: Vec<CoverageEntry> = data
    .iter()
    .filter(|(_, &percent)| percent > 0.0 && percent < 100.0)
    .map(|(path, &percent)| CoverageEntry::new(normalize_path(path, &config.source_dir), percent))
    .filter(|entry| is_source_file(&entry.file_path, &config.source_extensions))
    .filter(|entry| seen.insert(entry.file_path.clone()))
    .collect();

  // sort_by is stable, which keeps input order for ties.
  candidates.sort_by(|a, b| {
    a.coverage_percent
      .partial_cmp(&b.coverage_percent)
      .unwrap_or(std::cmp::Ordering::Equal)
  });
  candidates.truncate(limit);
  candidates
}
