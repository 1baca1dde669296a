//! Coverage report parsing: Cobertura XML first, tabular text as fallback.
//!
//! Both paths yield the same [`CoverageData`] shape, so nothing downstream
//! cares which one ran. Bad entries are zeroed and logged, never fatal.

use std::io::ErrorKind;
use std::path::Path;

use log::{debug, info, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::CoverageError;
use crate::types::CoverageData;

/// Convert a `line-rate` fraction to a percentage in [0, 100].
/// Missing, malformed and non-finite rates become exactly 0.0.
pub fn ratio_to_percent(raw: Option<&str>) -> f64 {
  match raw.map(|r| r.trim().parse::<f64>()) {
    Some(Ok(rate)) if rate.is_finite() => (rate * 100.0).clamp(0.0, 100.0),
    _ => 0.0,
  }
}

/// Read the structured report at `path`. An absent or unreadable file gives
/// an empty mapping, which sends the caller to the tabular fallback.
pub fn load_xml(path: &Path) -> CoverageData {
  match std::fs::read_to_string(path) {
    Ok(xml) => parse_xml(&xml),
    Err(e) if e.kind() == ErrorKind::NotFound => {
      info!("no structured report at {}", path.display());
      CoverageData::new()
    }
    Err(e) => {
      warn!("{}", CoverageError::parse(format!("{}: {}", path.display(), e)));
      CoverageData::new()
    }
  }
}

/// Per-file percentages from a Cobertura document (`<class filename line-rate>`).
///
/// Package rates are parsed with the same rule but only logged. A malformed
/// document stops the scan; whatever was read before it is kept.
pub fn parse_xml(xml: &str) -> CoverageData {
  let mut data = CoverageData::new();
  let mut reader = Reader::from_str(xml);

  loop {
    match reader.read_event() {
      Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
        b"package" => {
          let name = attribute(&e, b"name").unwrap_or_default();
          let percent = ratio_to_percent(attribute(&e, b"line-rate").as_deref());
          debug!("package {:?}: {:.1}%", name, percent);
        }
        b"class" => match attribute(&e, b"filename") {
          Some(filename) if !filename.is_empty() => {
            let rate = attribute(&e, b"line-rate");
            let percent = ratio_to_percent(rate.as_deref());
            if percent == 0.0 && rate.as_deref().map(str::trim) != Some("0") {
              debug!("{}: line-rate {:?} read as 0%", filename, rate);
            }
            data.insert(filename, percent);
          }
          _ => warn!("{}", CoverageError::parse("<class> without a filename skipped")),
        },
        _ => {}
      },
      Ok(Event::Eof) => break,
      Ok(_) => {}
      Err(e) => {
        warn!(
          "{}",
          CoverageError::parse(format!(
            "malformed XML at byte {}: {}; keeping {} entries",
            reader.buffer_position(),
            e,
            data.len()
          ))
        );
        break;
      }
    }
  }

  data
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
  e.attributes()
    .filter_map(Result::ok)
    .find(|a| a.key.as_ref() == key)
    .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Per-file percentages from `coverage report` output.
///
/// ```text
/// Name           Stmts   Miss  Cover
/// ----------------------------------
/// app/a.py          10      5    50%
/// ----------------------------------
/// TOTAL             10      5    50%
/// ```
///
/// First column is the file, the first token ending in `%` is the percentage.
pub fn parse_tabular(text: &str) -> CoverageData {
  let mut data = CoverageData::new();

  for line in text.lines() {
    let mut tokens = line.split_whitespace();
    let name = match tokens.next() {
      Some(name) => name,
      None => continue,
    };
    if name == "Name" || name == "TOTAL" || name.starts_with("---") {
      continue;
    }
    let percent = match tokens.find(|t| t.ends_with('%')) {
      Some(token) => token,
      None => continue,
    };

    let value = match percent.trim_end_matches('%').parse::<f64>() {
      Ok(v) if v.is_finite() => v.clamp(0.0, 100.0),
      _ => {
        warn!(
          "{}",
          CoverageError::parse(format!("{}: bad percentage {:?}", name, percent))
        );
        0.0
      }
    };
    data.insert(name.to_string(), value);
  }

  data
}
