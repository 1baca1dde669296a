//! Core pipeline: measure, parse, select, assemble. Strictly sequential.

use log::{error, info, warn};

use crate::assemble;
use crate::config::Config;
use crate::error::CoverageError;
use crate::parser;
use crate::runner::{CoverageCli, CoverageTool, RunState};
use crate::select;
use crate::types::*;

/// One configured coverage-gap analysis over a working root.
pub struct Pipeline<T: CoverageTool> {
  config: Config,
  tool: T,
}

impl Pipeline<CoverageCli> {
  pub fn with_cli(config: Config) -> Self {
    Self::new(config, CoverageCli)
  }
}

impl<T: CoverageTool> Pipeline<T> {
  pub fn new(config: Config, tool: T) -> Self {
    Self { config, tool }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Run the whole analysis.
  ///
  /// Returns `Err` only for fatal failures: the tool could not run or timed
  /// out, the structured report could not be generated, or no parser found
  /// any data. Everything else is logged and degraded.
  pub fn run(&self) -> Result<AnalysisReport, CoverageError> {
    let outcome = self.run_stages();
    if let Err(e) = &outcome {
      error!("coverage analysis failed: {}", e);
    }
    outcome
  }

  fn run_stages(&self) -> Result<AnalysisReport, CoverageError> {
    info!(
      "measuring coverage of {}/ with tests in {}/",
      self.config.source_dir, self.config.test_dir
    );
    if self.tool.measure(&self.config)? == RunState::Failed {
      warn!("test suite reported failures; coverage data may be partial");
    }

    self.tool.write_xml(&self.config)?;

    let (data, source) = self.collect()?;
    info!("parsed {} files from the {:?} report", data.len(), source);

    let selected = select::select_lowest(&data, self.config.limit, &self.config);
    info!("selected {} low-coverage files", selected.len());

    Ok(assemble::assemble(&selected, &data, &self.config))
  }

  /// Coverage data from the structured report, or from the tabular report
  /// when the structured one is absent or empty. The fallback runs at most once.
  pub fn collect(&self) -> Result<(CoverageData, ReportSource), CoverageError> {
    let xml = parser::load_xml(&self.config.xml_report_path());
    if !xml.is_empty() {
      return Ok((xml, ReportSource::Xml));
    }

    info!("structured report has no entries; falling back to tabular output");
    let text = match self.tool.tabular_report(&self.config) {
      Ok(text) => text,
      Err(e @ CoverageError::ReportGeneration(_)) => {
        warn!("{}", e);
        String::new()
      }
      Err(e) => return Err(e),
    };

    let tabular = parser::parse_tabular(&text);
    if tabular.is_empty() {
      return Err(CoverageError::no_data(
        "neither the XML nor the tabular report listed any files",
      ));
    }
    Ok((tabular, ReportSource::Tabular))
  }
}
