//! Coverage Gap Reporter — picks the least-covered source files for test generation.
//!
//! Runs `coverage` over the source tree, parses the Cobertura XML report
//! (tabular report as fallback), ranks files by coverage, and writes one JSON
//! artifact pairing each low-coverage file with its content and existing test.
//!
//! Sequential, single-run; the working root is explicit in [`Config`].

pub mod assemble;
pub mod config;
pub mod error;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod runner;
pub mod select;
pub mod types;

pub use config::Config;
pub use error::CoverageError;
pub use pipeline::Pipeline;
pub use runner::{CoverageCli, CoverageTool, RunState};
pub use types::{AnalysisReport, FileReport, ReportFile};
