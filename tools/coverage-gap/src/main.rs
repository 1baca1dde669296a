//! Binary entrypoint: run the analysis, write coverage_report.json, exit 1 on error.
//!
//! No flags. Configuration comes from `COVERAGE_GAP_*` environment variables;
//! logging is controlled by `RUST_LOG` (default `info`, to stderr).

use coverage_gap::{output, Config, Pipeline};
use log::error;

fn main() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let (config, outcome) = match Config::from_env() {
    Ok(config) => {
      let pipeline = Pipeline::with_cli(config.clone());
      (config, pipeline.run())
    }
    Err(e) => {
      error!("{}", e);
      (Config::paths_from_env(), Err(e))
    }
  };

  let path = config.output_file();
  let file = match output::write_report(&path, &outcome) {
    Ok(file) => file,
    Err(e) => {
      error!("cannot write {}: {}", path.display(), e);
      std::process::exit(1);
    }
  };

  for line in output::summary(&file) {
    println!("{}", line);
  }
  std::process::exit(output::exit_code(&file));
}

