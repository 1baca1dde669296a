//! Coverage tool invocation: blocking subprocess calls with hard timeouts.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::Config;
use crate::error::CoverageError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lifecycle of one external command. `Succeeded`, `Failed` and `TimedOut`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
  NotStarted,
  Running,
  Succeeded,
  Failed,
  TimedOut,
}

impl RunState {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
  }
}

/// One run of one command, with whatever it printed.
#[derive(Debug)]
pub struct Invocation {
  label: String,
  timeout: Duration,
  state: RunState,
  exit_code: Option<i32>,
  stdout: String,
  stderr: String,
}

impl Invocation {
  pub fn new(label: impl Into<String>, timeout: Duration) -> Self {
    Self {
      label: label.into(),
      timeout,
      state: RunState::NotStarted,
      exit_code: None,
      stdout: String::new(),
      stderr: String::new(),
    }
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn state(&self) -> RunState {
    self.state
  }

  pub fn exit_code(&self) -> Option<i32> {
    self.exit_code
  }

  pub fn stdout(&self) -> &str {
    &self.stdout
  }

  pub fn stderr(&self) -> &str {
    &self.stderr
  }

  /// Run `cmd` to completion or until the timeout fires.
  ///
  /// A non-zero exit is not an error here: it ends in `Failed` and the caller
  /// decides what that means. Spawn failures and timeouts are errors.
  pub fn run(&mut self, mut cmd: Command) -> Result<RunState, CoverageError> {
    if self.state != RunState::NotStarted {
      return Err(CoverageError::tool(&self.label, "invocation already used"));
    }

    self.state = RunState::Running;
    debug!("{}: starting (timeout {}s)", self.label, self.timeout.as_secs());

    let mut child = match cmd
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
    {
      Ok(child) => child,
      Err(e) => {
        self.state = RunState::Failed;
        return Err(CoverageError::tool(&self.label, e.to_string()));
      }
    };

    // Drain both pipes while polling so a chatty child never blocks on a full pipe.
    let stdout_reader = drain(child.stdout.take());
    let stderr_reader = drain(child.stderr.take());

    let deadline = Instant::now() + self.timeout;
    let status = loop {
      match child.try_wait() {
        Ok(Some(status)) => break status,
        Ok(None) if Instant::now() >= deadline => {
          kill(&mut child, &self.label);
          self.state = RunState::TimedOut;
          // Readers are left detached: a grandchild may still hold the pipes open.
          return Err(CoverageError::timed_out(&self.label, self.timeout));
        }
        Ok(None) => thread::sleep(POLL_INTERVAL),
        Err(e) => {
          kill(&mut child, &self.label);
          self.state = RunState::Failed;
          return Err(CoverageError::tool(&self.label, e.to_string()));
        }
      }
    };

    // The deadline also bounds draining: a grandchild that inherited the pipes
    // (a server started by a test, say) can keep them open after the child exits.
    let stdout = collect(stdout_reader, deadline);
    let stderr = collect(stderr_reader, deadline);
    if stdout.is_none() || stderr.is_none() {
      warn!(
        "{}: output still open at the deadline (background process?); keeping partial output",
        self.label
      );
    }
    self.stdout = stdout.unwrap_or_default();
    self.stderr = stderr.unwrap_or_default();
    self.exit_code = status.code();
    self.state = if status.success() {
      RunState::Succeeded
    } else {
      RunState::Failed
    };
    debug!("{}: finished with {:?} ({:?})", self.label, self.state, self.exit_code);
    Ok(self.state)
  }

  /// Short description of a failed run for error messages.
  fn failure_detail(&self) -> String {
    let code = match self.exit_code {
      Some(code) => format!("exit status {}", code),
      None => "terminated by signal".to_string(),
    };
    let tail = self
      .stderr
      .lines()
      .rev()
      .find(|l| !l.trim().is_empty())
      .or_else(|| self.stdout.lines().rev().find(|l| !l.trim().is_empty()));
    match tail {
      Some(line) => format!("{}: {}", code, line.trim()),
      None => code,
    }
  }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<String>> {
  pipe.map(|mut pipe| {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
      let mut buf = Vec::new();
      let _ = pipe.read_to_end(&mut buf);
      let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
  })
}

/// Wait for a drained pipe until the deadline. `None` means the pipe was
/// still open; the reader thread is left detached.
fn collect(reader: Option<Receiver<String>>, deadline: Instant) -> Option<String> {
  match reader {
    Some(rx) => {
      let wait = deadline
        .saturating_duration_since(Instant::now())
        .max(POLL_INTERVAL);
      rx.recv_timeout(wait).ok()
    }
    None => Some(String::new()),
  }
}

fn kill(child: &mut Child, label: &str) {
  if let Err(e) = child.kill() {
    warn!("{}: failed to kill child: {}", label, e);
  }
  let _ = child.wait();
}

// ---------------------------------------------------------------------------
// Coverage tool seam
// ---------------------------------------------------------------------------

/// The three calls the pipeline makes against the coverage tool.
pub trait CoverageTool {
  /// Measurement pass. Returns the terminal state; `Failed` means the test
  /// suite failed but partial data may still be usable.
  fn measure(&self, config: &Config) -> Result<RunState, CoverageError>;

  /// Write the structured (XML) report to `config.xml_report_path()`.
  fn write_xml(&self, config: &Config) -> Result<(), CoverageError>;

  /// Human-readable tabular report, as printed by the tool.
  fn tabular_report(&self, config: &Config) -> Result<String, CoverageError>;
}

/// [`CoverageTool`] backed by the `coverage` command line.
#[derive(Debug, Clone, Default)]
pub struct CoverageCli;

impl CoverageCli {
  fn command(config: &Config) -> Command {
    let mut cmd = Command::new(&config.coverage_command);
    cmd.current_dir(&config.work_root);
    cmd
  }
}

impl CoverageTool for CoverageCli {
  fn measure(&self, config: &Config) -> Result<RunState, CoverageError> {
    let mut cmd = Self::command(config);
    cmd
      .arg("run")
      .arg(format!("--source={}", config.source_dir))
      .args(["-m", "pytest"])
      .arg(&config.test_dir);

    let mut invocation = Invocation::new("coverage run", config.run_timeout);
    let state = invocation.run(cmd)?;
    if state == RunState::Failed {
      warn!(
        "test run failed ({}); continuing with partial coverage data",
        invocation.failure_detail()
      );
    } else {
      info!("test run completed");
    }
    Ok(state)
  }

  fn write_xml(&self, config: &Config) -> Result<(), CoverageError> {
    let mut cmd = Self::command(config);
    cmd.args(["xml", "-o"]).arg(config.xml_report_path());

    let mut invocation = Invocation::new("coverage xml", config.report_timeout);
    match invocation.run(cmd)? {
      RunState::Succeeded => Ok(()),
      _ => Err(CoverageError::report(format!(
        "{}: {}",
        invocation.label(),
        invocation.failure_detail()
      ))),
    }
  }

  fn tabular_report(&self, config: &Config) -> Result<String, CoverageError> {
    let mut cmd = Self::command(config);
    cmd.arg("report");

    let mut invocation = Invocation::new("coverage report", config.report_timeout);
    match invocation.run(cmd)? {
      RunState::Succeeded => Ok(invocation.stdout),
      _ => Err(CoverageError::report(format!(
        "{}: {}",
        invocation.label(),
        invocation.failure_detail()
      ))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sh(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", script]);
    cmd
  }

  #[test]
  fn new_invocation_is_not_started() {
    let inv = Invocation::new("noop", Duration::from_secs(1));
    assert_eq!(inv.state(), RunState::NotStarted);
    assert!(!inv.state().is_terminal());
  }

  #[test]
  fn missing_binary_is_a_tool_error() {
    let mut inv = Invocation::new("ghost", Duration::from_secs(1));
    let err = inv
      .run(Command::new("definitely-not-a-real-binary-4242"))
      .unwrap_err();
    assert!(matches!(err, CoverageError::ToolInvocation { .. }));
    assert_eq!(inv.state(), RunState::Failed);
  }

  #[cfg(unix)]
  #[test]
  fn captures_stdout_on_success() {
    let mut inv = Invocation::new("echo", Duration::from_secs(10));
    let state = inv.run(sh("echo hello")).unwrap();
    assert_eq!(state, RunState::Succeeded);
    assert_eq!(inv.stdout().trim(), "hello");
    assert_eq!(inv.exit_code(), Some(0));
  }

  #[cfg(unix)]
  #[test]
  fn non_zero_exit_is_failed_not_error() {
    let mut inv = Invocation::new("fail", Duration::from_secs(10));
    let state = inv.run(sh("echo oops >&2; exit 3")).unwrap();
    assert_eq!(state, RunState::Failed);
    assert_eq!(inv.exit_code(), Some(3));
    assert_eq!(inv.failure_detail(), "exit status 3: oops");
  }

  #[cfg(unix)]
  #[test]
  fn timeout_kills_and_reports() {
    let mut inv = Invocation::new("slow", Duration::from_millis(200));
    let started = Instant::now();
    let err = inv.run(sh("exec sleep 30")).unwrap_err();
    assert!(matches!(err, CoverageError::TimedOut { .. }));
    assert_eq!(inv.state(), RunState::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(10));
  }

  #[cfg(unix)]
  #[test]
  fn background_process_holding_pipes_does_not_outlive_deadline() {
    let mut inv = Invocation::new("bg", Duration::from_millis(300));
    let started = Instant::now();
    let state = inv.run(sh("echo started; sleep 5 & exit 0")).unwrap();
    assert_eq!(state, RunState::Succeeded);
    assert_eq!(inv.exit_code(), Some(0));
    assert!(
      started.elapsed() < Duration::from_secs(2),
      "took {:?}",
      started.elapsed()
    );
  }

  #[cfg(unix)]
  #[test]
  fn invocation_runs_only_once() {
    let mut inv = Invocation::new("once", Duration::from_secs(10));
    inv.run(sh("true")).unwrap();
    assert!(inv.run(sh("true")).is_err());
    assert_eq!(inv.state(), RunState::Succeeded);
  }

  #[cfg(unix)]
  #[test]
  fn report_failure_is_report_generation_error() {
    let dir = tempfile::tempdir().unwrap();
    // `sh xml -o ...` exits non-zero: there is no script called `xml`.
    let config = Config {
      work_root: dir.path().to_path_buf(),
      coverage_command: "sh".into(),
      ..Config::default()
    };
    let err = CoverageCli.write_xml(&config).unwrap_err();
    assert!(matches!(err, CoverageError::ReportGeneration(_)));
    assert!(err.to_string().contains("coverage xml"));
    assert_eq!(err.report_message(), "Failed to generate coverage report");
  }

  #[cfg(unix)]
  #[test]
  fn report_step_honors_report_timeout() {
    let dir = tempfile::tempdir().unwrap();
    // `sh xml -o ...` runs the `xml` script in the working root.
    std::fs::write(dir.path().join("xml"), "exec sleep 30\n").unwrap();
    let config = Config {
      work_root: dir.path().to_path_buf(),
      coverage_command: "sh".into(),
      report_timeout: Duration::from_millis(200),
      ..Config::default()
    };
    let started = Instant::now();
    let err = CoverageCli.write_xml(&config).unwrap_err();
    assert!(matches!(err, CoverageError::TimedOut { .. }));
    assert_eq!(err.report_message(), "Failed to run coverage");
    assert!(started.elapsed() < Duration::from_secs(10));
  }
}
