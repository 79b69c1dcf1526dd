use std::path::{Path, PathBuf};
use std::slice::Iter;
use std::thread;

use log::{error, info};
use nix::libc::STDOUT_FILENO;
use nix::unistd::isatty;

use crate::sandbox::{run_submission, ContainerOption};
use crate::stage::{Goal, ScoreRecord};
use crate::utils::escape_json;
use crate::GolBoxError;

pub use builder::{GolBoxBuilder, SubmissionOptionBuilder};

mod builder;

/// A batch of submissions and the context collecting their results
pub struct GolBox {
  context: Box<dyn GolBoxContext>,
  options: Vec<SubmissionOption>,
  parallel: bool,
}

/// GolBoxContext for storing submission results
pub trait GolBoxContext {
  fn add_result(&mut self, label: &str, result: Result<SubmissionResult, GolBoxError>);

  fn reports(&self) -> &[SubmissionReport];

  fn report(&self) {
    let is_tty = isatty(STDOUT_FILENO).unwrap_or(false);
    if is_tty {
      self.report_human();
    } else {
      self.report_json();
    }
  }

  fn report_human(&self);

  /// Reports as a JSON array
  fn render_json(&self) -> String;

  fn report_json(&self) {
    println!("{}", self.render_json());
  }
}

/// Outcome of one submission, kept even when it failed
pub struct SubmissionReport {
  label: String,
  result: Result<SubmissionResult, GolBoxError>,
}

#[derive(Default)]
pub struct GolBoxRunContext {
  reports: Vec<SubmissionReport>,
}

/// Where a submission lives and how it is run
#[derive(Debug, Clone)]
pub struct SubmissionOption {
  /// Team id, names the upload, the working tree and the audit files
  label: String,
  root: PathBuf,
  ext: String,
  /// Installed source name without extension
  entry: String,
  template: Option<PathBuf>,
  preamble: Option<String>,
  stages: Vec<Goal>,
  container: ContainerOption,
  keep: bool,
}

/// Parsed aggregate score log of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
  label: String,
  records: Vec<ScoreRecord>,
}

impl GolBox {
  /// Run every submission, a failing one does not stop the others
  pub fn start(&mut self) -> Result<(), GolBoxError> {
    let results = if self.parallel && self.options.len() > 1 {
      thread::scope(|scope| {
        let handles = self
          .options
          .iter()
          .map(|option| scope.spawn(move || run_submission(option)))
          .collect::<Vec<_>>();
        handles
          .into_iter()
          .map(|handle| {
            handle
              .join()
              .unwrap_or_else(|_| Err(GolBoxError::submission("Submission worker panicked")))
          })
          .collect::<Vec<_>>()
      })
    } else {
      self.options.iter().map(run_submission).collect::<Vec<_>>()
    };

    for (option, result) in self.options.iter().zip(results.into_iter()) {
      match &result {
        Ok(result) => info!("Submission {} finished with {}", option.label(), result.total()),
        Err(err) => error!("Submission {} failed: {}", option.label(), err),
      }
      self.context.add_result(option.label(), result);
    }
    Ok(())
  }

  /// List all the submissions
  pub fn submissions(&self) -> Iter<SubmissionOption> {
    self.options.iter()
  }

  /// Return the only submission when there is just one
  pub fn single(&self) -> Option<&SubmissionOption> {
    if self.options.len() == 1 {
      self.options.first()
    } else {
      None
    }
  }

  pub fn reports(&self) -> &[SubmissionReport] {
    self.context.reports()
  }

  pub fn report(&self) {
    self.context.report();
  }

  pub fn report_json(&self) {
    self.context.report_json();
  }

  pub fn render_json(&self) -> String {
    self.context.render_json()
  }
}

impl SubmissionReport {
  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn result(&self) -> &Result<SubmissionResult, GolBoxError> {
    &self.result
  }
}

impl SubmissionOption {
  pub fn new<LS: Into<String>, P: Into<PathBuf>>(label: LS, root: P) -> Self {
    SubmissionOption {
      label: label.into(),
      root: root.into(),
      ext: "py".to_string(),
      entry: "ModulePlayer".to_string(),
      template: None,
      preamble: None,
      stages: vec![],
      container: ContainerOption::default(),
      keep: false,
    }
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn ext(&self) -> &str {
    &self.ext
  }

  pub fn template(&self) -> Option<&Path> {
    self.template.as_deref()
  }

  pub fn preamble(&self) -> Option<&str> {
    self.preamble.as_deref()
  }

  pub fn stages(&self) -> &[Goal] {
    &self.stages
  }

  pub fn container(&self) -> &ContainerOption {
    &self.container
  }

  pub fn keep(&self) -> bool {
    self.keep
  }

  /// `<root>/tmp/<label>.<ext>`
  pub fn upload(&self) -> PathBuf {
    self
      .root
      .join("tmp")
      .join(format!("{}.{}", self.label, self.ext))
  }

  /// `<root>/teams/<label>`
  pub fn workdir(&self) -> PathBuf {
    self.root.join("teams").join(&self.label)
  }

  /// Sanitized source inside the working tree
  pub fn entry(&self) -> PathBuf {
    self.workdir().join(format!("{}.{}", self.entry, self.ext))
  }

  /// `<root>/logs`
  pub fn log_dir(&self) -> PathBuf {
    self.root.join("logs")
  }
}

impl SubmissionResult {
  pub fn new<LS: Into<String>>(label: LS, records: Vec<ScoreRecord>) -> Self {
    SubmissionResult {
      label: label.into(),
      records,
    }
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn records(&self) -> &[ScoreRecord] {
    &self.records
  }

  pub fn scores(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
    self.records.iter().filter_map(|record| match record {
      ScoreRecord::Score { stage, score } => Some((stage.as_str(), *score)),
      _ => None,
    })
  }

  pub fn errors(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
    self.records.iter().filter_map(|record| match record {
      ScoreRecord::Error { stage, message } => Some((stage.as_str(), message.as_str())),
      _ => None,
    })
  }

  /// Logged total, or the sum of the stage scores when the run was cut short
  pub fn total(&self) -> u64 {
    self
      .records
      .iter()
      .find_map(|record| match record {
        ScoreRecord::Total(total) => Some(*total),
        _ => None,
      })
      .unwrap_or_else(|| self.scores().map(|(_, score)| score as u64).sum())
  }
}

impl GolBoxRunContext {
  pub fn new() -> Self {
    GolBoxRunContext::default()
  }
}

impl GolBoxContext for GolBoxRunContext {
  fn add_result(&mut self, label: &str, result: Result<SubmissionResult, GolBoxError>) {
    self.reports.push(SubmissionReport {
      label: label.to_string(),
      result,
    });
  }

  fn reports(&self) -> &[SubmissionReport] {
    &self.reports
  }

  fn report_human(&self) {
    println!();
    for report in &self.reports {
      println!("\x1b[1mSubmission\x1b[22m {}", report.label);
      match &report.result {
        Ok(result) => {
          for (stage, score) in result.scores() {
            println!("  {:<10} {}", stage, score);
          }
          for (stage, message) in result.errors() {
            println!("  {:<10} \x1b[91m{}\x1b[39m", stage, message);
          }
          println!("  \x1b[1m{:<10}\x1b[22m {}", "Total", result.total());
        }
        Err(err) => println!("  \x1b[91m×\x1b[39m {}", err),
      }
      println!();
    }
  }

  fn render_json(&self) -> String {
    let mut entries = vec![];
    for report in &self.reports {
      let entry = match &report.result {
        Ok(result) => {
          let scores = result
            .scores()
            .map(|(stage, score)| {
              format!(
                "{{ \"stage\": \"{}\", \"score\": {} }}",
                escape_json(stage),
                score
              )
            })
            .collect::<Vec<String>>()
            .join(", ");
          let errors = result
            .errors()
            .map(|(stage, message)| {
              format!(
                "{{ \"stage\": \"{}\", \"message\": \"{}\" }}",
                escape_json(stage),
                escape_json(message)
              )
            })
            .collect::<Vec<String>>()
            .join(", ");
          format!(
            "  {{\n    \"label\": \"{}\",\n    \"ok\": true,\n    \"scores\": [{}],\n    \"errors\": [{}],\n    \"total\": {}\n  }}",
            escape_json(&report.label),
            scores,
            errors,
            result.total()
          )
        }
        Err(err) => format!(
          "  {{\n    \"label\": \"{}\",\n    \"ok\": false,\n    \"message\": \"{}\"\n  }}",
          escape_json(&report.label),
          escape_json(&err.to_string())
        ),
      };
      entries.push(entry);
    }
    format!("[\n{}\n]", entries.join(",\n"))
  }
}
