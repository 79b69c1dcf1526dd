//! Host side of a submission: install, isolated run, collection, cleanup.

use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use log::{debug, error, info, warn};

use crate::context::{SubmissionOption, SubmissionResult};
use crate::sanitize::{Sanitized, Sanitizer};
use crate::stage::{decode_latin1, encode_latin1, Goal, ScoreRecord};
use crate::utils::mount::MountPoint;
use crate::utils::{copy_dir_all, OutputPipe};
use crate::GolBoxError;

/// Trusted driver written into every working tree, it loads the submission
/// with the namespace sent by the host and answers its turns
pub const DRIVER_NAME: &str = "GoLDriver.py";
pub const DRIVER_SOURCE: &str = include_str!("../template/GoLDriver.py");

/// Player library, kept when the template tree ships its own
pub const LIBRARY_NAME: &str = "GoLLib.py";
pub const LIBRARY_SOURCE: &str = include_str!("../template/GoLLib.py");

/// Container runtime invocation
#[derive(Debug, Clone)]
pub struct ContainerOption {
  program: String,
  image: String,
  cpus: f64,
  mounts: Vec<MountPoint>,
  env: Vec<(String, String)>,
  command: Vec<String>,
}

impl Default for ContainerOption {
  fn default() -> Self {
    ContainerOption {
      program: "docker".to_string(),
      image: "secure-python-runner".to_string(),
      cpus: 1.0,
      mounts: vec![],
      env: vec![],
      command: vec![
        "golj".to_string(),
        "play".to_string(),
        "--root".to_string(),
        "/app".to_string(),
        "--".to_string(),
        "python3".to_string(),
        format!("/app/{}", DRIVER_NAME),
      ],
    }
  }
}

impl ContainerOption {
  pub fn new() -> Self {
    ContainerOption::default()
  }

  /// Container runtime executable
  pub fn program<PS: Into<String>>(mut self, program: PS) -> Self {
    self.program = program.into();
    self
  }

  pub fn image<IS: Into<String>>(mut self, image: IS) -> Self {
    self.image = image.into();
    self
  }

  pub fn cpus(mut self, cpus: f64) -> Self {
    self.cpus = cpus;
    self
  }

  /// Extra read only mount, e.g. a shared stage directory
  pub fn mount(mut self, mount: MountPoint) -> Self {
    self.mounts.push(mount);
    self
  }

  pub fn env<KS: Into<String>, VS: Into<String>>(mut self, key: KS, value: VS) -> Self {
    self.env.push((key.into(), value.into()));
    self
  }

  /// Command run inside the image, empty keeps the image entrypoint
  pub fn command(mut self, command: Vec<String>) -> Self {
    self.command = command;
    self
  }

  pub fn program_name(&self) -> &str {
    &self.program
  }

  pub fn image_name(&self) -> &str {
    &self.image
  }

  /// Argument vector of the runtime, no shell is involved
  pub fn arguments(&self, root: &Path, stages: &[Goal]) -> Result<Vec<String>, GolBoxError> {
    let app = MountPoint::write(root, "/app")?;
    let stages = stages
      .iter()
      .map(|goal| goal.id().to_string())
      .collect::<Vec<String>>()
      .join(" ");

    let mut arguments = vec![
      "run",
      "--rm",
      "--cap-drop",
      "ALL",
      "--cap-add",
      "SETUID",
      "--cap-add",
      "SETGID",
      "--security-opt",
      "no-new-privileges",
      "--network",
      "none",
    ]
    .into_iter()
    .map(|arg| arg.to_string())
    .collect::<Vec<String>>();
    arguments.push("--cpus".to_string());
    arguments.push(format!("{}", self.cpus));
    arguments.push("-v".to_string());
    arguments.push(app.volume());
    for mount in &self.mounts {
      arguments.push("-v".to_string());
      arguments.push(mount.volume());
    }
    arguments.push("-e".to_string());
    arguments.push(format!("STAGES={}", stages));
    for (key, value) in &self.env {
      arguments.push("-e".to_string());
      arguments.push(format!("{}={}", key, value));
    }
    arguments.push(self.image.clone());
    arguments.extend(self.command.iter().cloned());
    Ok(arguments)
  }
}

/// Copy the template tree, then sanitize the upload into the working tree
pub fn install_submission(option: &SubmissionOption) -> Result<Sanitized, GolBoxError> {
  let upload = option.upload();
  if !upload.is_file() {
    return Err(GolBoxError::submission(format!(
      "Submission {} does not exist",
      upload.to_string_lossy()
    )));
  }

  let workdir = option.workdir();
  fs::create_dir_all(&workdir)?;
  if let Some(template) = option.template() {
    if template.is_dir() {
      copy_dir_all(template, &workdir)?;
    } else {
      warn!(
        "Template directory {} does not exist",
        template.to_string_lossy()
      );
    }
  }
  fs::create_dir_all(workdir.join("logs"))?;
  // 驱动总是覆盖模板中的同名文件
  fs::write(workdir.join(DRIVER_NAME), DRIVER_SOURCE)?;
  let library = workdir.join(LIBRARY_NAME);
  if !library.exists() {
    fs::write(&library, LIBRARY_SOURCE)?;
  }

  let sanitizer = match option.preamble() {
    Some(preamble) => Sanitizer::new()?.preamble(preamble),
    None => Sanitizer::new()?,
  };
  let sanitized = sanitizer.install(&upload, option.entry())?;
  for stripped in sanitized.stripped() {
    info!(
      "Submission {} line {} stripped for {}",
      option.label(),
      stripped.line,
      stripped.token
    );
  }
  Ok(sanitized)
}

/// Run the working tree in the container, return the captured output.
///
/// The output is always written to `logs/<label>.log`, a non-zero exit is an
/// error carrying it.
pub fn invoke_isolated(option: &SubmissionOption) -> Result<String, GolBoxError> {
  let workdir = option.workdir();
  if !workdir.is_dir() {
    return Err(GolBoxError::submission(format!(
      "Working tree {} does not exist",
      workdir.to_string_lossy()
    )));
  }
  let container = option.container();
  let arguments = container.arguments(&workdir, option.stages())?;

  let (reader, stdout, stderr) = OutputPipe::new()?.split()?;
  let mut child = {
    let mut command = Command::new(container.program_name());
    command
      .args(&arguments)
      .stdin(Stdio::null())
      .stdout(stdout)
      .stderr(stderr);
    info!(
      "Start container {} {}",
      container.program_name(),
      arguments.join(" ")
    );
    command.spawn().map_err(|err| {
      GolBoxError::container(
        format!("Start {} fails: {}", container.program_name(), err),
        "",
      )
    })?
  };

  let output = reader.read_all();
  let status = child.wait()?;
  let output = output?;

  let log_dir = option.log_dir();
  fs::create_dir_all(&log_dir)?;
  let log_file = log_dir.join(format!("{}.log", option.label()));
  fs::write(&log_file, encode_latin1(&output))?;
  debug!("Write container output to {}", log_file.to_string_lossy());

  if status.success() {
    info!("Container of {} exits with {}", option.label(), status);
    Ok(output)
  } else {
    Err(GolBoxError::container(
      format!("Container of {} exits with {}", option.label(), status),
      output,
    ))
  }
}

/// Parse the aggregate score log and archive source and logs
pub fn collect_results(option: &SubmissionOption) -> Result<SubmissionResult, GolBoxError> {
  let workdir = option.workdir();
  if !workdir.is_dir() {
    return Err(GolBoxError::submission(format!(
      "Working tree {} does not exist",
      workdir.to_string_lossy()
    )));
  }

  let log_dir = option.log_dir();
  fs::create_dir_all(&log_dir)?;
  let entry = option.entry();
  match fs::symlink_metadata(&entry) {
    Ok(meta) if meta.file_type().is_file() => {
      fs::copy(&entry, log_dir.join(format!("{}.{}", option.label(), option.ext())))?;
    }
    Ok(_) => warn!("Installed source {} is not a regular file", entry.to_string_lossy()),
    Err(_) => warn!("Installed source {} is missing", entry.to_string_lossy()),
  }

  let logs = workdir.join("logs");
  let is_dir = fs::symlink_metadata(&logs)
    .map(|meta| meta.file_type().is_dir())
    .unwrap_or(false);
  if !is_dir {
    return Err(GolBoxError::submission(format!(
      "Log directory {} is not a directory",
      logs.to_string_lossy()
    )));
  }
  let all = logs.join("all.log");
  let is_file = fs::symlink_metadata(&all)
    .map(|meta| meta.file_type().is_file())
    .unwrap_or(false);
  if !is_file {
    return Err(GolBoxError::submission(format!(
      "Score log {} does not exist",
      all.to_string_lossy()
    )));
  }
  copy_dir_all(&logs, log_dir.join(option.label()))?;

  let records = ScoreRecord::parse_log(&decode_latin1(&fs::read(&all)?));
  let result = SubmissionResult::new(option.label(), records);
  info!("Submission {} total {}", option.label(), result.total());
  Ok(result)
}

/// Remove the working tree unless it is kept for debugging
pub fn close_environment(option: &SubmissionOption) {
  let workdir = option.workdir();
  if option.keep() {
    debug!("Persist working tree: {}", workdir.to_string_lossy());
    return;
  }
  if !workdir.exists() {
    return;
  }
  match remove_dir_all::remove_dir_all(&workdir) {
    Ok(_) => info!("Remove working tree: {}", workdir.to_string_lossy()),
    Err(err) => error!(
      "Fails removing working tree: {} ({})",
      workdir.to_string_lossy(),
      err
    ),
  }
}

/// Install, run, collect, then clean up whatever happened
pub fn run_submission(option: &SubmissionOption) -> Result<SubmissionResult, GolBoxError> {
  let result = install_submission(option)
    .and_then(|_| invoke_isolated(option))
    .and_then(|_| collect_results(option));
  close_environment(option);
  result
}
