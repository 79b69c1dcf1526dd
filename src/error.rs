use std::{
  error::Error,
  fmt::{Debug, Display},
  process::{ExitCode, Termination},
};

use flexi_logger::FlexiLoggerError;
use nix::{errno::Errno, libc::STDOUT_FILENO, unistd::isatty};

use crate::utils::escape_json;

pub enum GolBoxError {
  Stage(String),
  Permission(String),
  Privilege(String),
  Player(String),
  Submission(String),
  Container { message: String, output: String },
  Nix(Errno),
  Fs(String),
  Cli(String),
  Logger(FlexiLoggerError),
}

pub enum GolBoxExit {
  Ok,
  Err(GolBoxError),
}

impl GolBoxError {
  pub fn stage<MS: Into<String>>(msg: MS) -> GolBoxError {
    GolBoxError::Stage(msg.into())
  }

  pub fn permission<MS: Into<String>>(msg: MS) -> GolBoxError {
    GolBoxError::Permission(msg.into())
  }

  pub fn privilege<MS: Into<String>>(msg: MS) -> GolBoxError {
    GolBoxError::Privilege(msg.into())
  }

  pub fn player<MS: Into<String>>(msg: MS) -> GolBoxError {
    GolBoxError::Player(msg.into())
  }

  pub fn submission<MS: Into<String>>(msg: MS) -> GolBoxError {
    GolBoxError::Submission(msg.into())
  }

  pub fn container<MS: Into<String>, OS: Into<String>>(msg: MS, output: OS) -> GolBoxError {
    GolBoxError::Container {
      message: msg.into(),
      output: output.into(),
    }
  }

  pub fn cli<MS: Into<String>>(msg: MS) -> GolBoxError {
    GolBoxError::Cli(msg.into())
  }

  /// True for denied writes from the player context
  pub fn is_permission_denied(&self) -> bool {
    matches!(self, GolBoxError::Permission(_))
  }
}

impl Debug for GolBoxError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    std::fmt::Display::fmt(&self, f)
  }
}

impl Display for GolBoxError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match &self {
      GolBoxError::Stage(msg) => f.write_fmt(format_args!("GolBox Stage Error: {}", msg)),
      GolBoxError::Permission(msg) => f.write_fmt(format_args!("GolBox Permission Error: {}", msg)),
      GolBoxError::Privilege(msg) => f.write_fmt(format_args!("GolBox Privilege Error: {}", msg)),
      GolBoxError::Player(msg) => f.write_fmt(format_args!("GolBox Player Error: {}", msg)),
      GolBoxError::Submission(msg) => f.write_fmt(format_args!("GolBox Submission Error: {}", msg)),
      GolBoxError::Container { message, .. } => {
        f.write_fmt(format_args!("GolBox Container Error: {}", message))
      }
      GolBoxError::Nix(errno) => f.write_fmt(format_args!("GolBox Nix Error: {}", errno)),
      GolBoxError::Fs(msg) => f.write_fmt(format_args!("GolBox File System Error: {}", msg)),
      GolBoxError::Cli(msg) => f.write_fmt(format_args!("GolBox CLI Error: {}", msg)),
      GolBoxError::Logger(err) => f.write_fmt(format_args!("GolBox Logger Error: {}", err)),
    }
  }
}

impl From<Errno> for GolBoxError {
  fn from(errno: Errno) -> Self {
    GolBoxError::Nix(errno)
  }
}

impl From<std::io::Error> for GolBoxError {
  fn from(err: std::io::Error) -> Self {
    GolBoxError::Fs(err.to_string())
  }
}

impl From<FlexiLoggerError> for GolBoxError {
  fn from(err: FlexiLoggerError) -> Self {
    GolBoxError::Logger(err)
  }
}

impl From<regex::Error> for GolBoxError {
  fn from(err: regex::Error) -> Self {
    GolBoxError::Submission(err.to_string())
  }
}

impl Error for GolBoxError {}

impl From<Result<(), GolBoxError>> for GolBoxExit {
  fn from(result: Result<(), GolBoxError>) -> Self {
    match result {
      Ok(()) => GolBoxExit::Ok,
      Err(err) => GolBoxExit::Err(err),
    }
  }
}

impl Termination for GolBoxExit {
  fn report(self) -> ExitCode {
    match self {
      GolBoxExit::Ok => ExitCode::SUCCESS.report(),
      GolBoxExit::Err(err) => {
        let text = format!("{}", err);
        let text = match text.split_once(": ") {
          Some((prefix, message)) => {
            let is_tty = isatty(STDOUT_FILENO).unwrap_or(false);
            if is_tty {
              format!("\x1b[1m\x1b[91m{}\x1b[39m\x1b[22m  {}", prefix, message)
            } else {
              format!(
                "{{\n  \"ok\": false,\n  \"type\": \"{}\",\n  \"message\": \"{}\"\n}}",
                prefix,
                escape_json(message)
              )
            }
          }
          None => text,
        };
        eprintln!("{}", text);
        if let GolBoxError::Container { output, .. } = &err {
          eprintln!("{}", output);
        }
        ExitCode::FAILURE.report()
      }
    }
  }
}
