use std::env;
use std::fs;
use std::path::Path;

use flexi_logger::DeferredNow;
use log::{debug, error, info, warn, Record};
use nix::unistd::{Uid, User};

pub use pipe::{OutputPipe, OutputReader};

use crate::GolBoxError;

pub mod mount;
pub mod pipe;

/// Kilobytes
pub type MemoryLimitType = u64;

/// A logline-formatter that produces log lines like <br>
/// ```[datetime: INFO] Stage more scores 731204```
pub fn default_format(
  w: &mut dyn std::io::Write,
  now: &mut DeferredNow,
  record: &Record,
) -> Result<(), std::io::Error> {
  write!(
    w,
    "[{}: {:5}] {}",
    now.format("%Y-%m-%d %H:%M:%S"),
    record.level(),
    record.args()
  )
}

/// Parse `KEY=VALUE`, or `KEY` to pass the host value through
pub fn parse_env<S: AsRef<str>>(text: S) -> Result<(String, String), GolBoxError> {
  let text = text.as_ref();
  match text.split_once('=') {
    Some((key, _)) if key.is_empty() => {
      error!("Wrong environment variable string ({}) format", text);
      Err(GolBoxError::cli("Wrong environment variable string format"))
    }
    Some((key, value)) => Ok((key.to_string(), value.to_string())),
    None if text.is_empty() => Err(GolBoxError::cli("Empty environment variable name")),
    None => {
      let value = env::var(text).unwrap_or_default();
      info!("Read environment variable {} = {}", text, value);
      Ok((text.to_string(), value))
    }
  }
}

/// Escape `text` for a JSON string literal
pub fn escape_json(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '\\' => escaped.push_str("\\\\"),
      '"' => escaped.push_str("\\\""),
      '\n' => escaped.push_str("\\n"),
      '\r' => escaped.push_str("\\r"),
      '\t' => escaped.push_str("\\t"),
      c if c.is_control() => escaped.push_str(&format!("\\u{:04x}", c as u32)),
      c => escaped.push(c),
    }
  }
  escaped
}

/// Name of the effective user, used as the default cgroup parent
pub fn current_user_name() -> Result<String, GolBoxError> {
  let user = User::from_uid(Uid::effective())?
    .ok_or_else(|| GolBoxError::privilege("Current user does not exist"))?;
  Ok(user.name)
}

/// Copy the tree under `src` into `dst`, existing files are overwritten.
///
/// Symbolic links are skipped, they are never followed out of `src`.
pub fn copy_dir_all<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q) -> Result<(), GolBoxError> {
  let (src, dst) = (src.as_ref(), dst.as_ref());
  fs::create_dir_all(dst)?;
  for entry in fs::read_dir(src)? {
    let entry = entry?;
    let target = dst.join(entry.file_name());
    // DirEntry::file_type 不会跟随符号链接
    let file_type = entry.file_type()?;
    if file_type.is_dir() {
      copy_dir_all(entry.path(), &target)?;
    } else if file_type.is_file() {
      fs::copy(entry.path(), &target)?;
    } else {
      warn!("Skip special file {}", entry.path().to_string_lossy());
    }
  }
  debug!(
    "Copy directory {} -> {}",
    src.to_string_lossy(),
    dst.to_string_lossy()
  );
  Ok(())
}
