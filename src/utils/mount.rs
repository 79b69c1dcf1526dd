use std::path::{Path, PathBuf};

use log::error;
use path_absolutize::Absolutize;

use crate::GolBoxError;

/// Host directory exposed inside the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
  write: bool,
  src: PathBuf,
  dst: PathBuf,
}

impl MountPoint {
  fn absolutize<P: AsRef<Path>>(path: P) -> Result<PathBuf, GolBoxError> {
    Ok(path.as_ref().absolutize()?.to_path_buf())
  }

  /// Parse a read only `src:dst` mount, `src` alone is mounted at the same path
  pub fn parse_read(text: &str) -> Result<Self, GolBoxError> {
    let (src, dst) = match text.split_once(':') {
      Some((src, dst)) if !dst.contains(':') => (src, dst),
      Some(_) => {
        error!("Parse mount input string ({}) fails", text);
        return Err(GolBoxError::cli("Wrong mount string format"));
      }
      None => (text, text),
    };
    if !Path::new(dst).is_absolute() {
      return Err(GolBoxError::cli(format!(
        "Mount target {} should be absolute",
        dst
      )));
    }
    Ok(MountPoint {
      write: false,
      src: MountPoint::absolutize(src)?,
      dst: PathBuf::from(dst),
    })
  }

  pub fn write<SP: AsRef<Path>, DP: Into<PathBuf>>(src: SP, dst: DP) -> Result<Self, GolBoxError> {
    Ok(MountPoint {
      write: true,
      src: MountPoint::absolutize(src)?,
      dst: dst.into(),
    })
  }

  pub fn read_only(&self) -> bool {
    !self.write
  }

  pub fn src(&self) -> &PathBuf {
    &self.src
  }

  pub fn dst(&self) -> &PathBuf {
    &self.dst
  }

  /// Value of a `-v` container argument
  pub fn volume(&self) -> String {
    let mut volume = format!("{}:{}", self.src.to_string_lossy(), self.dst.to_string_lossy());
    if self.read_only() {
      volume.push_str(":ro");
    }
    volume
  }
}
