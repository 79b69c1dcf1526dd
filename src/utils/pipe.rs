use std::fs::File;
use std::io::Read;
use std::os::fd::{FromRawFd, OwnedFd};
use std::process::Stdio;

use nix::fcntl::OFlag;
use nix::unistd::pipe2;

use crate::stage::decode_latin1;
use crate::GolBoxError;

/// One pipe shared by the stdout and stderr of a child, so the captured text
/// keeps the interleaving of both streams
pub struct OutputPipe {
  read: File,
  write: OwnedFd,
}

pub struct OutputReader(File);

impl OutputPipe {
  pub fn new() -> Result<Self, GolBoxError> {
    let (read, write) = pipe2(OFlag::O_CLOEXEC)?;
    // pipe2 just returned both ends, nothing else owns them
    let (read, write) = unsafe { (File::from_raw_fd(read), OwnedFd::from_raw_fd(write)) };
    Ok(OutputPipe { read, write })
  }

  /// Split into the reader and the (stdout, stderr) handles of the child.
  ///
  /// The handles must be dropped once the child is spawned, or the reader
  /// never sees end of file.
  pub fn split(self) -> Result<(OutputReader, Stdio, Stdio), GolBoxError> {
    let stderr = self.write.try_clone()?;
    Ok((
      OutputReader(self.read),
      Stdio::from(self.write),
      Stdio::from(stderr),
    ))
  }
}

impl OutputReader {
  /// Read until every write end is closed
  pub fn read_all(mut self) -> Result<String, GolBoxError> {
    let mut buf = vec![];
    self.0.read_to_end(&mut buf)?;
    Ok(decode_latin1(&buf))
  }
}
