//! Install time filtering of submitted player sources.

use std::fs;
use std::io::Write;
use std::path::Path;

use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use tempfile::NamedTempFile;

use crate::stage::{decode_latin1, encode_latin1};
use crate::GolBoxError;

lazy_static! {
  /// A source line containing any of these is dropped
  static ref BANNED_TOKENS: Vec<&'static str> = vec![
    // debugger, code generation
    "breakpoint", "compile", "eval", "exec",
    // reflection
    "delattr", "getattr", "globals", "hasattr", "locals", "setattr", "vars",
    // raw I/O
    "input", "print", "memoryview", "open",
    // module metadata
    "__name__", "__doc__", "__package__", "__loader__", "__spec__", "__annotations__",
    "__file__", "__cached__", "__build_class__",
    // import machinery
    "import", "builtins",
  ];
}

/// Import line written before the sanitized body
pub const DEFAULT_PREAMBLE: &str = "import GoLLib, types, typing, collections, functools, \
  itertools, dataclasses, enum, time, random, math, cmath, heapq, bisect, array, decimal, \
  fractions, statistics, numpy, sympy, networkx, sortedcontainers";

pub fn banned_tokens() -> &'static [&'static str] {
  BANNED_TOKENS.as_slice()
}

pub fn contains_banned_token(text: &str) -> bool {
  BANNED_TOKENS.iter().any(|token| text.contains(token))
}

/// Letters, digits and connector punctuation outside ASCII, all of them may
/// appear in a Python identifier
fn is_foreign_identifier(c: char) -> bool {
  !c.is_ascii()
    && (c.is_alphanumeric()
      || matches!(
        c,
        '\u{203F}' | '\u{2040}' | '\u{2054}' | '\u{FE33}' | '\u{FE34}' | '\u{FE4D}'..='\u{FE4F}' | '\u{FF3F}'
      ))
}

/// A source line removed by the sanitizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedLine {
  /// 1-based
  pub line: usize,
  pub token: String,
}

#[derive(Debug, Clone)]
pub struct Sanitized {
  text: String,
  stripped: Vec<StrippedLine>,
}

/// Line filter built from one alternation over all banned tokens.
///
/// Every token is tried at every position, so tokens sharing a prefix can not
/// hide each other.
pub struct Sanitizer {
  pattern: Regex,
  preamble: String,
}

impl Sanitized {
  /// Preamble followed by the kept lines
  pub fn text(&self) -> &str {
    &self.text
  }

  pub fn stripped(&self) -> &[StrippedLine] {
    &self.stripped
  }
}

impl Sanitizer {
  pub fn new() -> Result<Self, GolBoxError> {
    Sanitizer::with_tokens(banned_tokens())
  }

  pub fn with_tokens(tokens: &[&str]) -> Result<Self, GolBoxError> {
    if tokens.is_empty() {
      return Err(GolBoxError::submission("Banned token list is empty"));
    }
    let alternation = tokens
      .iter()
      .map(|token| regex::escape(token))
      .collect::<Vec<String>>()
      .join("|");
    Ok(Sanitizer {
      pattern: Regex::new(&alternation)?,
      preamble: DEFAULT_PREAMBLE.to_string(),
    })
  }

  pub fn preamble<S: Into<String>>(mut self, preamble: S) -> Self {
    self.preamble = preamble.into();
    self
  }

  /// First banned token found in `line`.
  ///
  /// A non-ASCII identifier character counts as a token of its own, Python
  /// folds such names with NFKC so `ｅｖａｌ` would resolve to `eval`.
  pub fn find<'a>(&self, line: &'a str) -> Option<&'a str> {
    let banned = self.pattern.find(line).map(|found| (found.start(), found.as_str()));
    let foreign = line
      .char_indices()
      .find(|(_, c)| is_foreign_identifier(*c))
      .map(|(at, c)| (at, &line[at..at + c.len_utf8()]));
    match (banned, foreign) {
      (Some(banned), Some(foreign)) if foreign.0 < banned.0 => Some(foreign.1),
      (Some(banned), _) => Some(banned.1),
      (None, foreign) => foreign.map(|(_, token)| token),
    }
  }

  pub fn sanitize(&self, source: &str) -> Sanitized {
    let mut text = String::with_capacity(source.len() + self.preamble.len() + 1);
    if !self.preamble.is_empty() {
      text.push_str(&self.preamble);
      text.push('\n');
    }

    let mut stripped = vec![];
    for (number, line) in source.split_inclusive('\n').enumerate() {
      match self.find(line) {
        Some(token) => {
          debug!("Strip line {} for banned token {}", number + 1, token);
          stripped.push(StrippedLine {
            line: number + 1,
            token: token.to_string(),
          });
        }
        None => text.push_str(line),
      }
    }

    Sanitized { text, stripped }
  }

  /// Sanitize the upload at `src` into `dst`, then remove the upload.
  ///
  /// `dst` is replaced atomically, a reader never sees a partial file.
  pub fn install<P: AsRef<Path>, Q: AsRef<Path>>(
    &self,
    src: P,
    dst: Q,
  ) -> Result<Sanitized, GolBoxError> {
    let (src, dst) = (src.as_ref(), dst.as_ref());
    if !src.is_file() {
      return Err(GolBoxError::submission(format!(
        "Submission {} does not exist",
        src.to_string_lossy()
      )));
    }

    let source = decode_latin1(&fs::read(src)?);
    let sanitized = self.sanitize(&source);

    let parent = match dst.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent,
      _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(&encode_latin1(sanitized.text()))?;
    file.flush()?;
    file
      .persist(dst)
      .map_err(|err| GolBoxError::Fs(err.error.to_string()))?;

    info!(
      "Install submission {} -> {} ({} lines stripped)",
      src.to_string_lossy(),
      dst.to_string_lossy(),
      sanitized.stripped().len()
    );
    if let Err(err) = fs::remove_file(src) {
      debug!("Remove upload {} fails: {}", src.to_string_lossy(), err);
    }
    Ok(sanitized)
  }
}
