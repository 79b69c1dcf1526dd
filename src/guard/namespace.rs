//! Names a player program may resolve at load time.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use log::debug;

use crate::sanitize::contains_banned_token;

lazy_static! {
  /// Safe primitives and exception kinds admitted by default
  static ref SAFE_PRIMITIVES: Vec<&'static str> = vec![
    // functions
    "abs", "all", "any", "ascii", "bin", "callable", "chr", "divmod", "format", "hash", "hex",
    "isinstance", "issubclass", "iter", "len", "max", "min", "next", "oct", "ord", "pow", "repr",
    "round", "sorted", "sum",
    // constants
    "None", "Ellipsis", "NotImplemented", "False", "True",
    // types
    "bool", "bytearray", "bytes", "complex", "dict", "enumerate", "filter", "float", "frozenset",
    "int", "list", "map", "object", "range", "reversed", "set", "slice", "str", "tuple", "zip",
    // exceptions
    "BaseException", "Exception", "ArithmeticError", "AssertionError", "AttributeError",
    "IndexError", "KeyError", "LookupError", "MemoryError", "NameError", "NotImplementedError",
    "OverflowError", "RecursionError", "RuntimeError", "StopIteration", "TimeoutError",
    "TypeError", "ValueError", "ZeroDivisionError",
  ];

  /// Never admitted, whatever the allow-list says
  static ref DENIED_NAMES: Vec<&'static str> = vec![
    "breakpoint", "compile", "delattr", "dir", "eval", "exec", "exit", "getattr", "globals",
    "hasattr", "help", "id", "input", "locals", "memoryview", "open", "print", "quit", "setattr",
    "super", "type", "vars", "classmethod", "staticmethod", "property",
  ];
}

/// Allow-list of names injected into the player program when it is loaded.
///
/// A name is either in the list or absent from the player's context, there is
/// no per access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
  allowed: BTreeSet<String>,
}

impl Default for Namespace {
  fn default() -> Self {
    let mut namespace = Namespace::new();
    for name in SAFE_PRIMITIVES.iter() {
      namespace.allow(name);
    }
    namespace
  }
}

impl Namespace {
  /// Empty namespace
  pub fn new() -> Self {
    Namespace {
      allowed: BTreeSet::new(),
    }
  }

  pub fn is_denied(name: &str) -> bool {
    DENIED_NAMES.iter().any(|denied| *denied == name) || contains_banned_token(name)
  }

  /// Admit a name unless it is denied
  pub fn allow(&mut self, name: &str) -> &mut Self {
    if Namespace::is_denied(name) {
      debug!("Refuse to admit {} into the player namespace", name);
    } else {
      self.allowed.insert(name.to_string());
    }
    self
  }

  pub fn forbid(&mut self, name: &str) -> &mut Self {
    self.allowed.remove(name);
    self
  }

  pub fn contains(&self, name: &str) -> bool {
    self.allowed.contains(name)
  }

  pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
    self.allowed.iter().map(|name| name.as_str())
  }

  pub fn len(&self) -> usize {
    self.allowed.len()
  }

  pub fn is_empty(&self) -> bool {
    self.allowed.is_empty()
  }
}
