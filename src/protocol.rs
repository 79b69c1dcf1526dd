//! Line protocol spoken with a player process over its stdin / stdout.
//!
//! ```text
//! host   -> namespace <name>...
//! host   -> stage <gen> <moves> <width> <height> <goal> <last gen>
//! host   -> <height> rows of O and .
//! player -> moves <gen> <index | col,row>...
//! ```

use std::fmt::Write;

use log::debug;

use crate::grid::Coord;
use crate::guard::Namespace;
use crate::stage::StageView;

/// Longest reply line read from a player, in bytes
pub const MAX_REPLY_LENGTH: u64 = 4 * 1024 * 1024;

/// Proposals of one reply line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
  pub gen: u32,
  pub moves: Vec<Coord>,
}

pub fn encode_namespace(namespace: &Namespace) -> String {
  let mut line = String::from("namespace");
  for name in namespace.names() {
    line.push(' ');
    line.push_str(name);
  }
  line.push('\n');
  line
}

pub fn encode_stage(view: &StageView) -> String {
  let mut text = String::with_capacity((view.width() + 1) * view.height() + 64);
  let _ = writeln!(
    text,
    "stage {} {} {} {} {} {}",
    view.gen(),
    view.moves(),
    view.width(),
    view.height(),
    view.goal().id(),
    view.last_gen()
  );
  let _ = write!(text, "{}", view.grid());
  text
}

/// `i` or `col,row`, signed so that bad proposals are rejected later by the grid
pub fn parse_coord(token: &str) -> Option<Coord> {
  match token.split_once(',') {
    Some((col, row)) => Some(Coord::Pos {
      col: col.trim().parse().ok()?,
      row: row.trim().parse().ok()?,
    }),
    None => token.parse().ok().map(Coord::Index),
  }
}

/// Parse a `moves` line, unparsable coordinates are dropped
pub fn parse_reply(line: &str) -> Option<Reply> {
  let mut tokens = line.split_whitespace();
  if tokens.next()? != "moves" {
    return None;
  }
  let gen = tokens.next()?.parse::<u32>().ok()?;
  let moves = tokens
    .filter_map(|token| {
      let coord = parse_coord(token);
      if coord.is_none() {
        debug!("Drop malformed coordinate ({})", token);
      }
      coord
    })
    .collect();
  Some(Reply { gen, moves })
}
