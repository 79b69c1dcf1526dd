use std::fmt::{Display, Formatter};

use crate::guard::scope::ensure_engine_context;
use crate::GolBoxError;

/// A cell proposed by a player, either a linear index or a column / row pair.
///
/// Values are signed so that out of range proposals survive parsing and are
/// rejected by [`Grid::resolve`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coord {
  Index(i64),
  Pos { col: i64, row: i64 },
}

/// Write capability over [`Grid`] and [`crate::StageData`].
///
/// Only the engine can build one, player code never sees it.
#[derive(Debug)]
pub struct WriteToken {
  _private: (),
}

/// Fixed size boolean cell matrix stored row by row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
  width: usize,
  height: usize,
  cells: Vec<bool>,
}

impl WriteToken {
  pub(crate) fn new() -> Self {
    WriteToken { _private: () }
  }
}

impl Display for Coord {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Coord::Index(index) => write!(f, "{}", index),
      Coord::Pos { col, row } => write!(f, "{},{}", col, row),
    }
  }
}

impl From<usize> for Coord {
  fn from(index: usize) -> Self {
    Coord::Index(index as i64)
  }
}

impl Grid {
  /// All dead grid
  pub fn new(width: usize, height: usize) -> Self {
    Grid {
      width,
      height,
      cells: vec![false; width * height],
    }
  }

  pub fn from_cells(width: usize, height: usize, cells: Vec<bool>) -> Result<Self, GolBoxError> {
    if width.checked_mul(height) != Some(cells.len()) {
      return Err(GolBoxError::stage(format!(
        "Grid {}x{} does not hold {} cells",
        width,
        height,
        cells.len()
      )));
    }
    Ok(Grid {
      width,
      height,
      cells,
    })
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn len(&self) -> usize {
    self.cells.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cells.is_empty()
  }

  /// Linear index of (col, row), no bounds check
  pub fn index(&self, col: usize, row: usize) -> usize {
    col + row * self.width
  }

  pub fn get(&self, index: usize) -> Option<bool> {
    self.cells.get(index).copied()
  }

  pub fn at(&self, col: usize, row: usize) -> Option<bool> {
    if col >= self.width || row >= self.height {
      return None;
    }
    self.get(self.index(col, row))
  }

  /// Bounds checked linear index of a proposed coordinate
  pub fn resolve(&self, coord: Coord) -> Option<usize> {
    let index = match coord {
      Coord::Index(index) => index,
      Coord::Pos { col, row } => {
        if col < 0 || row < 0 || col >= self.width as i64 || row >= self.height as i64 {
          return None;
        }
        col + row * self.width as i64
      }
    };
    if index < 0 || index >= self.cells.len() as i64 {
      None
    } else {
      Some(index as usize)
    }
  }

  pub fn alive(&self) -> usize {
    self.cells.iter().filter(|cell| **cell).count()
  }

  pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
    self.cells.iter().copied()
  }

  pub fn rows(&self) -> impl Iterator<Item = &[bool]> + '_ {
    self.cells.chunks(self.width.max(1)).take(self.height)
  }

  pub fn as_slice(&self) -> &[bool] {
    &self.cells
  }

  pub fn set(&mut self, _token: &WriteToken, index: usize, value: bool) -> Result<(), GolBoxError> {
    ensure_engine_context("grid cell")?;
    self.cells[index] = value;
    Ok(())
  }

  /// Flip one cell, return its new state
  pub fn toggle(&mut self, token: &WriteToken, index: usize) -> Result<bool, GolBoxError> {
    let value = !self.cells[index];
    self.set(token, index, value)?;
    Ok(value)
  }
}

impl Display for Grid {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    for row in self.rows() {
      for cell in row {
        f.write_str(if *cell { "O" } else { "." })?;
      }
      f.write_str("\n")?;
    }
    Ok(())
  }
}
