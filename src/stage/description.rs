use std::fmt::Write;

use crate::grid::Grid;
use crate::stage::{Goal, StageData};
use crate::GolBoxError;

/// Line between the stage description and the frames of a stage log
pub const SEPARATOR: &str = "---------------------------------";

/// Largest grid a stage may declare, in cells
pub const MAX_CELLS: usize = 1 << 24;

fn header<'a>(line: Option<&'a str>, label: &str) -> Result<Vec<&'a str>, GolBoxError> {
  let line = line.ok_or_else(|| GolBoxError::stage(format!("Missing {} line", label)))?;
  let mut parts = line.split_whitespace();
  match parts.next() {
    Some(name) if name.trim_end_matches(':').eq_ignore_ascii_case(label) => Ok(parts.collect()),
    _ => Err(GolBoxError::stage(format!(
      "Expect {} line, got ({})",
      label,
      line.trim_end()
    ))),
  }
}

fn number<T: std::str::FromStr>(value: Option<&&str>, label: &str) -> Result<T, GolBoxError> {
  value
    .and_then(|v| v.parse::<T>().ok())
    .ok_or_else(|| GolBoxError::stage(format!("Invalid {} value", label)))
}

impl StageData {
  /// Parse a stage description.
  ///
  /// ```text
  /// Dimension: <W> <H>
  /// Goal: <1-8>
  /// Generation: <last generation>
  /// <H lines of W cells, `O` is alive>
  /// ```
  ///
  /// Rows shorter than the width leave their missing cells dead.
  pub fn parse(text: &str) -> Result<StageData, GolBoxError> {
    let mut lines = text.lines();

    let dimension = header(lines.next(), "Dimension")?;
    let width: usize = number(dimension.first(), "width")?;
    let height: usize = number(dimension.get(1), "height")?;

    let goal = header(lines.next(), "Goal")?;
    let goal: u32 = number(goal.first(), "goal")?;
    let goal = Goal::from_id(goal)
      .ok_or_else(|| GolBoxError::stage(format!("Goal {} is out of range", goal)))?;

    let generation = header(lines.next(), "Generation")?;
    let last_gen: u32 = number(generation.first(), "generation")?;

    let size = width
      .checked_mul(height)
      .filter(|size| *size <= MAX_CELLS)
      .ok_or_else(|| {
        GolBoxError::stage(format!(
          "Dimension {}x{} exceeds {} cells",
          width, height, MAX_CELLS
        ))
      })?;
    let mut cells = vec![false; size];
    for row in 0..height {
      let line = lines
        .next()
        .ok_or_else(|| GolBoxError::stage(format!("Missing grid row {} of {}", row, height)))?;
      for (col, cell) in line.trim().chars().take(width).enumerate() {
        cells[col + row * width] = cell == 'O';
      }
    }

    let grid = Grid::from_cells(width, height, cells)?;
    Ok(StageData::new(goal, last_gen, grid))
  }

  /// Format the stage back into its description form
  pub fn describe(&self) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "Dimension: {} {}", self.width(), self.height());
    let _ = writeln!(text, "Goal: {}", self.goal().id());
    let _ = writeln!(text, "Generation: {}", self.last_gen());
    let _ = write!(text, "{}", self.grid());
    text
  }
}

/// Stage files are written as ISO-8859-1
pub fn decode_latin1(bytes: &[u8]) -> String {
  bytes.iter().map(|b| *b as char).collect()
}

/// Inverse of [`decode_latin1`], characters above U+00FF become `?`
pub fn encode_latin1(text: &str) -> Vec<u8> {
  text
    .chars()
    .map(|c| if (c as u32) <= 0xff { c as u8 } else { b'?' })
    .collect()
}
