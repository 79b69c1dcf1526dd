//! Goal specific scoring of the final grid.

use log::debug;

use crate::grid::Grid;
use crate::stage::{Goal, StageData};

/// Best possible score
pub const MAX_SCORE: u32 = 1_000_000;

/// Number of weighted rings counted by the BORDER goal
const BORDER_RINGS: usize = 5;

/// A small boolean template matched against the padded grid
struct Template {
  width: usize,
  height: usize,
  cells: Vec<bool>,
}

impl Template {
  fn parse(rows: &[&str]) -> Self {
    Template {
      width: rows.first().map(|row| row.len()).unwrap_or(0),
      height: rows.len(),
      cells: rows
        .iter()
        .flat_map(|row| row.chars().map(|c| c == 'O'))
        .collect(),
    }
  }
}

/// Grid surrounded by one dead cell on each side
struct Padded {
  width: usize,
  height: usize,
  cells: Vec<bool>,
}

impl Padded {
  fn new(grid: &Grid) -> Self {
    let width = grid.width() + 2;
    let height = grid.height() + 2;
    let mut cells = vec![false; width * height];
    for row in 0..grid.height() {
      for col in 0..grid.width() {
        cells[(col + 1) + (row + 1) * width] = grid.as_slice()[grid.index(col, row)];
      }
    }
    Padded {
      width,
      height,
      cells,
    }
  }

  fn matches(&self, template: &Template, col: usize, row: usize) -> bool {
    (0..template.height).all(|r| {
      (0..template.width).all(|c| {
        self.cells[(col + c) + (row + r) * self.width] == template.cells[c + r * template.width]
      })
    })
  }

  /// Positions where any of the templates matches, scanned row by row
  fn count(&self, templates: &[Template]) -> usize {
    let mut count = 0;
    for template in templates {
      if template.width > self.width || template.height > self.height {
        return 0;
      }
    }
    let (tw, th) = match templates.first() {
      Some(template) => (template.width, template.height),
      None => return 0,
    };
    for row in 0..=(self.height - th) {
      for col in 0..=(self.width - tw) {
        if templates.iter().any(|template| self.matches(template, col, row)) {
          count += 1;
        }
      }
    }
    count
  }
}

fn ratio(value: f64, total: f64) -> f64 {
  if total <= 0.0 {
    0.0
  } else {
    value / total
  }
}

fn more_less(grid: &Grid, goal: Goal) -> f64 {
  let alive = grid.alive();
  let value = if goal == Goal::More {
    alive
  } else {
    grid.len() - alive
  };
  ratio(value as f64, grid.len() as f64)
}

fn odd_even(grid: &Grid, goal: Goal) -> f64 {
  let parity = if goal == Goal::Odd { 1 } else { 0 };
  let alive = grid
    .iter()
    .enumerate()
    .filter(|(index, alive)| *alive && index % 2 == parity)
    .count();
  ratio(2.0 * alive as f64, grid.len() as f64)
}

/// Distinct cells of ring `ring`, outermost ring is 0
fn ring_cells(width: usize, height: usize, ring: usize) -> Vec<(usize, usize)> {
  if width <= 2 * ring || height <= 2 * ring {
    return vec![];
  }
  let (left, right) = (ring, width - ring - 1);
  let (top, bottom) = (ring, height - ring - 1);
  let mut cells = vec![];
  for col in left..=right {
    cells.push((col, top));
    if bottom != top {
      cells.push((col, bottom));
    }
  }
  for row in (top + 1)..bottom {
    cells.push((left, row));
    if right != left {
      cells.push((right, row));
    }
  }
  cells
}

fn border(grid: &Grid) -> f64 {
  let mut value = 0usize;
  let mut maximum = 0usize;
  for ring in 0..BORDER_RINGS {
    let weight = BORDER_RINGS - ring;
    for (col, row) in ring_cells(grid.width(), grid.height(), ring) {
      maximum += weight;
      if grid.as_slice()[grid.index(col, row)] {
        value += weight;
      }
    }
  }
  ratio(value as f64, maximum as f64)
}

/// Templates of `size` cells along one axis, neighbors sharing their dead margin
fn tiling(length: usize, size: i64) -> i64 {
  let period = size - 1;
  let rest = length as i64 - size;
  let extra = if rest.rem_euclid(period) == period - 1 { 1 } else { 0 };
  1 + rest.div_euclid(period) + extra
}

/// Reference count of 2x2 blocks
pub fn maximum_fix(width: usize, height: usize) -> i64 {
  tiling(width, 4) * tiling(height, 4)
}

/// Reference count of 3 cell bars
pub fn maximum_cling(width: usize, height: usize) -> i64 {
  tiling(width, 5) * tiling(height, 5)
}

fn fix(grid: &Grid) -> f64 {
  let block = Template::parse(&["....", ".OO.", ".OO.", "...."]);
  let count = Padded::new(grid).count(&[block]);
  debug!("FIX found {} blocks", count);
  ratio(count as f64, maximum_fix(grid.width(), grid.height()) as f64)
}

fn cling(grid: &Grid) -> f64 {
  let horizontal = Template::parse(&[".....", ".....", ".OOO.", ".....", "....."]);
  let vertical = Template::parse(&[".....", "..O..", "..O..", "..O..", "....."]);
  let count = Padded::new(grid).count(&[horizontal, vertical]);
  debug!("CLING found {} bars", count);
  ratio(count as f64, maximum_cling(grid.width(), grid.height()) as f64)
}

/// Fraction of the goal reached, before scaling
pub fn percent(goal: Goal, grid: &Grid) -> f64 {
  match goal {
    Goal::More | Goal::Less => more_less(grid, goal),
    Goal::Odd | Goal::Even => odd_even(grid, goal),
    Goal::Border => border(grid),
    Goal::Fix => fix(grid),
    Goal::Cling => cling(grid),
    Goal::You => 0.0,
  }
}

/// Final integer score of a stage, within `0..=MAX_SCORE`
pub fn score(stage: &StageData) -> u32 {
  let percent = percent(stage.goal(), stage.grid());
  let value = (percent * MAX_SCORE as f64).round();
  if value.is_nan() || value <= 0.0 {
    0
  } else if value >= MAX_SCORE as f64 {
    MAX_SCORE
  } else {
    value as u32
  }
}
