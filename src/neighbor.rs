use crate::grid::Grid;

/// Live neighbor count of every cell, kept in step with the grid.
///
/// Built once per stage, then patched cell by cell through
/// [`NeighborCounts::apply_toggle`]. Cells outside the grid do not exist, there
/// is no wraparound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborCounts {
  width: usize,
  height: usize,
  counts: Vec<u8>,
}

impl NeighborCounts {
  /// Single pass over the grid
  pub fn from_grid(grid: &Grid) -> Self {
    let mut neighbors = NeighborCounts {
      width: grid.width(),
      height: grid.height(),
      counts: vec![0; grid.len()],
    };
    for row in 0..grid.height() {
      for col in 0..grid.width() {
        if grid.as_slice()[grid.index(col, row)] {
          neighbors.apply_toggle(col, row, true);
        }
      }
    }
    neighbors
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  /// Count at (col, row), panics out of bounds
  pub fn get(&self, col: usize, row: usize) -> u8 {
    assert!(col < self.width && row < self.height, "neighbor index out of bounds");
    self.counts[col + row * self.width]
  }

  /// Count at a linear index, panics out of bounds
  pub fn at(&self, index: usize) -> u8 {
    self.counts[index]
  }

  /// Patch the neighbors of (col, row) after the cell flipped to `alive`
  pub fn apply_toggle(&mut self, col: usize, row: usize, alive: bool) {
    assert!(col < self.width && row < self.height, "toggle index out of bounds");

    let rows = row.saturating_sub(1)..=(row + 1).min(self.height - 1);
    for r in rows {
      let cols = col.saturating_sub(1)..=(col + 1).min(self.width - 1);
      for c in cols {
        if r == row && c == col {
          continue;
        }
        let count = &mut self.counts[c + r * self.width];
        if alive {
          *count += 1;
        } else {
          *count -= 1;
        }
      }
    }
  }

  /// Row by row view, `rows()[row][col]`
  pub fn rows(&self) -> Vec<Vec<u8>> {
    self
      .counts
      .chunks(self.width.max(1))
      .take(self.height)
      .map(|row| row.to_vec())
      .collect()
  }
}
