use log::debug;

use crate::budget::next_allowance;
use crate::grid::{Coord, WriteToken};
use crate::neighbor::NeighborCounts;
use crate::stage::StageData;
use crate::GolBoxError;

/// Owns a stage, its neighbor counts and the write capability over both
pub struct Engine {
  stage: StageData,
  neighbors: NeighborCounts,
  token: WriteToken,
}

impl Engine {
  pub fn new(stage: StageData) -> Self {
    let neighbors = NeighborCounts::from_grid(stage.grid());
    Engine {
      stage,
      neighbors,
      token: WriteToken::new(),
    }
  }

  pub fn stage(&self) -> &StageData {
    &self.stage
  }

  pub fn neighbors(&self) -> &NeighborCounts {
    &self.neighbors
  }

  pub fn into_stage(self) -> StageData {
    self.stage
  }

  /// Flip one cell and patch its neighbors
  pub fn toggle(&mut self, index: usize) -> Result<bool, GolBoxError> {
    let width = self.stage.width();
    let alive = self.stage.grid_mut(&self.token)?.toggle(&self.token, index)?;
    self.neighbors.apply_toggle(index % width, index / width, alive);
    Ok(alive)
  }

  /// Advance the grid by one Game of Life generation.
  ///
  /// Every decision is read from the counts before the step, the changed
  /// cells are patched in afterwards. Returns the toggled indices.
  pub fn step(&mut self) -> Result<Vec<usize>, GolBoxError> {
    let grid = self.stage.grid();
    let changed = grid
      .iter()
      .enumerate()
      .filter(|(index, alive)| {
        let count = self.neighbors.at(*index);
        let next = count == 3 || (count == 2 && *alive);
        next != *alive
      })
      .map(|(index, _)| index)
      .collect::<Vec<usize>>();

    for index in changed.iter() {
      self.toggle(*index)?;
    }
    Ok(changed)
  }

  /// Apply player proposals within the current allowance.
  ///
  /// Only the first `moves` proposals are looked at. Out of grid proposals are
  /// skipped, every applied one spends a move. Returns the applied indices in
  /// order.
  pub fn apply_moves(&mut self, proposed: &[Coord]) -> Result<Vec<usize>, GolBoxError> {
    let limit = self.stage.moves() as usize;
    let mut applied = vec![];
    for coord in proposed.iter().take(limit) {
      if self.stage.moves() == 0 {
        break;
      }
      let index = match self.stage.grid().resolve(*coord) {
        Some(index) => index,
        None => {
          debug!("Skip invalid move {}", coord);
          continue;
        }
      };
      self.toggle(index)?;
      self.stage.consume_move(&self.token)?;
      applied.push(index);
    }
    Ok(applied)
  }

  /// Toggle already validated indices, used when replaying a move log
  pub fn apply_indices(&mut self, indices: &[usize]) -> Result<(), GolBoxError> {
    for index in indices {
      if *index >= self.stage.grid().len() {
        return Err(GolBoxError::stage(format!("Logged move {} is out of the grid", index)));
      }
      self.toggle(*index)?;
      self.stage.consume_move(&self.token)?;
    }
    Ok(())
  }

  /// Compute the next allowance and move to the next generation
  pub fn finish_turn(&mut self) -> Result<(), GolBoxError> {
    let moves = next_allowance(
      self.stage.goal(),
      self.stage.gen(),
      self.stage.last_gen(),
      self.stage.moves(),
    );
    self.stage.set_moves(&self.token, moves)?;
    self.stage.advance(&self.token)
  }
}
