use std::fmt::{Display, Formatter};

use crate::grid::{Coord, Grid, WriteToken};
use crate::guard::scope::ensure_engine_context;
use crate::GolBoxError;

pub use description::{MAX_CELLS, SEPARATOR};
pub use description::{decode_latin1, encode_latin1};
pub use logfile::{Frame, Replay, ScoreLog, ScoreRecord, StageLog};

mod description;
mod logfile;

/// Scoring objective of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Goal {
  More = 1,
  Less = 2,
  Odd = 3,
  Even = 4,
  Border = 5,
  Fix = 6,
  Cling = 7,
  You = 8,
}

/// One stage: dimensions, goal, generation counters and the move allowance
#[derive(Debug, Clone)]
pub struct StageData {
  width: usize,
  height: usize,
  goal: Goal,
  last_gen: u32,
  gen: u32,
  grid: Grid,
  moves: u32,
}

/// Read only snapshot of a stage handed to the player for one turn
#[derive(Debug, Clone)]
pub struct StageView {
  width: usize,
  height: usize,
  goal: Goal,
  last_gen: u32,
  gen: u32,
  grid: Grid,
  moves: u32,
}

impl Goal {
  pub fn all() -> [Goal; 8] {
    [
      Goal::More,
      Goal::Less,
      Goal::Odd,
      Goal::Even,
      Goal::Border,
      Goal::Fix,
      Goal::Cling,
      Goal::You,
    ]
  }

  pub fn from_id(id: u32) -> Option<Goal> {
    Goal::all().into_iter().find(|goal| goal.id() == id)
  }

  pub fn id(&self) -> u32 {
    *self as u32
  }

  /// Stage name used for stage and log file names
  pub fn name(&self) -> &'static str {
    match self {
      Goal::More => "more",
      Goal::Less => "less",
      Goal::Odd => "odd",
      Goal::Even => "even",
      Goal::Border => "border",
      Goal::Fix => "fix",
      Goal::Cling => "cling",
      Goal::You => "you",
    }
  }

  /// Parse a stage selector, either the numeric id or the stage name
  pub fn parse(text: &str) -> Result<Goal, GolBoxError> {
    let text = text.trim();
    let goal = match text.parse::<u32>() {
      Ok(id) => Goal::from_id(id),
      Err(_) => Goal::all()
        .into_iter()
        .find(|goal| goal.name().eq_ignore_ascii_case(text)),
    };
    goal.ok_or_else(|| GolBoxError::stage(format!("Unknown stage goal ({})", text)))
  }
}

impl Display for Goal {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.name().to_ascii_uppercase())
  }
}

impl StageData {
  pub fn new(goal: Goal, last_gen: u32, grid: Grid) -> Self {
    StageData {
      width: grid.width(),
      height: grid.height(),
      goal,
      last_gen,
      gen: 0,
      grid,
      moves: 0,
    }
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn goal(&self) -> Goal {
    self.goal
  }

  pub fn last_gen(&self) -> u32 {
    self.last_gen
  }

  pub fn gen(&self) -> u32 {
    self.gen
  }

  pub fn moves(&self) -> u32 {
    self.moves
  }

  pub fn grid(&self) -> &Grid {
    &self.grid
  }

  pub fn is_finished(&self) -> bool {
    self.gen >= self.last_gen
  }

  /// Snapshot for the guarded player call
  pub fn view(&self) -> StageView {
    StageView {
      width: self.width,
      height: self.height,
      goal: self.goal,
      last_gen: self.last_gen,
      gen: self.gen,
      grid: self.grid.clone(),
      moves: self.moves,
    }
  }

  pub fn grid_mut(&mut self, _token: &WriteToken) -> Result<&mut Grid, GolBoxError> {
    ensure_engine_context("stage grid")?;
    Ok(&mut self.grid)
  }

  pub fn set_moves(&mut self, _token: &WriteToken, moves: u32) -> Result<(), GolBoxError> {
    ensure_engine_context("move allowance")?;
    self.moves = moves;
    Ok(())
  }

  /// Spend one move of the allowance
  pub fn consume_move(&mut self, _token: &WriteToken) -> Result<(), GolBoxError> {
    ensure_engine_context("move allowance")?;
    self.moves = self.moves.saturating_sub(1);
    Ok(())
  }

  pub fn advance(&mut self, _token: &WriteToken) -> Result<(), GolBoxError> {
    ensure_engine_context("generation counter")?;
    self.gen += 1;
    Ok(())
  }
}

impl StageView {
  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn goal(&self) -> Goal {
    self.goal
  }

  pub fn last_gen(&self) -> u32 {
    self.last_gen
  }

  pub fn gen(&self) -> u32 {
    self.gen
  }

  pub fn moves(&self) -> u32 {
    self.moves
  }

  pub fn grid(&self) -> &Grid {
    &self.grid
  }

  pub fn is_alive(&self, coord: Coord) -> bool {
    self
      .grid
      .resolve(coord)
      .and_then(|index| self.grid.get(index))
      .unwrap_or(false)
  }
}
