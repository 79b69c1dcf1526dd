#![allow(dead_code)]

use std::sync::Once;

use flexi_logger::Logger;

use golj::{Goal, Grid, StageData};

static INIT: Once = Once::new();

pub fn setup() {
  INIT.call_once(|| {
    Logger::try_with_str("golj=debug,info")
      .unwrap()
      .start()
      .unwrap();
  });
}

/// Stage description text with `rows` of `O` / `.`
pub fn stage_text(goal: Goal, last_gen: u32, rows: &[&str]) -> String {
  let width = rows.first().map(|row| row.len()).unwrap_or(0);
  let mut text = format!(
    "Dimension: {} {}\nGoal: {}\nGeneration: {}\n",
    width,
    rows.len(),
    goal.id(),
    last_gen
  );
  for row in rows {
    text.push_str(row);
    text.push('\n');
  }
  text
}

pub fn grid(rows: &[&str]) -> Grid {
  let width = rows.first().map(|row| row.len()).unwrap_or(0);
  let cells = rows
    .iter()
    .flat_map(|row| row.chars().map(|c| c == 'O'))
    .collect();
  Grid::from_cells(width, rows.len(), cells).unwrap()
}

pub fn stage(goal: Goal, last_gen: u32, rows: &[&str]) -> StageData {
  StageData::new(goal, last_gen, grid(rows))
}

/// Filled grid of the given size
pub fn filled(width: usize, height: usize, alive: bool) -> Grid {
  Grid::from_cells(width, height, vec![alive; width * height]).unwrap()
}
