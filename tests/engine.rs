use proptest::prelude::*;

use golj::budget::{is_final_phase, next_allowance};
use golj::{Coord, Engine, Goal, Grid, NeighborCounts, StageData};

mod common;

fn brute_force(grid: &Grid) -> Vec<u8> {
  let (width, height) = (grid.width() as i64, grid.height() as i64);
  let mut counts = vec![];
  for row in 0..height {
    for col in 0..width {
      let mut count = 0;
      for dr in -1..=1 {
        for dc in -1..=1 {
          if dr == 0 && dc == 0 {
            continue;
          }
          let (c, r) = (col + dc, row + dr);
          if c >= 0 && r >= 0 && c < width && r < height && grid.at(c as usize, r as usize) == Some(true) {
            count += 1;
          }
        }
      }
      counts.push(count);
    }
  }
  counts
}

fn flatten(neighbors: &NeighborCounts) -> Vec<u8> {
  neighbors.rows().into_iter().flatten().collect()
}

fn grid_strategy() -> impl Strategy<Value = Grid> {
  (1usize..12, 1usize..12).prop_flat_map(|(width, height)| {
    prop::collection::vec(any::<bool>(), width * height)
      .prop_map(move |cells| Grid::from_cells(width, height, cells).unwrap())
  })
}

proptest! {
  #[test]
  fn neighbor_counts_match_brute_force(grid in grid_strategy()) {
    let neighbors = NeighborCounts::from_grid(&grid);
    prop_assert_eq!(flatten(&neighbors), brute_force(&grid));
  }

  #[test]
  fn toggles_keep_counts_in_step(grid in grid_strategy(), picks in prop::collection::vec(any::<usize>(), 0..40)) {
    let len = grid.len();
    let mut engine = Engine::new(StageData::new(Goal::More, 10, grid));
    for pick in picks {
      engine.toggle(pick % len).unwrap();
    }
    prop_assert_eq!(flatten(engine.neighbors()), brute_force(engine.stage().grid()));
  }

  #[test]
  fn steps_keep_counts_in_step(grid in grid_strategy(), steps in 1usize..6) {
    let mut engine = Engine::new(StageData::new(Goal::More, 10, grid));
    for _ in 0..steps {
      engine.step().unwrap();
    }
    prop_assert_eq!(flatten(engine.neighbors()), brute_force(engine.stage().grid()));
  }
}

#[test]
fn blinker_oscillates() {
  common::setup();

  let mut engine = Engine::new(common::stage(Goal::More, 10, &[".....", ".....", ".OOO.", ".....", "....."]));
  let changed = engine.step().unwrap();
  assert_eq!(changed.len(), 4);
  assert_eq!(
    engine.stage().grid(),
    &common::grid(&[".....", "..O..", "..O..", "..O..", "....."])
  );

  engine.step().unwrap();
  assert_eq!(
    engine.stage().grid(),
    &common::grid(&[".....", ".....", ".OOO.", ".....", "....."])
  );
}

#[test]
fn block_is_still() {
  common::setup();

  let mut engine = Engine::new(common::stage(Goal::Fix, 10, &["....", ".OO.", ".OO.", "...."]));
  assert!(engine.step().unwrap().is_empty());
}

#[test]
fn step_reads_the_grid_before_the_step() {
  common::setup();

  // 逐格原地更新时 (1, 2) 会先看到中间一行死亡，不会出生
  let mut engine = Engine::new(common::stage(Goal::More, 10, &["OO", "OO", "O."]));
  engine.step().unwrap();
  assert_eq!(engine.stage().grid(), &common::grid(&["OO", "..", "OO"]));
}

#[test]
fn moves_are_limited_by_the_allowance() {
  common::setup();

  let mut engine = Engine::new(common::stage(Goal::More, 10, &["....", "....", "...."]));
  engine.finish_turn().unwrap();
  assert_eq!(engine.stage().moves(), 5);

  let proposed = (0..12).map(Coord::from).collect::<Vec<Coord>>();
  let applied = engine.apply_moves(&proposed).unwrap();
  assert_eq!(applied, vec![0, 1, 2, 3, 4]);
  assert_eq!(engine.stage().moves(), 0);
  assert_eq!(engine.stage().grid().alive(), 5);
}

#[test]
fn invalid_moves_are_skipped_within_the_allowance() {
  common::setup();

  let mut engine = Engine::new(common::stage(Goal::More, 10, &["....", "....", "...."]));
  engine.finish_turn().unwrap();

  let proposed = vec![
    Coord::Index(-1),
    Coord::Pos { col: 4, row: 0 },
    Coord::Pos { col: 1, row: 2 },
    Coord::Index(12),
    Coord::Index(3),
    Coord::Index(7),
  ];
  // 只看前 5 个提议，其中 2 个合法
  let applied = engine.apply_moves(&proposed).unwrap();
  assert_eq!(applied, vec![9, 3]);
  assert_eq!(engine.stage().moves(), 3);
}

#[test]
fn toggling_twice_restores_the_cell() {
  common::setup();

  let mut engine = Engine::new(common::stage(Goal::More, 10, &["...", "...", "..."]));
  engine.finish_turn().unwrap();
  let applied = engine.apply_moves(&[Coord::Index(4), Coord::Pos { col: 1, row: 1 }]).unwrap();
  assert_eq!(applied, vec![4, 4]);
  assert_eq!(engine.stage().grid().alive(), 0);
  assert!(engine.neighbors().rows().iter().flatten().all(|count| *count == 0));
}

#[test]
fn first_generation_has_no_moves() {
  let engine = Engine::new(common::stage(Goal::More, 10, &["..", ".."]));
  assert_eq!(engine.stage().moves(), 0);
  assert_eq!(engine.stage().gen(), 0);
}

#[test]
fn allowance_follows_goal_and_phase() {
  assert_eq!(next_allowance(Goal::More, 0, 100, 10), 10);
  assert_eq!(next_allowance(Goal::Less, 3, 100, 0), 5);
  assert_eq!(next_allowance(Goal::More, 95, 100, 10), 250000);
  assert_eq!(next_allowance(Goal::Odd, 10, 100, 7), 6);
  assert_eq!(next_allowance(Goal::Even, 99, 100, 7), 125000);
  assert_eq!(next_allowance(Goal::Border, 0, 100, 100), 15);
  assert_eq!(next_allowance(Goal::Border, 96, 100, 0), 2000);
  assert_eq!(next_allowance(Goal::Fix, 99, 100, 0), 30);
  assert_eq!(next_allowance(Goal::Cling, 0, 100, 12), 30);
  assert_eq!(next_allowance(Goal::You, 0, 100, 12), 30);
}

#[test]
fn short_stages_are_always_in_the_final_phase() {
  assert!(is_final_phase(0, 3));
  assert!(is_final_phase(0, 5));
  assert!(!is_final_phase(0, 6));
  assert!(is_final_phase(1, 6));
}

#[test]
fn finish_turn_advances_the_generation() {
  let mut engine = Engine::new(common::stage(Goal::Border, 3, &["..", ".."]));
  for gen in 1..=3 {
    engine.step().unwrap();
    engine.finish_turn().unwrap();
    assert_eq!(engine.stage().gen(), gen);
  }
  assert!(engine.stage().is_finished());
  assert_eq!(engine.stage().moves(), 2000);
}
