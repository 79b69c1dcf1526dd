use golj::score::{maximum_cling, maximum_fix, percent, score, MAX_SCORE};
use golj::{Goal, StageData};

mod common;

fn stage_score(goal: Goal, rows: &[&str]) -> u32 {
  score(&common::stage(goal, 10, rows))
}

#[test]
fn more_and_less_count_cells() {
  common::setup();

  let dead = StageData::new(Goal::More, 10, common::filled(10, 10, false));
  assert_eq!(score(&dead), 0);
  let alive = StageData::new(Goal::More, 10, common::filled(10, 10, true));
  assert_eq!(score(&alive), MAX_SCORE);
  let alive = StageData::new(Goal::Less, 10, common::filled(10, 10, true));
  assert_eq!(score(&alive), 0);
  let dead = StageData::new(Goal::Less, 10, common::filled(10, 10, false));
  assert_eq!(score(&dead), MAX_SCORE);

  assert_eq!(stage_score(Goal::More, &["O...", "...."]), 125000);
}

#[test]
fn odd_and_even_use_linear_parity() {
  common::setup();

  assert_eq!(stage_score(Goal::Odd, &[".O.O"]), MAX_SCORE);
  assert_eq!(stage_score(Goal::Even, &[".O.O"]), 0);
  assert_eq!(stage_score(Goal::Even, &["O.O."]), MAX_SCORE);
  assert_eq!(stage_score(Goal::Odd, &["OOOO", "...."]), 500000);
}

#[test]
fn border_weights_outer_rings() {
  common::setup();

  assert_eq!(score(&StageData::new(Goal::Border, 10, common::filled(10, 10, true))), MAX_SCORE);
  assert_eq!(score(&StageData::new(Goal::Border, 10, common::filled(10, 10, false))), 0);

  let mut rows = vec!["OOOOOOOOOO"];
  rows.extend(std::iter::repeat("O........O").take(8));
  rows.push("OOOOOOOOOO");
  // 外圈 36 格 * 5 / (36 * 5 + 28 * 4 + 20 * 3 + 12 * 2 + 4 * 1)
  assert_eq!(stage_score(Goal::Border, &rows), 473684);
}

#[test]
fn border_counts_small_grids_consistently() {
  common::setup();

  assert_eq!(stage_score(Goal::Border, &["O"]), MAX_SCORE);
  assert_eq!(stage_score(Goal::Border, &["OOO", "OOO"]), MAX_SCORE);
}

#[test]
fn fix_counts_isolated_blocks() {
  common::setup();

  assert_eq!(stage_score(Goal::Fix, &["....", ".OO.", ".OO.", "...."]), MAX_SCORE);
  assert_eq!(
    stage_score(Goal::Fix, &[".......", ".OO.OO.", ".OO.OO.", "......."]),
    MAX_SCORE
  );
  // 相邻的活细胞破坏了空白边框
  assert_eq!(stage_score(Goal::Fix, &["....", ".OOO", ".OO.", "...."]), 0);
  assert_eq!(stage_score(Goal::Fix, &["OO..", "OO..", "....", "...."]), MAX_SCORE);
}

#[test]
fn cling_counts_bars_in_both_directions() {
  common::setup();

  let horizontal = [".....", ".....", ".OOO.", ".....", "....."];
  let vertical = [".....", "..O..", "..O..", "..O..", "....."];
  assert_eq!(stage_score(Goal::Cling, &horizontal), MAX_SCORE);
  assert_eq!(stage_score(Goal::Cling, &vertical), MAX_SCORE);
  assert_eq!(stage_score(Goal::Cling, &[".....", ".....", ".OOOO", ".....", "....."]), 0);
}

#[test]
fn template_scan_handles_non_square_grids() {
  common::setup();

  // 9x5: 横向最多放两个条
  assert_eq!(maximum_cling(9, 5), 2);
  assert_eq!(
    stage_score(Goal::Cling, &[".........", ".........", ".OOO.OOO.", ".........", "........."]),
    MAX_SCORE
  );
  assert_eq!(
    stage_score(Goal::Cling, &[".........", ".........", ".OOO.....", ".........", "........."]),
    500000
  );
}

#[test]
fn reference_counts() {
  assert_eq!(maximum_fix(4, 4), 1);
  assert_eq!(maximum_fix(6, 6), 4);
  assert_eq!(maximum_fix(7, 4), 2);
  assert_eq!(maximum_fix(10, 10), 9);
  assert_eq!(maximum_cling(5, 5), 1);
  assert_eq!(maximum_cling(9, 9), 4);
  assert_eq!(maximum_fix(500, 500), 166 * 166);
}

#[test]
fn degenerate_denominators_score_zero() {
  common::setup();

  assert_eq!(stage_score(Goal::Fix, &["OO", "OO"]), 0);
  assert_eq!(stage_score(Goal::Cling, &["OOO"]), 0);
  assert_eq!(percent(Goal::Fix, &common::filled(1, 1, true)), 0.0);
}

#[test]
fn you_always_scores_zero() {
  assert_eq!(score(&StageData::new(Goal::You, 10, common::filled(5, 5, true))), 0);
}
