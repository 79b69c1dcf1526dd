//! Move allowance of the upcoming generation.

use crate::stage::Goal;

/// Generations at the end of a stage with the final phase allowance
pub const FINAL_PHASE: u32 = 5;

/// Reference board size the final phase allowances are expressed in
pub const BOARD_SIDE: u32 = 500;

/// Allowance for the generation after `gen`, given what is `remaining` of the
/// current one.
///
/// | Goal        | Normal phase          | Final phase |
/// |-------------|-----------------------|-------------|
/// | MORE, LESS  | remaining / 2 + 5     | 500 * 500   |
/// | ODD, EVEN   | remaining / 2 + 3     | 500 * 500 / 2 |
/// | BORDER      | 15                    | 500 * 4     |
/// | FIX, CLING  | 30                    | 30          |
/// | YOU         | 30                    | 30          |
pub fn next_allowance(goal: Goal, gen: u32, last_gen: u32, remaining: u32) -> u32 {
  let final_phase = is_final_phase(gen, last_gen);
  match goal {
    Goal::More | Goal::Less => {
      if final_phase {
        BOARD_SIDE * BOARD_SIDE
      } else {
        remaining / 2 + 5
      }
    }
    Goal::Odd | Goal::Even => {
      if final_phase {
        BOARD_SIDE * BOARD_SIDE / 2
      } else {
        remaining / 2 + 3
      }
    }
    Goal::Border => {
      if final_phase {
        BOARD_SIDE * 4
      } else {
        15
      }
    }
    Goal::Fix | Goal::Cling => 30,
    Goal::You => 30,
  }
}

/// `gen >= last_gen - 5` without underflow on short stages
pub fn is_final_phase(gen: u32, last_gen: u32) -> bool {
  gen.saturating_add(FINAL_PHASE) >= last_gen
}
