use std::fs;
use std::time::Duration;

use tempfile::tempdir;

use golj::guard::from_fn;
use golj::runtime::parse_stages;
use golj::stage::{Replay, ScoreRecord};
use golj::{play, Coord, Goal, GolBoxError, Grid, GuardOptions, RuntimeOptions, StageData};

mod common;

#[test]
fn it_should_parse_stage_descriptions() {
  common::setup();

  let text = common::stage_text(Goal::Border, 12, &["O.O", ".O.", "OOO"]);
  let stage = StageData::parse(&text).unwrap();
  assert_eq!((stage.width(), stage.height()), (3, 3));
  assert_eq!(stage.goal(), Goal::Border);
  assert_eq!(stage.last_gen(), 12);
  assert_eq!(stage.gen(), 0);
  assert_eq!(stage.moves(), 0);
  assert_eq!(stage.grid(), &common::grid(&["O.O", ".O.", "OOO"]));
  assert_eq!(stage.describe(), text);
}

#[test]
fn short_rows_leave_cells_dead() {
  let stage = StageData::parse("Dimension: 4 2\nGoal: 1\nGeneration: 3\n  O\nO.xO\n").unwrap();
  assert_eq!(stage.grid(), &common::grid(&["O...", "O..O"]));
}

#[test]
fn malformed_descriptions_are_rejected() {
  assert!(StageData::parse("Dimension: 2 2\nGoal: 1\nGeneration: 3\nOO\n").is_err());
  assert!(StageData::parse("Dimension: 2 2\nGoal: 9\nGeneration: 3\nOO\nOO\n").is_err());
  assert!(StageData::parse("Goal: 1\nDimension: 2 2\nGeneration: 3\nOO\nOO\n").is_err());
  assert!(StageData::parse("Dimension: two 2\nGoal: 1\nGeneration: 3\nOO\nOO\n").is_err());
}

#[test]
fn oversized_dimensions_are_rejected() {
  common::setup();

  for dimension in ["4294967296 4294967296", "18446744073709551615 2", "8192 4096"] {
    let text = format!("Dimension: {}\nGoal: 1\nGeneration: 3\n", dimension);
    match StageData::parse(&text) {
      Err(GolBoxError::Stage(msg)) => assert!(msg.contains("exceeds"), "{}", msg),
      other => panic!("unexpected result {:?}", other.map(|_| ())),
    }
  }
  assert!(Grid::from_cells(usize::MAX, 2, vec![]).is_err());

  let dir = tempdir().unwrap();
  fs::create_dir_all(dir.path().join("stages")).unwrap();
  fs::write(
    dir.path().join("stages").join("more.in"),
    "Dimension: 4294967296 4294967296\nGoal: 1\nGeneration: 3\n",
  )
  .unwrap();
  let options = RuntimeOptions::new(dir.path()).stages(vec![Goal::More]);
  assert_eq!(play(&options, |_| Ok(from_fn(|_, _| Ok(())))).unwrap(), 0);

  let all = fs::read_to_string(dir.path().join("logs").join("all.log")).unwrap();
  let records = ScoreRecord::parse_log(&all);
  assert!(matches!(&records[0], ScoreRecord::Error { stage, .. } if stage == "more"));
  assert_eq!(records[1], ScoreRecord::Total(0));
}

#[test]
fn stage_selections_accept_ids_and_names() {
  assert_eq!(
    parse_stages("1 less, 5  CLING").unwrap(),
    vec![Goal::More, Goal::Less, Goal::Border, Goal::Cling]
  );
  assert!(parse_stages("").unwrap().is_empty());
  assert!(parse_stages("0").is_err());
}

#[test]
fn score_logs_are_parsed_back() {
  let records = ScoreRecord::parse_log("Score more: 12\nError fix: Stage Error: bad\n\nhello\nTotal: 12\n");
  assert_eq!(
    records,
    vec![
      ScoreRecord::Score {
        stage: "more".to_string(),
        score: 12
      },
      ScoreRecord::Error {
        stage: "fix".to_string(),
        message: "Stage Error: bad".to_string()
      },
      ScoreRecord::Total(12)
    ]
  );
}

#[test]
fn zero_generation_logs_keep_the_initial_grid() {
  common::setup();

  let dir = tempdir().unwrap();
  let text = common::stage_text(Goal::More, 0, &["O..", ".O.", "..O"]);
  fs::create_dir_all(dir.path().join("stages")).unwrap();
  fs::write(dir.path().join("stages").join("more.in"), &text).unwrap();

  let options = RuntimeOptions::new(dir.path()).stages(vec![Goal::More]);
  play(&options, |_| Ok(from_fn(|_, _| Ok(())))).unwrap();

  let log = fs::read_to_string(dir.path().join("logs").join("more.log")).unwrap();
  let replay = Replay::parse(&log).unwrap();
  assert!(replay.frames().is_empty());
  assert_eq!(replay.stage().grid(), &common::grid(&["O..", ".O.", "..O"]));
  assert_eq!(replay.final_stage().unwrap().grid(), replay.stage().grid());
}

#[test]
fn it_should_play_stages_and_replay_them() {
  common::setup();

  let dir = tempdir().unwrap();
  fs::create_dir_all(dir.path().join("stages")).unwrap();
  fs::write(
    dir.path().join("stages").join("more.in"),
    common::stage_text(Goal::More, 8, &["......", ".OO...", "......", "...O..", "......"]),
  )
  .unwrap();
  fs::write(
    dir.path().join("stages").join("fix.in"),
    common::stage_text(Goal::Fix, 6, &["....", "....", "....", "...."]),
  )
  .unwrap();

  let options = RuntimeOptions::new(dir.path())
    .stages(vec![Goal::More, Goal::Odd, Goal::Fix])
    .guard(GuardOptions::new().timeout(Duration::from_secs(2)));
  let total = play(&options, |stage| {
    let width = stage.width() as i64;
    Ok(from_fn(move |view, played| {
      // 把 (1, 1) (2, 1) (1, 2) (2, 2) 变成方块
      for index in [1 + width, 2 + width, 1 + 2 * width, 2 + 2 * width] {
        if !view.is_alive(Coord::Index(index)) {
          played.push(Coord::Index(index));
        }
      }
      played.push(Coord::Index(-3));
      Ok(())
    }))
  })
  .unwrap();

  let all = fs::read_to_string(dir.path().join("logs").join("all.log")).unwrap();
  let records = ScoreRecord::parse_log(&all);
  assert_eq!(records.len(), 3);
  assert_eq!(records.last(), Some(&ScoreRecord::Total(total)));
  assert!(!dir.path().join("logs").join("odd.log").exists());

  // FIX 的方块在最后一代仍然存在
  assert_eq!(
    records[1],
    ScoreRecord::Score {
      stage: "fix".to_string(),
      score: 1_000_000
    }
  );

  for name in ["more", "fix"] {
    let log = fs::read_to_string(dir.path().join("logs").join(format!("{}.log", name))).unwrap();
    let replay = Replay::parse(&log).unwrap();
    let final_stage = replay.final_stage().unwrap();
    let score = golj::score(&final_stage);
    let logged = records
      .iter()
      .find_map(|record| match record {
        ScoreRecord::Score { stage, score } if stage == name => Some(*score),
        _ => None,
      })
      .unwrap();
    assert_eq!(score, logged);
    assert_eq!(replay.frames().len(), final_stage.last_gen() as usize);
    assert!(replay.frames()[0].moves.is_empty());
  }
}

#[test]
fn failing_stages_are_logged_as_errors() {
  common::setup();

  let dir = tempdir().unwrap();
  fs::create_dir_all(dir.path().join("stages")).unwrap();
  fs::write(dir.path().join("stages").join("less.in"), "Dimension: 2 2\nGoal: 2\n").unwrap();
  fs::write(
    dir.path().join("stages").join("even.in"),
    common::stage_text(Goal::Even, 2, &["OO", "OO"]),
  )
  .unwrap();

  let options = RuntimeOptions::new(dir.path()).stages(vec![Goal::Less, Goal::Even]);
  let total = play(&options, |stage| {
    if stage.goal() == Goal::Even {
      Err(GolBoxError::player("no player"))
    } else {
      Ok(from_fn(|_, _| Ok(())))
    }
  })
  .unwrap();
  assert_eq!(total, 0);

  let all = fs::read_to_string(dir.path().join("logs").join("all.log")).unwrap();
  let records = ScoreRecord::parse_log(&all);
  assert_eq!(records.len(), 3);
  assert!(matches!(&records[0], ScoreRecord::Error { stage, .. } if stage == "less"));
  assert!(matches!(&records[1], ScoreRecord::Error { stage, .. } if stage == "even"));
  assert_eq!(records[2], ScoreRecord::Total(0));
}
