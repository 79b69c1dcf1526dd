//! Stage loop run inside the isolated environment.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};

use crate::engine::Engine;
use crate::guard::{ExecutionGuard, GuardOptions, Player};
use crate::player::ScriptCommand;
use crate::score::score;
use crate::stage::{decode_latin1, Goal, ScoreLog, StageData, StageLog};
use crate::GolBoxError;

#[derive(Debug, Clone)]
pub struct RuntimeOptions {
  root: PathBuf,
  stages: Vec<Goal>,
  guard: GuardOptions,
}

impl RuntimeOptions {
  pub fn new<P: Into<PathBuf>>(root: P) -> Self {
    RuntimeOptions {
      root: root.into(),
      stages: vec![],
      guard: GuardOptions::default(),
    }
  }

  pub fn stages(mut self, stages: Vec<Goal>) -> Self {
    self.stages = stages;
    self
  }

  pub fn guard(mut self, guard: GuardOptions) -> Self {
    self.guard = guard;
    self
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn selected(&self) -> &[Goal] {
    &self.stages
  }

  /// `<root>/stages/<name>.in`
  pub fn stage_file(&self, goal: Goal) -> PathBuf {
    self.root.join("stages").join(format!("{}.in", goal.name()))
  }

  /// `<root>/logs`
  pub fn log_dir(&self) -> PathBuf {
    self.root.join("logs")
  }
}

/// Parse a stage selection such as `1 2 border`
pub fn parse_stages(text: &str) -> Result<Vec<Goal>, GolBoxError> {
  text
    .split(|c: char| c.is_whitespace() || c == ',')
    .filter(|item| !item.is_empty())
    .map(Goal::parse)
    .collect()
}

/// Play every selected stage and write the aggregate score log.
///
/// `make_player` is called once per stage. A missing stage file is skipped, a
/// failing stage is logged as an error and scores nothing.
pub fn play<F>(options: &RuntimeOptions, mut make_player: F) -> Result<u64, GolBoxError>
where
  F: FnMut(&StageData) -> Result<Box<dyn Player>, GolBoxError>,
{
  let log_dir = options.log_dir();
  fs::create_dir_all(&log_dir)?;
  let mut scores = ScoreLog::create(log_dir.join("all.log"))?;

  let mut total = 0u64;
  for goal in options.selected() {
    let path = options.stage_file(*goal);
    if !path.is_file() {
      warn!("Stage file {} does not exist, skip", path.to_string_lossy());
      continue;
    }
    match run_stage(options, *goal, &path, &mut make_player) {
      Ok(value) => {
        info!("Stage {} scores {}", goal.name(), value);
        scores.score(goal.name(), value)?;
        total += value as u64;
      }
      Err(err) => {
        error!("Stage {} fails: {}", goal.name(), err);
        scores.error(goal.name(), &err.to_string())?;
      }
    }
  }

  scores.total(total)?;
  info!("Total: {}", total);
  Ok(total)
}

/// Play stages with a fresh player process each
pub fn play_script(options: &RuntimeOptions, command: &ScriptCommand) -> Result<u64, GolBoxError> {
  play(options, |_| {
    let player: Box<dyn Player> = Box::new(command.spawn()?);
    Ok(player)
  })
}

fn run_stage<F>(
  options: &RuntimeOptions,
  goal: Goal,
  path: &Path,
  make_player: &mut F,
) -> Result<u32, GolBoxError>
where
  F: FnMut(&StageData) -> Result<Box<dyn Player>, GolBoxError>,
{
  let description = decode_latin1(&fs::read(path)?);
  let stage = StageData::parse(&description)?;
  if stage.goal() != goal {
    warn!(
      "Stage file {} declares goal {}, expected {}",
      path.to_string_lossy(),
      stage.goal(),
      goal
    );
  }
  debug!(
    "Load stage {} ({}x{}, {} generations)",
    goal.name(),
    stage.width(),
    stage.height(),
    stage.last_gen()
  );

  let mut log = StageLog::create(
    options.log_dir().join(format!("{}.log", goal.name())),
    &description,
  )?;
  let player = make_player(&stage)?;
  let mut guard = ExecutionGuard::spawn(player, options.guard.clone())?;

  let mut engine = Engine::new(stage);
  while !engine.stage().is_finished() {
    engine.step()?;
    let proposed = guard.call(engine.stage().view());
    let applied = engine.apply_moves(&proposed)?;
    log.frame(engine.stage().gen(), &applied)?;
    engine.finish_turn()?;
  }
  drop(guard);

  Ok(score(engine.stage()))
}
