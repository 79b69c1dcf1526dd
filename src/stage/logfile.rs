use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use log::{debug, warn};

use crate::engine::Engine;
use crate::stage::{StageData, SEPARATOR};
use crate::GolBoxError;

/// Append only move log of one stage
pub struct StageLog {
  file: File,
}

/// Aggregate score log shared by all stages of a run
pub struct ScoreLog {
  file: File,
}

/// One line of the aggregate score log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreRecord {
  Score { stage: String, score: u32 },
  Error { stage: String, message: String },
  Total(u64),
}

/// Indices toggled by the player in one generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
  pub gen: u32,
  pub moves: Vec<usize>,
}

/// A stage log read back for audit
#[derive(Debug, Clone)]
pub struct Replay {
  stage: StageData,
  frames: Vec<Frame>,
}

impl StageLog {
  /// Start a stage log with a copy of the stage description
  pub fn create<P: AsRef<Path>>(path: P, description: &str) -> Result<Self, GolBoxError> {
    let mut file = File::create(path.as_ref())?;
    file.write_all(description.as_bytes())?;
    if !description.is_empty() && !description.ends_with('\n') {
      file.write_all(b"\n")?;
    }
    file.write_all(SEPARATOR.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()?;
    debug!("Create stage log {}", path.as_ref().to_string_lossy());
    Ok(StageLog { file })
  }

  /// Append and flush the frame of one generation
  pub fn frame(&mut self, gen: u32, moves: &[usize]) -> Result<(), GolBoxError> {
    let mut line = format!("Frame: {}", gen);
    for index in moves {
      line.push_str(&format!(" {}", index));
    }
    line.push('\n');
    self.file.write_all(line.as_bytes())?;
    self.file.flush()?;
    Ok(())
  }
}

impl ScoreLog {
  pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, GolBoxError> {
    let file = OpenOptions::new()
      .create(true)
      .write(true)
      .truncate(true)
      .open(path.as_ref())?;
    Ok(ScoreLog { file })
  }

  fn append(&mut self, record: ScoreRecord) -> Result<(), GolBoxError> {
    let line = match record {
      ScoreRecord::Score { stage, score } => format!("Score {}: {}\n", stage, score),
      ScoreRecord::Error { stage, message } => {
        format!("Error {}: {}\n", stage, message.replace('\n', " "))
      }
      ScoreRecord::Total(total) => format!("Total: {}\n", total),
    };
    self.file.write_all(line.as_bytes())?;
    self.file.flush()?;
    Ok(())
  }

  pub fn score(&mut self, stage: &str, score: u32) -> Result<(), GolBoxError> {
    self.append(ScoreRecord::Score {
      stage: stage.to_string(),
      score,
    })
  }

  pub fn error(&mut self, stage: &str, message: &str) -> Result<(), GolBoxError> {
    self.append(ScoreRecord::Error {
      stage: stage.to_string(),
      message: message.to_string(),
    })
  }

  pub fn total(&mut self, total: u64) -> Result<(), GolBoxError> {
    self.append(ScoreRecord::Total(total))
  }
}

impl ScoreRecord {
  fn parse_line(line: &str) -> Option<ScoreRecord> {
    let (head, value) = line.trim().split_once(':')?;
    let value = value.trim();
    let mut head = head.split_whitespace();
    match (head.next(), head.next()) {
      (Some("Total"), None) => value.parse().ok().map(ScoreRecord::Total),
      (Some("Score"), Some(stage)) => value.parse().ok().map(|score| ScoreRecord::Score {
        stage: stage.to_string(),
        score,
      }),
      (Some("Error"), Some(stage)) => Some(ScoreRecord::Error {
        stage: stage.to_string(),
        message: value.to_string(),
      }),
      _ => None,
    }
  }

  /// Parse an aggregate score log, unknown lines are skipped
  pub fn parse_log(text: &str) -> Vec<ScoreRecord> {
    let mut records = vec![];
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
      match ScoreRecord::parse_line(line) {
        Some(record) => records.push(record),
        None => warn!("Skip unknown score log line ({})", line),
      }
    }
    records
  }
}

impl Replay {
  pub fn parse(text: &str) -> Result<Replay, GolBoxError> {
    let (description, frames) = match text.split_once(&format!("\n{}\n", SEPARATOR)) {
      Some((description, frames)) => (description, frames),
      None => match text.strip_suffix(&format!("\n{}", SEPARATOR)) {
        Some(description) => (description, ""),
        None => return Err(GolBoxError::stage("Stage log has no separator line")),
      },
    };
    let stage = StageData::parse(description)?;

    let mut parsed = vec![];
    for line in frames.lines().filter(|line| !line.trim().is_empty()) {
      let rest = line
        .strip_prefix("Frame:")
        .ok_or_else(|| GolBoxError::stage(format!("Invalid frame line ({})", line)))?;
      let mut values = rest.split_whitespace();
      let gen = values
        .next()
        .and_then(|gen| gen.parse::<u32>().ok())
        .ok_or_else(|| GolBoxError::stage(format!("Frame without generation ({})", line)))?;
      let moves = values
        .map(|index| index.parse::<usize>())
        .collect::<Result<Vec<usize>, _>>()
        .map_err(|err| GolBoxError::stage(format!("Invalid frame index: {}", err)))?;
      parsed.push(Frame { gen, moves });
    }

    Ok(Replay {
      stage,
      frames: parsed,
    })
  }

  /// Initial stage as recorded in the log
  pub fn stage(&self) -> &StageData {
    &self.stage
  }

  pub fn frames(&self) -> &[Frame] {
    &self.frames
  }

  /// Re-simulate every logged generation and return the final stage
  pub fn final_stage(&self) -> Result<StageData, GolBoxError> {
    let mut engine = Engine::new(self.stage.clone());
    for frame in &self.frames {
      if engine.stage().is_finished() {
        warn!("Replay has more frames than generations, stop at {}", frame.gen);
        break;
      }
      engine.step()?;
      engine.apply_indices(&frame.moves)?;
      engine.finish_turn()?;
    }
    Ok(engine.into_stage())
  }
}
