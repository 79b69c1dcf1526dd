pub use context::{
  GolBox, GolBoxBuilder, GolBoxContext, GolBoxRunContext, SubmissionOption,
  SubmissionOptionBuilder, SubmissionReport, SubmissionResult,
};
pub use engine::Engine;
pub use error::{GolBoxError, GolBoxExit};
pub use grid::{Coord, Grid};
pub use guard::{ExecutionGuard, GuardOptions, Player};
pub use neighbor::NeighborCounts;
pub use player::{ScriptCommand, ScriptPlayer};
pub use runtime::{play, play_script, RuntimeOptions};
pub use sandbox::{
  close_environment, collect_results, install_submission, invoke_isolated, run_submission,
  ContainerOption, DRIVER_NAME, DRIVER_SOURCE, LIBRARY_NAME, LIBRARY_SOURCE,
};
pub use score::score;
pub use stage::{Goal, StageData, StageView};

pub mod budget;
mod cgroup;
mod context;
mod engine;
mod error;
pub mod grid;
pub mod guard;
mod neighbor;
mod player;
pub mod protocol;
pub mod runtime;
mod sandbox;
pub mod sanitize;
pub mod score;
pub mod stage;
pub mod utils;
