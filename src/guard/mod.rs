//! Runs one player turn at a time under a lowered identity, a write barrier
//! and a wall clock deadline.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, info, warn};

pub use identity::{Identity, IdentityGuard};
pub use namespace::Namespace;
pub use scope::{in_player_context, PlayerScope};

use crate::grid::Coord;
use crate::stage::StageView;
use crate::GolBoxError;

pub mod identity;
pub mod namespace;
pub mod scope;

/// Stops a running player from outside its worker thread
pub type Interrupter = Arc<dyn Fn() + Send + Sync>;

/// The turn function of a submission.
///
/// `played` starts empty and is filled in priority order. Anything returned
/// after the deadline is thrown away.
pub trait Player: Send {
  fn play(&mut self, stage: &StageView, played: &mut Vec<Coord>) -> Result<(), GolBoxError>;

  /// Called when a turn overruns and when the guard is dropped, used to
  /// release a stuck player
  fn interrupter(&self) -> Option<Interrupter> {
    None
  }
}

/// In process player built from a closure
pub struct FnPlayer<F> {
  turn: F,
}

impl<F> Player for FnPlayer<F>
where
  F: FnMut(&StageView, &mut Vec<Coord>) -> Result<(), GolBoxError> + Send,
{
  fn play(&mut self, stage: &StageView, played: &mut Vec<Coord>) -> Result<(), GolBoxError> {
    (self.turn)(stage, played)
  }
}

pub fn from_fn<F>(turn: F) -> Box<dyn Player>
where
  F: FnMut(&StageView, &mut Vec<Coord>) -> Result<(), GolBoxError> + Send + 'static,
{
  Box::new(FnPlayer { turn })
}

#[derive(Debug, Clone)]
pub struct GuardOptions {
  timeout: Duration,
  grace: Duration,
  identity: Option<Identity>,
}

impl Default for GuardOptions {
  fn default() -> Self {
    GuardOptions {
      timeout: Duration::from_secs(5),
      grace: Duration::from_secs(5),
      identity: None,
    }
  }
}

impl GuardOptions {
  pub fn new() -> Self {
    GuardOptions::default()
  }

  /// Wall clock budget of one call, counted from the moment the worker picks it up
  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// How long a turn may wait for an overrunning earlier call to return
  pub fn grace(mut self, grace: Duration) -> Self {
    self.grace = grace;
    self
  }

  /// Unprivileged identity of the worker thread during each call
  pub fn identity(mut self, identity: Option<Identity>) -> Self {
    self.identity = identity;
    self
  }

  pub fn timeout_value(&self) -> Duration {
    self.timeout
  }

  pub fn grace_value(&self) -> Duration {
    self.grace
  }

  pub fn identity_value(&self) -> Option<&Identity> {
    self.identity.as_ref()
  }
}

struct Turn {
  gen: u32,
  view: StageView,
}

enum Event {
  Started(u32),
  Finished { gen: u32, moves: Vec<Coord> },
}

/// Owns the worker thread of one player.
///
/// The deadline of a turn starts when the worker picks it up. An overrunning
/// call is interrupted when the player supports it, otherwise the next turn
/// waits up to the grace period for the worker. At most one turn waits behind
/// the running one, further turns are skipped. The worker is detached on drop.
pub struct ExecutionGuard {
  turns: Option<Sender<Turn>>,
  events: Receiver<Event>,
  timeout: Duration,
  grace: Duration,
  interrupter: Option<Interrupter>,
}

impl ExecutionGuard {
  pub fn spawn(player: Box<dyn Player>, options: GuardOptions) -> Result<Self, GolBoxError> {
    let (turn_sender, turn_receiver) = bounded::<Turn>(1);
    let (event_sender, event_receiver) = unbounded::<Event>();
    let interrupter = player.interrupter();
    let identity = options.identity;

    thread::Builder::new()
      .name("golj-player".to_string())
      .spawn(move || work(player, identity, turn_receiver, event_sender))?;

    debug!(
      "Spawn player worker with timeout {}ms",
      options.timeout.as_millis()
    );
    Ok(ExecutionGuard {
      turns: Some(turn_sender),
      events: event_receiver,
      timeout: options.timeout,
      grace: options.grace,
      interrupter,
    })
  }

  /// Run the player on `view` and return its proposals, empty on any failure
  pub fn call(&mut self, view: StageView) -> Vec<Coord> {
    let gen = view.gen();
    let turns = match &self.turns {
      Some(turns) => turns,
      None => return vec![],
    };
    match turns.try_send(Turn { gen, view }) {
      Ok(()) => {}
      Err(TrySendError::Full(_)) => {
        warn!("Player is still busy, skip generation {}", gen);
        return vec![];
      }
      Err(TrySendError::Disconnected(_)) => {
        error!("Player worker has stopped, skip generation {}", gen);
        return vec![];
      }
    }

    if !self.wait_started(gen) {
      return vec![];
    }

    let deadline = Instant::now() + self.timeout;
    loop {
      match self.events.recv_deadline(deadline) {
        Ok(Event::Finished { gen: done, moves }) if done == gen => return moves,
        Ok(Event::Finished { gen: done, .. }) => {
          debug!("Discard late moves of generation {}", done);
        }
        Ok(Event::Started(started)) => {
          debug!("Generation {} started out of order", started);
        }
        Err(RecvTimeoutError::Timeout) => {
          warn!(
            "Player exceeds {}ms at generation {}, moves discarded",
            self.timeout.as_millis(),
            gen
          );
          self.interrupt();
          return vec![];
        }
        Err(RecvTimeoutError::Disconnected) => {
          error!("Player worker has stopped at generation {}", gen);
          return vec![];
        }
      }
    }
  }

  /// Wait until the worker picks up `gen`, late results of earlier turns are dropped
  fn wait_started(&self, gen: u32) -> bool {
    let pickup = Instant::now() + self.grace;
    loop {
      match self.events.recv_deadline(pickup) {
        Ok(Event::Started(started)) if started == gen => return true,
        Ok(Event::Started(started)) => {
          debug!("Generation {} started late", started);
        }
        Ok(Event::Finished { gen: done, .. }) => {
          debug!("Discard late moves of generation {}", done);
        }
        Err(RecvTimeoutError::Timeout) => {
          warn!(
            "Player is still busy with an earlier turn, skip generation {}",
            gen
          );
          return false;
        }
        Err(RecvTimeoutError::Disconnected) => {
          error!("Player worker has stopped, skip generation {}", gen);
          return false;
        }
      }
    }
  }

  fn interrupt(&self) {
    if let Some(interrupter) = &self.interrupter {
      interrupter();
    }
  }
}

impl Drop for ExecutionGuard {
  fn drop(&mut self) {
    // 关闭 channel 后 worker 处理完当前回合即退出
    self.turns.take();
    if let Some(interrupter) = self.interrupter.take() {
      interrupter();
    }
  }
}

fn work(
  mut player: Box<dyn Player>,
  identity: Option<Identity>,
  turns: Receiver<Turn>,
  events: Sender<Event>,
) {
  for turn in turns.iter() {
    if events.send(Event::Started(turn.gen)).is_err() {
      break;
    }
    let moves = run_turn(player.as_mut(), identity.as_ref(), &turn.view);
    if events
      .send(Event::Finished {
        gen: turn.gen,
        moves,
      })
      .is_err()
    {
      break;
    }
  }
  info!("Player worker exits");
}

fn run_turn(player: &mut dyn Player, identity: Option<&Identity>, view: &StageView) -> Vec<Coord> {
  let _identity = match IdentityGuard::acquire(identity) {
    Ok(guard) => guard,
    Err(err) => {
      error!("Player is not called at generation {}: {}", view.gen(), err);
      return vec![];
    }
  };
  let _scope = PlayerScope::enter();

  let mut played = vec![];
  let result = panic::catch_unwind(AssertUnwindSafe(|| player.play(view, &mut played)));
  match result {
    Ok(Ok(())) => played,
    Ok(Err(err)) => {
      warn!("Player fails at generation {}: {}", view.gen(), err);
      vec![]
    }
    Err(payload) => {
      warn!(
        "Player panics at generation {}: {}",
        view.gen(),
        panic_message(payload.as_ref())
      );
      vec![]
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic".to_string()
  }
}
