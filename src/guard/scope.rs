//! Player context marker of the current thread.

use std::cell::Cell;
use std::marker::PhantomData;

use log::warn;

use crate::GolBoxError;

thread_local! {
  static PLAYER_CONTEXT: Cell<bool> = Cell::new(false);
}

/// Marks the current thread as running player code until dropped.
///
/// Stays on the thread that created it.
pub struct PlayerScope {
  previous: bool,
  _thread: PhantomData<*const ()>,
}

impl PlayerScope {
  pub fn enter() -> Self {
    let previous = PLAYER_CONTEXT.with(|context| context.replace(true));
    PlayerScope {
      previous,
      _thread: PhantomData,
    }
  }
}

impl Drop for PlayerScope {
  fn drop(&mut self) {
    PLAYER_CONTEXT.with(|context| context.set(self.previous));
  }
}

pub fn in_player_context() -> bool {
  PLAYER_CONTEXT.with(|context| context.get())
}

/// Refuse engine state writes coming from the player context
pub(crate) fn ensure_engine_context(target: &str) -> Result<(), GolBoxError> {
  if in_player_context() {
    warn!("Denied write to {} from player context", target);
    Err(GolBoxError::permission(format!(
      "Modification of {} is not allowed inside player code",
      target
    )))
  } else {
    Ok(())
  }
}
