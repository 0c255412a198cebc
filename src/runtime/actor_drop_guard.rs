// src/runtime/actor_drop_guard.rs

use crate::error::ExitCause;
use crate::runtime::lifecycle::Lifecycle;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Terminates an actor's lifecycle with `ExitCause::Aborted` if its task is
/// dropped (cancelled or unwound by a panic) before it exits on its own.
pub(crate) struct ActorDropGuard {
  lifecycle: Arc<Lifecycle>,
  stopped_normally: AtomicBool,
}

impl ActorDropGuard {
  pub fn new(lifecycle: Arc<Lifecycle>) -> Self {
    Self {
      lifecycle,
      stopped_normally: AtomicBool::new(false),
    }
  }

  pub fn waive(&self) {
    self.stopped_normally.store(true, Ordering::Relaxed);
  }
}

impl Drop for ActorDropGuard {
  fn drop(&mut self) {
    if !self.stopped_normally.load(Ordering::Relaxed) {
      debug!(
        actor = %self.lifecycle.actor(),
        "ActorDropGuard: actor task dropped before exiting (cancelled/panicked)"
      );
      self.lifecycle.terminate(Some(ExitCause::Aborted));
    }
  }
}
