// src/runtime/lifecycle.rs

//! Termination latch and watch registry shared by actors and bridges.

use crate::error::ExitCause;
use crate::runtime::{ActorId, Command, EventBus, MailboxSender, SystemEvent};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Notification that a watched actor terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitMessage {
  /// The actor that terminated.
  pub actor: ActorId,
  /// `None` for a normal exit.
  pub cause: Option<ExitCause>,
}

/// Receives exit notifications synchronously, on the thread that terminated the watched actor.
/// Implementations must not block.
pub trait IExitObserver: Send + Sync {
  fn on_exit(&self, exit: ExitMessage);
}

/// Who gets told when an actor terminates.
#[derive(Clone)]
pub enum Watcher {
  /// A weak back-reference; does not keep the observer alive.
  Observer(Weak<dyn IExitObserver>),
  /// An actor's control lane; receives `Command::Exit`. The lane is unbounded,
  /// so only a terminated watcher misses the notice.
  Mailbox(MailboxSender),
}

impl Watcher {
  fn deliver(&self, exit: ExitMessage) {
    match self {
      Watcher::Observer(weak) => {
        if let Some(observer) = weak.upgrade() {
          observer.on_exit(exit);
        }
      }
      Watcher::Mailbox(lane) => {
        let actor = exit.actor.clone();
        if lane.try_send(Command::Exit(exit)).is_err() {
          tracing::debug!(actor = %actor, "Watcher already terminated, exit notification dropped");
        }
      }
    }
  }
}

impl fmt::Debug for Watcher {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Watcher::Observer(weak) => f
        .debug_struct("Observer")
        .field("alive", &(weak.strong_count() > 0))
        .finish(),
      Watcher::Mailbox(mailbox) => f
        .debug_struct("Mailbox")
        .field("closed", &mailbox.is_closed())
        .finish(),
    }
  }
}

#[derive(Debug, Default)]
struct LifecycleState {
  terminated: bool,
  cause: Option<ExitCause>,
  watchers: HashMap<u64, Watcher>,
  next_watch_id: u64,
}

/// Single-shot termination of one actor plus the set of its watchers.
#[derive(Debug)]
pub struct Lifecycle {
  actor: ActorId,
  lanes: Vec<MailboxSender>,
  event_bus: EventBus,
  state: Mutex<LifecycleState>,
}

impl Lifecycle {
  /// `lanes` are the channels closed on termination (data mailbox and control lane).
  pub(crate) fn new(actor: ActorId, lanes: Vec<MailboxSender>, event_bus: EventBus) -> Arc<Self> {
    Arc::new(Self {
      actor,
      lanes,
      event_bus,
      state: Mutex::new(LifecycleState::default()),
    })
  }

  pub fn actor(&self) -> &ActorId {
    &self.actor
  }

  pub fn is_terminated(&self) -> bool {
    self.state.lock().terminated
  }

  /// `None` while alive, `Some(cause)` once terminated.
  pub fn exit_cause(&self) -> Option<Option<ExitCause>> {
    let state = self.state.lock();
    state.terminated.then(|| state.cause.clone())
  }

  /// Registers `watcher`. Watching an actor that already terminated delivers
  /// the exit immediately and returns an inert handle.
  pub fn watch(self: &Arc<Self>, watcher: Watcher) -> WatchHandle {
    let mut state = self.state.lock();
    if state.terminated {
      let exit = ExitMessage {
        actor: self.actor.clone(),
        cause: state.cause.clone(),
      };
      drop(state);
      tracing::debug!(actor = %self.actor, "Watch registered on terminated actor, delivering exit now");
      watcher.deliver(exit);
      return WatchHandle::inert();
    }
    let id = state.next_watch_id;
    state.next_watch_id += 1;
    state.watchers.insert(id, watcher);
    WatchHandle {
      id,
      lifecycle: Arc::downgrade(self),
    }
  }

  fn unwatch(&self, id: u64) {
    self.state.lock().watchers.remove(&id);
  }

  /// Terminates the actor. Only the first call has an effect: it records the
  /// cause, closes the mailbox, notifies every watcher once and returns `true`.
  pub fn terminate(&self, cause: Option<ExitCause>) -> bool {
    let watchers = {
      let mut state = self.state.lock();
      if state.terminated {
        return false;
      }
      state.terminated = true;
      state.cause = cause.clone();
      std::mem::take(&mut state.watchers)
    };

    tracing::debug!(actor = %self.actor, cause = ?cause, watchers = watchers.len(), "Actor terminated");
    for lane in &self.lanes {
      lane.close();
    }
    for watcher in watchers.into_values() {
      watcher.deliver(ExitMessage {
        actor: self.actor.clone(),
        cause: cause.clone(),
      });
    }
    self.event_bus.publish(SystemEvent::ActorStopping {
      actor: self.actor.clone(),
      cause,
    });
    true
  }
}

/// A cancellable watch subscription. Dropping it cancels the watch.
#[derive(Debug)]
#[must_use = "dropping a WatchHandle cancels the watch"]
pub struct WatchHandle {
  id: u64,
  lifecycle: Weak<Lifecycle>,
}

impl WatchHandle {
  fn inert() -> Self {
    Self {
      id: 0,
      lifecycle: Weak::new(),
    }
  }

  pub fn cancel(self) {
    drop(self);
  }
}

impl Drop for WatchHandle {
  fn drop(&mut self) {
    if let Some(lifecycle) = self.lifecycle.upgrade() {
      lifecycle.unwatch(self.id);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct Counter {
    exits: AtomicUsize,
    last: Mutex<Option<ExitMessage>>,
  }

  impl IExitObserver for Counter {
    fn on_exit(&self, exit: ExitMessage) {
      self.exits.fetch_add(1, Ordering::SeqCst);
      *self.last.lock() = Some(exit);
    }
  }

  fn counter() -> Arc<Counter> {
    Arc::new(Counter {
      exits: AtomicUsize::new(0),
      last: Mutex::new(None),
    })
  }

  fn lifecycle() -> Arc<Lifecycle> {
    Lifecycle::new(ActorId::new(7, "target"), Vec::new(), EventBus::new())
  }

  #[test]
  fn terminate_notifies_each_watcher_once() {
    let lifecycle = lifecycle();
    let observer = counter();
    let weak: Weak<dyn IExitObserver> = Arc::downgrade(&observer) as Weak<dyn IExitObserver>;
    let _handle = lifecycle.watch(Watcher::Observer(weak));

    assert!(lifecycle.terminate(Some(ExitCause::Interrupted)));
    assert!(!lifecycle.terminate(None));

    assert_eq!(observer.exits.load(Ordering::SeqCst), 1);
    let last = observer.last.lock().clone().unwrap();
    assert_eq!(last.actor, ActorId::new(7, "target"));
    assert_eq!(last.cause, Some(ExitCause::Interrupted));
    assert_eq!(lifecycle.exit_cause(), Some(Some(ExitCause::Interrupted)));
  }

  #[test]
  fn dropped_handle_stops_notifications() {
    let lifecycle = lifecycle();
    let observer = counter();
    let handle = lifecycle.watch(Watcher::Observer(Arc::downgrade(&observer) as Weak<dyn IExitObserver>));
    handle.cancel();
    lifecycle.terminate(None);
    assert_eq!(observer.exits.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn watching_dead_actor_delivers_immediately() {
    let lifecycle = lifecycle();
    lifecycle.terminate(None);
    let observer = counter();
    let _handle = lifecycle.watch(Watcher::Observer(Arc::downgrade(&observer) as Weak<dyn IExitObserver>));
    assert_eq!(observer.exits.load(Ordering::SeqCst), 1);
    assert_eq!(observer.last.lock().clone().unwrap().cause, None);
  }

  #[test]
  fn weak_observer_is_not_kept_alive() {
    let lifecycle = lifecycle();
    let observer = counter();
    let _handle = lifecycle.watch(Watcher::Observer(Arc::downgrade(&observer) as Weak<dyn IExitObserver>));
    drop(observer);
    // Nothing to deliver to; must not panic.
    assert!(lifecycle.terminate(None));
  }
}
