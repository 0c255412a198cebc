// src/context.rs

use crate::error::ExitCause;
use crate::runtime::{
  control_lane, mailbox, ActorDropGuard, ActorId, ActorMailbox, ActorRef, EventBus, Lifecycle, SystemEvent,
};
use crate::runtime::event_bus::DEFAULT_EVENT_BUS_CAPACITY;

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Tunables for actors created through a `Context`.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
  /// Mailbox capacity of new actors. `None` (the default) makes mailboxes
  /// unbounded. A bounded mailbox lets inbound frames overflow it, which
  /// tears the bridge down with `ExitCause::MailboxOverflow`.
  pub mailbox_capacity: Option<usize>,
  pub event_bus_capacity: usize,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      mailbox_capacity: None,
      event_bus_capacity: DEFAULT_EVENT_BUS_CAPACITY,
    }
  }
}

impl RuntimeConfig {
  pub fn mailbox_capacity(mut self, capacity: Option<usize>) -> Self {
    self.mailbox_capacity = capacity;
    self
  }

  pub fn event_bus_capacity(mut self, capacity: usize) -> Self {
    self.event_bus_capacity = capacity;
    self
  }
}

#[derive(Debug)]
pub(crate) struct ContextInner {
  next_handle: AtomicUsize,
  event_bus: EventBus,
  config: RuntimeConfig,
}

impl ContextInner {
  fn next_handle(&self) -> usize {
    self.next_handle.fetch_add(1, Ordering::Relaxed)
  }
}

/// Shared runtime state: handle allocation, the event bus and actor creation.
/// Contexts are cloneable and thread-safe.
#[derive(Clone)]
pub struct Context {
  inner: Arc<ContextInner>,
}

impl Context {
  pub fn new() -> Self {
    Self::with_config(RuntimeConfig::default())
  }

  pub fn with_config(config: RuntimeConfig) -> Self {
    tracing::debug!(?config, "Creating new webactors Context");
    Self {
      inner: Arc::new(ContextInner {
        next_handle: AtomicUsize::new(1),
        event_bus: EventBus::with_capacity(config.event_bus_capacity),
        config,
      }),
    }
  }

  pub fn next_handle(&self) -> usize {
    self.inner.next_handle()
  }

  pub fn event_bus(&self) -> &EventBus {
    &self.inner.event_bus
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.inner.config
  }

  /// Creates an actor address and its mailbox without spawning anything.
  /// The caller drives the mailbox and ends the actor with `ActorMailbox::exit`.
  pub fn actor(&self, name: &str) -> (ActorRef, ActorMailbox) {
    let id = ActorId::new(self.next_handle(), name);
    let (tx, rx) = mailbox(self.inner.config.mailbox_capacity);
    let (control_tx, control_rx) = control_lane();
    let lifecycle = Lifecycle::new(
      id.clone(),
      vec![tx.clone(), control_tx.clone()],
      self.inner.event_bus.clone(),
    );
    let actor = ActorRef::new(id, tx, control_tx, lifecycle);
    (actor.clone(), ActorMailbox::new(actor, rx, control_rx))
  }

  /// Spawns an actor body on the tokio runtime.
  ///
  /// The actor terminates with the body's result (`Ok` is a normal exit,
  /// `Err(cause)` an abnormal one). A task that is aborted or panics
  /// terminates with `ExitCause::Aborted`.
  pub fn spawn_actor<F, Fut>(&self, name: &str, body: F) -> (ActorRef, JoinHandle<()>)
  where
    F: FnOnce(ActorMailbox) -> Fut,
    Fut: Future<Output = Result<(), ExitCause>> + Send + 'static,
  {
    let (actor, mailbox) = self.actor(name);
    let lifecycle = actor.lifecycle().clone();
    let guard = ActorDropGuard::new(lifecycle.clone());
    let fut = body(mailbox);

    let task_handle = tokio::spawn(async move {
      let result = fut.await;
      guard.waive();
      lifecycle.terminate(result.err());
    });

    tracing::debug!(actor = %actor.id(), "Actor task spawned");
    self.event_bus().publish(SystemEvent::ActorStarted {
      actor: actor.id().clone(),
    });
    (actor, task_handle)
  }
}

impl Default for Context {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for Context {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Context")
      .field("config", &self.inner.config)
      .finish_non_exhaustive()
  }
}
