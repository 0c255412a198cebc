// src/runtime/actor_ref.rs

use crate::error::{BridgeError, ExitCause};
use crate::runtime::lifecycle::{Lifecycle, WatchHandle, Watcher};
use crate::runtime::mailbox::{MailboxReceiver, MailboxSender, TrySendError};
use crate::runtime::Command;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

/// Address of an actor or bridge: a unique handle plus a display name.
///
/// Equality and hashing use the handle only.
#[derive(Debug, Clone)]
pub struct ActorId {
  handle: usize,
  name: Arc<str>,
}

impl ActorId {
  pub fn new(handle: usize, name: impl Into<Arc<str>>) -> Self {
    Self {
      handle,
      name: name.into(),
    }
  }

  pub fn handle(&self) -> usize {
    self.handle
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

impl PartialEq for ActorId {
  fn eq(&self, other: &Self) -> bool {
    self.handle == other.handle
  }
}

impl Eq for ActorId {}

impl Hash for ActorId {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.handle.hash(state);
  }
}

impl fmt::Display for ActorId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}#{}", self.name, self.handle)
  }
}

/// Cloneable address of a mailbox-driven actor.
#[derive(Clone)]
pub struct ActorRef {
  id: ActorId,
  mailbox: MailboxSender,
  control: MailboxSender,
  lifecycle: Arc<Lifecycle>,
}

impl ActorRef {
  pub(crate) fn new(id: ActorId, mailbox: MailboxSender, control: MailboxSender, lifecycle: Arc<Lifecycle>) -> Self {
    Self {
      id,
      mailbox,
      control,
      lifecycle,
    }
  }

  pub fn id(&self) -> &ActorId {
    &self.id
  }

  /// Suspending send: waits while a bounded mailbox is full.
  pub async fn send(&self, command: Command) -> Result<(), BridgeError> {
    self
      .mailbox
      .send(command)
      .await
      .map_err(|_| BridgeError::MailboxClosed(self.id.to_string()))
  }

  /// Suspending send bounded by `timeout`.
  pub async fn send_timeout(&self, command: Command, timeout: Duration) -> Result<(), BridgeError> {
    match tokio::time::timeout(timeout, self.send(command)).await {
      Ok(result) => result,
      Err(_) => Err(BridgeError::MailboxFull(self.id.to_string())),
    }
  }

  /// Non-blocking enqueue. Never suspends the caller.
  pub fn try_send(&self, command: Command) -> Result<(), TrySendError> {
    self.mailbox.try_send(command)
  }

  pub fn watch(&self, watcher: Watcher) -> WatchHandle {
    self.lifecycle.watch(watcher)
  }

  pub fn is_terminated(&self) -> bool {
    self.lifecycle.is_terminated()
  }

  /// `None` while alive, `Some(cause)` once terminated.
  pub fn exit_cause(&self) -> Option<Option<ExitCause>> {
    self.lifecycle.exit_cause()
  }

  /// Kills the actor from outside: closes its mailbox and notifies watchers.
  /// Returns `false` if it had already terminated.
  pub fn terminate(&self, cause: Option<ExitCause>) -> bool {
    self.lifecycle.terminate(cause)
  }

  pub(crate) fn lifecycle(&self) -> &Arc<Lifecycle> {
    &self.lifecycle
  }
}

impl PartialEq for ActorRef {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for ActorRef {}

impl fmt::Debug for ActorRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ActorRef")
      .field("id", &self.id)
      .field("mailbox_closed", &self.mailbox.is_closed())
      .finish()
  }
}

/// The receiving side owned by the actor's own task.
///
/// Reads the control lane (exit notifications) ahead of the data mailbox, so
/// an exit notice can overtake data that is still queued.
#[derive(Debug)]
pub struct ActorMailbox {
  actor: ActorRef,
  receiver: MailboxReceiver,
  control: MailboxReceiver,
}

impl ActorMailbox {
  pub(crate) fn new(actor: ActorRef, receiver: MailboxReceiver, control: MailboxReceiver) -> Self {
    Self {
      actor,
      receiver,
      control,
    }
  }

  /// The actor's own address, e.g. to hand to watchers.
  pub fn actor(&self) -> &ActorRef {
    &self.actor
  }

  /// Waits for the next command. `None` once the mailbox is closed and drained.
  pub async fn recv(&self) -> Option<Command> {
    if let Ok(command) = self.control.try_recv() {
      return Some(command);
    }
    tokio::select! {
      biased;
      command = self.control.recv() => match command {
        Ok(command) => Some(command),
        Err(_) => self.receiver.recv().await.ok(),
      },
      command = self.receiver.recv() => match command {
        Ok(command) => Some(command),
        Err(_) => self.control.recv().await.ok(),
      },
    }
  }

  pub async fn recv_timeout(&self, timeout: Duration) -> Option<Command> {
    tokio::time::timeout(timeout, self.recv()).await.ok().flatten()
  }

  pub fn try_recv(&self) -> Option<Command> {
    self
      .control
      .try_recv()
      .or_else(|_| self.receiver.try_recv())
      .ok()
  }

  /// Watches another actor (or bridge) through this mailbox.
  pub fn watch(&self, other: &ActorRef) -> WatchHandle {
    other.watch(self.as_watcher())
  }

  /// This mailbox as a watcher, for watching entities other than actors (e.g. bridges).
  pub fn as_watcher(&self) -> Watcher {
    Watcher::Mailbox(self.actor.control.clone())
  }

  /// Terminates the owning actor with `cause`.
  pub fn exit(self, cause: Option<ExitCause>) {
    self.actor.terminate(cause);
  }
}
