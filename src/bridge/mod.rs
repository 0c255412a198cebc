// src/bridge/mod.rs

//! A live transport session exposed as an actor-addressable endpoint.

pub mod channel;
pub mod options;

pub use channel::{ISendPort, OutboundChannel};
pub use options::BridgeOptions;

use crate::context::Context;
use crate::error::{BridgeError, ExitCause};
use crate::message::{Payload, WebDataMessage};
use crate::runtime::{
  ActorId, ActorRef, Command, ExitMessage, IExitObserver, Lifecycle, SystemEvent, TrySendError,
  WatchHandle, Watcher,
};
use crate::transport::{truncate_on_char_boundary, CloseCode, CloseReason, ISession};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinError};

const STATE_OPEN: u8 = 0;
const STATE_DYING: u8 = 1;
const STATE_DEAD: u8 = 2;

/// Where a bridge is in its `Open -> Dying -> Dead` lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
  Open,
  /// Teardown is running on some thread.
  Dying,
  Dead,
}

impl BridgeState {
  fn from_u8(raw: u8) -> Self {
    match raw {
      STATE_OPEN => BridgeState::Open,
      STATE_DYING => BridgeState::Dying,
      _ => BridgeState::Dead,
    }
  }
}

/// Couples one transport session to one target actor for its whole life.
///
/// Inbound frames are forwarded to the target with a non-blocking enqueue,
/// outbound messages are written straight to the session. The bridge watches
/// the target; whichever side fails first tears the other down, exactly once.
pub struct WebSocketBridge {
  id: ActorId,
  session: Weak<dyn ISession>,
  target: ActorRef,
  outbound: OutboundChannel,
  state: AtomicU8,
  lifecycle: Arc<Lifecycle>,
  target_watch: Mutex<Option<WatchHandle>>,
  /// The in-flight socket-opened notification, aborted by `interrupt`.
  open_notice: Mutex<Option<AbortHandle>>,
  options: BridgeOptions,
  context: Context,
  self_ref: Weak<WebSocketBridge>,
}

impl WebSocketBridge {
  /// Builds an unattached bridge. It does not watch the target until
  /// `watch_target` is called, so a bridge that never makes it into the
  /// session's slot leaves nothing behind.
  pub(crate) fn new(
    session: &Arc<dyn ISession>,
    target: ActorRef,
    context: Context,
    options: BridgeOptions,
  ) -> Arc<Self> {
    let id = ActorId::new(context.next_handle(), session.to_string());
    let lifecycle = Lifecycle::new(id.clone(), Vec::new(), context.event_bus().clone());
    tracing::debug!(bridge = %id, target = %target.id(), "Creating bridge");
    Arc::new_cyclic(|self_ref| Self {
      id,
      session: Arc::downgrade(session),
      target,
      outbound: OutboundChannel::new(session),
      state: AtomicU8::new(STATE_OPEN),
      lifecycle,
      target_watch: Mutex::new(None),
      open_notice: Mutex::new(None),
      options,
      context,
      self_ref: self_ref.clone(),
    })
  }

  pub fn id(&self) -> &ActorId {
    &self.id
  }

  pub fn target(&self) -> &ActorRef {
    &self.target
  }

  pub fn state(&self) -> BridgeState {
    BridgeState::from_u8(self.state.load(Ordering::Acquire))
  }

  pub fn is_open(&self) -> bool {
    self.state() == BridgeState::Open
  }

  /// `None` while alive, `Some(cause)` once dead (`Some(None)` for a normal death).
  pub fn exit_cause(&self) -> Option<Option<ExitCause>> {
    self.lifecycle.exit_cause()
  }

  /// The session this bridge is attached to, if the transport still holds it.
  pub fn session(&self) -> Option<Arc<dyn ISession>> {
    self.session.upgrade()
  }

  fn handle(&self) -> Option<BridgeRef> {
    self.self_ref.upgrade().map(|inner| BridgeRef { inner })
  }

  /// Starts watching the target actor. If the target is already gone the
  /// exit arrives immediately and the bridge dies before this returns.
  pub(crate) fn watch_target(self: &Arc<Self>) {
    let observer: Weak<dyn IExitObserver> = Arc::downgrade(self) as Weak<dyn IExitObserver>;
    let handle = self.target.watch(Watcher::Observer(observer));
    *self.target_watch.lock() = Some(handle);
    // A death that raced the registration could not cancel it.
    if !self.is_open() {
      drop(self.target_watch.lock().take());
    }
  }

  /// Tells the target the session is open, with the bridge as originator.
  ///
  /// The send may suspend on a full mailbox, so it runs in its own task.
  /// A failed send or a panicking task is logged. A cancelled task (see
  /// `interrupt`) is returned as `BridgeError::Interrupted`.
  pub async fn notify_opened(self: &Arc<Self>) -> Result<(), BridgeError> {
    let bridge = BridgeRef { inner: self.clone() };
    let target = self.target.clone();
    let task = tokio::spawn(async move { target.send(Command::SocketOpened { bridge }).await });
    *self.open_notice.lock() = Some(task.abort_handle());

    let outcome = task.await;
    self.open_notice.lock().take();
    self.settle_open_notice(outcome)
  }

  fn settle_open_notice(&self, outcome: Result<Result<(), BridgeError>, JoinError>) -> Result<(), BridgeError> {
    match outcome {
      Ok(Ok(())) => {
        tracing::debug!(bridge = %self.id, target = %self.target.id(), "Delivered socket-opened notification");
        Ok(())
      }
      Ok(Err(e)) => {
        tracing::warn!(bridge = %self.id, target = %self.target.id(), error = %e, "Failed to deliver socket-opened notification");
        Ok(())
      }
      Err(join_err) if join_err.is_cancelled() => {
        tracing::error!(bridge = %self.id, "Socket-opened notification interrupted");
        Err(BridgeError::Interrupted)
      }
      Err(join_err) => {
        tracing::error!(bridge = %self.id, error = %join_err, "Socket-opened notification task panicked");
        Ok(())
      }
    }
  }

  pub fn on_text(&self, text: String) {
    self.forward(Payload::Text(text));
  }

  pub fn on_binary(&self, data: Bytes) {
    self.forward(Payload::Binary(data));
  }

  fn forward(&self, payload: Payload) {
    if !self.is_open() {
      tracing::trace!(bridge = %self.id, "Dropping inbound frame on closing bridge");
      return;
    }
    let Some(sender) = self.handle() else {
      return;
    };
    let len = payload.len();
    let msg = WebDataMessage::new(Some(sender), payload);
    match self.target.try_send(Command::Data(msg)) {
      Ok(()) => {
        tracing::trace!(bridge = %self.id, target = %self.target.id(), len, "Forwarded inbound frame");
      }
      Err(TrySendError::Full(_)) => {
        tracing::error!(bridge = %self.id, target = %self.target.id(), "Target mailbox full, tearing bridge down");
        self.die(Some(ExitCause::MailboxOverflow));
      }
      Err(TrySendError::Closed(_)) => {
        tracing::debug!(bridge = %self.id, target = %self.target.id(), "Target mailbox closed, inbound frame dropped");
      }
    }
  }

  /// The transport closed the session. A normal closure is a normal death.
  pub fn on_close(&self, reason: CloseReason) {
    tracing::debug!(bridge = %self.id, reason = %reason, "Session closed by transport");
    if reason.is_normal() {
      self.die(None);
    } else {
      self.die(Some(ExitCause::Closed(reason)));
    }
  }

  pub fn on_error(&self, error: &BridgeError) {
    tracing::warn!(bridge = %self.id, error = %error, "Transport error on session");
    if self.options.close_on_error {
      let message = match error {
        BridgeError::Transport(message) => message.clone(),
        other => other.to_string(),
      };
      self.fail(ExitCause::Transport(message));
    }
  }

  /// Reacts to an exit notification. Only the target's exit kills the
  /// bridge, taking over its cause; returns whether it did.
  pub fn handle_exit(&self, exit: &ExitMessage) -> bool {
    if exit.actor != *self.target.id() {
      tracing::trace!(bridge = %self.id, actor = %exit.actor, "Ignoring exit of unrelated actor");
      return false;
    }
    tracing::debug!(bridge = %self.id, target = %exit.actor, cause = ?exit.cause, "Target actor exited");
    self.die(exit.cause.clone());
    true
  }

  /// Kills the bridge with `ExitCause::Interrupted`. A socket-opened
  /// notification still waiting on the target's mailbox is cancelled, which
  /// makes `notify_opened` return `BridgeError::Interrupted`.
  pub fn interrupt(&self) {
    if let Some(pending) = self.open_notice.lock().take() {
      tracing::debug!(bridge = %self.id, "Cancelling pending socket-opened notification");
      pending.abort();
    }
    self.die(Some(ExitCause::Interrupted));
  }

  /// Kills the bridge with a fatal error.
  pub fn fail(&self, cause: ExitCause) {
    self.die(Some(cause));
  }

  /// Runs the death protocol once. Later calls (including concurrent ones)
  /// return `false` and do nothing.
  pub fn die(&self, cause: Option<ExitCause>) -> bool {
    if self
      .state
      .compare_exchange(STATE_OPEN, STATE_DYING, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      tracing::trace!(bridge = %self.id, "Bridge already dying or dead");
      return false;
    }
    tracing::debug!(bridge = %self.id, cause = ?cause, "Bridge dying");

    self.lifecycle.terminate(cause.clone());
    if let Some(handle) = self.target_watch.lock().take() {
      handle.cancel();
    }

    let reason = self.going_away_reason(cause.as_ref());
    if let Err(e) = self.outbound.close_with(reason) {
      tracing::error!(bridge = %self.id, error = %e, "Failed to close session during bridge teardown");
    }

    self.state.store(STATE_DEAD, Ordering::Release);
    self.context.event_bus().publish(SystemEvent::BridgeClosed {
      bridge: self.id.clone(),
      cause,
    });
    true
  }

  fn going_away_reason(&self, cause: Option<&ExitCause>) -> CloseReason {
    let mut phrase = cause
      .map(|cause| format!("{}: {}", cause.kind(), cause))
      .unwrap_or_default();
    truncate_on_char_boundary(&mut phrase, self.options.max_close_reason_len);
    CloseReason::new(CloseCode::GoingAway, phrase)
  }

  pub(crate) fn outbound(&self) -> &OutboundChannel {
    &self.outbound
  }

  pub(crate) fn lifecycle(&self) -> &Arc<Lifecycle> {
    &self.lifecycle
  }
}

impl IExitObserver for WebSocketBridge {
  fn on_exit(&self, exit: ExitMessage) {
    self.handle_exit(&exit);
  }
}

impl fmt::Debug for WebSocketBridge {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WebSocketBridge")
      .field("id", &self.id)
      .field("target", self.target.id())
      .field("state", &self.state())
      .finish()
  }
}

/// Cloneable address of a bridge. Actors reply to a peer by sending
/// `WebDataMessage`s here; they go straight to the transport.
#[derive(Clone)]
pub struct BridgeRef {
  inner: Arc<WebSocketBridge>,
}

impl BridgeRef {
  pub(crate) fn new(inner: Arc<WebSocketBridge>) -> Self {
    Self { inner }
  }

  pub fn id(&self) -> &ActorId {
    self.inner.id()
  }

  pub fn target(&self) -> &ActorRef {
    self.inner.target()
  }

  pub fn state(&self) -> BridgeState {
    self.inner.state()
  }

  pub fn is_open(&self) -> bool {
    self.inner.is_open()
  }

  pub fn exit_cause(&self) -> Option<Option<ExitCause>> {
    self.inner.exit_cause()
  }

  pub async fn send(&self, msg: WebDataMessage) -> bool {
    self.inner.outbound().send(msg).await
  }

  pub async fn send_timeout(&self, msg: WebDataMessage, timeout: Duration) -> bool {
    self.inner.outbound().send_timeout(msg, timeout).await
  }

  pub fn try_send(&self, msg: WebDataMessage) -> bool {
    self.inner.outbound().try_send(msg)
  }

  /// Watches the bridge; the watcher is told once when it dies.
  pub fn watch(&self, watcher: Watcher) -> WatchHandle {
    self.inner.lifecycle().watch(watcher)
  }

  pub fn interrupt(&self) {
    self.inner.interrupt();
  }

  /// Closes the session normally. The bridge dies when the transport reports the close.
  pub fn close(&self) {
    self.inner.outbound().close();
  }

  pub fn bridge(&self) -> &Arc<WebSocketBridge> {
    &self.inner
  }
}

#[async_trait]
impl ISendPort<WebDataMessage> for BridgeRef {
  async fn send(&self, msg: WebDataMessage) -> bool {
    BridgeRef::send(self, msg).await
  }

  async fn send_timeout(&self, msg: WebDataMessage, timeout: Duration) -> bool {
    BridgeRef::send_timeout(self, msg, timeout).await
  }

  fn try_send(&self, msg: WebDataMessage) -> bool {
    BridgeRef::try_send(self, msg)
  }

  fn close(&self) {
    BridgeRef::close(self)
  }
}

impl PartialEq for BridgeRef {
  fn eq(&self, other: &Self) -> bool {
    self.id() == other.id()
  }
}

impl Eq for BridgeRef {}

impl fmt::Debug for BridgeRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BridgeRef")
      .field("id", self.id())
      .field("state", &self.state())
      .finish()
  }
}
