// src/bridge/channel.rs

use crate::error::BridgeError;
use crate::message::{Payload, WebDataMessage};
use crate::transport::{CloseReason, ISession};

use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Sending end of an addressable entity.
///
/// All three send shapes share one contract: `false` means delivery was not
/// attempted, `true` means the message was handed to the underlying writer.
/// None of them raise.
#[async_trait]
pub trait ISendPort<M: Send + 'static>: Send + Sync {
  /// Sends `msg`; may suspend if the implementation needs to.
  async fn send(&self, msg: M) -> bool;

  /// Sends `msg`, giving up after `timeout`.
  async fn send_timeout(&self, msg: M, timeout: Duration) -> bool;

  /// Best-effort send that never suspends.
  fn try_send(&self, msg: M) -> bool;

  /// Closes the port. Failures are logged, not raised.
  fn close(&self);
}

/// Non-blocking sender over a transport session.
///
/// Holds only a non-owning reference to the session; once the session is
/// closed or gone every send reports `false`.
#[derive(Clone)]
pub struct OutboundChannel {
  session: Weak<dyn ISession>,
}

impl OutboundChannel {
  pub fn new(session: &Arc<dyn ISession>) -> Self {
    Self {
      session: Arc::downgrade(session),
    }
  }

  /// Whether the underlying session is still open.
  pub fn is_open(&self) -> bool {
    self.session.upgrade().map_or(false, |s| s.is_open())
  }

  fn dispatch(&self, msg: WebDataMessage) -> bool {
    let Some(session) = self.session.upgrade() else {
      tracing::trace!("Outbound send on dropped session, not delivered");
      return false;
    };
    if !session.is_open() {
      tracing::trace!(session = %session, "Outbound send on closed session, not delivered");
      return false;
    }

    let result = match msg.into_payload() {
      Payload::Text(text) => session.send_text(text),
      Payload::Binary(data) => session.send_binary(data),
    };
    match result {
      Ok(()) => true,
      Err(e) => {
        tracing::warn!(session = %session, error = %e, "Transport rejected outbound frame");
        false
      }
    }
  }

  /// Closes the session with `reason`. A session that is already gone counts as closed.
  pub(crate) fn close_with(&self, reason: CloseReason) -> Result<(), BridgeError> {
    match self.session.upgrade() {
      Some(session) => session.close(reason),
      None => Ok(()),
    }
  }
}

#[async_trait]
impl ISendPort<WebDataMessage> for OutboundChannel {
  async fn send(&self, msg: WebDataMessage) -> bool {
    self.dispatch(msg)
  }

  async fn send_timeout(&self, msg: WebDataMessage, _timeout: Duration) -> bool {
    // Dispatch never waits, so there is nothing to time out.
    self.dispatch(msg)
  }

  fn try_send(&self, msg: WebDataMessage) -> bool {
    self.dispatch(msg)
  }

  fn close(&self) {
    if let Err(e) = self.close_with(CloseReason::normal()) {
      tracing::warn!(error = %e, "Failed to close session from outbound channel");
    }
  }
}

impl fmt::Debug for OutboundChannel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("OutboundChannel")
      .field("open", &self.is_open())
      .finish()
  }
}
