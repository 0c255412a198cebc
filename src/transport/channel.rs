// src/transport/channel.rs

//! In-memory session whose writes land in a channel read by the remote side.

use crate::error::BridgeError;
use crate::protocol::Frame;
use crate::transport::{AttachmentSlot, CloseReason, ISession};

use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct ChannelSession {
  id: String,
  open: AtomicBool,
  outbound: async_channel::Sender<Frame>,
  slot: AttachmentSlot,
}

impl ChannelSession {
  /// Creates an open session plus the receiver the remote side reads frames from.
  pub fn pair(id: impl Into<String>) -> (Arc<Self>, async_channel::Receiver<Frame>) {
    let (tx, rx) = async_channel::unbounded();
    let session = Arc::new(Self {
      id: id.into(),
      open: AtomicBool::new(true),
      outbound: tx,
      slot: AttachmentSlot::new(),
    });
    (session, rx)
  }

  /// Marks the session closed by the remote side; nothing is written.
  /// Returns whether it was open.
  pub fn mark_closed(&self) -> bool {
    let was_open = self.open.swap(false, Ordering::AcqRel);
    if was_open {
      self.outbound.close();
    }
    was_open
  }

  fn write(&self, frame: Frame) -> Result<(), BridgeError> {
    if !self.is_open() {
      return Err(BridgeError::SessionClosed);
    }
    self
      .outbound
      .try_send(frame)
      .map_err(|_| BridgeError::Transport(format!("remote side of {} is gone", self.id)))
  }
}

impl ISession for ChannelSession {
  fn is_open(&self) -> bool {
    self.open.load(Ordering::Acquire)
  }

  fn send_text(&self, text: String) -> Result<(), BridgeError> {
    self.write(Frame::Text(text))
  }

  fn send_binary(&self, data: Bytes) -> Result<(), BridgeError> {
    self.write(Frame::Binary(data))
  }

  fn close(&self, reason: CloseReason) -> Result<(), BridgeError> {
    if !self.open.swap(false, Ordering::AcqRel) {
      return Ok(());
    }
    tracing::debug!(session = %self.id, reason = %reason, "Closing channel session");
    if self.outbound.try_send(Frame::Close(reason)).is_err() {
      tracing::debug!(session = %self.id, "Remote side gone before close frame");
    }
    self.outbound.close();
    Ok(())
  }

  fn attachment(&self) -> &AttachmentSlot {
    &self.slot
  }
}

impl fmt::Display for ChannelSession {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.id)
  }
}

impl fmt::Debug for ChannelSession {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ChannelSession")
      .field("id", &self.id)
      .field("open", &self.is_open())
      .field("slot", &self.slot)
      .finish()
  }
}
