// src/transport/mod.rs

//! The session capability the bridge depends on, plus concrete transports.

pub mod channel;
pub mod framed;

use crate::bridge::WebSocketBridge;
use crate::error::BridgeError;

use bytes::Bytes;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Maximum number of bytes a close reason phrase may carry (125-byte control
/// frame payload minus the 2-byte status code).
pub const MAX_CLOSE_REASON_LEN: usize = 123;

/// A duplex, session-oriented connection as seen by the bridge.
///
/// Implementations exist per transport (in-memory channels, the framed TCP
/// protocol, test doubles). Send operations must not block: they hand the
/// payload to the transport's own writer and return once it was accepted.
/// The `Display` impl is the session's string representation and becomes the
/// bridge's name.
pub trait ISession: fmt::Display + Send + Sync + 'static {
  /// Whether the session still accepts writes.
  fn is_open(&self) -> bool;

  /// Dispatches a text frame asynchronously.
  fn send_text(&self, text: String) -> Result<(), BridgeError>;

  /// Dispatches a binary frame asynchronously.
  fn send_binary(&self, data: Bytes) -> Result<(), BridgeError>;

  /// Closes the session. Closing an already closed session is a no-op.
  fn close(&self, reason: CloseReason) -> Result<(), BridgeError>;

  /// The per-session storage slot used to find the bridge on later callbacks.
  fn attachment(&self) -> &AttachmentSlot;

  /// Opaque remote identity, if the transport knows one.
  fn remote_addr(&self) -> Option<String> {
    None
  }
}

/// Set-once storage slot on a session holding the bridge attached to it.
#[derive(Default)]
pub struct AttachmentSlot {
  bridge: OnceLock<Arc<WebSocketBridge>>,
}

impl AttachmentSlot {
  pub fn new() -> Self {
    Self::default()
  }

  /// Records the bridge. Fails with `AlreadyAttached` if a bridge was recorded
  /// before; the existing attachment is left untouched.
  pub(crate) fn attach(&self, bridge: Arc<WebSocketBridge>) -> Result<(), BridgeError> {
    self
      .bridge
      .set(bridge)
      .map_err(|rejected| BridgeError::AlreadyAttached(rejected.id().name().to_string()))
  }

  pub(crate) fn get(&self) -> Option<&Arc<WebSocketBridge>> {
    self.bridge.get()
  }

  pub fn is_attached(&self) -> bool {
    self.bridge.get().is_some()
  }
}

impl fmt::Debug for AttachmentSlot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AttachmentSlot")
      .field("bridge", &self.bridge.get().map(|b| b.id().clone()))
      .finish()
  }
}

/// Close status codes (RFC 6455 section 7.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
  NormalClosure,
  GoingAway,
  ProtocolError,
  CannotAccept,
  Reserved,
  NoStatusCode,
  ClosedAbnormally,
  NotConsistent,
  ViolatedPolicy,
  TooBig,
  NoExtension,
  UnexpectedCondition,
  ServiceRestart,
  TryAgainLater,
  TlsHandshakeFailure,
  Other(u16),
}

impl CloseCode {
  pub fn code(self) -> u16 {
    match self {
      CloseCode::NormalClosure => 1000,
      CloseCode::GoingAway => 1001,
      CloseCode::ProtocolError => 1002,
      CloseCode::CannotAccept => 1003,
      CloseCode::Reserved => 1004,
      CloseCode::NoStatusCode => 1005,
      CloseCode::ClosedAbnormally => 1006,
      CloseCode::NotConsistent => 1007,
      CloseCode::ViolatedPolicy => 1008,
      CloseCode::TooBig => 1009,
      CloseCode::NoExtension => 1010,
      CloseCode::UnexpectedCondition => 1011,
      CloseCode::ServiceRestart => 1012,
      CloseCode::TryAgainLater => 1013,
      CloseCode::TlsHandshakeFailure => 1015,
      CloseCode::Other(code) => code,
    }
  }

  pub fn from_code(code: u16) -> Self {
    match code {
      1000 => CloseCode::NormalClosure,
      1001 => CloseCode::GoingAway,
      1002 => CloseCode::ProtocolError,
      1003 => CloseCode::CannotAccept,
      1004 => CloseCode::Reserved,
      1005 => CloseCode::NoStatusCode,
      1006 => CloseCode::ClosedAbnormally,
      1007 => CloseCode::NotConsistent,
      1008 => CloseCode::ViolatedPolicy,
      1009 => CloseCode::TooBig,
      1010 => CloseCode::NoExtension,
      1011 => CloseCode::UnexpectedCondition,
      1012 => CloseCode::ServiceRestart,
      1013 => CloseCode::TryAgainLater,
      1015 => CloseCode::TlsHandshakeFailure,
      other => CloseCode::Other(other),
    }
  }
}

impl From<u16> for CloseCode {
  fn from(code: u16) -> Self {
    CloseCode::from_code(code)
  }
}

impl From<CloseCode> for u16 {
  fn from(code: CloseCode) -> Self {
    code.code()
  }
}

/// A machine-readable close code plus a human-readable phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
  code: CloseCode,
  phrase: String,
}

impl CloseReason {
  /// Builds a close reason, truncating the phrase to `MAX_CLOSE_REASON_LEN`
  /// bytes on a char boundary.
  pub fn new(code: CloseCode, phrase: impl Into<String>) -> Self {
    let mut phrase = phrase.into();
    truncate_on_char_boundary(&mut phrase, MAX_CLOSE_REASON_LEN);
    Self { code, phrase }
  }

  pub fn normal() -> Self {
    Self::new(CloseCode::NormalClosure, "")
  }

  pub fn code(&self) -> CloseCode {
    self.code
  }

  pub fn phrase(&self) -> &str {
    &self.phrase
  }

  pub fn is_normal(&self) -> bool {
    self.code == CloseCode::NormalClosure
  }
}

impl fmt::Display for CloseReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.code {
      CloseCode::Other(code) => write!(f, "{}", code)?,
      code => write!(f, "{} ({:?})", code.code(), code)?,
    }
    if !self.phrase.is_empty() {
      write!(f, ": {}", self.phrase)?;
    }
    Ok(())
  }
}

pub(crate) fn truncate_on_char_boundary(s: &mut String, max_len: usize) {
  if s.len() <= max_len {
    return;
  }
  let mut cut = max_len;
  while !s.is_char_boundary(cut) {
    cut -= 1;
  }
  s.truncate(cut);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn close_codes_map_both_ways() {
    for raw in [1000u16, 1001, 1002, 1003, 1006, 1011, 1015] {
      assert_eq!(CloseCode::from_code(raw).code(), raw);
    }
    assert_eq!(CloseCode::from_code(4000), CloseCode::Other(4000));
    assert_eq!(u16::from(CloseCode::GoingAway), 1001);
  }

  #[test]
  fn close_reason_phrase_is_truncated_on_char_boundary() {
    let long = "é".repeat(100); // 200 bytes
    let reason = CloseReason::new(CloseCode::GoingAway, long);
    assert!(reason.phrase().len() <= MAX_CLOSE_REASON_LEN);
    assert_eq!(reason.phrase().len(), 122);
    assert!(reason.phrase().chars().all(|c| c == 'é'));
  }

  #[test]
  fn close_reason_display() {
    assert_eq!(CloseReason::normal().to_string(), "1000 (NormalClosure)");
    assert_eq!(
      CloseReason::new(CloseCode::Other(4001), "custom").to_string(),
      "4001: custom"
    );
    assert!(CloseReason::normal().is_normal());
  }
}
