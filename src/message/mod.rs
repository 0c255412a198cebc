// src/message/mod.rs

//! Data frames exchanged between a bridge and its target actor.

use crate::bridge::BridgeRef;

use bytes::Bytes;
use std::fmt;

/// Payload of a data frame, tagged with its kind.
#[derive(Clone, PartialEq, Eq)]
pub enum Payload {
  Text(String),
  Binary(Bytes),
}

impl Payload {
  pub fn is_binary(&self) -> bool {
    matches!(self, Payload::Binary(_))
  }

  pub fn len(&self) -> usize {
    match self {
      Payload::Text(text) => text.len(),
      Payload::Binary(data) => data.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl fmt::Debug for Payload {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Payload::Text(text) => f.debug_tuple("Text").field(text).finish(),
      Payload::Binary(data) => f.debug_tuple("Binary").field(&data.len()).finish(),
    }
  }
}

impl From<String> for Payload {
  fn from(text: String) -> Self {
    Payload::Text(text)
  }
}

impl From<&str> for Payload {
  fn from(text: &str) -> Self {
    Payload::Text(text.to_owned())
  }
}

impl From<Bytes> for Payload {
  fn from(data: Bytes) -> Self {
    Payload::Binary(data)
  }
}

impl From<Vec<u8>> for Payload {
  fn from(data: Vec<u8>) -> Self {
    Payload::Binary(Bytes::from(data))
  }
}

/// A text or binary frame.
///
/// Inbound messages (transport → actor) carry the bridge they arrived on as
/// `sender` so the actor can reply. Outbound messages are addressed by sending
/// them to a `BridgeRef`; their sender is ignored.
#[derive(Debug, Clone)]
pub struct WebDataMessage {
  sender: Option<BridgeRef>,
  payload: Payload,
}

impl WebDataMessage {
  pub fn new(sender: Option<BridgeRef>, payload: impl Into<Payload>) -> Self {
    Self {
      sender,
      payload: payload.into(),
    }
  }

  pub fn text(text: impl Into<String>) -> Self {
    Self::new(None, Payload::Text(text.into()))
  }

  pub fn binary(data: impl Into<Bytes>) -> Self {
    Self::new(None, Payload::Binary(data.into()))
  }

  pub fn sender(&self) -> Option<&BridgeRef> {
    self.sender.as_ref()
  }

  pub fn payload(&self) -> &Payload {
    &self.payload
  }

  pub fn is_binary(&self) -> bool {
    self.payload.is_binary()
  }

  pub fn string_body(&self) -> Option<&str> {
    match &self.payload {
      Payload::Text(text) => Some(text),
      Payload::Binary(_) => None,
    }
  }

  pub fn binary_body(&self) -> Option<&Bytes> {
    match &self.payload {
      Payload::Binary(data) => Some(data),
      Payload::Text(_) => None,
    }
  }

  pub fn into_payload(self) -> Payload {
    self.payload
  }
}
