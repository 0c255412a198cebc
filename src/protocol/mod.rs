// src/protocol/mod.rs

//! Wire framing for the stream-based session transport.

pub mod codec;

pub use codec::{FrameCodec, DEFAULT_MAX_FRAME};

use crate::transport::CloseReason;
use bytes::Bytes;

/// One unit on the wire between a session and its remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
  Text(String),
  Binary(Bytes),
  Close(CloseReason),
}

impl Frame {
  pub fn is_close(&self) -> bool {
    matches!(self, Frame::Close(_))
  }
}
