// src/protocol/codec.rs

use crate::error::BridgeError;
use crate::protocol::Frame;
use crate::transport::{CloseCode, CloseReason};

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

// --- Frame tags ---
pub const TAG_TEXT: u8 = 1;
pub const TAG_BINARY: u8 = 2;
pub const TAG_CLOSE: u8 = 8;

/// tag(1) + length(4, big endian)
const HEADER_LEN: usize = 5;

/// Largest accepted frame body unless configured otherwise.
pub const DEFAULT_MAX_FRAME: usize = 16 * 1024 * 1024;

/// Codec for `tag | len | body` framing.
#[derive(Debug)]
pub struct FrameCodec {
  decoding_state: DecodingState,
  max_frame: usize,
}

#[derive(Debug, Default, Clone, Copy)]
enum DecodingState {
  #[default]
  ReadHeader,
  ReadBody(FrameHeader),
}

#[derive(Debug, Clone, Copy)]
struct FrameHeader {
  tag: u8,
  size: usize,
}

impl FrameCodec {
  pub fn new() -> Self {
    Self::with_max_frame(DEFAULT_MAX_FRAME)
  }

  pub fn with_max_frame(max_frame: usize) -> Self {
    Self {
      decoding_state: DecodingState::default(),
      max_frame,
    }
  }

  pub fn max_frame(&self) -> usize {
    self.max_frame
  }

  fn check_size(&self, size: usize) -> Result<(), BridgeError> {
    if size > self.max_frame || size > u32::MAX as usize {
      return Err(BridgeError::Protocol(format!(
        "frame of {} bytes exceeds limit of {}",
        size, self.max_frame
      )));
    }
    Ok(())
  }

  fn parse_body(header: FrameHeader, body: BytesMut) -> Result<Frame, BridgeError> {
    match header.tag {
      TAG_TEXT => String::from_utf8(body.to_vec())
        .map(Frame::Text)
        .map_err(|_| BridgeError::Protocol("text frame is not valid UTF-8".into())),
      TAG_BINARY => Ok(Frame::Binary(body.freeze())),
      TAG_CLOSE => {
        let mut body = body;
        if body.len() < 2 {
          return Err(BridgeError::Protocol("close frame shorter than its code".into()));
        }
        let code = CloseCode::from_code(body.get_u16());
        let phrase = std::str::from_utf8(&body)
          .map_err(|_| BridgeError::Protocol("close reason is not valid UTF-8".into()))?;
        Ok(Frame::Close(CloseReason::new(code, phrase)))
      }
      other => Err(BridgeError::Protocol(format!("unknown frame tag {}", other))),
    }
  }
}

impl Default for FrameCodec {
  fn default() -> Self {
    Self::new()
  }
}

// --- Encoder Implementation (Frame -> BytesMut) ---
impl Encoder<Frame> for FrameCodec {
  type Error = BridgeError;

  fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
    match item {
      Frame::Text(text) => {
        self.check_size(text.len())?;
        dst.reserve(HEADER_LEN + text.len());
        dst.put_u8(TAG_TEXT);
        dst.put_u32(text.len() as u32);
        dst.put_slice(text.as_bytes());
      }
      Frame::Binary(data) => {
        self.check_size(data.len())?;
        dst.reserve(HEADER_LEN + data.len());
        dst.put_u8(TAG_BINARY);
        dst.put_u32(data.len() as u32);
        dst.put_slice(&data);
      }
      Frame::Close(reason) => {
        let phrase = reason.phrase().as_bytes();
        let size = 2 + phrase.len();
        dst.reserve(HEADER_LEN + size);
        dst.put_u8(TAG_CLOSE);
        dst.put_u32(size as u32);
        dst.put_u16(reason.code().code());
        dst.put_slice(phrase);
      }
    }
    Ok(())
  }
}

// --- Decoder Implementation (BytesMut -> Frame) ---
impl Decoder for FrameCodec {
  type Item = Frame;
  type Error = BridgeError;

  fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
    loop {
      match self.decoding_state {
        DecodingState::ReadHeader => {
          if src.len() < HEADER_LEN {
            src.reserve(HEADER_LEN - src.len());
            return Ok(None);
          }
          let tag = src.get_u8();
          let size = src.get_u32() as usize;
          self.check_size(size)?;
          self.decoding_state = DecodingState::ReadBody(FrameHeader { tag, size });
        }

        DecodingState::ReadBody(header) => {
          if src.len() < header.size {
            src.reserve(header.size - src.len());
            return Ok(None);
          }
          let body = src.split_to(header.size);
          self.decoding_state = DecodingState::ReadHeader;
          let frame = Self::parse_body(header, body)?;
          tracing::trace!(tag = header.tag, size = header.size, "Decoded frame");
          return Ok(Some(frame));
        }
      }
    }
  }
}
