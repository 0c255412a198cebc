// src/bridge/options.rs

use crate::transport::MAX_CLOSE_REASON_LEN;

/// Per-bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
  /// Tear the bridge down when the transport reports an error, instead of
  /// waiting for the close callback that normally follows. For transports
  /// that can error without ever closing.
  pub close_on_error: bool,
  /// Upper bound for the phrase of the "going away" close sent on teardown.
  /// Never exceeds what a close frame can carry.
  pub max_close_reason_len: usize,
}

impl Default for BridgeOptions {
  fn default() -> Self {
    Self {
      close_on_error: false,
      max_close_reason_len: MAX_CLOSE_REASON_LEN,
    }
  }
}

impl BridgeOptions {
  pub fn close_on_error(mut self, enabled: bool) -> Self {
    self.close_on_error = enabled;
    self
  }

  pub fn max_close_reason_len(mut self, len: usize) -> Self {
    self.max_close_reason_len = len.min(MAX_CLOSE_REASON_LEN);
    self
  }
}
