// src/error.rs

use crate::transport::CloseReason;

use std::fmt;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BridgeError {
  // --- I/O Errors ---
  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  // --- Attachment Errors ---
  #[error("Session {0} is already attached to an actor")]
  AlreadyAttached(String),
  #[error("Session {0} has no bridge attached")]
  NotAttached(String),
  #[error("HTTP session hasn't been embedded in the endpoint configuration")]
  MissingSessionEmbedding,
  #[error("No actor is bound to HTTP session {0}")]
  ActorNotFound(String),

  // --- Delivery Errors ---
  #[error("Mailbox of actor {0} is closed")]
  MailboxClosed(String),
  #[error("Mailbox of actor {0} is full")]
  MailboxFull(String),
  #[error("Session is closed")]
  SessionClosed,

  // --- Execution Errors ---
  #[error("Operation was interrupted")]
  Interrupted,
  #[error("Execution failed: {0}")]
  Execution(String),

  // --- Transport / Protocol Errors ---
  #[error("Transport error: {0}")]
  Transport(String),
  #[error("Framing protocol violation: {0}")]
  Protocol(String),

  // --- Internal Errors ---
  #[error("Internal library error: {0}")]
  Internal(String),
}

/// Why an actor (or a bridge) terminated.
///
/// Recorded as the death cause of a bridge and delivered to watchers in an
/// `ExitMessage`. `None` in those places means a normal exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitCause {
  /// The transport session closed with a non-normal reason.
  Closed(CloseReason),
  /// An explicit interrupt/kill request.
  Interrupted,
  /// The transport reported an error and the bridge was configured to die on it.
  Transport(String),
  /// The target actor's mailbox could not take an inbound frame without blocking.
  MailboxOverflow,
  /// The actor task was cancelled or panicked before it could exit.
  Aborted,
  /// Any other fatal error thrown into the actor.
  Error(String),
}

impl ExitCause {
  /// Short machine-readable name of the cause, used as the "type" part of close reasons.
  pub fn kind(&self) -> &'static str {
    match self {
      ExitCause::Closed(_) => "SessionClosed",
      ExitCause::Interrupted => "Interrupted",
      ExitCause::Transport(_) => "TransportError",
      ExitCause::MailboxOverflow => "MailboxOverflow",
      ExitCause::Aborted => "Aborted",
      ExitCause::Error(_) => "Error",
    }
  }
}

impl fmt::Display for ExitCause {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ExitCause::Closed(reason) => write!(f, "{}", reason),
      ExitCause::Interrupted => f.write_str("interrupted"),
      ExitCause::Transport(msg) => f.write_str(msg),
      ExitCause::MailboxOverflow => f.write_str("target mailbox is full"),
      ExitCause::Aborted => f.write_str("actor task cancelled or panicked"),
      ExitCause::Error(msg) => f.write_str(msg),
    }
  }
}

impl From<&BridgeError> for ExitCause {
  fn from(err: &BridgeError) -> Self {
    match err {
      BridgeError::Interrupted => ExitCause::Interrupted,
      BridgeError::Transport(msg) => ExitCause::Transport(msg.clone()),
      other => ExitCause::Error(other.to_string()),
    }
  }
}

impl From<BridgeError> for ExitCause {
  fn from(err: BridgeError) -> Self {
    ExitCause::from(&err)
  }
}
