// src/runtime/command.rs

use crate::bridge::BridgeRef;
use crate::message::WebDataMessage;
use crate::runtime::lifecycle::ExitMessage;

/// Messages delivered to an actor's mailbox.
#[derive(Debug)]
pub enum Command {
  /// A bridge finished opening; the actor can reply through `bridge`.
  SocketOpened { bridge: BridgeRef },
  /// An inbound frame, tagged with the bridge it arrived on.
  Data(WebDataMessage),
  /// A watched actor (or bridge) terminated.
  Exit(ExitMessage),
  /// Asks the receiving actor to stop.
  Stop,
}

impl Command {
  pub fn variant_name(&self) -> &'static str {
    match self {
      Command::SocketOpened { .. } => "SocketOpened",
      Command::Data(_) => "Data",
      Command::Exit(_) => "Exit",
      Command::Stop => "Stop",
    }
  }
}
