// src/runtime/mailbox.rs

//! Type aliases for actor communication channels based on `async-channel`.

use crate::runtime::command::Command;

/// The sending end of an actor's mailbox. Cloneable.
pub type MailboxSender = async_channel::Sender<Command>;

/// The receiving end of an actor's mailbox.
pub type MailboxReceiver = async_channel::Receiver<Command>;

/// Error returned by the non-blocking enqueue (`Full` or `Closed`).
pub type TrySendError = async_channel::TrySendError<Command>;

/// Creates a new mailbox channel pair.
///
/// `Some(capacity)` gives a bounded mailbox (a suspending `send` waits while it
/// is full, a non-blocking `try_send` fails); `None` gives an unbounded one.
pub fn mailbox(capacity: Option<usize>) -> (MailboxSender, MailboxReceiver) {
  match capacity {
    Some(capacity) => async_channel::bounded(capacity.max(1)),
    None => async_channel::unbounded(),
  }
}

/// Creates the control lane that sits beside an actor's data mailbox.
///
/// Exit notifications travel here. The lane is unbounded so a watcher whose
/// data mailbox is full still learns about the exit.
pub fn control_lane() -> (MailboxSender, MailboxReceiver) {
  async_channel::unbounded()
}
