// src/runtime/mod.rs

//! The actor-runtime surface the bridge needs: mailboxes, addresses,
//! watch/exit lifecycle and the system event bus.

pub mod actor_drop_guard;
pub mod actor_ref;
pub mod command;
pub mod event_bus;
pub mod lifecycle;
pub mod mailbox;
pub mod system_events;

pub use actor_ref::{ActorId, ActorMailbox, ActorRef};
pub use command::Command;
pub use lifecycle::{ExitMessage, IExitObserver, Lifecycle, WatchHandle, Watcher};
pub use mailbox::{control_lane, mailbox, MailboxReceiver, MailboxSender, TrySendError};

// System Coordination
pub use event_bus::EventBus;
pub use system_events::SystemEvent;

pub(crate) use actor_drop_guard::ActorDropGuard;
