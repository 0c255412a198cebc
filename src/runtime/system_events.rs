// src/runtime/system_events.rs

use crate::error::ExitCause;
use crate::runtime::ActorId;

/// Events broadcast on the `EventBus` for observability of actor and bridge lifecycles.
#[derive(Debug, Clone)]
pub enum SystemEvent {
  /// Published by `Context::spawn_actor` after the actor task is launched.
  ActorStarted {
    /// The actor that started.
    actor: ActorId,
  },

  /// Published exactly once when an actor's (or bridge's) lifecycle terminates.
  ActorStopping {
    /// The actor that stopped.
    actor: ActorId,
    /// `None` for a normal exit.
    cause: Option<ExitCause>,
  },

  /// Published when a bridge is recorded on its session and watches its target.
  BridgeAttached {
    bridge: ActorId,
    target: ActorId,
    /// Remote identity of the session, if the transport knows one.
    remote_addr: Option<String>,
  },

  /// Published when a bridge has finished its teardown.
  BridgeClosed {
    bridge: ActorId,
    cause: Option<ExitCause>,
  },
}
