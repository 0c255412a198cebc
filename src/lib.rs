//! webactors - Bridges duplex network sessions to actor mailboxes on Tokio.

pub mod bridge;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod protocol;
pub mod runtime;
pub mod session_store;
pub mod transport;

// Re-export core types for user convenience
pub use bridge::{BridgeOptions, BridgeRef, BridgeState, ISendPort, OutboundChannel, WebSocketBridge};
pub use context::{Context, RuntimeConfig};
pub use endpoint::{Endpoint, EndpointConfig};
pub use error::{BridgeError, ExitCause};
pub use message::{Payload, WebDataMessage};
pub use runtime::{ActorId, ActorMailbox, ActorRef, Command, ExitMessage, SystemEvent, WatchHandle, Watcher};
pub use session_store::{HttpSession, SessionStore};
pub use transport::{CloseCode, CloseReason, ISession};

// --- Top-Level Functions ---

const VERSION_MAJOR: i32 = 0;
const VERSION_MINOR: i32 = 1;
const VERSION_PATCH: i32 = 0;

/// Returns the library version as a tuple (major, minor, patch).
pub fn version() -> (i32, i32, i32) {
  (VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH)
}

/// Returns the major version number of the library.
pub fn version_major() -> i32 {
  VERSION_MAJOR
}

/// Returns the minor version number of the library.
pub fn version_minor() -> i32 {
  VERSION_MINOR
}

/// Returns the patch version number of the library.
pub fn version_patch() -> i32 {
  VERSION_PATCH
}

/// Creates a runtime context with default configuration.
pub fn context() -> Context {
  Context::new()
}
