// src/runtime/event_bus.rs

use super::system_events::SystemEvent;
use tokio::sync::broadcast::{self, Receiver, Sender};

pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 256;

/// Broadcasts `SystemEvent`s to every subscriber.
/// Internally uses tokio::sync::broadcast.
#[derive(Debug, Clone)]
pub struct EventBus {
  sender: Sender<SystemEvent>,
}

impl EventBus {
  pub fn new() -> Self {
    Self::with_capacity(DEFAULT_EVENT_BUS_CAPACITY)
  }

  pub fn with_capacity(capacity: usize) -> Self {
    let (sender, _) = broadcast::channel(capacity.max(1));
    tracing::debug!(capacity = capacity.max(1), "Created new EventBus");
    Self { sender }
  }

  /// Publishes an event and returns how many subscribers received it.
  ///
  /// Having no subscribers is normal (nobody is observing), so it yields 0
  /// instead of an error.
  pub fn publish(&self, event: SystemEvent) -> usize {
    tracing::trace!(event = ?event, "Publishing event");
    self.sender.send(event).unwrap_or(0)
  }

  /// Each receiver sees all events published *after* it subscribed.
  /// A receiver that lags too far behind misses events (see `tokio::sync::broadcast`).
  pub fn subscribe(&self) -> Receiver<SystemEvent> {
    self.sender.subscribe()
  }

  pub fn subscriber_count(&self) -> usize {
    self.sender.receiver_count()
  }
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new()
  }
}
