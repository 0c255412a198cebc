// src/session_store.rs

//! HTTP sessions that carry the actor a connection belongs to.

use crate::runtime::ActorRef;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The HTTP session a connection was upgraded from. The application binds
/// the owning actor here before the upgrade; the endpoint reads it on open.
pub struct HttpSession {
  id: String,
  actor: RwLock<Option<ActorRef>>,
}

impl HttpSession {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      actor: RwLock::new(None),
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  /// Binds `actor` as the session's owner, returning the previous one.
  pub fn bind_actor(&self, actor: ActorRef) -> Option<ActorRef> {
    tracing::debug!(session = %self.id, actor = %actor.id(), "Binding actor to HTTP session");
    self.actor.write().replace(actor)
  }

  pub fn actor(&self) -> Option<ActorRef> {
    self.actor.read().clone()
  }

  pub fn unbind_actor(&self) -> Option<ActorRef> {
    self.actor.write().take()
  }
}

impl fmt::Debug for HttpSession {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HttpSession")
      .field("id", &self.id)
      .field("actor", &self.actor.read().as_ref().map(|a| a.id().clone()))
      .finish()
  }
}

/// Session id -> `HttpSession`.
#[derive(Debug, Default)]
pub struct SessionStore {
  sessions: RwLock<HashMap<String, Arc<HttpSession>>>,
}

impl SessionStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get_or_create(&self, id: &str) -> Arc<HttpSession> {
    if let Some(session) = self.sessions.read().get(id) {
      return session.clone();
    }
    self
      .sessions
      .write()
      .entry(id.to_owned())
      .or_insert_with(|| Arc::new(HttpSession::new(id)))
      .clone()
  }

  pub fn get(&self, id: &str) -> Option<Arc<HttpSession>> {
    self.sessions.read().get(id).cloned()
  }

  pub fn remove(&self, id: &str) -> Option<Arc<HttpSession>> {
    self.sessions.write().remove(id)
  }

  pub fn len(&self) -> usize {
    self.sessions.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
