// src/endpoint.rs

//! Transport-facing callbacks: resolve the owning actor, attach a bridge to
//! the session and route later events to it.

use crate::bridge::{BridgeOptions, BridgeRef, WebSocketBridge};
use crate::context::Context;
use crate::error::{BridgeError, ExitCause};
use crate::runtime::{ActorRef, SystemEvent};
use crate::session_store::HttpSession;
use crate::transport::{CloseCode, CloseReason, ISession};

use bytes::Bytes;
use std::sync::Arc;

pub const ACTOR_NOT_FOUND_REASON: &str = "session actor not found";

/// What the transport hands the endpoint when a session opens.
#[derive(Debug, Clone, Default)]
pub struct EndpointConfig {
  /// The HTTP session the connection was upgraded from.
  pub http_session: Option<Arc<HttpSession>>,
  pub options: BridgeOptions,
}

impl EndpointConfig {
  pub fn new(http_session: Arc<HttpSession>) -> Self {
    Self {
      http_session: Some(http_session),
      options: BridgeOptions::default(),
    }
  }

  pub fn with_options(mut self, options: BridgeOptions) -> Self {
    self.options = options;
    self
  }
}

#[derive(Debug, Clone)]
pub struct Endpoint {
  context: Context,
}

impl Endpoint {
  pub fn new(context: Context) -> Self {
    Self { context }
  }

  pub fn context(&self) -> &Context {
    &self.context
  }

  /// A session is ready. Attaches a bridge to the actor bound to the HTTP
  /// session and tells that actor the socket is open.
  ///
  /// Without a bound actor the session is closed with `CannotAccept` and
  /// `Ok(None)` is returned. If the open notification is interrupted the
  /// bridge is failed before the error is returned, so it never stays open.
  pub async fn on_open(
    &self,
    session: &Arc<dyn ISession>,
    config: &EndpointConfig,
  ) -> Result<Option<BridgeRef>, BridgeError> {
    let http_session = config
      .http_session
      .as_ref()
      .ok_or(BridgeError::MissingSessionEmbedding)?;

    let Some(actor) = http_session.actor() else {
      tracing::warn!(session = %session, http_session = %http_session.id(), "No actor bound to HTTP session, rejecting");
      if let Err(e) = session.close(CloseReason::new(CloseCode::CannotAccept, ACTOR_NOT_FOUND_REASON)) {
        tracing::error!(session = %session, error = %e, "Failed to close rejected session");
      }
      return Ok(None);
    };

    let bridge = self.attach(session, config, actor)?;
    if let Err(e) = bridge.bridge().notify_opened().await {
      tracing::error!(bridge = %bridge.id(), error = %e, "Open did not complete, tearing bridge down");
      bridge.bridge().fail(ExitCause::from(&e));
      return Err(e);
    }
    Ok(Some(bridge))
  }

  /// Creates a bridge between `session` and `actor` and records it in the
  /// session's slot. Fails with `AlreadyAttached` if the slot is taken; the
  /// existing bridge is left untouched.
  pub fn attach(
    &self,
    session: &Arc<dyn ISession>,
    config: &EndpointConfig,
    actor: ActorRef,
  ) -> Result<BridgeRef, BridgeError> {
    if session.attachment().is_attached() {
      return Err(BridgeError::AlreadyAttached(session.to_string()));
    }

    let bridge = WebSocketBridge::new(session, actor, self.context.clone(), config.options.clone());
    // A bridge that loses the slot race has not watched anything yet.
    session.attachment().attach(bridge.clone())?;
    bridge.watch_target();

    tracing::debug!(bridge = %bridge.id(), target = %bridge.target().id(), "Bridge attached to session");
    self.context.event_bus().publish(SystemEvent::BridgeAttached {
      bridge: bridge.id().clone(),
      target: bridge.target().id().clone(),
      remote_addr: session.remote_addr(),
    });
    Ok(BridgeRef::new(bridge))
  }

  pub fn bridge_for(&self, session: &dyn ISession) -> Option<BridgeRef> {
    session.attachment().get().cloned().map(BridgeRef::new)
  }

  fn attached<'a>(&self, session: &'a dyn ISession) -> Result<&'a Arc<WebSocketBridge>, BridgeError> {
    session
      .attachment()
      .get()
      .ok_or_else(|| BridgeError::NotAttached(session.to_string()))
  }

  pub fn on_text(&self, session: &dyn ISession, text: String) -> Result<(), BridgeError> {
    self.attached(session)?.on_text(text);
    Ok(())
  }

  pub fn on_binary(&self, session: &dyn ISession, data: Bytes) -> Result<(), BridgeError> {
    self.attached(session)?.on_binary(data);
    Ok(())
  }

  pub fn on_error(&self, session: &dyn ISession, error: &BridgeError) -> Result<(), BridgeError> {
    self.attached(session)?.on_error(error);
    Ok(())
  }

  pub fn on_close(&self, session: &dyn ISession, reason: CloseReason) -> Result<(), BridgeError> {
    self.attached(session)?.on_close(reason);
    Ok(())
  }
}
