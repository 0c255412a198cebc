// src/transport/framed.rs

//! Sessions over any byte stream using `FrameCodec` framing.

use crate::endpoint::{Endpoint, EndpointConfig};
use crate::error::BridgeError;
use crate::protocol::{Frame, FrameCodec, DEFAULT_MAX_FRAME};
use crate::transport::{AttachmentSlot, CloseCode, CloseReason, ISession};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

/// How long `serve_connection` waits for the peer to answer a locally
/// initiated close before dropping the connection.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection-level tunables for `serve_connection_with`.
#[derive(Debug, Clone)]
pub struct FramedConfig {
  /// Largest frame body accepted from the peer.
  pub max_frame: usize,
  pub close_timeout: Duration,
}

impl Default for FramedConfig {
  fn default() -> Self {
    Self {
      max_frame: DEFAULT_MAX_FRAME,
      close_timeout: DEFAULT_CLOSE_TIMEOUT,
    }
  }
}

impl FramedConfig {
  pub fn max_frame(mut self, max_frame: usize) -> Self {
    self.max_frame = max_frame;
    self
  }

  pub fn close_timeout(mut self, timeout: Duration) -> Self {
    self.close_timeout = timeout;
    self
  }
}

/// Session whose writes are queued to a dedicated writer task.
pub struct FramedSession {
  id: String,
  remote_addr: Option<String>,
  open: AtomicBool,
  writer: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
  /// Flips to `true` once the session is closed from this side.
  closed: watch::Sender<bool>,
  slot: AttachmentSlot,
}

impl FramedSession {
  /// Creates the session and spawns its writer task. The task ends after
  /// writing a close frame or once the session is marked closed.
  pub fn spawn<W>(id: impl Into<String>, remote_addr: Option<String>, write_half: W) -> (Arc<Self>, JoinHandle<()>)
  where
    W: AsyncWrite + Send + Unpin + 'static,
  {
    let id = id.into();
    let (tx, rx) = mpsc::unbounded_channel();
    let session = Arc::new(Self {
      id: id.clone(),
      remote_addr,
      open: AtomicBool::new(true),
      writer: Mutex::new(Some(tx)),
      closed: watch::channel(false).0,
      slot: AttachmentSlot::new(),
    });
    let task = tokio::spawn(Self::run_writer(id, rx, FramedWrite::new(write_half, FrameCodec::new())));
    (session, task)
  }

  async fn run_writer<W>(id: String, mut rx: mpsc::UnboundedReceiver<Frame>, mut sink: FramedWrite<W, FrameCodec>)
  where
    W: AsyncWrite + Send + Unpin + 'static,
  {
    tracing::debug!(session = %id, "Framed writer started");
    while let Some(frame) = rx.recv().await {
      let is_close = frame.is_close();
      if let Err(e) = sink.send(frame).await {
        tracing::warn!(session = %id, error = %e, "Framed writer failed, stopping");
        break;
      }
      if is_close {
        break;
      }
    }
    if let Err(e) = sink.close().await {
      tracing::debug!(session = %id, error = %e, "Error shutting down framed writer");
    }
    tracing::debug!(session = %id, "Framed writer finished");
  }

  /// Marks the session closed without writing anything and stops the writer.
  pub fn mark_closed(&self) -> bool {
    let was_open = self.open.swap(false, Ordering::AcqRel);
    self.writer.lock().take();
    self.closed.send_replace(true);
    was_open
  }

  /// Resolves once the session has been closed locally.
  pub async fn closed(&self) {
    let mut rx = self.closed.subscribe();
    while !*rx.borrow_and_update() {
      if rx.changed().await.is_err() {
        return;
      }
    }
  }

  fn write(&self, frame: Frame) -> Result<(), BridgeError> {
    if !self.is_open() {
      return Err(BridgeError::SessionClosed);
    }
    match self.writer.lock().as_ref() {
      Some(tx) => tx
        .send(frame)
        .map_err(|_| BridgeError::Transport(format!("writer of {} has stopped", self.id))),
      None => Err(BridgeError::SessionClosed),
    }
  }
}

impl ISession for FramedSession {
  fn is_open(&self) -> bool {
    self.open.load(Ordering::Acquire)
  }

  fn send_text(&self, text: String) -> Result<(), BridgeError> {
    self.write(Frame::Text(text))
  }

  fn send_binary(&self, data: Bytes) -> Result<(), BridgeError> {
    self.write(Frame::Binary(data))
  }

  fn close(&self, reason: CloseReason) -> Result<(), BridgeError> {
    if !self.open.swap(false, Ordering::AcqRel) {
      return Ok(());
    }
    tracing::debug!(session = %self.id, reason = %reason, "Closing framed session");
    let sent = match self.writer.lock().take() {
      Some(tx) => tx
        .send(Frame::Close(reason))
        .map_err(|_| BridgeError::Transport(format!("writer of {} has stopped", self.id))),
      None => Ok(()),
    };
    self.closed.send_replace(true);
    sent
  }

  fn attachment(&self) -> &AttachmentSlot {
    &self.slot
  }

  fn remote_addr(&self) -> Option<String> {
    self.remote_addr.clone()
  }
}

impl fmt::Display for FramedSession {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.id)
  }
}

impl fmt::Debug for FramedSession {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FramedSession")
      .field("id", &self.id)
      .field("remote_addr", &self.remote_addr)
      .field("open", &self.is_open())
      .finish()
  }
}

/// Serves one connection with the default `FramedConfig`.
pub async fn serve_connection<S>(
  stream: S,
  endpoint: Endpoint,
  config: EndpointConfig,
  id: impl Into<String>,
  remote_addr: Option<String>,
) -> Result<(), BridgeError>
where
  S: AsyncRead + AsyncWrite + Send + 'static,
{
  serve_connection_with(stream, endpoint, config, FramedConfig::default(), id, remote_addr).await
}

/// Serves one connection: opens a session on `endpoint`, feeds it decoded
/// frames in order and reports the close when the stream ends.
///
/// A peer close frame is echoed before `on_close`. A decode error is reported
/// through `on_error`, closes the session with `ProtocolError` and is returned.
/// When the session is closed from this side (the bridge died) the loop stops
/// dispatching and waits up to `close_timeout` for the peer's close.
pub async fn serve_connection_with<S>(
  stream: S,
  endpoint: Endpoint,
  config: EndpointConfig,
  framed: FramedConfig,
  id: impl Into<String>,
  remote_addr: Option<String>,
) -> Result<(), BridgeError>
where
  S: AsyncRead + AsyncWrite + Send + 'static,
{
  let (read_half, write_half) = tokio::io::split(stream);
  let (session, writer) = FramedSession::spawn(id, remote_addr, write_half);
  let dyn_session: Arc<dyn ISession> = session.clone();

  match endpoint.on_open(&dyn_session, &config).await {
    Ok(Some(_)) => {}
    Ok(None) => {
      await_writer(&session, writer).await;
      return Ok(());
    }
    Err(e) => {
      tracing::error!(session = %session, error = %e, "Failed to open session");
      if let Err(close_err) = session.close(CloseReason::new(CloseCode::UnexpectedCondition, e.to_string())) {
        tracing::debug!(session = %session, error = %close_err, "Close after failed open did not go out");
      }
      await_writer(&session, writer).await;
      return Err(e);
    }
  }

  let mut reader = FramedRead::new(read_half, FrameCodec::with_max_frame(framed.max_frame));
  let mut failure = None;
  let reason = loop {
    let next = tokio::select! {
      biased;
      _ = session.closed() => None,
      next = reader.next() => Some(next),
    };
    let Some(next) = next else {
      tracing::debug!(session = %session, timeout = ?framed.close_timeout, "Session closed locally, awaiting peer close");
      break await_peer_close(&mut reader, framed.close_timeout).await;
    };
    let dispatched = match next {
      Some(Ok(Frame::Text(text))) => endpoint.on_text(&*session, text),
      Some(Ok(Frame::Binary(data))) => endpoint.on_binary(&*session, data),
      Some(Ok(Frame::Close(reason))) => {
        tracing::debug!(session = %session, reason = %reason, "Peer sent close frame");
        if let Err(e) = session.close(reason.clone()) {
          tracing::debug!(session = %session, error = %e, "Could not echo close frame");
        }
        break reason;
      }
      Some(Err(e)) => {
        tracing::warn!(session = %session, error = %e, "Failed to decode frame");
        if let Err(err) = endpoint.on_error(&*session, &e) {
          tracing::debug!(session = %session, error = %err, "Error callback had no bridge");
        }
        let reason = CloseReason::new(CloseCode::ProtocolError, e.to_string());
        if let Err(close_err) = session.close(reason.clone()) {
          tracing::debug!(session = %session, error = %close_err, "Could not send protocol-error close");
        }
        failure = Some(e);
        break reason;
      }
      None => {
        tracing::debug!(session = %session, "Peer closed stream without close frame");
        session.mark_closed();
        break CloseReason::new(CloseCode::ClosedAbnormally, "");
      }
    };
    if let Err(e) = dispatched {
      tracing::warn!(session = %session, error = %e, "Inbound frame not dispatched");
    }
  };

  if let Err(e) = endpoint.on_close(&*session, reason) {
    tracing::warn!(session = %session, error = %e, "Close callback had no bridge");
  }
  await_writer(&session, writer).await;

  match failure {
    Some(e) => Err(e),
    None => Ok(()),
  }
}

async fn await_peer_close<R>(reader: &mut FramedRead<R, FrameCodec>, timeout: Duration) -> CloseReason
where
  R: AsyncRead + Unpin,
{
  let drain = async {
    while let Some(next) = reader.next().await {
      match next {
        Ok(Frame::Close(reason)) => return reason,
        Ok(_) => tracing::trace!("Discarding frame received after local close"),
        Err(e) => return CloseReason::new(CloseCode::ProtocolError, e.to_string()),
      }
    }
    CloseReason::new(CloseCode::ClosedAbnormally, "")
  };
  match tokio::time::timeout(timeout, drain).await {
    Ok(reason) => reason,
    Err(_) => {
      tracing::debug!(?timeout, "Peer did not answer close, dropping connection");
      CloseReason::new(CloseCode::ClosedAbnormally, "close handshake timed out")
    }
  }
}

async fn await_writer(session: &FramedSession, writer: JoinHandle<()>) {
  session.mark_closed();
  if let Err(e) = writer.await {
    tracing::error!(session = %session, error = %e, "Framed writer task failed");
  }
}
