// tests/framed.rs

use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::Framed;
use webactors::protocol::{Frame, FrameCodec};
use webactors::transport::framed::{serve_connection, serve_connection_with, FramedConfig};
use webactors::{BridgeError, CloseCode, CloseReason, Endpoint, EndpointConfig, ExitCause, HttpSession, SystemEvent};
use std::sync::Arc;
use std::time::Duration;
mod common;

use common::{bound_config, LONG_TIMEOUT};

async fn next_frame<T>(framed: &mut Framed<T, FrameCodec>) -> Option<Frame>
where
  T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
  tokio::time::timeout(LONG_TIMEOUT, framed.next())
    .await
    .expect("frame in time")
    .map(|res| res.expect("valid frame"))
}

#[tokio::test]
async fn test_serve_connection_echo_and_peer_close() -> anyhow::Result<()> {
  let ctx = common::test_context();
  let mut events = ctx.event_bus().subscribe();
  let endpoint = Endpoint::new(ctx.clone());
  let echo = common::spawn_echo(&ctx);
  let (client, server) = tokio::io::duplex(4096);

  let server_task = tokio::spawn(serve_connection(
    server,
    endpoint,
    bound_config(&echo),
    "peer-1",
    Some("127.0.0.1:40000".into()),
  ));
  let mut client = Framed::new(client, FrameCodec::new());

  client.send(Frame::Text("hi".into())).await?;
  client.send(Frame::Text("there".into())).await?;
  assert_eq!(next_frame(&mut client).await, Some(Frame::Text("echo: hi".into())));
  assert_eq!(next_frame(&mut client).await, Some(Frame::Text("echo: there".into())));

  client.send(Frame::Close(CloseReason::normal())).await?;
  assert_eq!(next_frame(&mut client).await, Some(Frame::Close(CloseReason::normal())));
  assert_eq!(next_frame(&mut client).await, None);

  tokio::time::timeout(LONG_TIMEOUT, server_task).await??.map_err(anyhow::Error::from)?;

  let mut remote_addr = None;
  let mut closed_cause = None;
  while let Ok(event) = events.try_recv() {
    match event {
      SystemEvent::BridgeAttached { remote_addr: addr, .. } => remote_addr = addr,
      SystemEvent::BridgeClosed { cause, .. } => closed_cause = Some(cause),
      _ => {}
    }
  }
  assert_eq!(remote_addr.as_deref(), Some("127.0.0.1:40000"));
  assert_eq!(closed_cause, Some(None));
  // The peer leaving does not stop the actor.
  assert!(!echo.is_terminated());
  Ok(())
}

#[tokio::test]
async fn test_serve_connection_protocol_error_closes_session() -> anyhow::Result<()> {
  let ctx = common::test_context();
  let mut events = ctx.event_bus().subscribe();
  let endpoint = Endpoint::new(ctx.clone());
  let (target, _mailbox) = ctx.actor("owner");
  let (client, server) = tokio::io::duplex(4096);

  let server_task = tokio::spawn(serve_connection(server, endpoint, bound_config(&target), "peer-2", None));
  let mut client = Framed::new(client, FrameCodec::new());
  client.get_mut().write_all(&[9, 0, 0, 0, 0]).await?;

  match next_frame(&mut client).await {
    Some(Frame::Close(reason)) => assert_eq!(reason.code(), CloseCode::ProtocolError),
    other => panic!("expected protocol-error close, got {:?}", other),
  }
  assert_eq!(next_frame(&mut client).await, None);

  let result = tokio::time::timeout(LONG_TIMEOUT, server_task).await??;
  assert!(matches!(result, Err(BridgeError::Protocol(_))));

  let mut closed_cause = None;
  while let Ok(event) = events.try_recv() {
    if let SystemEvent::BridgeClosed { cause, .. } = event {
      closed_cause = cause;
    }
  }
  match closed_cause {
    Some(ExitCause::Closed(reason)) => assert_eq!(reason.code(), CloseCode::ProtocolError),
    other => panic!("expected protocol-error death, got {:?}", other),
  }
  Ok(())
}

#[tokio::test]
async fn test_serve_connection_without_actor_rejects() -> anyhow::Result<()> {
  let ctx = common::test_context();
  let endpoint = Endpoint::new(ctx);
  let (client, server) = tokio::io::duplex(4096);
  let config = EndpointConfig::new(Arc::new(HttpSession::new("nobody")));

  let server_task = tokio::spawn(serve_connection(server, endpoint, config, "peer-3", None));
  let mut client = Framed::new(client, FrameCodec::new());

  assert_eq!(
    next_frame(&mut client).await,
    Some(Frame::Close(CloseReason::new(CloseCode::CannotAccept, "session actor not found")))
  );
  tokio::time::timeout(LONG_TIMEOUT, server_task).await??.map_err(anyhow::Error::from)?;
  Ok(())
}

#[tokio::test]
async fn test_actor_exit_closes_connection_going_away() -> anyhow::Result<()> {
  let ctx = common::test_context();
  let endpoint = Endpoint::new(ctx.clone());
  let (target, mailbox) = ctx.actor("owner");
  let (client, server) = tokio::io::duplex(4096);

  let server_task = tokio::spawn(serve_connection(server, endpoint, bound_config(&target), "peer-4", None));
  let mut client = Framed::new(client, FrameCodec::new());

  let bridge = common::expect_opened(&mailbox).await;
  mailbox.exit(Some(ExitCause::Error("shutting down".into())));

  assert_eq!(
    next_frame(&mut client).await,
    Some(Frame::Close(CloseReason::new(CloseCode::GoingAway, "Error: shutting down")))
  );
  assert_eq!(bridge.exit_cause(), Some(Some(ExitCause::Error("shutting down".into()))));

  // Peer finishes the close handshake by hanging up.
  drop(client);
  tokio::time::timeout(LONG_TIMEOUT, server_task).await??.map_err(anyhow::Error::from)?;
  Ok(())
}

#[tokio::test]
async fn test_local_close_ends_serve_while_peer_stays_connected() -> anyhow::Result<()> {
  let ctx = common::test_context();
  let endpoint = Endpoint::new(ctx.clone());
  let (target, mailbox) = ctx.actor("owner");
  let (client, server) = tokio::io::duplex(4096);
  let framed = FramedConfig::default().close_timeout(Duration::from_millis(200));

  let server_task = tokio::spawn(serve_connection_with(
    server,
    endpoint,
    bound_config(&target),
    framed,
    "peer-5",
    None,
  ));
  let mut client = Framed::new(client, FrameCodec::new());

  let bridge = common::expect_opened(&mailbox).await;
  mailbox.exit(Some(ExitCause::Error("bye".into())));
  assert_eq!(
    next_frame(&mut client).await,
    Some(Frame::Close(CloseReason::new(CloseCode::GoingAway, "Error: bye")))
  );
  assert!(!bridge.is_open());

  // The client neither answers nor hangs up; the server still lets go.
  tokio::time::timeout(LONG_TIMEOUT, server_task).await??.map_err(anyhow::Error::from)?;
  assert_eq!(next_frame(&mut client).await, None);
  Ok(())
}

#[tokio::test]
async fn test_peer_close_answer_finishes_local_close() -> anyhow::Result<()> {
  let ctx = common::test_context();
  let endpoint = Endpoint::new(ctx.clone());
  let (target, mailbox) = ctx.actor("owner");
  let (client, server) = tokio::io::duplex(4096);

  let server_task = tokio::spawn(serve_connection(server, endpoint, bound_config(&target), "peer-6", None));
  let mut client = Framed::new(client, FrameCodec::new());

  let bridge = common::expect_opened(&mailbox).await;
  bridge.interrupt();
  match next_frame(&mut client).await {
    Some(Frame::Close(reason)) => assert_eq!(reason.code(), CloseCode::GoingAway),
    other => panic!("expected going-away close, got {:?}", other),
  }

  // Frames racing the close are not dispatched to the dead bridge.
  client.send(Frame::Text("late".into())).await?;
  client.send(Frame::Close(CloseReason::normal())).await?;
  tokio::time::timeout(LONG_TIMEOUT, server_task).await??.map_err(anyhow::Error::from)?;
  assert!(common::recv_timeout(&mailbox, common::SHORT_TIMEOUT).await.is_none());
  Ok(())
}
