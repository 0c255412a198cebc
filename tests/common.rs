// tests/common.rs
#![allow(dead_code)] // Not every test binary uses every helper

use bytes::Bytes;
use parking_lot::Mutex;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use webactors::transport::AttachmentSlot;
use webactors::{
  ActorMailbox, ActorRef, BridgeError, BridgeRef, CloseReason, Command, Context, EndpointConfig, ExitCause,
  HttpSession, ISession, WebDataMessage,
};

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

pub const SHORT_TIMEOUT: Duration = Duration::from_millis(100);
pub const LONG_TIMEOUT: Duration = Duration::from_secs(2);

static TRACING_INIT: Once = Once::new();
static SESSION_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn setup_tracing() {
  TRACING_INIT.call_once(|| {
    // Overridable with RUST_LOG
    let default_filter = "webactors=debug,warn";
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = FmtSubscriber::builder()
      .with_env_filter(env_filter)
      .with_target(true)
      .with_line_number(true)
      .with_test_writer()
      .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set global tracing subscriber");
  });
}

pub fn test_context() -> Context {
  setup_tracing();
  Context::new()
}

pub fn test_context_with(config: webactors::RuntimeConfig) -> Context {
  setup_tracing();
  Context::with_config(config)
}

/// Session double that records every write and close.
pub struct MockSession {
  id: String,
  open: AtomicBool,
  fail_writes: AtomicBool,
  pub texts: Mutex<Vec<String>>,
  pub binaries: Mutex<Vec<Bytes>>,
  pub closes: Mutex<Vec<CloseReason>>,
  slot: AttachmentSlot,
}

impl MockSession {
  pub fn new() -> Arc<Self> {
    let n = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    Arc::new(Self {
      id: format!("mock-session-{}", n),
      open: AtomicBool::new(true),
      fail_writes: AtomicBool::new(false),
      texts: Mutex::new(Vec::new()),
      binaries: Mutex::new(Vec::new()),
      closes: Mutex::new(Vec::new()),
      slot: AttachmentSlot::new(),
    })
  }

  pub fn set_open(&self, open: bool) {
    self.open.store(open, Ordering::SeqCst);
  }

  pub fn fail_writes(&self, fail: bool) {
    self.fail_writes.store(fail, Ordering::SeqCst);
  }

  pub fn write_count(&self) -> usize {
    self.texts.lock().len() + self.binaries.lock().len()
  }

  pub fn close_count(&self) -> usize {
    self.closes.lock().len()
  }

  pub fn last_close(&self) -> Option<CloseReason> {
    self.closes.lock().last().cloned()
  }
}

impl ISession for MockSession {
  fn is_open(&self) -> bool {
    self.open.load(Ordering::SeqCst)
  }

  fn send_text(&self, text: String) -> Result<(), BridgeError> {
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(BridgeError::Transport("write refused".into()));
    }
    self.texts.lock().push(text);
    Ok(())
  }

  fn send_binary(&self, data: Bytes) -> Result<(), BridgeError> {
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(BridgeError::Transport("write refused".into()));
    }
    self.binaries.lock().push(data);
    Ok(())
  }

  // Records every call, even on a closed session, so tests can count them.
  fn close(&self, reason: CloseReason) -> Result<(), BridgeError> {
    self.open.store(false, Ordering::SeqCst);
    self.closes.lock().push(reason);
    Ok(())
  }

  fn attachment(&self) -> &AttachmentSlot {
    &self.slot
  }
}

impl fmt::Display for MockSession {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.id)
  }
}

pub fn as_dyn(session: &Arc<MockSession>) -> Arc<dyn ISession> {
  session.clone()
}

/// An endpoint configuration whose HTTP session is bound to `actor`.
pub fn bound_config(actor: &ActorRef) -> EndpointConfig {
  let http_session = Arc::new(HttpSession::new(format!("http-{}", actor.id().handle())));
  http_session.bind_actor(actor.clone());
  EndpointConfig::new(http_session)
}

pub async fn recv_timeout(mailbox: &ActorMailbox, duration: Duration) -> Option<Command> {
  mailbox.recv_timeout(duration).await
}

/// Waits for the socket-opened notification and returns the bridge it names.
pub async fn expect_opened(mailbox: &ActorMailbox) -> BridgeRef {
  match recv_timeout(mailbox, LONG_TIMEOUT).await {
    Some(Command::SocketOpened { bridge }) => bridge,
    other => panic!("expected SocketOpened, got {:?}", other),
  }
}

pub async fn expect_data(mailbox: &ActorMailbox) -> WebDataMessage {
  match recv_timeout(mailbox, LONG_TIMEOUT).await {
    Some(Command::Data(msg)) => msg,
    other => panic!("expected Data, got {:?}", other),
  }
}

/// Spawns an actor that answers every text frame with `"echo: <text>"` on
/// the bridge it came from, and stops on `Command::Stop`.
pub fn spawn_echo(ctx: &Context) -> ActorRef {
  let (actor, _task) = ctx.spawn_actor("echo", |mailbox| async move {
    while let Some(command) = mailbox.recv().await {
      match command {
        Command::Data(msg) => {
          if let (Some(bridge), Some(text)) = (msg.sender(), msg.string_body()) {
            bridge.send(WebDataMessage::text(format!("echo: {}", text))).await;
          }
        }
        Command::Stop => break,
        _ => {}
      }
    }
    Ok::<(), ExitCause>(())
  });
  actor
}
