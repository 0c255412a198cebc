// tests/runtime.rs

use webactors::{Command, ExitCause, ExitMessage, SystemEvent};
use std::time::Duration;
mod common;

use common::{recv_timeout, LONG_TIMEOUT};

#[tokio::test]
async fn test_spawned_actor_exit_reaches_mailbox_watcher() {
  let ctx = common::test_context();
  let (watcher, watcher_mailbox) = ctx.actor("watcher");
  let (worker, task) = ctx.spawn_actor("worker", |mailbox| async move {
    match mailbox.recv().await {
      Some(Command::Stop) => Err(ExitCause::Error("asked to stop".into())),
      _ => Ok(()),
    }
  });
  let _watch = watcher_mailbox.watch(&worker);

  assert!(worker.try_send(Command::Stop).is_ok());
  task.await.expect("worker task");

  match recv_timeout(&watcher_mailbox, LONG_TIMEOUT).await {
    Some(Command::Exit(ExitMessage { actor, cause })) => {
      assert_eq!(&actor, worker.id());
      assert_eq!(cause, Some(ExitCause::Error("asked to stop".into())));
    }
    other => panic!("expected Exit, got {:?}", other),
  }
  assert!(worker.is_terminated());
  assert!(!watcher.is_terminated());
}

#[tokio::test]
async fn test_aborted_actor_is_reported_as_aborted() {
  let ctx = common::test_context();
  let (worker, task) = ctx.spawn_actor("sleeper", |_mailbox| async move {
    tokio::time::sleep(Duration::from_secs(3600)).await;
    Ok(())
  });

  task.abort();
  assert!(task.await.unwrap_err().is_cancelled());
  assert_eq!(worker.exit_cause(), Some(Some(ExitCause::Aborted)));
}

#[tokio::test]
async fn test_watching_a_dead_actor_delivers_exit_immediately() {
  let ctx = common::test_context();
  let (dead, dead_mailbox) = ctx.actor("dead");
  dead_mailbox.exit(None);

  let (_watcher, watcher_mailbox) = ctx.actor("watcher");
  let _watch = watcher_mailbox.watch(&dead);
  assert!(matches!(
    watcher_mailbox.try_recv(),
    Some(Command::Exit(ExitMessage { cause: None, .. }))
  ));
}

#[tokio::test]
async fn test_dropped_watch_handle_stops_notifications() {
  let ctx = common::test_context();
  let (target, target_mailbox) = ctx.actor("target");
  let (_watcher, watcher_mailbox) = ctx.actor("watcher");

  let watch = watcher_mailbox.watch(&target);
  drop(watch);
  target_mailbox.exit(Some(ExitCause::Interrupted));
  assert!(watcher_mailbox.try_recv().is_none());
}

#[tokio::test]
async fn test_terminated_actor_rejects_sends() {
  let ctx = common::test_context();
  let (target, target_mailbox) = ctx.actor("target");
  target_mailbox.exit(None);
  assert!(target.send(Command::Stop).await.is_err());
  assert!(target.try_send(Command::Stop).is_err());
}

#[tokio::test]
async fn test_event_bus_sees_actor_start_and_stop() {
  let ctx = common::test_context();
  let mut events = ctx.event_bus().subscribe();
  let (worker, task) = ctx.spawn_actor("short-lived", |_mailbox| async move { Ok(()) });
  task.await.expect("worker task");

  let mut started = false;
  let mut stopped = false;
  while let Ok(event) = events.try_recv() {
    match event {
      SystemEvent::ActorStarted { actor } if &actor == worker.id() => started = true,
      SystemEvent::ActorStopping { actor, cause } if &actor == worker.id() => {
        assert_eq!(cause, None);
        stopped = true;
      }
      _ => {}
    }
  }
  assert!(started && stopped);
}
