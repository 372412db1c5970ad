mod common;

use std::time::Duration;

use common::*;
use meshlink::protobuf::PortNum;
use meshlink::session::{
    ConnectionStatus, LinkPhase, SessionError, SessionHandle, SessionRunner, NONCE_CONFIG,
};
use meshlink::storage::{MemoryRepository, NodeRecord, Repository};
use meshlink::transport::TransportEvent;
use tokio::sync::mpsc;

async fn wait_for(handle: &SessionHandle, pred: impl Fn(&ConnectionStatus) -> bool) -> ConnectionStatus {
    let mut status = handle.status();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let current = status.borrow();
                if pred(&*current) {
                    return current.clone();
                }
            }
            status.changed().await.expect("runner alive");
        }
    })
    .await
    .expect("status reached in time")
}

#[tokio::test]
async fn runner_drives_a_session_to_subscribed() {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (session, fake) = new_session(tunings());
    events_tx.send(discovered()).unwrap();
    let (runner, handle) = SessionRunner::new(session, events_rx);
    let task = tokio::spawn(runner.run());

    handle.connect(device()).await.unwrap();
    assert_eq!(fake.state().connects, vec![device()]);

    events_tx.send(TransportEvent::Connected(device())).unwrap();
    events_tx.send(my_info(ME)).unwrap();
    events_tx.send(config_complete(NONCE_CONFIG)).unwrap();
    let status = wait_for(&handle, |s| s.subscribed).await;
    assert_eq!(status.phase, LinkPhase::Subscribed);
    assert_eq!(status.my_node_num, Some(ME));

    let id = handle.send_text("hello mesh", None, 0, None, false).await.unwrap();
    assert_eq!(fake.sent_on(PortNum::TextMessageApp)[0].id, id);

    handle.shutdown();
    let session = task.await.unwrap();
    assert_eq!(session.repository().messages().len(), 1);
    assert_eq!(session.status().phase, LinkPhase::Disconnected);
    assert_eq!(fake.state().disconnects, 1);
}

#[tokio::test]
async fn runner_fires_timers_on_its_own() {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let mut t = tunings();
    t.connect_timeout = Duration::from_millis(10);
    t.connect_max_attempts = 3;
    let (session, fake) = new_session(t);
    events_tx.send(discovered()).unwrap();
    let (runner, handle) = SessionRunner::new(session, events_rx);
    let task = tokio::spawn(runner.run());

    handle.connect(device()).await.unwrap();
    let status = wait_for(&handle, |s| s.last_error.is_some()).await;
    assert_eq!(status.phase, LinkPhase::Disconnected);
    assert_eq!(
        status.last_error.as_deref(),
        Some("connection failed after 3 attempts")
    );
    assert_eq!(fake.state().scans, 2);

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn errors_travel_back_to_the_caller() {
    let (_events_tx, events_rx) = mpsc::unbounded_channel();
    let (session, _fake) = new_session(tunings());
    let (runner, handle) = SessionRunner::new(session, events_rx);
    let task = tokio::spawn(runner.run());

    let err = handle.send_text("nobody home", None, 0, None, false).await.unwrap_err();
    assert!(matches!(err, SessionError::NotConnected));
    let err = handle.connect(meshlink::transport::DeviceId::from("/dev/nothing")).await.unwrap_err();
    assert!(matches!(err, SessionError::UnknownDevice(_)));

    handle.shutdown();
    task.await.unwrap();
    let err = handle.request_trace_route(REMOTE, 0).await.unwrap_err();
    assert!(matches!(err, SessionError::Closed));
    assert!(handle.disconnect(false).is_err());
}

#[tokio::test]
async fn dropping_every_handle_stops_the_runner() {
    let (_events_tx, events_rx) = mpsc::unbounded_channel();
    let (session, fake) = new_session(tunings());
    let (runner, handle) = SessionRunner::new(session, events_rx);
    let task = tokio::spawn(runner.run());
    assert_eq!(handle.current_status().phase, LinkPhase::Disconnected);
    drop(handle);
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("runner stopped")
        .unwrap();
    assert_eq!(fake.state().scans, 1);
}

#[tokio::test]
async fn timers_fire_while_frames_keep_arriving() {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let mut t = tunings();
    t.connect_timeout = Duration::from_millis(10);
    t.connect_max_attempts = 2;
    let (session, _fake) = new_session(t);
    events_tx.send(discovered()).unwrap();
    let (runner, handle) = SessionRunner::new(session, events_rx);
    let task = tokio::spawn(runner.run());
    handle.connect(device()).await.unwrap();

    let flood = tokio::spawn(async move {
        loop {
            for _ in 0..256 {
                if events_tx.send(raw_frame(vec![0xff, 0xff, 0xff, 0x0f])).is_err() {
                    return;
                }
            }
            tokio::task::yield_now().await;
        }
    });

    let status = wait_for(&handle, |s| s.last_error.is_some()).await;
    assert_eq!(
        status.last_error.as_deref(),
        Some("connection failed after 2 attempts")
    );

    handle.shutdown();
    task.await.unwrap();
    flood.abort();
}

#[tokio::test]
async fn saved_changes_reach_the_snapshot_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mesh.json");
    let (_events_tx, events_rx) = mpsc::unbounded_channel();
    let (mut session, _fake) =
        session_with_repository(tunings(), MemoryRepository::with_snapshot(&path).unwrap());
    let repo = session.repository_mut();
    repo.begin();
    repo.upsert_node(NodeRecord::new(REMOTE));
    assert!(repo.save_and_log_on_failure());
    assert!(!path.exists());

    let (runner, handle) = SessionRunner::new(session, events_rx);
    let task = tokio::spawn(runner.with_flush_interval(Duration::from_secs(3600)).run());
    handle.shutdown();
    let session = task.await.unwrap();

    assert!(!session.repository().is_dirty());
    let reloaded = MemoryRepository::with_snapshot(&path).unwrap();
    assert!(reloaded.find_node(REMOTE).is_some());
}
