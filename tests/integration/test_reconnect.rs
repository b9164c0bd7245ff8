//! Integration Tests for Host Reconnection
//!
//! Disconnect and reconnect a host through the service and check what
//! happens to its sessions inside and after the grace window.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::time::Duration;

use tabmux::models::ProcessExit;
use tabmux::session::CreateSessionRequest;
use tabmux::HostMessage;
use test_utils::{create_test_config, fake_service, next_message, next_output};
use tokio::sync::mpsc;

#[tokio::test(start_paused = true)]
async fn test_reconnect_replays_exactly_the_detached_bytes() {
    let (spawner, service) = fake_service(create_test_config());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let connection = service.hello(None, tx);
    let host = connection.host;
    assert!(matches!(next_message(&mut rx).await, HostMessage::Welcome { .. }));

    let session = service
        .create_session(host, CreateSessionRequest::new())
        .await
        .unwrap();
    let process = spawner.last().unwrap();

    process.emit_stdout(b"live\n");
    assert_eq!(next_output(&mut rx).await, (session.id, b"live\n".to_vec()));

    drop(rx);
    service.disconnect(connection);

    let detached = [&b"one "[..], &b"two "[..], &b"three"[..]];
    for chunk in &detached {
        process.emit_stdout(chunk);
    }
    tokio::time::sleep(Duration::from_secs(2)).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    assert_eq!(service.hello(Some(host), tx).host, host);
    assert_eq!(next_message(&mut rx).await, HostMessage::Welcome { host_id: host });

    assert_eq!(next_output(&mut rx).await, (session.id, detached.concat()));

    // Live output flows again and the grace timer is gone
    process.emit_stdout(b"after");
    assert_eq!(next_output(&mut rx).await, (session.id, b"after".to_vec()));
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(service.registry().contains(session.id));
}

#[tokio::test(start_paused = true)]
async fn test_replay_is_capped_by_buffer_capacity() {
    let mut config = create_test_config();
    config.bridge.buffer_capacity = 8;
    let (spawner, service) = fake_service(config);

    let (tx, rx) = mpsc::unbounded_channel();
    let connection = service.hello(None, tx);
    let host = connection.host;
    let session = service
        .create_session(host, CreateSessionRequest::new())
        .await
        .unwrap();
    drop(rx);
    service.disconnect(connection);

    spawner.last().unwrap().emit_stdout(b"0123456789abcdef");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(service.bridge().evicted_bytes(session.id), 8);

    let (tx, mut rx) = mpsc::unbounded_channel();
    service.hello(Some(host), tx);
    next_message(&mut rx).await;
    assert_eq!(next_output(&mut rx).await, (session.id, b"89abcdef".to_vec()));
}

#[tokio::test(start_paused = true)]
async fn test_grace_expiry_kills_only_that_hosts_sessions() {
    let (spawner, service) = fake_service(create_test_config());

    let (tx_a, rx_a) = mpsc::unbounded_channel();
    let connection_a = service.hello(None, tx_a);
    let host_a = connection_a.host;
    let (tx_b, _rx_b) = mpsc::unbounded_channel();
    let host_b = service.hello(None, tx_b).host;

    let owned = service
        .create_session(host_a, CreateSessionRequest::new())
        .await
        .unwrap();
    let foreign = service
        .create_session(host_b, CreateSessionRequest::new())
        .await
        .unwrap();

    drop(rx_a);
    service.disconnect(connection_a);
    tokio::time::sleep(service.coordinator().grace_period() + Duration::from_secs(1)).await;

    assert!(!service.registry().contains(owned.id));
    assert!(service.registry().contains(foreign.id));
    assert!(spawner.find(owned.pid.unwrap()).unwrap().was_killed());
    assert!(!spawner.find(foreign.pid.unwrap()).unwrap().was_killed());
}

#[tokio::test(start_paused = true)]
async fn test_output_before_detached_exit_is_replayed() {
    let mut config = create_test_config();
    config.session.retain_exited = true;
    let (spawner, service) = fake_service(config);

    let (tx, rx) = mpsc::unbounded_channel();
    let connection = service.hello(None, tx);
    let host = connection.host;
    let session = service
        .create_session(host, CreateSessionRequest::new())
        .await
        .unwrap();
    drop(rx);
    service.disconnect(connection);

    let process = spawner.last().unwrap();
    process.emit_stdout(b"last words");
    process.exit(ProcessExit::with_code(2));
    tokio::time::sleep(Duration::from_secs(1)).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    service.hello(Some(host), tx);
    next_message(&mut rx).await;
    assert_eq!(next_output(&mut rx).await, (session.id, b"last words".to_vec()));
    assert!(service.registry().get_session(session.id).unwrap().exit.is_some());
}

#[tokio::test]
async fn test_shutdown_kills_without_grace() {
    let (spawner, service) = fake_service(create_test_config());
    let (tx, _rx) = mpsc::unbounded_channel();
    let connection = service.hello(None, tx);
    let host = connection.host;
    for _ in 0..3 {
        service
            .create_session(host, CreateSessionRequest::new())
            .await
            .unwrap();
    }
    service.disconnect(connection);

    assert_eq!(service.shutdown(), 3);
    assert!(service.registry().is_empty());
    assert!(spawner.processes().iter().all(|p| p.was_killed()));
}

#[tokio::test(start_paused = true)]
async fn test_late_close_of_replaced_connection_is_ignored() {
    let (spawner, service) = fake_service(create_test_config());

    let (old_tx, _old_rx) = mpsc::unbounded_channel();
    let old = service.hello(None, old_tx);
    let session = service
        .create_session(old.host, CreateSessionRequest::new())
        .await
        .unwrap();

    // The host reconnects before its first socket is noticed as closed
    let (new_tx, mut new_rx) = mpsc::unbounded_channel();
    let new = service.hello(Some(old.host), new_tx);
    assert_eq!(next_message(&mut new_rx).await, HostMessage::Welcome { host_id: old.host });
    service.disconnect(old);

    assert!(service.coordinator().is_connected(old.host));
    let process = spawner.last().unwrap();
    process.emit_stdout(b"still here");
    assert_eq!(next_output(&mut new_rx).await, (session.id, b"still here".to_vec()));

    tokio::time::sleep(service.coordinator().grace_period() + Duration::from_secs(1)).await;
    assert!(service.registry().contains(session.id));
    assert!(!process.was_killed());

    service.disconnect(new);
    tokio::time::sleep(service.coordinator().grace_period() + Duration::from_secs(1)).await;
    assert!(!service.registry().contains(session.id));
}
