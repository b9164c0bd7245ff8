//! Contract Tests for Session Lifecycle
//!
//! Registry behavior over the fake spawner: creation, disposal, natural
//! exit, active promotion and concurrent creation.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::collections::HashSet;

use tabmux::models::{ProcessExit, SessionId, SessionStatus, TerminalSize};
use tabmux::session::{CreateSessionRequest, RegistryOptions, SessionEvent};
use tabmux::Error;
use test_utils::{fake_registry, wait_until};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_session_ids_are_never_reused() {
    let (_, registry) = fake_registry(RegistryOptions::default());
    let mut seen = HashSet::new();

    for _ in 0..20 {
        let session = registry
            .create_session(CreateSessionRequest::new())
            .await
            .unwrap();
        assert!(seen.insert(session.id));
        registry.remove_session(session.id).unwrap();
    }
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_concurrent_creates_are_independent() {
    let (spawner, registry) = fake_registry(RegistryOptions::default());

    let creates = (0..8).map(|_| {
        let registry = registry.clone();
        async move {
            registry
                .create_session(CreateSessionRequest::new())
                .await
                .unwrap()
        }
    });
    let sessions = futures::future::join_all(creates).await;

    let ids: HashSet<SessionId> = sessions.iter().map(|s| s.id).collect();
    let pids: HashSet<Option<u32>> = sessions.iter().map(|s| s.pid).collect();
    assert_eq!(ids.len(), 8);
    assert_eq!(pids.len(), 8);
    assert_eq!(spawner.spawn_count(), 8);
    assert_eq!(
        registry
            .get_all_sessions()
            .iter()
            .filter(|s| s.is_active)
            .count(),
        1
    );

    // Output of one session stays in its own buffer
    let victim = &sessions[0];
    let sibling = &sessions[1];
    spawner.find(sibling.pid.unwrap()).unwrap().emit_stdout(b"sibling");
    wait_until(|| registry.bridge().pending_bytes(sibling.id) == 7).await;

    registry.remove_session(victim.id).unwrap();
    assert!(spawner.find(victim.pid.unwrap()).unwrap().was_killed());
    assert!(!spawner.find(sibling.pid.unwrap()).unwrap().was_killed());
    assert_eq!(registry.bridge().pending_output(sibling.id), b"sibling");
    assert_eq!(registry.len(), 7);
}

#[tokio::test]
async fn test_unknown_profile_leaves_registry_unchanged() {
    let (_, registry) = fake_registry(RegistryOptions::default());
    registry
        .create_session(CreateSessionRequest::new())
        .await
        .unwrap();

    let result = registry
        .create_session(CreateSessionRequest::new().profile("never-registered"))
        .await;
    assert!(matches!(result, Err(Error::ProfileNotFound { ref name }) if name == "never-registered"));
    assert!(result.unwrap_err().is_spawn_error());
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_write_after_dispose() {
    let (_, registry) = fake_registry(RegistryOptions::default());
    let session = registry
        .create_session(CreateSessionRequest::new())
        .await
        .unwrap();

    assert_ok!(registry.write(session.id, b"echo hi\n"));
    assert_ok!(registry.remove_session(session.id));

    assert!(matches!(
        assert_err!(registry.write(session.id, b"echo hi\n")),
        Error::SessionNotFound { .. }
    ));
    assert!(matches!(
        assert_err!(registry.remove_session(session.id)),
        Error::SessionNotFound { .. }
    ));
}

#[tokio::test]
async fn test_resize_never_creates_records() {
    let (spawner, registry) = fake_registry(RegistryOptions::default());
    let size = TerminalSize::new(132, 43);

    assert_ok!(registry.resize(SessionId::new(), size));
    assert!(registry.is_empty());

    let session = registry
        .create_session(CreateSessionRequest::new())
        .await
        .unwrap();
    registry.resize(session.id, size).unwrap();
    assert_eq!(registry.get_session(session.id).unwrap().size, size);
    assert_eq!(spawner.last().unwrap().size(), size);
}

#[tokio::test]
async fn test_natural_exit_event_order_and_promotion() {
    let (spawner, registry) = fake_registry(RegistryOptions::default());
    let older = registry
        .create_session(CreateSessionRequest::new())
        .await
        .unwrap();
    let newer = registry
        .create_session(CreateSessionRequest::new().activate(false))
        .await
        .unwrap();
    let active = registry
        .create_session(CreateSessionRequest::new())
        .await
        .unwrap();
    assert_eq!(registry.get_active_session().unwrap().id, active.id);

    let mut events = registry.subscribe();
    spawner
        .find(active.pid.unwrap())
        .unwrap()
        .exit(ProcessExit::with_code(0));

    let mut seen = Vec::new();
    loop {
        let event = events.recv().await.unwrap();
        let removed = matches!(event, SessionEvent::Removed { id } if id == active.id);
        seen.push(event);
        if removed {
            break;
        }
    }

    let exits: Vec<&SessionEvent> = seen
        .iter()
        .filter(|e| matches!(e, SessionEvent::Exited { .. }))
        .collect();
    assert_eq!(exits.len(), 1);
    assert!(seen.contains(&SessionEvent::Activated { id: newer.id }));

    let position = |wanted: &SessionEvent| seen.iter().position(|e| e == wanted).unwrap();
    assert!(
        position(&SessionEvent::Exited {
            id: active.id,
            exit: ProcessExit::with_code(0)
        }) < position(&SessionEvent::Removed { id: active.id })
    );

    assert_eq!(registry.get_active_session().unwrap().id, newer.id);
    assert!(registry.get_session(older.id).is_ok());
}

#[tokio::test]
async fn test_retained_exit_keeps_exited_record() {
    let (spawner, registry) = fake_registry(RegistryOptions {
        retain_exited: true,
        ..RegistryOptions::default()
    });
    let session = registry
        .create_session(CreateSessionRequest::new())
        .await
        .unwrap();

    spawner
        .last()
        .unwrap()
        .exit(ProcessExit::with_signal("Terminated"));
    wait_until(|| {
        registry
            .get_session(session.id)
            .is_ok_and(|s| s.status == SessionStatus::Exited)
    })
    .await;

    let record = registry.get_session(session.id).unwrap();
    assert_eq!(record.exit, Some(ProcessExit::with_signal("Terminated")));
    assert!(registry.get_active_session().is_none());
    assert_eq!(registry.supervisor().live_count(), 0);
}

#[tokio::test]
async fn test_connecting_record_is_visible() {
    let (spawner, registry) = fake_registry(RegistryOptions::default());
    spawner.set_delay(Some(std::time::Duration::from_millis(50)));

    let creating = {
        let registry = registry.clone();
        tokio::spawn(async move {
            registry
                .create_session(CreateSessionRequest::new())
                .await
        })
    };
    wait_until(|| registry.len() == 1).await;
    assert_eq!(
        registry.get_all_sessions()[0].status,
        SessionStatus::Connecting
    );

    let session = creating.await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Running);
}
