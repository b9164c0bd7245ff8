//! Integration Tests for the Host Protocol
//!
//! Drive the service with wire-format requests and check the replies and
//! push events a host receives.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use tabmux::catalog::TerminalProfile;
use tabmux::models::{ProcessExit, SessionId};
use tabmux::{Config, HostId, HostMessage, HostRequest, TerminalService};
use test_utils::{collect_until, create_test_config, fake_service, next_message};
use tokio::sync::mpsc;

async fn request(service: &TerminalService, host: HostId, line: &str) -> Option<HostMessage> {
    let request = HostRequest::from_line(line).expect("valid request line");
    service.handle(host, request).await
}

async fn create(service: &TerminalService, host: HostId) -> SessionId {
    match request(service, host, r#"{"type":"create","request_id":"c1"}"#).await {
        Some(HostMessage::Created { session_id, .. }) => session_id,
        other => panic!("expected created, got {:?}", other),
    }
}

#[tokio::test]
async fn test_data_arrives_before_exit() {
    let (spawner, service) = fake_service(create_test_config());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let host = service.hello(None, tx).host;
    let session = create(&service, host).await;

    let write = format!(
        r#"{{"type":"write","session_id":"{}","data":"echo hi\n"}}"#,
        session
    );
    assert!(request(&service, host, &write).await.is_none());
    spawner.last().unwrap().exit(ProcessExit::with_code(0));

    let messages = collect_until(&mut rx, |m| matches!(m, HostMessage::Exit { .. })).await;
    let data = messages
        .iter()
        .position(|m| matches!(m, HostMessage::Data { data, .. } if String::from_utf8_lossy(data).contains("hi")))
        .expect("data event");
    let exit = messages.len() - 1;
    assert!(data < exit);
    assert_eq!(
        messages[exit],
        HostMessage::Exit {
            session_id: session,
            code: 0,
            signal: None
        }
    );
    assert_eq!(service.history().last().as_deref(), Some("echo hi"));
}

#[tokio::test]
async fn test_unknown_profile_is_rejected_synchronously() {
    let (spawner, service) = fake_service(create_test_config());
    let host = HostId::new();

    let reply = request(
        &service,
        host,
        r#"{"type":"create","request_id":"x","profile":"never-registered"}"#,
    )
    .await;
    match reply {
        Some(HostMessage::Error {
            request_id,
            session_id,
            message,
        }) => {
            assert_eq!(request_id.as_deref(), Some("x"));
            assert!(session_id.is_none());
            assert!(message.contains("never-registered"));
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert!(service.registry().is_empty());
    assert_eq!(spawner.spawn_count(), 0);
}

#[tokio::test]
async fn test_dispose_then_write_pushes_not_found() {
    let (_, service) = fake_service(create_test_config());
    let host = HostId::new();
    let session = create(&service, host).await;

    let dispose = format!(
        r#"{{"type":"dispose","request_id":"d1","session_id":"{}"}}"#,
        session
    );
    assert_eq!(
        request(&service, host, &dispose).await,
        Some(HostMessage::Disposed {
            request_id: Some("d1".to_string()),
            session_id: session,
            ok: true
        })
    );

    let write = format!(
        r#"{{"type":"write","session_id":"{}","data":[108,115]}}"#,
        session
    );
    match request(&service, host, &write).await {
        Some(HostMessage::Error {
            session_id,
            message,
            ..
        }) => {
            assert_eq!(session_id, Some(session));
            assert!(message.contains("not found"));
        }
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_resize_of_unknown_session_is_silent() {
    let (_, service) = fake_service(create_test_config());
    let line = format!(
        r#"{{"type":"resize","session_id":"{}","cols":100,"rows":40}}"#,
        SessionId::new()
    );
    assert!(request(&service, HostId::new(), &line).await.is_none());
    assert!(service.registry().is_empty());
}

#[tokio::test]
async fn test_broken_stdin_pushes_scoped_error() {
    let (spawner, service) = fake_service(create_test_config());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let host = service.hello(None, tx).host;
    let session = create(&service, host).await;

    spawner.last().unwrap().break_stdin();
    let write = format!(
        r#"{{"type":"write","session_id":"{}","data":"x"}}"#,
        session
    );
    assert!(request(&service, host, &write).await.is_none());

    let messages = collect_until(&mut rx, |m| matches!(m, HostMessage::Error { .. })).await;
    match messages.last() {
        Some(HostMessage::Error { session_id, .. }) => assert_eq!(*session_id, Some(session)),
        other => panic!("expected error, got {:?}", other),
    }
    test_utils::wait_until(|| !service.registry().contains(session)).await;
}

#[tokio::test]
async fn test_list_split_and_activate() {
    let (_, service) = fake_service(create_test_config());
    let host = HostId::new();
    let parent = create(&service, host).await;

    let split = format!(
        r#"{{"type":"split","request_id":"s1","parent_id":"{}","direction":"horizontal"}}"#,
        parent
    );
    let child = match request(&service, host, &split).await {
        Some(HostMessage::Created {
            request_id,
            session_id,
        }) => {
            assert_eq!(request_id.as_deref(), Some("s1"));
            session_id
        }
        other => panic!("expected created, got {:?}", other),
    };
    assert_eq!(service.coordinator().owner_of(child), Some(host));
    assert_eq!(
        service.splits().split_for_session(parent).unwrap().sessions,
        vec![parent, child]
    );

    let activate = format!(r#"{{"type":"activate","session_id":"{}"}}"#, parent);
    assert!(request(&service, host, &activate).await.is_none());

    match request(&service, host, r#"{"type":"list"}"#).await {
        Some(HostMessage::Sessions { sessions }) => {
            let ids: Vec<SessionId> = sessions.iter().map(|s| s.id).collect();
            assert_eq!(ids, vec![parent, child]);
            assert!(sessions[0].is_active);
            assert!(!sessions[1].is_active);
        }
        other => panic!("expected sessions, got {:?}", other),
    }
}

/// The default profile on a real pty, when the environment allows it
#[cfg(unix)]
#[tokio::test]
async fn test_default_profile_on_native_pty() {
    let service = TerminalService::native(Config::default()).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let host = service.hello(None, tx).host;
    next_message(&mut rx).await;

    let session = match request(&service, host, r#"{"type":"create","profile":"default"}"#).await {
        Some(HostMessage::Created { session_id, .. }) => session_id,
        Some(HostMessage::Error { message, .. }) => {
            eprintln!("skipping, no usable shell: {}", message);
            return;
        }
        other => panic!("unexpected reply {:?}", other),
    };

    // The quotes keep the echoed keystrokes from matching
    let write = format!(
        r#"{{"type":"write","session_id":"{}","data":"echo tab''mux-ok\nexit\n"}}"#,
        session
    );
    assert!(request(&service, host, &write).await.is_none());

    let mut output = String::new();
    loop {
        match next_message(&mut rx).await {
            HostMessage::Data { data, .. } => output.push_str(&String::from_utf8_lossy(&data)),
            HostMessage::Exit { session_id, .. } => {
                assert_eq!(session_id, session);
                break;
            }
            _ => {}
        }
    }
    assert!(output.contains("tabmux-ok"), "output was {:?}", output);
}

#[tokio::test]
async fn test_theme_change_names_sessions_using_it() {
    let (_, service) = fake_service(create_test_config());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let host = service.hello(None, tx).host;
    let dark = create(&service, host).await;
    let solarized = match request(
        &service,
        host,
        r#"{"type":"create","request_id":"c2","theme":"solarized-dark"}"#,
    )
    .await
    {
        Some(HostMessage::Created { session_id, .. }) => session_id,
        other => panic!("expected created, got {:?}", other),
    };

    let catalog = service.catalog();
    catalog.register_profile(TerminalProfile::new("zsh").with_shell("/bin/zsh"));
    let theme = catalog.get_theme("default-dark").unwrap();
    catalog.register_theme(theme.with_description("Tweaked"));

    let messages = collect_until(&mut rx, |m| matches!(m, HostMessage::ThemeChanged { .. })).await;
    assert_eq!(
        messages.last(),
        Some(&HostMessage::ThemeChanged {
            theme: "default-dark".to_string(),
            sessions: vec![dark],
        })
    );

    catalog.register_custom_theme("solarized-dark", catalog.get_theme("default-light").unwrap());
    let messages = collect_until(&mut rx, |m| matches!(m, HostMessage::ThemeChanged { .. })).await;
    assert_eq!(
        messages.last(),
        Some(&HostMessage::ThemeChanged {
            theme: "solarized-dark".to_string(),
            sessions: vec![solarized],
        })
    );
}
