//! Contract Tests for PTY Process Lifecycle
//!
//! Real shells behind real pseudoterminals, driven through the supervisor.
//! Environments without pty support skip the spawning tests.

#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tabmux::catalog::TerminalProfile;
use tabmux::models::{SessionId, TerminalSize};
use tabmux::pty::{ProcessIo, ProcessStart, ProcessSupervisor, PtySpawner};
use tabmux::Error;

fn supervisor() -> ProcessSupervisor {
    ProcessSupervisor::new(Arc::new(PtySpawner))
}

fn sh(script: &str) -> TerminalProfile {
    TerminalProfile::new("script")
        .with_shell("/bin/sh")
        .with_args(vec!["-c".to_string(), script.to_string()])
}

/// Spawn or return `None` when the environment has no ptys
async fn spawn(
    supervisor: &ProcessSupervisor,
    id: SessionId,
    profile: &TerminalProfile,
) -> Option<ProcessStart> {
    let request = supervisor
        .prepare(profile, None, None, TerminalSize::new(100, 30))
        .expect("/bin/sh resolves");
    match supervisor.spawn(id, request).await {
        Ok(start) => Some(start),
        Err(Error::SpawnFailed { reason, .. }) => {
            eprintln!("skipping, cannot open a pty: {}", reason);
            None
        }
        Err(e) => panic!("unexpected spawn error: {}", e),
    }
}

async fn read_until(io: &mut ProcessIo, needle: &str) -> String {
    let mut output = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !String::from_utf8_lossy(&output).contains(needle) {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, io.stdout.recv()).await {
            Ok(Some(chunk)) => output.extend(chunk),
            Ok(None) | Err(_) => break,
        }
    }
    String::from_utf8_lossy(&output).into_owned()
}

#[tokio::test]
async fn test_shell_output_and_exit_code() {
    let supervisor = supervisor();
    let id = SessionId::new();
    let Some(start) = spawn(&supervisor, id, &sh("echo contract-ok; exit 4")).await else {
        return;
    };
    assert!(start.pid.is_some());
    let mut io = start.io;

    let output = read_until(&mut io, "contract-ok").await;
    assert!(output.contains("contract-ok"), "output was {:?}", output);

    let exit = tokio::time::timeout(Duration::from_secs(10), io.exit)
        .await
        .expect("exit in time")
        .expect("exit reported");
    assert_eq!(exit.code, 4);
    assert!(exit.signal.is_none());
}

#[tokio::test]
async fn test_terminal_environment() {
    let supervisor = supervisor();
    let Some(start) = spawn(&supervisor, SessionId::new(), &sh("echo \"term=$TERM\"")).await
    else {
        return;
    };
    let mut io = start.io;
    let output = read_until(&mut io, "term=xterm-256color").await;
    assert!(output.contains("term=xterm-256color"), "output was {:?}", output);
}

#[tokio::test]
async fn test_write_reaches_stdin() {
    let supervisor = supervisor();
    let id = SessionId::new();
    let Some(start) = spawn(&supervisor, id, &sh("read line; echo \"got:$line\"")).await else {
        return;
    };
    let mut io = start.io;

    supervisor.write(id, b"marker\n").unwrap();
    let output = read_until(&mut io, "got:marker").await;
    assert!(output.contains("got:marker"), "output was {:?}", output);
}

#[tokio::test]
async fn test_kill_then_write_and_resize() {
    let supervisor = supervisor();
    let id = SessionId::new();
    let Some(start) = spawn(&supervisor, id, &sh("sleep 30")).await else {
        return;
    };
    assert!(supervisor.is_alive(id));
    assert!(supervisor.resize(id, TerminalSize::new(120, 40)).is_ok());

    supervisor.kill(id).unwrap();
    let exit = tokio::time::timeout(Duration::from_secs(10), start.io.exit)
        .await
        .expect("exit in time")
        .expect("exit reported");
    assert!(!exit.success());
    supervisor.mark_exited(id, exit);

    assert!(matches!(
        supervisor.write(id, b"late\n"),
        Err(Error::ProcessAlreadyTerminated { .. })
    ));
    assert!(supervisor.resize(id, TerminalSize::new(10, 10)).is_ok());
    // Killing again is harmless
    assert!(supervisor.kill(id).is_ok());

    let info = supervisor.release(id).expect("bookkeeping kept until release");
    assert!(info.is_terminated());
    assert_eq!(supervisor.live_count(), 0);
}

#[tokio::test]
async fn test_sibling_survives_kill() {
    let supervisor = supervisor();
    let (a, b) = (SessionId::new(), SessionId::new());
    let Some(start_a) = spawn(&supervisor, a, &sh("sleep 30")).await else {
        return;
    };
    let Some(start_b) = spawn(&supervisor, b, &sh("sleep 30")).await else {
        return;
    };
    assert_ne!(start_a.pid, start_b.pid);

    supervisor.kill(a).unwrap();
    let _ = tokio::time::timeout(Duration::from_secs(10), start_a.io.exit).await;
    assert!(!supervisor.is_alive(a));
    assert!(supervisor.is_alive(b));

    assert_eq!(supervisor.kill_all(), 1);
    let _ = tokio::time::timeout(Duration::from_secs(10), start_b.io.exit).await;
}

#[test]
fn test_missing_shell_is_rejected_before_spawn() {
    let supervisor = supervisor();
    let profile = TerminalProfile::new("broken").with_shell("/definitely/not/a/shell");
    assert!(matches!(
        supervisor.prepare(&profile, None, None, TerminalSize::default()),
        Err(Error::ShellNotFound { .. })
    ));
}

#[test]
fn test_non_executable_shell_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("not-a-shell");
    std::fs::write(&file, "plain text").unwrap();

    let supervisor = supervisor();
    let profile = TerminalProfile::new("broken").with_shell(&file);
    let result = supervisor.prepare(&profile, None, Some(Path::new("/")), TerminalSize::default());
    assert!(matches!(result, Err(Error::PermissionDenied { .. })));
}
