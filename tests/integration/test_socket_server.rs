//! Integration Tests for the Unix Socket Server
//!
//! Real socket connections against a service backed by the echoing fake
//! spawner.

#![cfg(unix)]

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tabmux::host::server;
use tabmux::models::SessionId;
use tabmux::{HostId, HostMessage, TerminalService};
use test_utils::fixtures::TEST_TIMEOUT;
use test_utils::{create_test_config, fake_service, wait_until};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(path: &Path) -> Self {
        let stream = UnixStream::connect(path).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn send_bytes(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv(&mut self) -> HostMessage {
        let line = tokio::time::timeout(TEST_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap()
            .expect("server closed the connection");
        serde_json::from_str(&line).unwrap()
    }

    async fn recv_output(&mut self) -> Vec<u8> {
        loop {
            match self.recv().await {
                HostMessage::Data { data, .. } => return data,
                HostMessage::Activated { .. } | HostMessage::Title { .. } => continue,
                other => panic!("expected output, got {:?}", other),
            }
        }
    }

    async fn hello(&mut self, host_id: Option<HostId>) -> HostId {
        let line = match host_id {
            Some(id) => format!(r#"{{"type":"hello","host_id":"{}"}}"#, id),
            None => r#"{"type":"hello"}"#.to_string(),
        };
        self.send(&line).await;
        match self.recv().await {
            HostMessage::Welcome { host_id } => host_id,
            other => panic!("expected welcome, got {:?}", other),
        }
    }

    async fn create(&mut self) -> SessionId {
        self.send(r#"{"type":"create","request_id":"1"}"#).await;
        loop {
            match self.recv().await {
                HostMessage::Created { session_id, .. } => return session_id,
                HostMessage::Activated { .. } => continue,
                other => panic!("expected created, got {:?}", other),
            }
        }
    }
}

struct Server {
    _dir: tempfile::TempDir,
    path: PathBuf,
    service: Arc<TerminalService>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<std::io::Result<()>>,
}

async fn start() -> Server {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tabmux.sock");
    let (_, service) = fake_service(create_test_config());
    let service = Arc::new(service);
    let (shutdown, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(server::serve(
        Arc::clone(&service),
        path.clone(),
        shutdown_rx,
    ));
    wait_until(|| path.exists()).await;
    Server {
        _dir: dir,
        path,
        service,
        shutdown,
        task,
    }
}

#[tokio::test]
async fn test_socket_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let server = start().await;
    let mode = std::fs::metadata(&server.path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[tokio::test]
async fn test_requests_before_hello_are_refused() {
    let server = start().await;
    let mut client = Client::connect(&server.path).await;

    client.send(r#"{"type":"list"}"#).await;
    match client.recv().await {
        HostMessage::Error { message, .. } => assert!(message.contains("hello")),
        other => panic!("expected error, got {:?}", other),
    }

    client.send("not json").await;
    assert!(matches!(client.recv().await, HostMessage::Error { .. }));

    client.hello(None).await;
    client.send(r#"{"type":"list"}"#).await;
    assert_eq!(
        client.recv().await,
        HostMessage::Sessions { sessions: vec![] }
    );
}

#[tokio::test]
async fn test_malformed_lines_get_errors_and_keep_the_connection() {
    let server = start().await;
    let mut client = Client::connect(&server.path).await;
    client.hello(None).await;

    client.send_bytes(b"{\"type\":\"list\xff\xfe\"}\n").await;
    match client.recv().await {
        HostMessage::Error { message, .. } => assert!(message.contains("UTF-8")),
        other => panic!("expected error, got {:?}", other),
    }

    let mut oversized = vec![b'x'; server::MAX_LINE_BYTES + 16];
    oversized.push(b'\n');
    client.send_bytes(&oversized).await;
    match client.recv().await {
        HostMessage::Error { message, .. } => assert!(message.contains("exceeds")),
        other => panic!("expected error, got {:?}", other),
    }

    client.send(r#"{"type":"list"}"#).await;
    assert_eq!(
        client.recv().await,
        HostMessage::Sessions { sessions: vec![] }
    );
}

#[tokio::test]
async fn test_create_and_echo_over_socket() {
    let server = start().await;
    let mut client = Client::connect(&server.path).await;
    client.hello(None).await;

    let session = client.create().await;
    let write = format!(
        r#"{{"type":"write","session_id":"{}","data":"echo hi\n"}}"#,
        session
    );
    client.send(&write).await;

    assert_eq!(client.recv_output().await, b"echo hi\n".to_vec());
    assert!(server.service.registry().contains(session));
}

#[tokio::test]
async fn test_reconnect_replays_detached_output() {
    let server = start().await;
    let mut client = Client::connect(&server.path).await;
    let host = client.hello(None).await;
    let session = client.create().await;
    drop(client);

    let coordinator = server.service.coordinator();
    wait_until(|| coordinator.is_pending(host)).await;

    let write = server.service.write(session, b"while away");
    assert!(write.is_ok());

    let mut client = Client::connect(&server.path).await;
    assert_eq!(client.hello(Some(host)).await, host);
    assert_eq!(client.recv_output().await, b"while away".to_vec());
    assert!(coordinator.is_connected(host));
    assert_eq!(coordinator.owned_sessions(host), vec![session]);
}

#[tokio::test]
async fn test_shutdown_removes_socket() {
    let server = start().await;
    let mut client = Client::connect(&server.path).await;
    client.hello(None).await;
    client.create().await;

    server.shutdown.send(true).unwrap();
    server.task.await.unwrap().unwrap();
    assert!(!server.path.exists());

    assert_eq!(server.service.shutdown(), 1);
    assert!(server.service.registry().is_empty());
}
