//! Unix socket transport
//!
//! Serves the host protocol as JSON lines over a Unix domain socket. Each
//! socket connection is one host connection: it must open with `hello`,
//! after which requests and replies flow one per line. Closing the socket
//! starts the host's grace period.

use std::io;
#[cfg(unix)]
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::service::TerminalService;

/// Longest a single outbound line may take to write
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest accepted request line, newline excluded
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[cfg(not(unix))]
pub async fn serve(
    _service: Arc<TerminalService>,
    socket_path: PathBuf,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    warn!(
        "Unix sockets are unavailable on this platform, not listening on {}",
        socket_path.display()
    );
    let _ = shutdown.changed().await;
    Ok(())
}

/// Accept host connections on `socket_path` until `shutdown` turns true
#[cfg(unix)]
pub async fn serve(
    service: Arc<TerminalService>,
    socket_path: PathBuf,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    let listener = bind(&socket_path)?;
    info!("Listening on {}", socket_path.display());

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            accept = listener.accept() => match accept {
                Ok((stream, _addr)) => {
                    let service = Arc::clone(&service);
                    tokio::spawn(async move {
                        unix::handle_connection(service, stream).await;
                    });
                }
                Err(e) => warn!("Failed to accept host connection: {}", e),
            },
        }
    }

    let _ = std::fs::remove_file(&socket_path);
    info!("Stopped listening on {}", socket_path.display());
    Ok(())
}

/// Bind the socket, replacing a stale one and restricting access to the
/// current user
#[cfg(unix)]
pub fn bind(socket_path: &Path) -> io::Result<tokio::net::UnixListener> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    if let Some(parent) = socket_path.parent() {
        fs::create_dir_all(parent)?;
    }
    if socket_path.exists() {
        fs::remove_file(socket_path)?;
    }

    let listener = tokio::net::UnixListener::bind(socket_path)?;
    let _ = fs::set_permissions(socket_path, fs::Permissions::from_mode(0o600));
    Ok(listener)
}

#[cfg(unix)]
mod unix {
    use std::sync::Arc;

    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::net::UnixStream;
    use tokio::sync::mpsc;

    use super::{MAX_LINE_BYTES, WRITE_TIMEOUT};
    use crate::host::protocol::{HostMessage, HostRequest};
    use crate::host::service::TerminalService;

    pub(super) async fn handle_connection(service: Arc<TerminalService>, stream: UnixStream) {
        let (reader_half, writer_half) = stream.into_split();
        let mut reader = BufReader::new(reader_half);

        let (tx, rx) = mpsc::unbounded_channel::<HostMessage>();
        let writer = tokio::spawn(writer_loop(writer_half, rx));

        let connection = loop {
            match read_request(&mut reader).await {
                Some(Ok(HostRequest::Hello { host_id })) => break service.hello(host_id, tx.clone()),
                Some(Ok(other)) => {
                    debug!("Request before hello: {:?}", other);
                    let _ = tx.send(HostMessage::error(None, "expected hello"));
                }
                Some(Err(message)) => {
                    let _ = tx.send(HostMessage::error(None, message));
                }
                None => {
                    drop(tx);
                    let _ = writer.await;
                    return;
                }
            }
        };

        while let Some(request) = read_request(&mut reader).await {
            match request {
                Ok(request) => {
                    if let Some(reply) = service.handle(connection.host, request).await {
                        if tx.send(reply).is_err() {
                            break;
                        }
                    }
                }
                Err(message) => {
                    let _ = tx.send(HostMessage::error(None, message));
                }
            }
        }

        service.disconnect(connection);
        // Sinks and the event forwarder hold senders too
        writer.abort();
    }

    /// Next request line; `Some(Err)` for a line that is too long, not
    /// UTF-8 or does not parse, `None` at end of stream
    async fn read_request(
        reader: &mut BufReader<OwnedReadHalf>,
    ) -> Option<Result<HostRequest, String>> {
        let limit = MAX_LINE_BYTES as u64 + 1;
        loop {
            let mut line = Vec::new();
            match (&mut *reader).take(limit).read_until(b'\n', &mut line).await {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    debug!("Host connection read failed: {}", e);
                    return None;
                }
            }

            if !line.ends_with(b"\n") && line.len() as u64 == limit {
                skip_line(reader).await;
                return Some(Err(format!(
                    "request line exceeds {} bytes",
                    MAX_LINE_BYTES
                )));
            }
            let Ok(line) = std::str::from_utf8(&line) else {
                return Some(Err("request line is not valid UTF-8".to_string()));
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(HostRequest::from_line(line).map_err(|e| e.to_string()));
        }
    }

    /// Discard input up to and including the next newline
    async fn skip_line(reader: &mut BufReader<OwnedReadHalf>) {
        let mut discarded = Vec::new();
        loop {
            discarded.clear();
            match (&mut *reader)
                .take(MAX_LINE_BYTES as u64)
                .read_until(b'\n', &mut discarded)
                .await
            {
                Ok(0) | Err(_) => return,
                Ok(_) if discarded.ends_with(b"\n") => return,
                Ok(_) => {}
            }
        }
    }

    async fn writer_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<HostMessage>) {
        while let Some(message) = rx.recv().await {
            let line = match message.to_line() {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to encode host message: {}", e);
                    continue;
                }
            };
            let send = async {
                writer.write_all(line.as_bytes()).await?;
                writer.flush().await
            };
            match tokio::time::timeout(WRITE_TIMEOUT, send).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!("Host connection write failed: {}", e);
                    break;
                }
                Err(_) => {
                    warn!("Host connection write timed out");
                    break;
                }
            }
        }
    }
}
