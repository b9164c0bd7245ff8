//! PTY Streams
//!
//! Bridges the blocking reader and writer of a pty master to async code.
//! Each native process gets one reader thread forwarding output into a
//! tokio channel and one writer thread draining a std channel into the pty.

use std::io::{Read, Write};
use std::sync::mpsc::{channel, Sender as StdSender};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Read buffer size for pty output
pub const READ_BUFFER_SIZE: usize = 8192;

const MAX_CONSECUTIVE_READ_ERRORS: u32 = 5;
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Spawn the reader thread. It exits on EOF, on a closed receiver, or after
/// repeated read errors; dropping `output` then closes the channel.
pub fn spawn_reader_thread(
    name: String,
    mut reader: Box<dyn Read + Send>,
    output: UnboundedSender<Vec<u8>>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new().name(name).spawn(move || {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        let mut consecutive_errors = 0;

        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    debug!("PTY read EOF");
                    break;
                }
                Ok(n) => {
                    consecutive_errors = 0;
                    if output.send(buf[..n].to_vec()).is_err() {
                        debug!("PTY read: receiver dropped, stopping reader thread");
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    // Linux reports EIO once the slave side is gone
                    consecutive_errors += 1;
                    debug!(
                        "PTY read error ({}): {} (attempt {}/{})",
                        e.kind(),
                        e,
                        consecutive_errors,
                        MAX_CONSECUTIVE_READ_ERRORS
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS
                        || e.raw_os_error() == Some(5)
                    {
                        break;
                    }
                    thread::sleep(Duration::from_millis(50));
                }
            }
        }
        debug!("PTY reader thread exiting");
    })
}

/// Spawn the writer thread and return the sender feeding it.
///
/// Writes are fire-and-forget for the caller. A write that cannot be
/// completed is reported on `failures` and ends the thread, since a broken
/// stdin does not heal.
pub fn spawn_writer_thread(
    name: String,
    mut writer: Box<dyn Write + Send>,
    failures: UnboundedSender<String>,
) -> std::io::Result<StdSender<Vec<u8>>> {
    let (input_tx, input_rx) = channel::<Vec<u8>>();

    thread::Builder::new().name(name).spawn(move || {
        while let Ok(data) = input_rx.recv() {
            let mut attempts = 0;

            let outcome = loop {
                match writer.write_all(&data).and_then(|_| writer.flush()) {
                    Ok(()) => break Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e)
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            && attempts < MAX_WRITE_ATTEMPTS =>
                    {
                        attempts += 1;
                        thread::sleep(Duration::from_millis(10));
                    }
                    Err(e) => break Err(e),
                }
            };

            if let Err(e) = outcome {
                warn!("PTY write error ({}): {}", e.kind(), e);
                let _ = failures.send(e.to_string());
                break;
            }
        }
        debug!("PTY writer thread exiting");
    })?;

    Ok(input_tx)
}
