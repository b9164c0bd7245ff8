//! PTY Signal Handling
//!
//! Forced termination of a shell and everything it started. A shell spawned
//! on a pty is a session leader, so its pid doubles as its process group id.

use std::io;

/// Send SIGKILL to the process group led by `pid`
#[cfg(unix)]
pub fn kill_process_group(pid: u32) -> io::Result<()> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    // pgid 0 or 1 would hit our own group or init
    let pgid = i32::try_from(pid)
        .ok()
        .filter(|pgid| *pgid > 1)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid process group {pid}"),
            )
        })?;

    killpg(Pid::from_raw(pgid), Signal::SIGKILL).map_err(io::Error::from)
}

/// Process groups are a Unix concept
#[cfg(not(unix))]
pub fn kill_process_group(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("process groups are not supported on {}", std::env::consts::OS),
    ))
}
