//! I/O bridge between session processes and the UI host
//!
//! Each open session has a channel holding its attached sink (if any), a
//! bounded buffer of output nobody has seen yet, and the line tracker that
//! feeds command history. Output is forwarded live while a sink is
//! attached and buffered otherwise; attaching replays the buffer first.
//! Replay and live forwarding run under the same per-session lock, so bytes
//! are never reordered across an attach.

pub mod buffer;
pub mod sink;

pub use buffer::OutputBuffer;
pub use sink::{ChannelSink, OutputChunk, OutputSink, SinkClosed};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::history::{HistoryBuffer, InputLineTracker};
use crate::models::{SessionId, TerminalSize};
use crate::pty::ProcessSupervisor;

/// Default per-session buffer size: 64 KiB
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

#[derive(Debug)]
struct SessionChannel {
    buffer: OutputBuffer,
    sink: Option<Arc<dyn OutputSink>>,
    tracker: InputLineTracker,
    delivered_bytes: u64,
}

impl SessionChannel {
    /// Forward to the sink or buffer. A failing sink is dropped and the
    /// chunk kept for the next attach.
    fn deliver(&mut self, id: SessionId, chunk: &[u8]) {
        if let Some(sink) = &self.sink {
            match sink.send(id, chunk) {
                Ok(()) => {
                    self.delivered_bytes += chunk.len() as u64;
                    return;
                }
                Err(SinkClosed) => {
                    debug!("Sink for session {} closed, buffering output", id);
                    self.sink = None;
                }
            }
        }

        let evicted = self.buffer.push(chunk);
        if evicted > 0 {
            trace!("Session {} buffer full, evicted {} bytes", id, evicted);
        }
    }
}

/// Per-session output routing and input forwarding
pub struct IoBridge {
    channels: Mutex<HashMap<SessionId, Arc<Mutex<SessionChannel>>>>,
    capacity: usize,
    supervisor: Arc<ProcessSupervisor>,
    history: Arc<HistoryBuffer>,
}

impl std::fmt::Debug for IoBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoBridge")
            .field("channels", &self.channels().len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl IoBridge {
    pub fn new(
        supervisor: Arc<ProcessSupervisor>,
        history: Arc<HistoryBuffer>,
        capacity: usize,
    ) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity,
            supervisor,
            history,
        }
    }

    /// Open the channel of a new session. Returns `false` if already open.
    pub fn open(&self, id: SessionId) -> bool {
        let mut channels = self.channels();
        if channels.contains_key(&id) {
            return false;
        }
        channels.insert(
            id,
            Arc::new(Mutex::new(SessionChannel {
                buffer: OutputBuffer::new(self.capacity),
                sink: None,
                tracker: InputLineTracker::new(),
                delivered_bytes: 0,
            })),
        );
        true
    }

    /// Close a channel, discarding undelivered output
    pub fn close(&self, id: SessionId) -> bool {
        self.channels().remove(&id).is_some()
    }

    pub fn is_open(&self, id: SessionId) -> bool {
        self.channels().contains_key(&id)
    }

    /// Attach a sink: replay buffered output into it, then forward live.
    ///
    /// Returns the number of replayed bytes. If the sink rejects the replay
    /// the output stays buffered and the sink is not attached.
    pub fn attach(&self, id: SessionId, sink: Arc<dyn OutputSink>) -> Result<usize> {
        let channel = self.channel(id)?;
        let mut channel = lock(&channel);

        let pending = channel.buffer.drain();
        if !pending.is_empty() && sink.send(id, &pending).is_err() {
            channel.buffer.push(&pending);
            channel.sink = None;
            debug!("Sink rejected replay for session {}", id);
            return Ok(0);
        }

        channel.delivered_bytes += pending.len() as u64;
        channel.sink = Some(sink);
        debug!("Attached session {} ({} bytes replayed)", id, pending.len());
        Ok(pending.len())
    }

    /// Detach the sink; further output is buffered
    pub fn detach(&self, id: SessionId) -> Result<()> {
        let channel = self.channel(id)?;
        lock(&channel).sink = None;
        Ok(())
    }

    pub fn is_attached(&self, id: SessionId) -> bool {
        self.channel(id)
            .map(|channel| lock(&channel).sink.is_some())
            .unwrap_or(false)
    }

    /// Route a chunk of process output
    pub fn push(&self, id: SessionId, chunk: &[u8]) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        let channel = self.channel(id)?;
        lock(&channel).deliver(id, chunk);
        Ok(())
    }

    /// Forward user input to the process and record submitted lines
    pub fn write_user_input(&self, id: SessionId, data: &[u8]) -> Result<()> {
        self.supervisor.write(id, data)?;

        if let Ok(channel) = self.channel(id) {
            let lines = lock(&channel).tracker.feed(data);
            for line in lines {
                self.history.push(line);
            }
        }
        Ok(())
    }

    /// Resize the session's pty. Unknown or exited sessions are ignored.
    pub fn resize(&self, id: SessionId, size: TerminalSize) -> Result<()> {
        match self.supervisor.resize(id, size) {
            Err(Error::SessionNotFound { .. }) => {
                debug!("Ignoring resize of unknown session {}", id);
                Ok(())
            }
            other => other,
        }
    }

    /// Bytes waiting for a sink
    pub fn pending_bytes(&self, id: SessionId) -> usize {
        self.channel(id)
            .map(|channel| lock(&channel).buffer.len())
            .unwrap_or(0)
    }

    /// Copy of the undelivered output
    pub fn pending_output(&self, id: SessionId) -> Vec<u8> {
        self.channel(id)
            .map(|channel| lock(&channel).buffer.contents())
            .unwrap_or_default()
    }

    /// Bytes dropped from the session's buffer so far
    pub fn evicted_bytes(&self, id: SessionId) -> u64 {
        self.channel(id)
            .map(|channel| lock(&channel).buffer.evicted_bytes())
            .unwrap_or(0)
    }

    /// Bytes handed to sinks so far
    pub fn delivered_bytes(&self, id: SessionId) -> u64 {
        self.channel(id)
            .map(|channel| lock(&channel).delivered_bytes)
            .unwrap_or(0)
    }

    pub fn history(&self) -> &Arc<HistoryBuffer> {
        &self.history
    }

    pub fn buffer_capacity(&self) -> usize {
        self.capacity
    }

    fn channel(&self, id: SessionId) -> Result<Arc<Mutex<SessionChannel>>> {
        self.channels()
            .get(&id)
            .cloned()
            .ok_or(Error::SessionNotFound { id })
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<Mutex<SessionChannel>>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock(channel: &Mutex<SessionChannel>) -> MutexGuard<'_, SessionChannel> {
    channel.lock().unwrap_or_else(PoisonError::into_inner)
}
