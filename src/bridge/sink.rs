//! Output sinks
//!
//! Where a session's output goes while a host is attached.

use std::fmt;
use tokio::sync::mpsc;

use crate::models::SessionId;

/// The receiving end of a sink has gone away
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("output sink closed")]
pub struct SinkClosed;

/// Destination for live session output
pub trait OutputSink: Send + Sync + fmt::Debug {
    /// Deliver a chunk. Must not block.
    fn send(&self, id: SessionId, data: &[u8]) -> Result<(), SinkClosed>;
}

/// One chunk of session output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub session_id: SessionId,
    pub data: Vec<u8>,
}

/// Sink forwarding into an unbounded tokio channel
pub struct ChannelSink<T = OutputChunk> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> ChannelSink<T>
where
    T: From<OutputChunk> + Send + 'static,
{
    pub fn new(tx: mpsc::UnboundedSender<T>) -> Self {
        Self { tx }
    }
}

impl ChannelSink<OutputChunk> {
    /// Sink plus the receiver it feeds
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutputChunk>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl<T> fmt::Debug for ChannelSink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSink")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<T> OutputSink for ChannelSink<T>
where
    T: From<OutputChunk> + Send + 'static,
{
    fn send(&self, id: SessionId, data: &[u8]) -> Result<(), SinkClosed> {
        let chunk = OutputChunk {
            session_id: id,
            data: data.to_vec(),
        };
        self.tx.send(T::from(chunk)).map_err(|_| SinkClosed)
    }
}
