//! Bounded output buffer
//!
//! Holds output a session produced while no sink was attached. When full,
//! the oldest bytes are discarded first so a reattaching host always sees
//! the most recent screenful.

use std::collections::VecDeque;

/// Byte queue with a hard capacity and oldest-first eviction
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    data: VecDeque<u8>,
    capacity: usize,
    evicted_bytes: u64,
}

impl OutputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: VecDeque::new(),
            capacity: capacity.max(1),
            evicted_bytes: 0,
        }
    }

    /// Append a chunk, evicting from the front to stay within capacity.
    /// Returns the number of bytes evicted by this call.
    pub fn push(&mut self, chunk: &[u8]) -> usize {
        // Only the tail of an oversized chunk can survive
        let kept = if chunk.len() > self.capacity {
            &chunk[chunk.len() - self.capacity..]
        } else {
            chunk
        };
        let mut evicted = chunk.len() - kept.len();

        let overflow = (self.data.len() + kept.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.data.drain(..overflow);
            evicted += overflow;
        }

        self.data.extend(kept);
        self.evicted_bytes += evicted as u64;
        evicted
    }

    /// Take everything buffered, leaving the buffer empty
    pub fn drain(&mut self) -> Vec<u8> {
        self.data.drain(..).collect()
    }

    /// Copy of the buffered bytes
    pub fn contents(&self) -> Vec<u8> {
        self.data.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total bytes discarded since creation
    pub fn evicted_bytes(&self) -> u64 {
        self.evicted_bytes
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}
