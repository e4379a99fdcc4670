//! Bounded history of the most recent sample chunks.
//!
//! The waveform is drawn from this window. The first accepted chunk fixes the
//! chunk length for the lifetime of the buffer; anything that disagrees with
//! it is dropped so a malformed frame can never corrupt the render.

use std::collections::VecDeque;

use super::decode::SampleVector;

/// Number of chunks kept for display.
pub const HISTORY_SIZE: usize = 20;

/// Result of a push, reported for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    LengthMismatch { expected: usize, actual: usize },
}

/// FIFO of at most `capacity` equal-length chunks.
#[derive(Debug)]
pub struct HistoryBuffer {
    chunks: VecDeque<SampleVector>,
    chunk_len: Option<usize>,
    capacity: usize,
}

/// Read-only view handed to the renderer.
#[derive(Debug, Clone, Copy)]
pub struct HistorySnapshot<'a> {
    pub chunks: &'a VecDeque<SampleVector>,
    pub chunk_len: Option<usize>,
    pub capacity: usize,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            chunks: VecDeque::with_capacity(capacity + 1),
            chunk_len: None,
            capacity,
        }
    }

    /// Appends a chunk, evicting the oldest one once over capacity.
    pub fn push(&mut self, chunk: SampleVector) -> PushOutcome {
        let expected = *self.chunk_len.get_or_insert(chunk.len());
        if chunk.len() != expected {
            return PushOutcome::LengthMismatch {
                expected,
                actual: chunk.len(),
            };
        }

        self.chunks.push_back(chunk);
        if self.chunks.len() > self.capacity {
            self.chunks.pop_front();
        }
        PushOutcome::Accepted
    }

    pub fn snapshot(&self) -> HistorySnapshot<'_> {
        HistorySnapshot {
            chunks: &self.chunks,
            chunk_len: self.chunk_len,
            capacity: self.capacity,
        }
    }

    pub fn chunk_len(&self) -> Option<usize> {
        self.chunk_len
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl HistorySnapshot<'_> {
    /// Sample at logical position `index` across the whole window, if that
    /// chunk has arrived yet.
    pub fn sample(&self, index: usize) -> Option<f32> {
        let chunk_len = self.chunk_len?;
        let chunk = self.chunks.get(index / chunk_len)?;
        chunk.get(index % chunk_len).copied()
    }

    /// Number of logical sample positions in a full window.
    pub fn total_positions(&self) -> usize {
        self.chunk_len.unwrap_or(0) * self.capacity
    }
}
