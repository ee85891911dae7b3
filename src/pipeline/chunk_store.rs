//! Double-ended chunk store backing the audio bridge.
//!
//! Chunks live in two parallel queues: a sample arena holding every payload
//! back to back, and an index of [`ChunkHeader`] records. The front record's
//! payload always starts at arena index 0, so peeking and popping never
//! search. Partial consumption patches the front record in place.
//!
//! The store is not synchronized; the bridge holds it under its lock.

use std::collections::VecDeque;

use crate::ChunkHeader;

/// Borrowed view of the front chunk.
///
/// The payload may be split across the arena's wrap point, so it is exposed
/// as two slices that together hold `header.payload_len()` samples.
#[derive(Debug, Clone, Copy)]
pub struct ChunkView<'a> {
    /// The chunk's header as currently stored.
    pub header: ChunkHeader,
    head: &'a [f32],
    tail: &'a [f32],
}

impl ChunkView<'_> {
    /// Copies the whole payload into `out`, replacing its contents.
    ///
    /// Does not allocate when `out` already has enough capacity.
    pub fn copy_into(&self, out: &mut Vec<f32>) {
        out.clear();
        out.extend_from_slice(self.head);
        out.extend_from_slice(self.tail);
    }

    /// Returns the number of payload samples in the view.
    pub fn len(&self) -> usize {
        self.head.len() + self.tail.len()
    }

    /// Returns `true` if the chunk carries no payload.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// FIFO of variable-length audio chunks.
#[derive(Debug, Default)]
pub struct ChunkStore {
    samples: VecDeque<f32>,
    records: VecDeque<ChunkHeader>,
}

impl ChunkStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk.
    ///
    /// `planes` holds one slice per present channel, in the order they were
    /// added to `header`; each must contain `header.frame_count` samples.
    pub fn push_back(&mut self, header: ChunkHeader, planes: &[&[f32]]) {
        debug_assert_eq!(planes.len(), usize::from(header.channel_count));
        let frames = header.frame_count as usize;
        for plane in planes {
            debug_assert!(plane.len() >= frames);
            self.samples.extend(plane.iter().take(frames));
        }
        self.records.push_back(header);
    }

    /// Returns a view of the front chunk without removing it.
    pub fn peek_front(&self) -> Option<ChunkView<'_>> {
        let header = *self.records.front()?;
        let len = header.payload_len().min(self.samples.len());
        let (first, second) = self.samples.as_slices();
        let (head, tail) = if len <= first.len() {
            (&first[..len], &second[..0])
        } else {
            (first, &second[..len - first.len()])
        };
        Some(ChunkView { header, head, tail })
    }

    /// Removes the front chunk and its payload.
    pub fn pop_front(&mut self) -> Option<ChunkHeader> {
        let header = self.records.pop_front()?;
        let len = header.payload_len().min(self.samples.len());
        self.samples.drain(..len);
        Some(header)
    }

    /// Rewrites the consumed offset of the chunk at `index`.
    ///
    /// Out-of-range indices and offsets are caller bugs: they panic in debug
    /// builds and are ignored or clamped in release builds.
    pub fn overwrite_at(&mut self, index: usize, consumed_offset: u32) {
        debug_assert!(index < self.records.len(), "chunk index {index} out of range");
        let Some(record) = self.records.get_mut(index) else {
            return;
        };
        debug_assert!(
            consumed_offset < record.frame_count,
            "consumed offset {consumed_offset} would exhaust a live chunk"
        );
        record.consumed_offset = consumed_offset.min(record.frame_count.saturating_sub(1));
    }

    /// Drops every chunk and releases the arena's memory.
    pub fn clear(&mut self) {
        self.samples = VecDeque::new();
        self.records = VecDeque::new();
    }

    /// Returns the number of live chunks.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no chunks are stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the number of payload samples held in the arena.
    pub fn sample_len(&self) -> usize {
        self.samples.len()
    }

    /// Returns the frames not yet drained, summed over all chunks.
    pub fn remaining_frames(&self) -> usize {
        self.records.iter().map(|r| r.remaining() as usize).sum()
    }
}
