//! Header record describing one buffered chunk of planar audio.

use crate::config::MAX_AUDIO_CHANNELS;

/// Metadata for one push worth of planar `f32` audio held in the chunk store.
///
/// A chunk only carries payload for the channels that were present in the
/// push. Its payload is laid out channel-major: every present channel
/// contributes `frame_count` consecutive samples, in channel order.
///
/// `consumed_offset` counts frames already drained from the front of the
/// chunk. A live chunk always has `consumed_offset < frame_count`; a chunk
/// that reaches `frame_count` is evicted immediately.
///
/// # Example
///
/// ```
/// use branch_output::ChunkHeader;
///
/// let mut header = ChunkHeader::new(480, 1_000);
/// header.add_channel(0);
/// header.add_channel(2);
///
/// assert_eq!(header.channel_count, 2);
/// assert_eq!(header.channel_offset(0), Some(0));
/// assert_eq!(header.channel_offset(1), None);
/// assert_eq!(header.channel_offset(2), Some(480));
/// assert_eq!(header.payload_len(), 960);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Frames carried by the chunk.
    pub frame_count: u32,
    /// Host timestamp of the first frame, in nanoseconds.
    pub timestamp: u64,
    /// Number of channels with a payload.
    pub channel_count: u8,
    /// Sample offset of each host channel inside the payload, `None` when absent.
    pub channel_offsets: [Option<u32>; MAX_AUDIO_CHANNELS],
    /// Frames already drained from the front of the chunk.
    pub consumed_offset: u32,
}

impl ChunkHeader {
    /// Creates a header with no channels.
    pub fn new(frame_count: u32, timestamp: u64) -> Self {
        Self {
            frame_count,
            timestamp,
            channel_count: 0,
            channel_offsets: [None; MAX_AUDIO_CHANNELS],
            consumed_offset: 0,
        }
    }

    /// Appends a host channel to the payload layout.
    ///
    /// Channels must be added in ascending order. Indices at or beyond
    /// [`MAX_AUDIO_CHANNELS`] are ignored.
    pub fn add_channel(&mut self, channel: usize) {
        let Some(slot) = self.channel_offsets.get_mut(channel) else {
            return;
        };
        debug_assert!(slot.is_none(), "channel {channel} added twice");
        *slot = Some(u32::from(self.channel_count) * self.frame_count);
        self.channel_count += 1;
    }

    /// Returns the payload offset of a host channel, if present.
    pub fn channel_offset(&self, channel: usize) -> Option<usize> {
        self.channel_offsets
            .get(channel)
            .copied()
            .flatten()
            .map(|offset| offset as usize)
    }

    /// Returns the number of payload samples (all present channels).
    pub fn payload_len(&self) -> usize {
        usize::from(self.channel_count) * self.frame_count as usize
    }

    /// Returns the frames not yet drained.
    pub fn remaining(&self) -> u32 {
        self.frame_count.saturating_sub(self.consumed_offset)
    }
}
