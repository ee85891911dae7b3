//! Borrowed planar audio frame as delivered by host callbacks.

use crate::config::MAX_AUDIO_CHANNELS;

/// One callback's worth of planar `f32` audio.
///
/// `planes[ch]` is `None` for channels the callback did not supply.
#[derive(Debug, Clone, Copy)]
pub struct AudioFrame<'a> {
    /// Frames per plane.
    pub frames: u32,
    /// Host timestamp of the first frame, in nanoseconds.
    pub timestamp: u64,
    /// Per-channel sample planes.
    pub planes: [Option<&'a [f32]>; MAX_AUDIO_CHANNELS],
}

impl<'a> AudioFrame<'a> {
    /// Creates a frame with no channel planes.
    pub fn new(frames: u32, timestamp: u64) -> Self {
        Self {
            frames,
            timestamp,
            planes: [None; MAX_AUDIO_CHANNELS],
        }
    }

    /// Creates a frame from consecutive planes starting at channel 0.
    ///
    /// The frame count is the shortest plane's length. Planes beyond
    /// [`MAX_AUDIO_CHANNELS`] are ignored.
    pub fn from_planes(timestamp: u64, planes: &[&'a [f32]]) -> Self {
        let frames = planes.iter().map(|p| p.len()).min().unwrap_or(0);
        let mut frame = Self::new(u32::try_from(frames).unwrap_or(u32::MAX), timestamp);
        for (slot, &plane) in frame.planes.iter_mut().zip(planes) {
            *slot = Some(plane);
        }
        frame
    }

    /// Sets the plane for one channel. Out-of-range channels are ignored.
    #[must_use]
    pub fn with_plane(mut self, channel: usize, plane: &'a [f32]) -> Self {
        if let Some(slot) = self.planes.get_mut(channel) {
            *slot = Some(plane);
        }
        self
    }

    /// Returns `true` if the frame carries no audio.
    pub fn is_empty(&self) -> bool {
        self.frames == 0 || self.planes.iter().all(Option::is_none)
    }
}
