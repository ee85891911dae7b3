//! Mock audio source for testing without a host.

use std::time::Duration;

use crate::config::MAX_AUDIO_CHANNELS;
use crate::source::AudioFrame;

/// Generates synthetic planar `f32` audio and slices it into callback-sized
/// frames.
///
/// # Example
///
/// ```
/// use branch_output::source::MockSource;
///
/// let mut mock = MockSource::new(48_000, 2);
/// mock.generate_silence(10);
/// mock.generate_sine(440.0, 10);
///
/// assert_eq!(mock.frame_count(), 960);
/// let frames: Vec<_> = mock.chunks(480).collect();
/// assert_eq!(frames.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MockSource {
    sample_rate: u32,
    planes: Vec<Vec<f32>>,
    absent: [bool; MAX_AUDIO_CHANNELS],
}

impl MockSource {
    /// Creates an empty source. `channels` is clamped to [`MAX_AUDIO_CHANNELS`].
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            planes: vec![Vec::new(); channels.min(MAX_AUDIO_CHANNELS)],
            absent: [false; MAX_AUDIO_CHANNELS],
        }
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the channel count.
    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// Marks a channel as omitted by the callback; its plane is reported as
    /// `None` in generated frames.
    #[must_use]
    pub fn without_channel(mut self, channel: usize) -> Self {
        if let Some(flag) = self.absent.get_mut(channel) {
            *flag = true;
        }
        self
    }

    /// Appends silence for the given duration in milliseconds.
    pub fn generate_silence(&mut self, duration_ms: u64) {
        let frames = self.frames_for_duration(duration_ms);
        self.generate_constant(0.0, frames);
    }

    /// Appends `frames` frames of a constant value on every channel.
    pub fn generate_constant(&mut self, value: f32, frames: usize) {
        for plane in &mut self.planes {
            plane.extend(std::iter::repeat(value).take(frames));
        }
    }

    /// Appends a ramp continuing from the current length, so every sample of
    /// a channel is distinct. Channel `n` is offset by `n`.
    pub fn generate_ramp(&mut self, frames: usize) {
        let start = self.frame_count();
        for (ch, plane) in self.planes.iter_mut().enumerate() {
            plane.extend((start..start + frames).map(|i| ramp_value(ch, i)));
        }
    }

    /// Appends a sine wave on every channel.
    pub fn generate_sine(&mut self, frequency: f64, duration_ms: u64) {
        let frames = self.frames_for_duration(duration_ms);
        let sample_rate = f64::from(self.sample_rate);
        for plane in &mut self.planes {
            plane.extend((0..frames).map(|i| {
                let t = i as f64 / sample_rate;
                (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
            }));
        }
    }

    /// Returns the generated frames per channel.
    pub fn frame_count(&self) -> usize {
        self.planes.first().map_or(0, Vec::len)
    }

    /// Returns the duration of the generated audio.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count() as f64 / f64::from(self.sample_rate))
    }

    /// Returns one channel's samples.
    pub fn plane(&self, channel: usize) -> &[f32] {
        self.planes.get(channel).map_or(&[], Vec::as_slice)
    }

    /// Returns a frame covering `len` frames from `start`, clipped to the
    /// generated length. The timestamp is derived from the sample rate.
    pub fn frame(&self, start: usize, len: usize) -> AudioFrame<'_> {
        let start = start.min(self.frame_count());
        let end = (start + len).min(self.frame_count());
        let mut frame = AudioFrame::new(
            u32::try_from(end - start).unwrap_or(u32::MAX),
            self.timestamp_at(start),
        );
        for (ch, plane) in self.planes.iter().enumerate() {
            if !self.absent[ch] {
                frame = frame.with_plane(ch, &plane[start..end]);
            }
        }
        frame
    }

    /// Slices the generated audio into consecutive frames of `size` frames.
    /// The last frame may be shorter.
    pub fn chunks(&self, size: usize) -> impl Iterator<Item = AudioFrame<'_>> + '_ {
        let size = size.max(1);
        (0..self.frame_count())
            .step_by(size)
            .map(move |start| self.frame(start, size))
    }

    /// Slices the generated audio into consecutive frames of the given
    /// sizes, cycling through `sizes` until the audio runs out.
    pub fn chunks_varied<'a>(
        &'a self,
        sizes: &'a [usize],
    ) -> impl Iterator<Item = AudioFrame<'a>> + 'a {
        let total = self.frame_count();
        let usable = if sizes.iter().any(|&n| n > 0) {
            sizes.len()
        } else {
            0
        };
        let mut start = 0;
        sizes
            .iter()
            .copied()
            .take(usable)
            .filter(|&n| n > 0)
            .cycle()
            .map_while(move |n| {
                if start >= total {
                    return None;
                }
                let frame = self.frame(start, n);
                start += n;
                Some(frame)
            })
    }

    fn frames_for_duration(&self, duration_ms: u64) -> usize {
        (u64::from(self.sample_rate) * duration_ms / 1000) as usize
    }

    fn timestamp_at(&self, frame: usize) -> u64 {
        frame as u64 * 1_000_000_000 / u64::from(self.sample_rate.max(1))
    }
}

/// Value of sample `index` on `channel` in [`MockSource::generate_ramp`].
pub fn ramp_value(channel: usize, index: usize) -> f32 {
    ((index % 100_000) as f32 + channel as f32) / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_length() {
        let mut mock = MockSource::new(48_000, 2);
        mock.generate_silence(100);
        assert_eq!(mock.frame_count(), 4800);
        assert!(mock.plane(1).iter().all(|&s| s == 0.0));
        assert_eq!(mock.duration(), Duration::from_millis(100));
    }

    #[test]
    fn test_sine_has_both_signs() {
        let mut mock = MockSource::new(48_000, 1);
        mock.generate_sine(440.0, 10);
        assert!(mock.plane(0).iter().any(|&s| s > 0.0));
        assert!(mock.plane(0).iter().any(|&s| s < 0.0));
    }

    #[test]
    fn test_ramp_is_distinct() {
        let mut mock = MockSource::new(48_000, 2);
        mock.generate_ramp(10);
        mock.generate_ramp(10);
        assert_eq!(mock.plane(0)[15], ramp_value(0, 15));
        assert_eq!(mock.plane(1)[3], ramp_value(1, 3));
    }

    #[test]
    fn test_chunks_cover_everything() {
        let mut mock = MockSource::new(48_000, 1);
        mock.generate_ramp(1000);
        let total: u32 = mock.chunks(300).map(|f| f.frames).sum();
        assert_eq!(total, 1000);
        assert_eq!(mock.chunks(300).count(), 4);
    }

    #[test]
    fn test_chunks_varied() {
        let mut mock = MockSource::new(48_000, 1);
        mock.generate_ramp(100);
        let sizes: Vec<u32> = mock.chunks_varied(&[30, 50]).map(|f| f.frames).collect();
        assert_eq!(sizes, vec![30, 50, 20]);
    }

    #[test]
    fn test_absent_channel() {
        let mut mock = MockSource::new(48_000, 2).without_channel(0);
        mock.generate_constant(0.5, 8);
        let frame = mock.frame(0, 8);
        assert!(frame.planes[0].is_none());
        assert_eq!(frame.planes[1].map(<[f32]>::len), Some(8));
    }

    #[test]
    fn test_timestamps_advance() {
        let mut mock = MockSource::new(48_000, 1);
        mock.generate_silence(20);
        let stamps: Vec<u64> = mock.chunks(480).map(|f| f.timestamp).collect();
        assert_eq!(stamps, vec![0, 10_000_000]);
    }
}
