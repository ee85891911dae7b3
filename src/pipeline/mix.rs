//! Mix bus destinations and the accumulate-and-clip kernel.

/// Per-bus, per-channel destination buffers handed over by the host mixer.
///
/// The bridge accumulates into whatever the buffers already hold, so a
/// destination must not be cleared between streams mixed on the same bus.
pub trait MixDestination {
    /// Returns the sample buffer for one channel of one mix bus, if the host
    /// provided it.
    fn channel_mut(&mut self, mix: usize, channel: usize) -> Option<&mut [f32]>;
}

/// Owned mix buffers, laid out as `[mix][channel][frame]`.
///
/// Useful for hosts that allocate their own mix buffers and for tests.
///
/// # Example
///
/// ```
/// use branch_output::{MixBuffers, MixDestination};
///
/// let mut buffers = MixBuffers::new(2, 2, 1024);
/// buffers.channel_mut(1, 0).unwrap()[0] = 0.25;
/// assert_eq!(buffers.channel(1, 0)[0], 0.25);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MixBuffers {
    buses: Vec<Vec<Vec<f32>>>,
}

impl MixBuffers {
    /// Creates silent buffers for `mixes` buses of `channels` channels.
    pub fn new(mixes: usize, channels: usize, frames: usize) -> Self {
        Self {
            buses: vec![vec![vec![0.0; frames]; channels]; mixes],
        }
    }

    /// Returns one channel of one bus.
    ///
    /// # Panics
    ///
    /// Panics if the bus or channel does not exist.
    pub fn channel(&self, mix: usize, channel: usize) -> &[f32] {
        &self.buses[mix][channel]
    }

    /// Fills every buffer with `value`.
    pub fn fill(&mut self, value: f32) {
        for bus in &mut self.buses {
            for channel in bus {
                channel.fill(value);
            }
        }
    }

    /// Returns the number of buses.
    pub fn mixes(&self) -> usize {
        self.buses.len()
    }
}

impl MixDestination for MixBuffers {
    fn channel_mut(&mut self, mix: usize, channel: usize) -> Option<&mut [f32]> {
        self.buses
            .get_mut(mix)
            .and_then(|bus| bus.get_mut(channel))
            .map(Vec::as_mut_slice)
    }
}

/// Adds `src` onto `out` sample by sample and hard-clips to `[-1.0, 1.0]`.
#[inline]
pub fn mix_and_clip(out: &mut [f32], src: &[f32]) {
    for (o, &s) in out.iter_mut().zip(src) {
        *o = (*o + s).clamp(-1.0, 1.0);
    }
}
