//! Fixed-cadence pull entry point for the host mixing engine.

use std::sync::Arc;

use crate::pipeline::bridge::{AudioBridge, DrainOutcome};
use crate::pipeline::gate::OutputGate;
use crate::pipeline::mix::MixDestination;

/// Result of one pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullOutcome {
    /// Timestamp reported back to the mixer; always the input timestamp.
    pub timestamp: u64,
    /// Frames mixed into the destinations; 0 means silence.
    pub frames_written: usize,
}

impl PullOutcome {
    fn silence(timestamp: u64) -> Self {
        Self {
            timestamp,
            frames_written: 0,
        }
    }

    /// Returns `true` if nothing was written.
    pub fn is_silence(&self) -> bool {
        self.frames_written == 0
    }
}

/// Serves one output period per call from an [`AudioBridge`].
///
/// Handed to the host when the pull-side audio endpoint is opened. The host
/// calls [`pull`](Self::pull) from its mixing thread; the call takes the
/// bridge lock once and never waits on anything else.
#[derive(Debug)]
pub struct PullConsumer {
    bridge: Arc<AudioBridge>,
    gate: Arc<OutputGate>,
    output_frames: usize,
}

impl PullConsumer {
    /// Creates a consumer draining `output_frames` frames per pull.
    pub fn new(bridge: Arc<AudioBridge>, gate: Arc<OutputGate>, output_frames: usize) -> Self {
        Self {
            bridge,
            gate,
            output_frames,
        }
    }

    /// Mixes one period into the buses selected by `mixers`, or leaves the
    /// destinations untouched.
    ///
    /// Silence is produced while the output is inactive, while the audio
    /// source is `Silence`, before any audio has arrived, and whenever the
    /// bridge holds less than one period.
    pub fn pull(
        &self,
        start_ts: u64,
        mixers: u32,
        destination: &mut dyn MixDestination,
    ) -> PullOutcome {
        if !self.gate.accepts_audio() || !self.bridge.has_received() {
            return PullOutcome::silence(start_ts);
        }

        match self.bridge.drain(self.output_frames, mixers, destination) {
            DrainOutcome::Drained { frames } => PullOutcome {
                timestamp: start_ts,
                frames_written: frames,
            },
            DrainOutcome::Starved { .. } => PullOutcome::silence(start_ts),
        }
    }

    /// Returns the frames served per pull.
    pub fn output_frames(&self) -> usize {
        self.output_frames
    }

    /// Returns the bridge this consumer drains.
    pub fn bridge(&self) -> &Arc<AudioBridge> {
        &self.bridge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::bridge::create_audio_bridge;
    use crate::pipeline::mix::MixBuffers;
    use crate::source::AudioSourceKind;
    use crate::BridgeConfig;

    fn consumer(frames: usize) -> (PullConsumer, Arc<AudioBridge>, Arc<OutputGate>) {
        let (bridge, _) = create_audio_bridge(2, 48_000, BridgeConfig::default(), 8);
        let gate = Arc::new(OutputGate::new());
        let pull = PullConsumer::new(Arc::clone(&bridge), Arc::clone(&gate), frames);
        (pull, bridge, gate)
    }

    #[test]
    fn test_inactive_is_silence() {
        let (pull, bridge, _gate) = consumer(4);
        bridge.push(8, 0, &[Some(&[0.5; 8]), None]);

        let mut mixes = MixBuffers::new(1, 2, 4);
        let outcome = pull.pull(99, 0b1, &mut mixes);
        assert_eq!(outcome.timestamp, 99);
        assert!(outcome.is_silence());
        assert_eq!(bridge.buffered_frames(), 8);
    }

    #[test]
    fn test_silence_kind_is_silence() {
        let (pull, bridge, gate) = consumer(4);
        gate.open(AudioSourceKind::Silence);
        bridge.push(8, 0, &[Some(&[0.5; 8]), None]);

        let mut mixes = MixBuffers::new(1, 2, 4);
        assert!(pull.pull(0, 0b1, &mut mixes).is_silence());
    }

    #[test]
    fn test_nothing_received_is_silence() {
        let (pull, bridge, gate) = consumer(4);
        gate.open(AudioSourceKind::FilterTap);

        let mut mixes = MixBuffers::new(1, 2, 4);
        assert!(pull.pull(0, 0b1, &mut mixes).is_silence());
        // No drain happened, so no starvation was counted.
        assert_eq!(bridge.starvation_streak(), 0);
    }

    #[test]
    fn test_active_drains_one_period() {
        let (pull, bridge, gate) = consumer(4);
        gate.open(AudioSourceKind::FilterTap);
        bridge.push(6, 0, &[Some(&[0.5; 6]), Some(&[-0.5; 6])]);

        let mut mixes = MixBuffers::new(1, 2, 4);
        let outcome = pull.pull(1234, 0b1, &mut mixes);
        assert_eq!(outcome.timestamp, 1234);
        assert_eq!(outcome.frames_written, 4);
        assert_eq!(mixes.channel(0, 1), &[-0.5; 4]);
        assert_eq!(bridge.buffered_frames(), 2);

        // Two frames left: starved, untouched.
        let mut mixes = MixBuffers::new(1, 2, 4);
        assert!(pull.pull(0, 0b1, &mut mixes).is_silence());
        assert_eq!(mixes.channel(0, 0), &[0.0; 4]);
    }
}
