//! Adapter for one master mix bus of the host's audio engine.

use crate::source::{AudioFrame, TapTarget};

/// Raw audio callback target for master mix bus `mix_index`.
///
/// Master audio carries no mute state; every callback is forwarded.
#[derive(Debug)]
pub struct MasterBusTap {
    mix_index: usize,
    target: TapTarget,
}

impl MasterBusTap {
    /// Creates a tap for the zero-based mix bus.
    pub fn new(mix_index: usize, target: TapTarget) -> Self {
        Self { mix_index, target }
    }

    /// Raw audio callback. Audio for other buses is ignored.
    ///
    /// Returns `true` if the frame reached the bridge.
    pub fn on_master_audio(&self, mix_index: usize, frame: &AudioFrame<'_>) -> bool {
        if mix_index != self.mix_index {
            return false;
        }
        self.target.forward(frame)
    }

    /// Returns the subscribed mix bus.
    pub fn mix_index(&self) -> usize {
        self.mix_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{create_audio_bridge, OutputGate};
    use crate::source::AudioSourceKind;
    use crate::BridgeConfig;
    use std::sync::Arc;

    #[test]
    fn test_forwards_own_bus_only() {
        let (bridge, _) = create_audio_bridge(1, 48_000, BridgeConfig::default(), 4);
        let gate = Arc::new(OutputGate::new());
        gate.open(AudioSourceKind::MasterBus);
        let tap = MasterBusTap::new(2, TapTarget::new(Arc::clone(&bridge), gate));
        let plane = [0.4f32; 12];
        let frame = AudioFrame::from_planes(0, &[&plane]);

        assert!(!tap.on_master_audio(0, &frame));
        assert!(tap.on_master_audio(2, &frame));
        assert_eq!(tap.mix_index(), 2);
        assert_eq!(bridge.buffered_frames(), 12);
    }
}
