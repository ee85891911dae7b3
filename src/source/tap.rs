//! Shared forwarding path of every production adapter.

use std::sync::Arc;

use crate::pipeline::{AudioBridge, OutputGate, PushOutcome};
use crate::source::AudioFrame;

/// Where an adapter pushes its audio: one bridge behind one gate.
#[derive(Debug, Clone)]
pub struct TapTarget {
    bridge: Arc<AudioBridge>,
    gate: Arc<OutputGate>,
}

impl TapTarget {
    /// Creates a target.
    pub fn new(bridge: Arc<AudioBridge>, gate: Arc<OutputGate>) -> Self {
        Self { bridge, gate }
    }

    /// Pushes `frame` into the bridge unless the output is inactive, the
    /// source kind is silence, or the frame is empty.
    ///
    /// Returns `true` if the frame reached the bridge.
    pub fn forward(&self, frame: &AudioFrame<'_>) -> bool {
        if !self.gate.accepts_audio() || frame.frames == 0 {
            return false;
        }
        !matches!(
            self.bridge
                .push(frame.frames, frame.timestamp, &frame.planes),
            PushOutcome::Ignored | PushOutcome::Rejected
        )
    }

    /// Returns the bridge.
    pub fn bridge(&self) -> &Arc<AudioBridge> {
        &self.bridge
    }
}
