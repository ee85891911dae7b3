//! Lock-free flags read by producers and the pull side on every callback.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::source::AudioSourceKind;

/// Output activity and the selected audio source kind.
///
/// Written by the lifecycle, read from capture and mixing threads.
#[derive(Debug, Default)]
pub struct OutputGate {
    active: AtomicBool,
    kind: AtomicU8,
}

impl OutputGate {
    /// Creates a closed gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the output active with the given audio source kind.
    pub fn open(&self, kind: AudioSourceKind) {
        self.kind.store(kind as u8, Ordering::Release);
        self.active.store(true, Ordering::Release);
    }

    /// Marks the output inactive and resets the kind to silence.
    pub fn close(&self) {
        self.active.store(false, Ordering::Release);
        self.kind
            .store(AudioSourceKind::Silence as u8, Ordering::Release);
    }

    /// Returns `true` while the output is active.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Returns the selected audio source kind.
    pub fn kind(&self) -> AudioSourceKind {
        AudioSourceKind::from_u8(self.kind.load(Ordering::Acquire))
    }

    /// Returns `true` if audio should flow: active and not silence.
    pub fn accepts_audio(&self) -> bool {
        self.is_active() && self.kind() != AudioSourceKind::Silence
    }
}
