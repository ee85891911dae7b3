//! Adapter for another host source's capture callback.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::source::{AudioFrame, SourceId, TapTarget};

/// Capture callback target bound to one host source.
///
/// The host keeps an `Arc` to the tap for as long as the callback is
/// registered. Once the backing source goes away the host (or the
/// registration handle) calls [`detach`](Self::detach) and later callbacks
/// are dropped.
#[derive(Debug)]
pub struct NamedSourceTap {
    source: SourceId,
    target: TapTarget,
    attached: AtomicBool,
}

impl NamedSourceTap {
    /// Creates an attached tap.
    pub fn new(source: SourceId, target: TapTarget) -> Self {
        Self {
            source,
            target,
            attached: AtomicBool::new(true),
        }
    }

    /// Capture callback. Muted audio is dropped.
    ///
    /// Returns `true` if the frame reached the bridge.
    pub fn on_capture(&self, frame: &AudioFrame<'_>, muted: bool) -> bool {
        if muted || !self.attached.load(Ordering::Acquire) {
            return false;
        }
        self.target.forward(frame)
    }

    /// Marks the backing source as gone.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    /// Returns `true` while the backing source is present.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Returns the id of the backing source.
    pub fn source(&self) -> &SourceId {
        &self.source
    }
}
