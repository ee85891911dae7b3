//! Adapter for audio passing through the filter itself.
//!
//! The host delivers this audio to the filter on every audio callback,
//! whether or not an output is running. The slot holds a target only while
//! the filter's own audio is the selected source.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::host::TapRegistration;
use crate::source::{AudioFrame, TapTarget};

/// Holds the filter tap's target while it is registered.
#[derive(Debug, Default)]
pub struct FilterTapSlot {
    target: Mutex<Option<TapTarget>>,
}

impl FilterTapSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `target` and returns the registration that removes it.
    pub fn install(self: &Arc<Self>, target: TapTarget) -> FilterTapRegistration {
        *self.target.lock() = Some(target);
        FilterTapRegistration {
            slot: Arc::clone(self),
        }
    }

    /// Forwards the filter's audio when a target is installed.
    ///
    /// Returns `true` if the frame reached the bridge.
    pub fn on_filter_audio(&self, frame: &AudioFrame<'_>) -> bool {
        match self.target.lock().as_ref() {
            Some(target) => target.forward(frame),
            None => false,
        }
    }

    /// Returns `true` while a target is installed.
    pub fn is_installed(&self) -> bool {
        self.target.lock().is_some()
    }
}

/// Clears the slot when dropped.
#[derive(Debug)]
pub struct FilterTapRegistration {
    slot: Arc<FilterTapSlot>,
}

impl TapRegistration for FilterTapRegistration {
    fn describe(&self) -> String {
        "filter audio".to_string()
    }
}

impl Drop for FilterTapRegistration {
    fn drop(&mut self) {
        self.slot.target.lock().take();
    }
}
