//! The branch output filter instance.
//!
//! A [`BranchFilter`] is what the host holds for one filter attached to one
//! source. The host calls into it from three places:
//!
//! - the audio thread, with the filter's own audio ([`BranchFilter::filter_audio`]),
//! - the video thread, once per rendered frame ([`BranchFilter::video_tick`]),
//! - the UI thread, when the user edits the properties ([`BranchFilter::update`]).
//!
//! The audio entry point never takes the lifecycle lock.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::error::OutputError;
use crate::output::{OutputLifecycle, OutputState, StartOutcome, TickAction};
use crate::settings::{OutputSettings, SettingsStore};
use crate::source::{AudioFrame, AudioSourceKind, FilterTapSlot};

/// One branch output attached to one upstream source.
///
/// Created by [`BranchFilterBuilder`](crate::BranchFilterBuilder).
pub struct BranchFilter {
    name: String,
    lifecycle: Mutex<OutputLifecycle>,
    filter_tap: Arc<FilterTapSlot>,
    store: Option<SettingsStore>,
}

impl BranchFilter {
    pub(crate) fn from_parts(
        lifecycle: OutputLifecycle,
        filter_tap: Arc<FilterTapSlot>,
        store: Option<SettingsStore>,
    ) -> Self {
        Self {
            name: lifecycle.name().to_string(),
            lifecycle: Mutex::new(lifecycle),
            filter_tap,
            store,
        }
    }

    /// Returns the filter instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feeds the filter's own audio to the running output.
    ///
    /// Returns `true` if the frame was buffered. The frame is dropped when
    /// no output is running or the output uses another audio source.
    pub fn filter_audio(&self, frame: &AudioFrame<'_>) -> bool {
        self.filter_tap.on_filter_audio(frame)
    }

    /// Runs the lifecycle once. Called by the host on every video frame.
    pub fn video_tick(&self) {
        self.tick();
    }

    /// Runs the lifecycle once and reports what it did.
    pub fn tick(&self) -> TickAction {
        self.lifecycle.lock().tick()
    }

    /// Applies new settings and saves them as the most recent ones.
    ///
    /// A running output restarts with them on a later tick.
    pub fn update(&self, settings: OutputSettings) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&settings) {
                tracing::warn!(filter = %self.name, error = %e, "failed to save settings");
            }
        }
        self.lifecycle.lock().update(settings);
    }

    /// Stops any running output and starts it again if a server is set.
    pub fn restart_output(&self) -> Result<StartOutcome, OutputError> {
        self.lifecycle.lock().restart_output()
    }

    /// Stops the output. Returns `true` if one was running.
    pub fn stop_output(&self) -> bool {
        self.lifecycle.lock().stop_output()
    }

    /// Returns the observable lifecycle state.
    pub fn state(&self) -> OutputState {
        self.lifecycle.lock().state()
    }

    /// Returns `true` while an output is started.
    pub fn is_active(&self) -> bool {
        self.lifecycle.lock().is_active()
    }

    /// Returns a copy of the current settings.
    pub fn settings(&self) -> OutputSettings {
        self.lifecycle.lock().settings().clone()
    }

    /// Returns the audio source feeding the running output.
    pub fn audio_source_kind(&self) -> AudioSourceKind {
        self.lifecycle.lock().audio_source_kind()
    }

    /// Locks the lifecycle for inspection.
    ///
    /// Event callbacks run with this lock held and must not call back into
    /// the filter.
    pub fn lifecycle(&self) -> MutexGuard<'_, OutputLifecycle> {
        self.lifecycle.lock()
    }

    /// Returns the settings store, if the filter persists its settings.
    pub fn settings_store(&self) -> Option<&SettingsStore> {
        self.store.as_ref()
    }

    /// Stops the output and releases everything.
    pub fn destroy(self) {
        tracing::debug!(filter = %self.name, "destroying branch output");
        drop(self);
    }
}

impl std::fmt::Debug for BranchFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchFilter")
            .field("name", &self.name)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Drop for BranchFilter {
    fn drop(&mut self) {
        self.lifecycle.get_mut().stop_output();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;
    use crate::source::MockSource;
    use crate::BranchFilterBuilder;

    fn configured() -> OutputSettings {
        OutputSettings {
            server: "rtmp://live.example.com/app".to_string(),
            ..OutputSettings::default()
        }
    }

    #[test]
    fn test_filter_audio_dropped_while_idle() {
        let host = MockHost::new();
        let filter = BranchFilterBuilder::new("f", Arc::new(host))
            .settings(configured())
            .build();

        let mut source = MockSource::new(48_000, 2);
        source.generate_constant(0.5, 480);
        assert!(!filter.filter_audio(&source.frame(0, 480)));
    }

    #[test]
    fn test_filter_audio_reaches_bridge() {
        let host = MockHost::new();
        let filter = BranchFilterBuilder::new("f", Arc::new(host.clone()))
            .settings(configured())
            .build();

        filter.video_tick();
        assert!(filter.is_active());

        let mut source = MockSource::new(48_000, 2);
        source.generate_constant(0.5, 480);
        assert!(filter.filter_audio(&source.frame(0, 480)));

        let bridge = filter.lifecycle().bridge().unwrap();
        assert_eq!(bridge.buffered_frames(), 480);
    }

    #[test]
    fn test_update_saves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("recently.json"));
        let filter = BranchFilterBuilder::new("f", Arc::new(MockHost::new()))
            .settings(OutputSettings::default())
            .settings_store(store.clone())
            .build();

        filter.update(configured());
        assert_eq!(store.load().unwrap(), Some(configured()));
        assert_eq!(filter.lifecycle().stored_revision(), 1);
        assert!(filter.lifecycle().filter_active());
    }

    #[test]
    fn test_drop_stops_output() {
        let host = MockHost::new();
        let filter = BranchFilterBuilder::new("f", Arc::new(host.clone()))
            .settings(configured())
            .build();
        filter.video_tick();
        assert_eq!(host.upstream_source().unwrap().showing(), 1);

        filter.destroy();
        assert_eq!(host.upstream_source().unwrap().showing(), 0);
        assert!(host.pull_consumer().is_none());
    }
}
