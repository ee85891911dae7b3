//! Builder pattern for `BranchFilter`.

use std::sync::Arc;

use crate::filter::BranchFilter;
use crate::host::Host;
use crate::output::{OutputLifecycle, OutputTypePolicy};
use crate::settings::{OutputSettings, SettingsStore};
use crate::source::FilterTapSlot;
use crate::{event_callback, BridgeConfig, EventCallback, LifecycleConfig, OutputEvent};

/// Builder for a [`BranchFilter`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use branch_output::host::mock::MockHost;
/// use branch_output::{BranchFilterBuilder, OutputSettings};
///
/// let host = MockHost::new();
/// let filter = BranchFilterBuilder::new("Branch Output 1", Arc::new(host))
///     .settings(OutputSettings {
///         server: "rtmp://live.example.com/app".to_string(),
///         key: "secret".to_string(),
///         ..OutputSettings::default()
///     })
///     .on_event(|e| tracing::info!(?e, "branch output event"))
///     .build();
///
/// filter.video_tick();
/// assert!(filter.is_active());
/// ```
pub struct BranchFilterBuilder {
    name: String,
    host: Arc<dyn Host>,
    settings: Option<OutputSettings>,
    config: LifecycleConfig,
    bridge_config: BridgeConfig,
    policy: Option<Arc<dyn OutputTypePolicy>>,
    event_callback: Option<EventCallback>,
    store: Option<SettingsStore>,
}

impl BranchFilterBuilder {
    /// Creates a builder for a filter named `name` bound to `host`.
    pub fn new(name: impl Into<String>, host: Arc<dyn Host>) -> Self {
        Self {
            name: name.into(),
            host,
            settings: None,
            config: LifecycleConfig::default(),
            bridge_config: BridgeConfig::default(),
            policy: None,
            event_callback: None,
            store: None,
        }
    }

    /// Sets the settings the filter was created with.
    ///
    /// Without settings the filter restores the most recent ones from the
    /// settings store, minus destination and audio source.
    pub fn settings(mut self, settings: OutputSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Set custom lifecycle timing.
    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Set custom audio bridge sizing.
    pub fn bridge_config(mut self, config: BridgeConfig) -> Self {
        self.bridge_config = config;
        self
    }

    /// Replaces the output type selection.
    pub fn output_type_policy(mut self, policy: Arc<dyn OutputTypePolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Set a callback to receive runtime events.
    ///
    /// The callback runs on the thread driving the lifecycle, with the
    /// filter's lifecycle lock held.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(OutputEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Persists settings through `store` and restores from it on creation.
    pub fn settings_store(mut self, store: SettingsStore) -> Self {
        self.store = Some(store);
        self
    }

    fn resolve_settings(&mut self) -> OutputSettings {
        if let Some(settings) = self.settings.take() {
            return settings;
        }
        let Some(store) = &self.store else {
            return OutputSettings::default();
        };
        match store.load_recent() {
            Ok(Some(settings)) => {
                tracing::info!(filter = %self.name, path = %store.path().display(), "restored recent settings");
                settings
            }
            Ok(None) => OutputSettings::default(),
            Err(e) => {
                tracing::warn!(filter = %self.name, error = %e, "failed to load recent settings");
                OutputSettings::default()
            }
        }
    }

    /// Creates the filter. No output starts until the first tick.
    pub fn build(mut self) -> BranchFilter {
        let settings = self.resolve_settings();
        let filter_tap = Arc::new(FilterTapSlot::new());

        let mut lifecycle = OutputLifecycle::new(self.name.clone(), self.host, settings)
            .with_config(self.config)
            .with_bridge_config(self.bridge_config)
            .with_event_callback(self.event_callback)
            .with_filter_tap(Arc::clone(&filter_tap));
        if let Some(policy) = self.policy {
            lifecycle = lifecycle.with_policy(policy);
        }

        tracing::info!(
            filter = %self.name,
            active = lifecycle.filter_active(),
            "branch output created"
        );
        BranchFilter::from_parts(lifecycle, filter_tap, self.store)
    }
}

impl std::fmt::Debug for BranchFilterBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchFilterBuilder")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("config", &self.config)
            .field("bridge_config", &self.bridge_config)
            .field("has_event_callback", &self.event_callback.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;
    use crate::host::ServiceHandle;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedPolicy;

    impl OutputTypePolicy for FixedPolicy {
        fn output_type(&self, _service: &dyn ServiceHandle) -> String {
            "fixed_output".to_string()
        }
    }

    fn saved() -> OutputSettings {
        OutputSettings {
            server: "rtmp://live.example.com/app".to_string(),
            key: "secret".to_string(),
            custom_audio_source: true,
            audio_source: "master_track_2".to_string(),
            video_encoder: "nvenc".to_string(),
            audio_bitrate: 320,
            ..OutputSettings::default()
        }
    }

    #[test]
    fn test_builder_defaults_to_inactive() {
        let filter = BranchFilterBuilder::new("f", Arc::new(MockHost::new())).build();
        assert!(!filter.lifecycle().filter_active());
        assert_eq!(filter.settings(), OutputSettings::default());
    }

    #[test]
    fn test_restores_recent_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("recently.json"));
        store.save(&saved()).unwrap();

        let filter = BranchFilterBuilder::new("f", Arc::new(MockHost::new()))
            .settings_store(store)
            .build();

        let settings = filter.settings();
        assert!(settings.server.is_empty());
        assert!(settings.key.is_empty());
        assert!(!settings.custom_audio_source);
        assert!(settings.audio_source.is_empty());
        assert_eq!(settings.video_encoder, "nvenc");
        assert_eq!(settings.audio_bitrate, 320);
        assert!(!filter.lifecycle().filter_active());
    }

    #[test]
    fn test_explicit_settings_skip_restore() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("recently.json"));
        store.save(&saved()).unwrap();

        let filter = BranchFilterBuilder::new("f", Arc::new(MockHost::new()))
            .settings(saved())
            .settings_store(store)
            .build();
        assert_eq!(filter.settings(), saved());
        assert!(filter.lifecycle().filter_active());
    }

    #[test]
    fn test_custom_policy_and_events() {
        let host = MockHost::new();
        let started = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&started);

        let filter = BranchFilterBuilder::new("f", Arc::new(host.clone()))
            .settings(OutputSettings {
                server: "srt://a:9000".to_string(),
                ..OutputSettings::default()
            })
            .output_type_policy(Arc::new(FixedPolicy))
            .on_event(move |e| {
                if matches!(e, OutputEvent::OutputStarted { .. }) {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build();

        filter.video_tick();
        assert_eq!(host.output_types(), vec!["fixed_output".to_string()]);
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }
}
