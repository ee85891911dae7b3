//! Output lifecycle state machine.
//!
//! The lifecycle owns one filter's network output. Once per host tick it
//! compares what is running against the settings, the filter's visibility
//! toggle and the upstream source, and starts, restarts or stops the output.
//!
//! Every start tears down whatever is left first and acquires host objects
//! in a fixed order. A failed step drops what was acquired so far in reverse
//! order and leaves the lifecycle idle; the next attempt waits for the
//! configured backoff.
//!
//! Settings updates never touch a running output directly. They bump a
//! revision counter that the tick compares against the revision the output
//! was started with.

use std::sync::Arc;

use crate::config::{BridgeConfig, LifecycleConfig};
use crate::error::OutputError;
use crate::event::{EventCallback, OutputEvent, RestartReason, StopReason};
use crate::host::{AudioOutputSpec, Host, TapRegistration};
use crate::output::availability::AvailabilityMonitor;
use crate::output::protocol::{DefaultOutputTypePolicy, OutputTypePolicy};
use crate::output::resources::OutputResources;
use crate::pipeline::{
    create_audio_bridge, AudioBridge, BridgeNotice, NoticeReceiver, OutputGate, PullConsumer,
};
use crate::source::{
    AudioSourceKind, AudioSourceSelection, FilterTapSlot, MasterBusTap, NamedSourceTap,
    TapTarget, MASTER_TRACK_PREFIX,
};
use crate::OutputSettings;

/// Service type used for every output.
pub const SERVICE_KIND: &str = "rtmp_custom";

/// Track the audio encoder is bound to.
pub const AUDIO_TRACK: usize = 0;

/// Observable state of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    /// No output is running.
    Idle,
    /// The output was started and has not yet proven itself streaming past
    /// the connect timeout.
    Connecting,
    /// The output is streaming and monitored.
    Active,
    /// The output was stopped during the current tick cycle.
    Stopped,
}

/// What a tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Nothing to do.
    Unchanged,
    /// A start was attempted from idle.
    Start,
    /// The output was torn down and started again.
    Restart(RestartReason),
    /// The output was stopped.
    Stop(StopReason),
}

/// Why a start attempt did not start anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The host is still initializing.
    HostNotReady,
    /// The filter's visibility toggle is off.
    SourceDisabled,
    /// The host has no video running.
    NoVideo,
    /// Zero width, height or frame rate.
    InvalidVideo,
    /// No server is configured.
    NoServer,
}

/// Result of a start attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The output is streaming.
    Started,
    /// Preconditions were not met; nothing was acquired.
    Skipped(SkipReason),
}

/// Rounds a dimension up to the next even number.
pub fn round_up_even(value: u32) -> u32 {
    value.saturating_add(value & 1)
}

/// Start, stop and restart logic for one branch output.
pub struct OutputLifecycle {
    name: String,
    host: Arc<dyn Host>,
    config: LifecycleConfig,
    bridge_config: BridgeConfig,
    policy: Arc<dyn OutputTypePolicy>,
    on_event: Option<EventCallback>,
    filter_tap: Arc<FilterTapSlot>,
    gate: Arc<OutputGate>,
    settings: OutputSettings,
    filter_active: bool,
    is_active: bool,
    stopped: bool,
    connect_attempt_started_at: Option<u64>,
    stored_revision: u64,
    active_revision: u64,
    width: u32,
    height: u32,
    audio_source_kind: AudioSourceKind,
    availability: AvailabilityMonitor,
    next_start_allowed_at: Option<u64>,
    resources: OutputResources,
    notices: Option<NoticeReceiver>,
}

impl OutputLifecycle {
    /// Creates an idle lifecycle. It becomes active once `settings` names a
    /// server.
    pub fn new(name: impl Into<String>, host: Arc<dyn Host>, settings: OutputSettings) -> Self {
        let config = LifecycleConfig::default();
        Self {
            name: name.into(),
            host,
            availability: AvailabilityMonitor::new(config.availability_check_interval),
            config,
            bridge_config: BridgeConfig::default(),
            policy: Arc::new(DefaultOutputTypePolicy),
            on_event: None,
            filter_tap: Arc::new(FilterTapSlot::new()),
            gate: Arc::new(OutputGate::new()),
            filter_active: settings.has_server(),
            settings,
            is_active: false,
            stopped: false,
            connect_attempt_started_at: None,
            stored_revision: 0,
            active_revision: 0,
            width: 0,
            height: 0,
            audio_source_kind: AudioSourceKind::Silence,
            next_start_allowed_at: None,
            resources: OutputResources::default(),
            notices: None,
        }
    }

    /// Replaces the timing configuration.
    #[must_use]
    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.availability = AvailabilityMonitor::new(config.availability_check_interval);
        self.config = config;
        self
    }

    /// Replaces the bridge configuration used for future starts.
    #[must_use]
    pub fn with_bridge_config(mut self, config: BridgeConfig) -> Self {
        self.bridge_config = config;
        self
    }

    /// Replaces the output type policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn OutputTypePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the event callback.
    #[must_use]
    pub fn with_event_callback(mut self, callback: Option<EventCallback>) -> Self {
        self.on_event = callback;
        self
    }

    /// Shares the filter tap slot the filter's own audio is routed through.
    #[must_use]
    pub fn with_filter_tap(mut self, slot: Arc<FilterTapSlot>) -> Self {
        self.filter_tap = slot;
        self
    }

    /// Evaluates the transitions once. Called on every host video tick.
    pub fn tick(&mut self) -> TickAction {
        self.stopped = false;
        self.drain_notices();

        // Nothing starts before a server has been configured once.
        if !self.filter_active {
            return TickAction::Unchanged;
        }

        let enabled = self.host.filter_enabled();

        if !self.is_active {
            if !enabled || !self.start_allowed() {
                return TickAction::Unchanged;
            }
            let _ = self.restart_output();
            return TickAction::Start;
        }

        if !enabled {
            self.stop_with(StopReason::SourceDisabled);
            return TickAction::Stop(StopReason::SourceDisabled);
        }

        if !self.connect_timed_out() {
            return TickAction::Unchanged;
        }

        if !self.resources.output_active() {
            tracing::info!(filter = %self.name, "attempting to reactivate the stream output");
            self.emit(OutputEvent::RestartScheduled {
                reason: RestartReason::ConnectTimeout,
            });
            let _ = self.start_output();
            return TickAction::Restart(RestartReason::ConnectTimeout);
        }

        if self.active_revision < self.stored_revision {
            tracing::info!(
                filter = %self.name,
                active = self.active_revision,
                stored = self.stored_revision,
                "settings change detected, restarting"
            );
            self.emit(OutputEvent::RestartScheduled {
                reason: RestartReason::SettingsChanged,
            });
            let _ = self.restart_output();
            return TickAction::Restart(RestartReason::SettingsChanged);
        }

        let Some(upstream) = self.host.upstream() else {
            self.stop_with(StopReason::Unreachable);
            return TickAction::Stop(StopReason::Unreachable);
        };
        let width = round_up_even(upstream.width());
        let height = round_up_even(upstream.height());

        if width == 0 || height == 0 {
            self.stop_with(StopReason::ZeroGeometry);
            return TickAction::Stop(StopReason::ZeroGeometry);
        }

        let now = self.host.now_ns();
        let host = Arc::clone(&self.host);
        if !self
            .availability
            .check(now, || host.is_reachable(upstream.as_ref()))
        {
            self.stop_with(StopReason::Unreachable);
            return TickAction::Stop(StopReason::Unreachable);
        }

        if (width, height) != (self.width, self.height) {
            tracing::info!(
                filter = %self.name,
                from = %format_args!("{}x{}", self.width, self.height),
                to = %format_args!("{width}x{height}"),
                "source resolution changed, restarting"
            );
            self.emit(OutputEvent::RestartScheduled {
                reason: RestartReason::GeometryChanged,
            });
            let _ = self.start_output();
            return TickAction::Restart(RestartReason::GeometryChanged);
        }

        TickAction::Unchanged
    }

    /// Stores new settings. A running output picks them up on a later tick.
    pub fn update(&mut self, settings: OutputSettings) {
        self.stored_revision += 1;
        if settings.has_server() {
            self.filter_active = true;
        }
        self.settings = settings;
        tracing::debug!(
            filter = %self.name,
            revision = self.stored_revision,
            "settings updated"
        );
    }

    /// Tears down any running output and starts a new one from the current
    /// settings.
    ///
    /// On failure everything acquired by the attempt is released and the
    /// next tick-driven attempt is deferred by the start backoff.
    pub fn start_output(&mut self) -> Result<StartOutcome, OutputError> {
        self.stop_with(StopReason::Requested);

        match self.try_start() {
            Ok(StartOutcome::Started) => {
                self.next_start_allowed_at = None;
                Ok(StartOutcome::Started)
            }
            Ok(StartOutcome::Skipped(reason)) => {
                tracing::debug!(filter = %self.name, ?reason, "start skipped");
                Ok(StartOutcome::Skipped(reason))
            }
            Err(err) => {
                self.resources.release_all();
                self.notices = None;
                self.connect_attempt_started_at = None;
                self.audio_source_kind = AudioSourceKind::Silence;
                let backoff =
                    u64::try_from(self.config.start_retry_backoff.as_nanos()).unwrap_or(u64::MAX);
                self.next_start_allowed_at = Some(self.host.now_ns().saturating_add(backoff));
                tracing::error!(filter = %self.name, error = %err, "starting stream output failed");
                self.emit(OutputEvent::OutputStartFailed {
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Stops the output if one is running, then starts one if a server is
    /// configured.
    pub fn restart_output(&mut self) -> Result<StartOutcome, OutputError> {
        if self.is_active {
            self.stop_with(StopReason::Requested);
        }
        if !self.settings.has_server() {
            return Ok(StartOutcome::Skipped(SkipReason::NoServer));
        }
        self.start_output()
    }

    /// Stops the output and releases every host object. Idempotent.
    ///
    /// Returns `true` if a running output was stopped.
    pub fn stop_output(&mut self) -> bool {
        self.stop_with(StopReason::Requested)
    }

    fn stop_with(&mut self, reason: StopReason) -> bool {
        self.connect_attempt_started_at = None;
        self.gate.close();
        self.resources.release_all();
        self.drain_notices();
        self.notices = None;
        self.audio_source_kind = AudioSourceKind::Silence;
        self.availability.reset();

        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.stopped = true;
        tracing::info!(filter = %self.name, %reason, "stopping stream output succeeded");
        self.emit(OutputEvent::OutputStopped { reason });
        true
    }

    fn try_start(&mut self) -> Result<StartOutcome, OutputError> {
        if !self.host.initialized() {
            return Ok(StartOutcome::Skipped(SkipReason::HostNotReady));
        }
        if !self.host.filter_enabled() {
            return Ok(StartOutcome::Skipped(SkipReason::SourceDisabled));
        }

        let upstream = self.host.upstream().ok_or(OutputError::UpstreamMissing)?;
        let Some(video) = self.host.video_info() else {
            return Ok(StartOutcome::Skipped(SkipReason::NoVideo));
        };

        self.width = round_up_even(upstream.width());
        self.height = round_up_even(upstream.height());
        if self.width == 0 || self.height == 0 || !video.has_frame_rate() {
            return Ok(StartOutcome::Skipped(SkipReason::InvalidVideo));
        }
        let video = video.with_size(self.width, self.height);

        self.active_revision = self.stored_revision;
        let blob = self.settings.to_blob();

        // Locals drop in reverse declaration order, so any `?` below
        // releases what was acquired so far in reverse acquisition order.
        let service = self
            .host
            .create_service(SERVICE_KIND, &self.name, &blob)
            .map_err(OutputError::ServiceCreation)?;

        let output_type = self.policy.output_type(service.as_ref());
        let mut output = self
            .host
            .create_output(&output_type, &self.name, &blob, service.as_ref())
            .map_err(|source| OutputError::OutputCreation {
                kind: output_type.clone(),
                source,
            })?;
        output.set_reconnect_settings(
            self.config.output_max_retries,
            self.config.output_retry_delay,
        );
        self.connect_attempt_started_at = Some(self.host.now_ns());

        let view = self
            .host
            .create_view(upstream.as_ref(), &video)
            .map_err(OutputError::ViewCreation)?;

        let audio = self.host.audio_info().ok_or(OutputError::AudioUnavailable)?;
        let (bridge, notices) = create_audio_bridge(
            audio.channels,
            audio.sample_rate,
            self.bridge_config,
            self.config.notice_queue_capacity,
        );
        let spec = AudioOutputSpec {
            name: self.name.clone(),
            sample_rate: audio.sample_rate,
            channels: bridge.channels(),
        };

        let selection = AudioSourceSelection::from_settings(&self.settings);
        let target = TapTarget::new(Arc::clone(&bridge), Arc::clone(&self.gate));
        let (kind, audio_tap) = self.register_audio_tap(selection, &spec, target)?;
        if kind == AudioSourceKind::Silence {
            tracing::info!(filter = %self.name, "audio is disabled");
        }

        let consumer = Arc::new(PullConsumer::new(
            Arc::clone(&bridge),
            Arc::clone(&self.gate),
            self.bridge_config.output_frames,
        ));
        let audio_output = self
            .host
            .open_audio_output(&spec, consumer)
            .map_err(OutputError::AudioOutputOpen)?;

        let video_encoder = self
            .host
            .create_video_encoder(&self.settings.video_encoder, &self.name, &blob, view.as_ref())
            .map_err(|source| OutputError::VideoEncoderCreation {
                id: self.settings.video_encoder.clone(),
                source,
            })?;
        output.set_video_encoder(video_encoder.as_ref());

        let audio_encoder = self
            .host
            .create_audio_encoder(
                &self.settings.audio_encoder,
                &self.name,
                &self.settings.audio_encoder_blob(),
                AUDIO_TRACK,
                audio_output.as_ref(),
            )
            .map_err(|source| OutputError::AudioEncoderCreation {
                id: self.settings.audio_encoder.clone(),
                source,
            })?;
        output.set_audio_encoder(audio_encoder.as_ref(), AUDIO_TRACK);

        if !output.start() {
            return Err(OutputError::StartRejected);
        }

        upstream.inc_showing();
        self.resources.service = Some(service);
        self.resources.output = Some(output);
        self.resources.output_type = Some(output_type.clone());
        self.resources.view = Some(view);
        self.resources.audio_tap = audio_tap;
        self.resources.audio_output = Some(audio_output);
        self.resources.video_encoder = Some(video_encoder);
        self.resources.audio_encoder = Some(audio_encoder);
        self.resources.showing = Some(upstream);
        self.resources.bridge = Some(bridge);
        self.notices = Some(notices);

        self.audio_source_kind = kind;
        self.gate.open(kind);
        self.is_active = true;

        tracing::info!(
            filter = %self.name,
            output_type = %output_type,
            width = self.width,
            height = self.height,
            audio = %kind,
            "starting stream output succeeded"
        );
        self.emit(OutputEvent::OutputStarted {
            output_type,
            width: self.width,
            height: self.height,
            audio_source: kind,
            revision: self.active_revision,
        });
        Ok(StartOutcome::Started)
    }

    fn register_audio_tap(
        &self,
        selection: AudioSourceSelection,
        spec: &AudioOutputSpec,
        target: TapTarget,
    ) -> Result<(AudioSourceKind, Option<Box<dyn TapRegistration>>), OutputError> {
        match selection {
            AudioSourceSelection::Silence => Ok((AudioSourceKind::Silence, None)),
            AudioSourceSelection::Filter => {
                tracing::info!(filter = %self.name, "using filter audio as the audio source");
                let registration: Box<dyn TapRegistration> =
                    Box::new(self.filter_tap.install(target));
                Ok((AudioSourceKind::FilterTap, Some(registration)))
            }
            AudioSourceSelection::MasterTrack { mix_index } => {
                tracing::info!(filter = %self.name, track = mix_index + 1, "using master track");
                let tap = Arc::new(MasterBusTap::new(mix_index, target));
                let registration = self
                    .host
                    .add_master_audio_callback(spec, tap)
                    .map_err(|source| OutputError::AudioSourceRegistration {
                        source_id: format!("{MASTER_TRACK_PREFIX}{}", mix_index + 1),
                        source,
                    })?;
                Ok((AudioSourceKind::MasterBus, Some(registration)))
            }
            AudioSourceSelection::Named(id) => {
                let Some(source_name) = self.host.find_source(&id) else {
                    tracing::warn!(filter = %self.name, source = %id, "audio source not found");
                    return Ok((AudioSourceKind::Silence, None));
                };
                tracing::info!(filter = %self.name, source = %source_name, "using audio source");
                let tap = Arc::new(NamedSourceTap::new(id.clone(), target));
                let registration = self.host.add_capture_callback(&id, tap).map_err(|source| {
                    OutputError::AudioSourceRegistration {
                        source_id: id.to_string(),
                        source,
                    }
                })?;
                Ok((AudioSourceKind::NamedSource, Some(registration)))
            }
        }
    }

    fn drain_notices(&mut self) {
        let Some(notices) = self.notices.as_mut() else {
            return;
        };
        while let Some(notice) = notices.try_recv() {
            let event = match notice {
                BridgeNotice::Overflow {
                    dropped_frames,
                    incoming_frames,
                } => {
                    tracing::warn!(
                        filter = %self.name,
                        dropped_frames,
                        incoming_frames,
                        "audio buffer is full"
                    );
                    OutputEvent::BufferOverflow {
                        dropped_frames,
                        incoming_frames,
                    }
                }
                BridgeNotice::Starved {
                    available,
                    requested,
                } => {
                    tracing::debug!(filter = %self.name, available, requested, "waiting for frames");
                    OutputEvent::AudioStarved {
                        available,
                        requested,
                    }
                }
                BridgeNotice::ScratchExpanded {
                    from_bytes,
                    to_bytes,
                } => {
                    tracing::info!(filter = %self.name, from_bytes, to_bytes, "scratch buffer expanded");
                    OutputEvent::ScratchExpanded {
                        from_bytes,
                        to_bytes,
                    }
                }
            };
            if let Some(callback) = &self.on_event {
                callback(event);
            }
        }
    }

    fn emit(&self, event: OutputEvent) {
        if let Some(callback) = &self.on_event {
            callback(event);
        }
    }

    fn connect_timed_out(&self) -> bool {
        let timeout = u64::try_from(self.config.connect_timeout.as_nanos()).unwrap_or(u64::MAX);
        self.connect_attempt_started_at
            .is_some_and(|at| self.host.now_ns().saturating_sub(at) > timeout)
    }

    fn start_allowed(&self) -> bool {
        self.next_start_allowed_at
            .map_or(true, |at| self.host.now_ns() >= at)
    }

    /// Returns the observable state.
    pub fn state(&self) -> OutputState {
        if self.is_active {
            if self.connect_timed_out() && self.resources.output_active() {
                OutputState::Active
            } else {
                OutputState::Connecting
            }
        } else if self.stopped {
            OutputState::Stopped
        } else {
            OutputState::Idle
        }
    }

    /// Returns the filter instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current settings.
    pub fn settings(&self) -> &OutputSettings {
        &self.settings
    }

    /// Returns `true` once a server has been configured.
    pub fn filter_active(&self) -> bool {
        self.filter_active
    }

    /// Returns `true` while an output is started.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the settings revision, bumped on every update.
    pub fn stored_revision(&self) -> u64 {
        self.stored_revision
    }

    /// Returns the revision the running output was started with.
    pub fn active_revision(&self) -> u64 {
        self.active_revision
    }

    /// Returns the even-rounded size captured at the last start.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns the adapter feeding the running output.
    pub fn audio_source_kind(&self) -> AudioSourceKind {
        self.audio_source_kind
    }

    /// Returns the type of the running network output.
    pub fn output_type(&self) -> Option<&str> {
        self.resources.output_type()
    }

    /// Returns the audio bridge of the running output.
    pub fn bridge(&self) -> Option<Arc<AudioBridge>> {
        self.resources.bridge().cloned()
    }

    /// Returns the gate shared with the audio path.
    pub fn gate(&self) -> &Arc<OutputGate> {
        &self.gate
    }

    /// Returns the filter tap slot.
    pub fn filter_tap(&self) -> &Arc<FilterTapSlot> {
        &self.filter_tap
    }

    /// Returns the lifecycle configuration.
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }
}

impl std::fmt::Debug for OutputLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputLifecycle")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("stored_revision", &self.stored_revision)
            .field("active_revision", &self.active_revision)
            .field("resources", &self.resources)
            .finish_non_exhaustive()
    }
}

impl Drop for OutputLifecycle {
    fn drop(&mut self) {
        self.stop_with(StopReason::Requested);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::{JournalEntry, MockHost, Resource};
    use crate::output::protocol::{FTL_OUTPUT, MPEGTS_OUTPUT, RTMP_OUTPUT};
    use parking_lot::Mutex;
    use std::time::Duration;

    fn settings(server: &str) -> OutputSettings {
        OutputSettings {
            server: server.to_string(),
            ..OutputSettings::default()
        }
    }

    fn lifecycle(host: &MockHost) -> OutputLifecycle {
        OutputLifecycle::new(
            "Branch 1",
            Arc::new(host.clone()),
            settings("rtmp://live.example.com/app"),
        )
    }

    fn recorder() -> (EventCallback, Arc<Mutex<Vec<OutputEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let callback: EventCallback = Arc::new(move |event| sink.lock().push(event));
        (callback, events)
    }

    fn past_timeout(host: &MockHost) {
        host.advance(Duration::from_secs(11));
    }

    #[test]
    fn test_round_up_even() {
        assert_eq!(round_up_even(0), 0);
        assert_eq!(round_up_even(1279), 1280);
        assert_eq!(round_up_even(720), 720);
        assert_eq!(round_up_even(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_inactive_without_server() {
        let host = MockHost::new();
        let mut lc = OutputLifecycle::new("f", Arc::new(host.clone()), OutputSettings::default());
        assert!(!lc.filter_active());
        assert_eq!(lc.tick(), TickAction::Unchanged);
        assert!(host.journal().is_empty());
    }

    #[test]
    fn test_update_with_server_activates() {
        let host = MockHost::new();
        let mut lc = OutputLifecycle::new("f", Arc::new(host.clone()), OutputSettings::default());
        lc.update(settings("rtmp://a/b"));
        assert!(lc.filter_active());
        assert_eq!(lc.stored_revision(), 1);
        assert_eq!(lc.tick(), TickAction::Start);
        assert!(lc.is_active());
    }

    #[test]
    fn test_first_tick_starts() {
        let host = MockHost::new();
        let (callback, events) = recorder();
        let mut lc = lifecycle(&host).with_event_callback(Some(callback));

        assert_eq!(lc.tick(), TickAction::Start);
        assert!(lc.is_active());
        assert_eq!(lc.state(), OutputState::Connecting);
        assert_eq!(lc.dimensions(), (1280, 720));
        assert_eq!(lc.output_type(), Some(RTMP_OUTPUT));
        assert_eq!(lc.audio_source_kind(), AudioSourceKind::FilterTap);
        assert!(lc.gate().accepts_audio());
        assert_eq!(host.upstream_source().unwrap().showing(), 1);
        assert_eq!(host.reconnect_settings(), Some((7, Duration::from_secs(1))));

        let (blob, track) = host.audio_encoder_settings().unwrap();
        assert_eq!(blob["bitrate"], 160);
        assert_eq!(track, 0);

        assert!(matches!(
            events.lock().as_slice(),
            [OutputEvent::OutputStarted { width: 1280, height: 720, .. }]
        ));
    }

    #[test]
    fn test_acquisition_order() {
        let host = MockHost::new();
        let mut lc = lifecycle(&host);
        lc.tick();
        assert_eq!(
            host.journal(),
            vec![
                JournalEntry::Acquired(Resource::Service),
                JournalEntry::Acquired(Resource::Output),
                JournalEntry::Acquired(Resource::View),
                JournalEntry::Acquired(Resource::AudioOutput),
                JournalEntry::Acquired(Resource::VideoEncoder),
                JournalEntry::Acquired(Resource::AudioEncoder),
                JournalEntry::StreamStarted,
                JournalEntry::ShowingIncremented,
            ]
        );
    }

    #[test]
    fn test_stop_releases_in_reverse() {
        let host = MockHost::new();
        let mut lc = lifecycle(&host);
        lc.tick();
        host.clear_journal();

        assert!(lc.stop_output());
        assert_eq!(
            host.journal(),
            vec![
                JournalEntry::ShowingDecremented,
                JournalEntry::StreamStopped,
                JournalEntry::Released(Resource::AudioEncoder),
                JournalEntry::Released(Resource::VideoEncoder),
                JournalEntry::Released(Resource::AudioOutput),
                JournalEntry::Released(Resource::View),
                JournalEntry::Released(Resource::Output),
                JournalEntry::Released(Resource::Service),
            ]
        );
        assert_eq!(lc.state(), OutputState::Stopped);
        assert!(!lc.filter_tap().is_installed());
        assert!(lc.bridge().is_none());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let host = MockHost::new();
        let (callback, events) = recorder();
        let mut lc = lifecycle(&host).with_event_callback(Some(callback));

        assert!(!lc.stop_output());
        lc.tick();
        assert!(lc.stop_output());
        host.clear_journal();
        assert!(!lc.stop_output());
        assert!(!lc.stop_output());

        assert!(host.journal().is_empty());
        assert_eq!(host.upstream_source().unwrap().showing(), 0);
        let stops = events
            .lock()
            .iter()
            .filter(|e| matches!(e, OutputEvent::OutputStopped { .. }))
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn test_failure_releases_partial_acquisition() {
        let host = MockHost::new();
        host.fail_at(Some(Resource::VideoEncoder));
        let (callback, events) = recorder();
        let mut lc = lifecycle(&host).with_event_callback(Some(callback));

        let err = lc.start_output().unwrap_err();
        assert!(matches!(err, OutputError::VideoEncoderCreation { .. }));
        assert!(!lc.is_active());
        assert_eq!(lc.state(), OutputState::Idle);
        assert_eq!(
            host.journal(),
            vec![
                JournalEntry::Acquired(Resource::Service),
                JournalEntry::Acquired(Resource::Output),
                JournalEntry::Acquired(Resource::View),
                JournalEntry::Acquired(Resource::AudioOutput),
                JournalEntry::Released(Resource::AudioOutput),
                JournalEntry::Released(Resource::View),
                JournalEntry::Released(Resource::Output),
                JournalEntry::Released(Resource::Service),
            ]
        );
        assert!(!lc.filter_tap().is_installed());
        assert!(matches!(
            events.lock().as_slice(),
            [OutputEvent::OutputStartFailed { .. }]
        ));
    }

    #[test]
    fn test_start_rejected_releases_everything() {
        let host = MockHost::new();
        host.set_start_result(false);
        let mut lc = lifecycle(&host);

        assert!(matches!(lc.start_output(), Err(OutputError::StartRejected)));
        let journal = host.journal();
        let acquired = journal
            .iter()
            .filter(|e| matches!(e, JournalEntry::Acquired(_)))
            .count();
        let released = journal
            .iter()
            .filter(|e| matches!(e, JournalEntry::Released(_)))
            .count();
        assert_eq!(acquired, released);
        assert_eq!(host.upstream_source().unwrap().showing(), 0);
    }

    #[test]
    fn test_failed_start_backs_off() {
        let host = MockHost::new();
        host.fail_at(Some(Resource::Service));
        let mut lc = lifecycle(&host);

        assert_eq!(lc.tick(), TickAction::Start);
        host.fail_at(None);
        host.advance(Duration::from_millis(500));
        assert_eq!(lc.tick(), TickAction::Unchanged);
        assert!(!lc.is_active());

        host.advance(Duration::from_millis(500));
        assert_eq!(lc.tick(), TickAction::Start);
        assert!(lc.is_active());
    }

    #[test]
    fn test_skipped_preconditions() {
        let host = MockHost::new();
        let mut lc = lifecycle(&host);

        host.set_initialized(false);
        assert_eq!(
            lc.start_output().unwrap(),
            StartOutcome::Skipped(SkipReason::HostNotReady)
        );
        host.set_initialized(true);

        host.set_upstream_size(0, 720);
        assert_eq!(
            lc.start_output().unwrap(),
            StartOutcome::Skipped(SkipReason::InvalidVideo)
        );
        host.set_upstream_size(1280, 720);

        host.set_video_info(None);
        assert_eq!(
            lc.start_output().unwrap(),
            StartOutcome::Skipped(SkipReason::NoVideo)
        );
        assert!(host.journal().is_empty());
    }

    #[test]
    fn test_missing_upstream_fails() {
        let host = MockHost::new();
        host.remove_upstream();
        let mut lc = lifecycle(&host);
        assert!(matches!(lc.start_output(), Err(OutputError::UpstreamMissing)));
    }

    #[test]
    fn test_missing_audio_fails() {
        let host = MockHost::new();
        host.set_audio_info(None);
        let mut lc = lifecycle(&host);
        assert!(matches!(lc.start_output(), Err(OutputError::AudioUnavailable)));
        assert_eq!(
            host.journal().last(),
            Some(&JournalEntry::Released(Resource::Service))
        );
    }

    #[test]
    fn test_revision_gap_restarts() {
        let host = MockHost::new();
        let mut lc = lifecycle(&host);
        for _ in 0..3 {
            lc.update(settings("rtmp://live.example.com/app"));
        }
        lc.tick();
        assert_eq!(lc.active_revision(), 3);

        lc.update(settings("rtmp://live.example.com/app"));
        lc.update(settings("srt://backup.example.com:9000"));
        assert_eq!(lc.stored_revision(), 5);

        // The revision gap is ignored until the connect timeout has elapsed.
        assert_eq!(lc.tick(), TickAction::Unchanged);
        assert_eq!(lc.active_revision(), 3);

        past_timeout(&host);
        assert_eq!(
            lc.tick(),
            TickAction::Restart(RestartReason::SettingsChanged)
        );
        assert_eq!(lc.active_revision(), 5);
        assert_eq!(lc.output_type(), Some(MPEGTS_OUTPUT));
        assert!(lc.is_active());
    }

    #[test]
    fn test_connect_timeout_retries() {
        let host = MockHost::new();
        let (callback, events) = recorder();
        let mut lc = lifecycle(&host).with_event_callback(Some(callback));
        lc.tick();
        host.set_stream_active(false);

        host.advance(Duration::from_secs(5));
        assert_eq!(lc.tick(), TickAction::Unchanged);

        host.advance(Duration::from_secs(6));
        assert_eq!(
            lc.tick(),
            TickAction::Restart(RestartReason::ConnectTimeout)
        );
        assert!(lc.is_active());
        assert_eq!(host.output_types().len(), 2);
        assert!(events.lock().contains(&OutputEvent::RestartScheduled {
            reason: RestartReason::ConnectTimeout
        }));
    }

    #[test]
    fn test_active_after_timeout() {
        let host = MockHost::new();
        let mut lc = lifecycle(&host);
        lc.tick();
        past_timeout(&host);
        assert_eq!(lc.tick(), TickAction::Unchanged);
        assert_eq!(lc.state(), OutputState::Active);
    }

    #[test]
    fn test_geometry_change_restarts() {
        let host = MockHost::new();
        let mut lc = lifecycle(&host);
        lc.tick();
        past_timeout(&host);

        // Odd sizes round up to the captured size: no restart.
        host.set_upstream_size(1279, 719);
        assert_eq!(lc.tick(), TickAction::Unchanged);

        host.set_upstream_size(1920, 1080);
        assert_eq!(
            lc.tick(),
            TickAction::Restart(RestartReason::GeometryChanged)
        );
        assert_eq!(lc.dimensions(), (1920, 1080));
    }

    #[test]
    fn test_zero_geometry_stops() {
        let host = MockHost::new();
        let mut lc = lifecycle(&host);
        lc.tick();
        past_timeout(&host);

        host.set_upstream_size(0, 0);
        assert_eq!(lc.tick(), TickAction::Stop(StopReason::ZeroGeometry));
        assert!(!lc.is_active());
        assert_eq!(host.reachability_queries(), 0);
    }

    #[test]
    fn test_unreachable_stops_and_is_rate_limited() {
        let host = MockHost::new();
        let mut lc = lifecycle(&host);
        lc.tick();
        past_timeout(&host);

        lc.tick();
        lc.tick();
        assert_eq!(host.reachability_queries(), 1);

        host.set_reachable(false);
        assert_eq!(lc.tick(), TickAction::Unchanged);

        host.advance(Duration::from_secs(1));
        assert_eq!(lc.tick(), TickAction::Stop(StopReason::Unreachable));
        assert_eq!(host.reachability_queries(), 2);
    }

    #[test]
    fn test_visibility_toggle() {
        let host = MockHost::new();
        let mut lc = lifecycle(&host);
        lc.tick();

        host.set_filter_enabled(false);
        assert_eq!(lc.tick(), TickAction::Stop(StopReason::SourceDisabled));
        assert_eq!(lc.tick(), TickAction::Unchanged);

        host.set_filter_enabled(true);
        assert_eq!(lc.tick(), TickAction::Start);
        assert!(lc.is_active());
    }

    #[test]
    fn test_restart_without_server_stays_idle() {
        let host = MockHost::new();
        let mut lc = lifecycle(&host);
        lc.tick();
        lc.update(OutputSettings::default());
        assert_eq!(
            lc.restart_output().unwrap(),
            StartOutcome::Skipped(SkipReason::NoServer)
        );
        assert!(!lc.is_active());
    }

    #[test]
    fn test_output_type_selection() {
        let host = MockHost::new();
        let mut lc = OutputLifecycle::new("f", Arc::new(host.clone()), settings("ftl://ingest"));
        lc.start_output().unwrap();
        assert_eq!(lc.output_type(), Some(FTL_OUTPUT));

        host.set_preferred_output_type(Some("whip_output"));
        lc.start_output().unwrap();
        assert_eq!(lc.output_type(), Some("whip_output"));
    }

    #[test]
    fn test_master_track_registration() {
        let host = MockHost::new();
        let mut s = settings("rtmp://a/b");
        s.custom_audio_source = true;
        s.audio_source = "master_track_3".to_string();
        let mut lc = OutputLifecycle::new("f", Arc::new(host.clone()), s);

        lc.start_output().unwrap();
        assert_eq!(lc.audio_source_kind(), AudioSourceKind::MasterBus);
        assert_eq!(host.master_tap().unwrap().mix_index(), 2);
        assert!(host.journal().contains(&JournalEntry::Acquired(Resource::AudioTap)));

        lc.stop_output();
        assert!(host.master_tap().is_none());
    }

    #[test]
    fn test_missing_named_source_is_silence() {
        let host = MockHost::new();
        let mut s = settings("rtmp://a/b");
        s.custom_audio_source = true;
        s.audio_source = "missing-uuid".to_string();
        let mut lc = OutputLifecycle::new("f", Arc::new(host.clone()), s);

        assert_eq!(lc.start_output().unwrap(), StartOutcome::Started);
        assert_eq!(lc.audio_source_kind(), AudioSourceKind::Silence);
        assert!(!lc.gate().accepts_audio());
    }

    #[test]
    fn test_named_source_detached_on_stop() {
        let host = MockHost::new();
        host.add_source("mic-uuid", "Mic");
        let mut s = settings("rtmp://a/b");
        s.custom_audio_source = true;
        s.audio_source = "mic-uuid".to_string();
        let mut lc = OutputLifecycle::new("f", Arc::new(host.clone()), s);

        lc.start_output().unwrap();
        let tap = host.named_tap().unwrap();
        assert!(tap.is_attached());
        lc.stop_output();
        assert!(!tap.is_attached());
    }

    #[test]
    fn test_bridge_notices_become_events() {
        let host = MockHost::new();
        let (callback, events) = recorder();
        let mut lc = lifecycle(&host)
            .with_event_callback(Some(callback))
            .with_bridge_config(BridgeConfig {
                max_buffer_frames: 100,
                output_frames: 64,
            });
        lc.tick();

        let bridge = lc.bridge().unwrap();
        let plane = [0.0f32; 80];
        bridge.push(80, 0, &[Some(&plane[..]), Some(&plane[..])]);
        bridge.push(80, 1, &[Some(&plane[..]), Some(&plane[..])]);
        lc.tick();

        let events = events.lock();
        assert!(events.contains(&OutputEvent::BufferOverflow {
            dropped_frames: 80,
            incoming_frames: 80
        }));
        assert!(events
            .iter()
            .any(|e| matches!(e, OutputEvent::ScratchExpanded { .. })));
    }
}
