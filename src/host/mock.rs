//! Scriptable in-memory host for tests.
//!
//! [`MockHost`] implements every host trait. Tests drive its clock, flip its
//! flags, inject failures at any acquisition stage and read back a journal of
//! every acquire and release in the order they happened.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::HostError;
use crate::host::{
    AudioInfo, AudioOutputHandle, AudioOutputSpec, AudioTaps, Clock, EncoderHandle, MediaHost,
    OutputFactory, OutputHandle, SceneGraph, ServiceHandle, TapRegistration, UpstreamSource,
    VideoInfo, ViewHandle,
};
use crate::pipeline::PullConsumer;
use crate::source::{MasterBusTap, NamedSourceTap, SourceId};

/// Host object kinds tracked by the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Streaming service.
    Service,
    /// Network output.
    Output,
    /// Upstream view.
    View,
    /// Audio callback registration.
    AudioTap,
    /// Pull-side audio endpoint.
    AudioOutput,
    /// Video encoder.
    VideoEncoder,
    /// Audio encoder.
    AudioEncoder,
}

/// One journal record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    /// A host object was created.
    Acquired(Resource),
    /// A host object was released.
    Released(Resource),
    /// The network output was started.
    StreamStarted,
    /// The network output was stopped.
    StreamStopped,
    /// The upstream showing counter went up.
    ShowingIncremented,
    /// The upstream showing counter went down.
    ShowingDecremented,
}

struct MockState {
    now_ns: AtomicU64,
    initialized: AtomicBool,
    filter_enabled: AtomicBool,
    video: Mutex<Option<VideoInfo>>,
    audio: Mutex<Option<AudioInfo>>,
    upstream: Mutex<Option<Arc<MockUpstream>>>,
    reachable: AtomicBool,
    reachability_queries: AtomicU64,
    fail_at: Mutex<Option<Resource>>,
    start_result: AtomicBool,
    stream_active: AtomicBool,
    preferred_output_type: Mutex<Option<String>>,
    journal: Mutex<Vec<JournalEntry>>,
    output_types: Mutex<Vec<String>>,
    output_settings: Mutex<Option<serde_json::Value>>,
    audio_encoder_settings: Mutex<Option<(serde_json::Value, usize)>>,
    reconnect: Mutex<Option<(u32, Duration)>>,
    sources: Mutex<HashMap<SourceId, String>>,
    pull: Mutex<Option<Arc<PullConsumer>>>,
    named_tap: Mutex<Option<Arc<NamedSourceTap>>>,
    master_tap: Mutex<Option<Arc<MasterBusTap>>>,
}

impl MockState {
    fn record(&self, entry: JournalEntry) {
        self.journal.lock().push(entry);
    }

    fn acquire(&self, resource: Resource) -> Result<(), HostError> {
        if *self.fail_at.lock() == Some(resource) {
            return Err(HostError::new(format!("{resource:?} unavailable")));
        }
        self.record(JournalEntry::Acquired(resource));
        Ok(())
    }
}

/// The filter's upstream source in a [`MockHost`].
pub struct MockUpstream {
    name: String,
    width: AtomicU32,
    height: AtomicU32,
    showing: AtomicI64,
    state: Weak<MockState>,
}

impl MockUpstream {
    /// Returns the current showing count.
    pub fn showing(&self) -> i64 {
        self.showing.load(Ordering::SeqCst)
    }

    fn record(&self, entry: JournalEntry) {
        if let Some(state) = self.state.upgrade() {
            state.record(entry);
        }
    }
}

impl UpstreamSource for MockUpstream {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn width(&self) -> u32 {
        self.width.load(Ordering::SeqCst)
    }

    fn height(&self) -> u32 {
        self.height.load(Ordering::SeqCst)
    }

    fn inc_showing(&self) {
        self.showing.fetch_add(1, Ordering::SeqCst);
        self.record(JournalEntry::ShowingIncremented);
    }

    fn dec_showing(&self) {
        self.showing.fetch_sub(1, Ordering::SeqCst);
        self.record(JournalEntry::ShowingDecremented);
    }
}

/// Scriptable host.
///
/// Defaults: initialized, filter enabled, 30 fps video, 48 kHz stereo audio,
/// a reachable 1280x720 upstream named `Camera`, and outputs that start and
/// report active.
#[derive(Clone)]
pub struct MockHost {
    state: Arc<MockState>,
}

impl MockHost {
    /// Creates a host with the defaults above.
    pub fn new() -> Self {
        let state = Arc::new_cyclic(|weak: &Weak<MockState>| MockState {
            now_ns: AtomicU64::new(1_000_000_000),
            initialized: AtomicBool::new(true),
            filter_enabled: AtomicBool::new(true),
            video: Mutex::new(Some(VideoInfo {
                fps_num: 30,
                fps_den: 1,
                ..VideoInfo::default()
            }
            .with_size(1920, 1080))),
            audio: Mutex::new(Some(AudioInfo {
                sample_rate: 48_000,
                channels: 2,
            })),
            upstream: Mutex::new(Some(Arc::new(MockUpstream {
                name: "Camera".to_string(),
                width: AtomicU32::new(1280),
                height: AtomicU32::new(720),
                showing: AtomicI64::new(0),
                state: weak.clone(),
            }))),
            reachable: AtomicBool::new(true),
            reachability_queries: AtomicU64::new(0),
            fail_at: Mutex::new(None),
            start_result: AtomicBool::new(true),
            stream_active: AtomicBool::new(true),
            preferred_output_type: Mutex::new(None),
            journal: Mutex::new(Vec::new()),
            output_types: Mutex::new(Vec::new()),
            output_settings: Mutex::new(None),
            audio_encoder_settings: Mutex::new(None),
            reconnect: Mutex::new(None),
            sources: Mutex::new(HashMap::new()),
            pull: Mutex::new(None),
            named_tap: Mutex::new(None),
            master_tap: Mutex::new(None),
        });
        Self { state }
    }

    /// Advances the clock.
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.state.now_ns.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Sets whether the host reports itself initialized.
    pub fn set_initialized(&self, value: bool) {
        self.state.initialized.store(value, Ordering::SeqCst);
    }

    /// Sets the filter's visibility toggle.
    pub fn set_filter_enabled(&self, value: bool) {
        self.state.filter_enabled.store(value, Ordering::SeqCst);
    }

    /// Replaces the video configuration.
    pub fn set_video_info(&self, info: Option<VideoInfo>) {
        *self.state.video.lock() = info;
    }

    /// Replaces the audio configuration.
    pub fn set_audio_info(&self, info: Option<AudioInfo>) {
        *self.state.audio.lock() = info;
    }

    /// Resizes the upstream source.
    pub fn set_upstream_size(&self, width: u32, height: u32) {
        if let Some(upstream) = self.state.upstream.lock().as_ref() {
            upstream.width.store(width, Ordering::SeqCst);
            upstream.height.store(height, Ordering::SeqCst);
        }
    }

    /// Detaches the filter from its upstream source.
    pub fn remove_upstream(&self) {
        self.state.upstream.lock().take();
    }

    /// Returns the upstream source, if attached.
    pub fn upstream_source(&self) -> Option<Arc<MockUpstream>> {
        self.state.upstream.lock().clone()
    }

    /// Sets the scene-graph answer.
    pub fn set_reachable(&self, value: bool) {
        self.state.reachable.store(value, Ordering::SeqCst);
    }

    /// Returns how often the scene graph was queried.
    pub fn reachability_queries(&self) -> u64 {
        self.state.reachability_queries.load(Ordering::SeqCst)
    }

    /// Makes creation of `resource` fail until cleared with `None`.
    pub fn fail_at(&self, resource: Option<Resource>) {
        *self.state.fail_at.lock() = resource;
    }

    /// Sets whether output start succeeds.
    pub fn set_start_result(&self, value: bool) {
        self.state.start_result.store(value, Ordering::SeqCst);
    }

    /// Sets whether a started output reports active.
    pub fn set_stream_active(&self, value: bool) {
        self.state.stream_active.store(value, Ordering::SeqCst);
    }

    /// Sets the output type services report as preferred.
    pub fn set_preferred_output_type(&self, kind: Option<&str>) {
        *self.state.preferred_output_type.lock() = kind.map(str::to_string);
    }

    /// Registers a source that capture callbacks can be added to.
    pub fn add_source(&self, id: &str, name: &str) {
        self.state
            .sources
            .lock()
            .insert(SourceId::new(id), name.to_string());
    }

    /// Returns the journal.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.state.journal.lock().clone()
    }

    /// Empties the journal.
    pub fn clear_journal(&self) {
        self.state.journal.lock().clear();
    }

    /// Returns the output types created so far, oldest first.
    pub fn output_types(&self) -> Vec<String> {
        self.state.output_types.lock().clone()
    }

    /// Returns the settings blob of the last created output.
    pub fn output_settings(&self) -> Option<serde_json::Value> {
        self.state.output_settings.lock().clone()
    }

    /// Returns the settings and track of the last created audio encoder.
    pub fn audio_encoder_settings(&self) -> Option<(serde_json::Value, usize)> {
        self.state.audio_encoder_settings.lock().clone()
    }

    /// Returns the reconnect settings applied to the last output.
    pub fn reconnect_settings(&self) -> Option<(u32, Duration)> {
        *self.state.reconnect.lock()
    }

    /// Returns the consumer of the open audio endpoint.
    pub fn pull_consumer(&self) -> Option<Arc<PullConsumer>> {
        self.state.pull.lock().clone()
    }

    /// Returns the registered capture tap.
    pub fn named_tap(&self) -> Option<Arc<NamedSourceTap>> {
        self.state.named_tap.lock().clone()
    }

    /// Returns the registered master bus tap.
    pub fn master_tap(&self) -> Option<Arc<MasterBusTap>> {
        self.state.master_tap.lock().clone()
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHost")
            .field("now_ns", &self.state.now_ns.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Clock for MockHost {
    fn now_ns(&self) -> u64 {
        self.state.now_ns.load(Ordering::SeqCst)
    }
}

impl MediaHost for MockHost {
    fn initialized(&self) -> bool {
        self.state.initialized.load(Ordering::SeqCst)
    }

    fn video_info(&self) -> Option<VideoInfo> {
        *self.state.video.lock()
    }

    fn audio_info(&self) -> Option<AudioInfo> {
        *self.state.audio.lock()
    }

    fn filter_enabled(&self) -> bool {
        self.state.filter_enabled.load(Ordering::SeqCst)
    }

    fn upstream(&self) -> Option<Arc<dyn UpstreamSource>> {
        self.state
            .upstream
            .lock()
            .clone()
            .map(|u| u as Arc<dyn UpstreamSource>)
    }
}

impl SceneGraph for MockHost {
    fn is_reachable(&self, _upstream: &dyn UpstreamSource) -> bool {
        self.state.reachability_queries.fetch_add(1, Ordering::SeqCst);
        self.state.reachable.load(Ordering::SeqCst)
    }
}

struct MockService {
    state: Arc<MockState>,
    url: Option<String>,
    preferred: Option<String>,
}

impl ServiceHandle for MockService {
    fn preferred_output_type(&self) -> Option<String> {
        self.preferred.clone()
    }

    fn server_url(&self) -> Option<String> {
        self.url.clone()
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.state.record(JournalEntry::Released(Resource::Service));
    }
}

struct MockOutput {
    state: Arc<MockState>,
    started: bool,
}

impl OutputHandle for MockOutput {
    fn set_reconnect_settings(&mut self, max_retries: u32, retry_delay: Duration) {
        *self.state.reconnect.lock() = Some((max_retries, retry_delay));
    }

    fn set_video_encoder(&mut self, _encoder: &dyn EncoderHandle) {}

    fn set_audio_encoder(&mut self, _encoder: &dyn EncoderHandle, _track: usize) {}

    fn start(&mut self) -> bool {
        if !self.state.start_result.load(Ordering::SeqCst) {
            return false;
        }
        self.started = true;
        self.state.record(JournalEntry::StreamStarted);
        true
    }

    fn stop(&mut self) {
        if self.started {
            self.started = false;
            self.state.record(JournalEntry::StreamStopped);
        }
    }

    fn is_active(&self) -> bool {
        self.started && self.state.stream_active.load(Ordering::SeqCst)
    }
}

impl Drop for MockOutput {
    fn drop(&mut self) {
        self.state.record(JournalEntry::Released(Resource::Output));
    }
}

struct MockView {
    state: Arc<MockState>,
    size: (u32, u32),
}

impl ViewHandle for MockView {
    fn size(&self) -> (u32, u32) {
        self.size
    }
}

impl Drop for MockView {
    fn drop(&mut self) {
        self.state.record(JournalEntry::Released(Resource::View));
    }
}

struct MockEncoder {
    state: Arc<MockState>,
    id: String,
    resource: Resource,
}

impl EncoderHandle for MockEncoder {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for MockEncoder {
    fn drop(&mut self) {
        self.state.record(JournalEntry::Released(self.resource));
    }
}

struct MockAudioOutput {
    state: Arc<MockState>,
    spec: AudioOutputSpec,
}

impl AudioOutputHandle for MockAudioOutput {
    fn spec(&self) -> &AudioOutputSpec {
        &self.spec
    }
}

impl Drop for MockAudioOutput {
    fn drop(&mut self) {
        self.state.pull.lock().take();
        self.state.record(JournalEntry::Released(Resource::AudioOutput));
    }
}

struct MockTap {
    state: Arc<MockState>,
    description: String,
}

impl TapRegistration for MockTap {
    fn describe(&self) -> String {
        self.description.clone()
    }
}

impl Drop for MockTap {
    fn drop(&mut self) {
        if let Some(tap) = self.state.named_tap.lock().take() {
            tap.detach();
        }
        self.state.master_tap.lock().take();
        self.state.record(JournalEntry::Released(Resource::AudioTap));
    }
}

impl OutputFactory for MockHost {
    fn create_service(
        &self,
        _kind: &str,
        _name: &str,
        settings: &serde_json::Value,
    ) -> Result<Box<dyn ServiceHandle>, HostError> {
        self.state.acquire(Resource::Service)?;
        let url = settings
            .get("server")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        Ok(Box::new(MockService {
            state: Arc::clone(&self.state),
            url,
            preferred: self.state.preferred_output_type.lock().clone(),
        }))
    }

    fn create_output(
        &self,
        kind: &str,
        _name: &str,
        settings: &serde_json::Value,
        _service: &dyn ServiceHandle,
    ) -> Result<Box<dyn OutputHandle>, HostError> {
        self.state.acquire(Resource::Output)?;
        self.state.output_types.lock().push(kind.to_string());
        *self.state.output_settings.lock() = Some(settings.clone());
        Ok(Box::new(MockOutput {
            state: Arc::clone(&self.state),
            started: false,
        }))
    }

    fn create_view(
        &self,
        _upstream: &dyn UpstreamSource,
        video: &VideoInfo,
    ) -> Result<Box<dyn ViewHandle>, HostError> {
        self.state.acquire(Resource::View)?;
        Ok(Box::new(MockView {
            state: Arc::clone(&self.state),
            size: (video.output_width, video.output_height),
        }))
    }

    fn open_audio_output(
        &self,
        spec: &AudioOutputSpec,
        consumer: Arc<PullConsumer>,
    ) -> Result<Box<dyn AudioOutputHandle>, HostError> {
        self.state.acquire(Resource::AudioOutput)?;
        *self.state.pull.lock() = Some(consumer);
        Ok(Box::new(MockAudioOutput {
            state: Arc::clone(&self.state),
            spec: spec.clone(),
        }))
    }

    fn create_video_encoder(
        &self,
        id: &str,
        _name: &str,
        _settings: &serde_json::Value,
        _view: &dyn ViewHandle,
    ) -> Result<Box<dyn EncoderHandle>, HostError> {
        self.state.acquire(Resource::VideoEncoder)?;
        Ok(Box::new(MockEncoder {
            state: Arc::clone(&self.state),
            id: id.to_string(),
            resource: Resource::VideoEncoder,
        }))
    }

    fn create_audio_encoder(
        &self,
        id: &str,
        _name: &str,
        settings: &serde_json::Value,
        track: usize,
        _audio: &dyn AudioOutputHandle,
    ) -> Result<Box<dyn EncoderHandle>, HostError> {
        self.state.acquire(Resource::AudioEncoder)?;
        *self.state.audio_encoder_settings.lock() = Some((settings.clone(), track));
        Ok(Box::new(MockEncoder {
            state: Arc::clone(&self.state),
            id: id.to_string(),
            resource: Resource::AudioEncoder,
        }))
    }
}

impl AudioTaps for MockHost {
    fn find_source(&self, id: &SourceId) -> Option<String> {
        self.state.sources.lock().get(id).cloned()
    }

    fn add_capture_callback(
        &self,
        id: &SourceId,
        tap: Arc<NamedSourceTap>,
    ) -> Result<Box<dyn TapRegistration>, HostError> {
        self.state.acquire(Resource::AudioTap)?;
        *self.state.named_tap.lock() = Some(tap);
        Ok(Box::new(MockTap {
            state: Arc::clone(&self.state),
            description: format!("capture {id}"),
        }))
    }

    fn add_master_audio_callback(
        &self,
        _spec: &AudioOutputSpec,
        tap: Arc<MasterBusTap>,
    ) -> Result<Box<dyn TapRegistration>, HostError> {
        self.state.acquire(Resource::AudioTap)?;
        let description = format!("master track {}", tap.mix_index() + 1);
        *self.state.master_tap.lock() = Some(tap);
        Ok(Box::new(MockTap {
            state: Arc::clone(&self.state),
            description,
        }))
    }
}
