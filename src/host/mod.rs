//! Interfaces to the host media framework.
//!
//! The output lifecycle never talks to a media framework directly. It sees
//! the host through the traits in this module, as bound to one filter
//! instance: its clock, its upstream source, the scene graph, the object
//! factories and the audio callback registries.
//!
//! Every host object the lifecycle acquires comes back as a boxed handle.
//! Dropping a handle releases the object; the lifecycle controls the order.

pub mod mock;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::HostError;
use crate::pipeline::PullConsumer;
use crate::source::{MasterBusTap, NamedSourceTap, SourceId};

/// Monotonic host clock in nanoseconds.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now_ns(&self) -> u64;
}

/// [`Clock`] backed by [`Instant`], counting from its creation.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock starting at zero now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ns(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Video parameters of the host, and of a view created from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoInfo {
    /// Frame rate numerator.
    pub fps_num: u32,
    /// Frame rate denominator.
    pub fps_den: u32,
    /// Canvas width.
    pub base_width: u32,
    /// Canvas height.
    pub base_height: u32,
    /// Scaled output width.
    pub output_width: u32,
    /// Scaled output height.
    pub output_height: u32,
}

impl VideoInfo {
    /// Returns a copy with canvas and output size set to `width` x `height`.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.base_width = width;
        self.base_height = height;
        self.output_width = width;
        self.output_height = height;
        self
    }

    /// Returns `true` if both frame rate terms are non-zero.
    pub fn has_frame_rate(&self) -> bool {
        self.fps_num != 0 && self.fps_den != 0
    }
}

/// Audio parameters of the host mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInfo {
    /// Samples per second.
    pub sample_rate: u32,
    /// Channel count of the speaker layout.
    pub channels: usize,
}

/// Format of the pull-side audio endpoint and of master bus subscriptions.
///
/// Samples are always planar 32-bit float.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioOutputSpec {
    /// Name shown by the host.
    pub name: String,
    /// Samples per second.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: usize,
}

/// The source the filter is attached to.
pub trait UpstreamSource: Send + Sync {
    /// Display name.
    fn name(&self) -> String;

    /// Current width in pixels.
    fn width(&self) -> u32;

    /// Current height in pixels.
    fn height(&self) -> u32;

    /// Asks the host to keep rendering the source.
    fn inc_showing(&self);

    /// Balances a previous [`inc_showing`](Self::inc_showing).
    fn dec_showing(&self);
}

/// Process-wide host state as seen from one filter instance.
pub trait MediaHost: Send + Sync {
    /// Returns `true` once the host has finished initializing.
    fn initialized(&self) -> bool;

    /// Returns the host's video configuration, if video is running.
    fn video_info(&self) -> Option<VideoInfo>;

    /// Returns the host's audio configuration, if audio is running.
    fn audio_info(&self) -> Option<AudioInfo>;

    /// Returns the filter's own visibility toggle.
    fn filter_enabled(&self) -> bool;

    /// Returns the source the filter is attached to.
    fn upstream(&self) -> Option<Arc<dyn UpstreamSource>>;
}

/// Scene-graph query.
pub trait SceneGraph: Send + Sync {
    /// Returns `true` if `upstream` is a scene or is found, recursively,
    /// inside any scene of the compositor.
    fn is_reachable(&self, upstream: &dyn UpstreamSource) -> bool;
}

/// A streaming service object.
pub trait ServiceHandle: Send {
    /// Output type the service asks for, if any.
    fn preferred_output_type(&self) -> Option<String>;

    /// Server URL the service connects to.
    fn server_url(&self) -> Option<String>;
}

/// A network output object.
pub trait OutputHandle: Send {
    /// Configures the output's own reconnect policy.
    fn set_reconnect_settings(&mut self, max_retries: u32, retry_delay: Duration);

    /// Binds the video encoder.
    fn set_video_encoder(&mut self, encoder: &dyn EncoderHandle);

    /// Binds the audio encoder to a track.
    fn set_audio_encoder(&mut self, encoder: &dyn EncoderHandle, track: usize);

    /// Starts streaming. Returns `false` if the host refused.
    fn start(&mut self) -> bool;

    /// Stops streaming.
    fn stop(&mut self);

    /// Returns `true` while the output is connected and streaming.
    fn is_active(&self) -> bool;
}

/// A view rendering the upstream source into its own video output.
pub trait ViewHandle: Send {
    /// Size the view renders at.
    fn size(&self) -> (u32, u32);
}

/// An encoder object.
pub trait EncoderHandle: Send {
    /// Encoder type id.
    fn id(&self) -> &str;
}

/// The pull-side audio endpoint. The host calls the registered
/// [`PullConsumer`] until the handle is dropped.
pub trait AudioOutputHandle: Send {
    /// Format the endpoint was opened with.
    fn spec(&self) -> &AudioOutputSpec;
}

/// An audio callback registration. Dropping it unregisters the callback.
pub trait TapRegistration: Send {
    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Host object construction.
///
/// `settings` is the filter's settings blob, forwarded verbatim.
pub trait OutputFactory: Send + Sync {
    /// Creates a streaming service of type `kind`.
    fn create_service(
        &self,
        kind: &str,
        name: &str,
        settings: &serde_json::Value,
    ) -> Result<Box<dyn ServiceHandle>, HostError>;

    /// Creates a network output of type `kind` bound to `service`.
    fn create_output(
        &self,
        kind: &str,
        name: &str,
        settings: &serde_json::Value,
        service: &dyn ServiceHandle,
    ) -> Result<Box<dyn OutputHandle>, HostError>;

    /// Creates a view rendering `upstream` with the given video parameters.
    fn create_view(
        &self,
        upstream: &dyn UpstreamSource,
        video: &VideoInfo,
    ) -> Result<Box<dyn ViewHandle>, HostError>;

    /// Opens the pull-side audio endpoint served by `consumer`.
    fn open_audio_output(
        &self,
        spec: &AudioOutputSpec,
        consumer: Arc<PullConsumer>,
    ) -> Result<Box<dyn AudioOutputHandle>, HostError>;

    /// Creates a video encoder fed by `view`.
    fn create_video_encoder(
        &self,
        id: &str,
        name: &str,
        settings: &serde_json::Value,
        view: &dyn ViewHandle,
    ) -> Result<Box<dyn EncoderHandle>, HostError>;

    /// Creates an audio encoder for `track`, fed by `audio`.
    fn create_audio_encoder(
        &self,
        id: &str,
        name: &str,
        settings: &serde_json::Value,
        track: usize,
        audio: &dyn AudioOutputHandle,
    ) -> Result<Box<dyn EncoderHandle>, HostError>;
}

/// Audio callback registries.
pub trait AudioTaps: Send + Sync {
    /// Looks up a source by id and returns its display name.
    fn find_source(&self, id: &SourceId) -> Option<String>;

    /// Registers a capture callback on the source `id`.
    fn add_capture_callback(
        &self,
        id: &SourceId,
        tap: Arc<NamedSourceTap>,
    ) -> Result<Box<dyn TapRegistration>, HostError>;

    /// Registers a raw audio callback on master mix bus `tap.mix_index()`.
    fn add_master_audio_callback(
        &self,
        spec: &AudioOutputSpec,
        tap: Arc<MasterBusTap>,
    ) -> Result<Box<dyn TapRegistration>, HostError>;
}

/// Everything the output lifecycle needs from the host.
pub trait Host: Clock + MediaHost + SceneGraph + OutputFactory + AudioTaps {}

impl<T> Host for T where T: Clock + MediaHost + SceneGraph + OutputFactory + AudioTaps {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ns();
        let b = clock.now_ns();
        assert!(b >= a);
    }

    #[test]
    fn test_video_info_with_size() {
        let info = VideoInfo {
            fps_num: 30,
            fps_den: 1,
            ..VideoInfo::default()
        }
        .with_size(1280, 720);
        assert_eq!(info.output_width, 1280);
        assert_eq!(info.base_height, 720);
        assert!(info.has_frame_rate());
        assert!(!VideoInfo::default().has_frame_rate());
    }
}
