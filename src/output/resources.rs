//! Host objects held by a running output.

use std::sync::Arc;

use crate::host::{
    AudioOutputHandle, EncoderHandle, OutputHandle, ServiceHandle, TapRegistration,
    UpstreamSource, ViewHandle,
};
use crate::pipeline::AudioBridge;

/// Every host object acquired by one start sequence.
///
/// Acquisition order is service, output, view, audio tap, audio endpoint,
/// video encoder, audio encoder, then the stream start. [`release_all`]
/// undoes it in exactly the reverse order and can run at any point of a
/// partial acquisition.
///
/// [`release_all`]: OutputResources::release_all
#[derive(Default)]
pub struct OutputResources {
    pub(crate) service: Option<Box<dyn ServiceHandle>>,
    pub(crate) output: Option<Box<dyn OutputHandle>>,
    pub(crate) output_type: Option<String>,
    pub(crate) view: Option<Box<dyn ViewHandle>>,
    pub(crate) audio_tap: Option<Box<dyn TapRegistration>>,
    pub(crate) audio_output: Option<Box<dyn AudioOutputHandle>>,
    pub(crate) video_encoder: Option<Box<dyn EncoderHandle>>,
    pub(crate) audio_encoder: Option<Box<dyn EncoderHandle>>,
    pub(crate) showing: Option<Arc<dyn UpstreamSource>>,
    pub(crate) bridge: Option<Arc<AudioBridge>>,
}

impl OutputResources {
    /// Releases everything in reverse acquisition order.
    ///
    /// Returns `true` if the stream had been started. Safe to call when
    /// nothing is held.
    pub fn release_all(&mut self) -> bool {
        let was_streaming = match self.showing.take() {
            Some(upstream) => {
                upstream.dec_showing();
                if let Some(output) = self.output.as_mut() {
                    output.stop();
                }
                true
            }
            None => false,
        };

        drop(self.audio_encoder.take());
        drop(self.video_encoder.take());
        drop(self.audio_output.take());
        if let Some(tap) = self.audio_tap.take() {
            tracing::trace!(tap = %tap.describe(), "audio tap removed");
        }
        drop(self.view.take());
        drop(self.output.take());
        self.output_type = None;
        drop(self.service.take());

        if let Some(bridge) = self.bridge.take() {
            bridge.clear();
        }
        was_streaming
    }

    /// Returns `true` if no host object is held.
    pub fn is_empty(&self) -> bool {
        self.service.is_none()
            && self.output.is_none()
            && self.view.is_none()
            && self.audio_tap.is_none()
            && self.audio_output.is_none()
            && self.video_encoder.is_none()
            && self.audio_encoder.is_none()
            && self.showing.is_none()
            && self.bridge.is_none()
    }

    /// Returns `true` if the network output reports itself streaming.
    pub fn output_active(&self) -> bool {
        self.output.as_ref().is_some_and(|o| o.is_active())
    }

    /// Returns the type of the created network output.
    pub fn output_type(&self) -> Option<&str> {
        self.output_type.as_deref()
    }

    /// Returns the audio bridge of the running output.
    pub fn bridge(&self) -> Option<&Arc<AudioBridge>> {
        self.bridge.as_ref()
    }
}

impl std::fmt::Debug for OutputResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputResources")
            .field("service", &self.service.is_some())
            .field("output", &self.output_type)
            .field("view", &self.view.is_some())
            .field("audio_tap", &self.audio_tap.is_some())
            .field("audio_output", &self.audio_output.is_some())
            .field("video_encoder", &self.video_encoder.is_some())
            .field("audio_encoder", &self.audio_encoder.is_some())
            .field("showing", &self.showing.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for OutputResources {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::{JournalEntry, MockHost, Resource};
    use crate::host::{MediaHost, OutputFactory, VideoInfo};

    #[test]
    fn test_release_empty_is_noop() {
        let mut resources = OutputResources::default();
        assert!(resources.is_empty());
        assert!(!resources.release_all());
        assert!(!resources.release_all());
    }

    #[test]
    fn test_release_partial_in_reverse() {
        let host = MockHost::new();
        let blob = serde_json::Value::Null;
        let mut resources = OutputResources::default();
        resources.service = Some(host.create_service("rtmp_custom", "f", &blob).unwrap());
        let service = resources.service.as_deref().unwrap();
        resources.output = Some(host.create_output("rtmp_output", "f", &blob, service).unwrap());
        let upstream = host.upstream().unwrap();
        resources.view = Some(
            host.create_view(upstream.as_ref(), &VideoInfo::default())
                .unwrap(),
        );
        host.clear_journal();

        resources.release_all();
        assert!(resources.is_empty());
        assert_eq!(
            host.journal(),
            vec![
                JournalEntry::Released(Resource::View),
                JournalEntry::Released(Resource::Output),
                JournalEntry::Released(Resource::Service),
            ]
        );
    }
}
