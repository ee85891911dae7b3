//! Output type selection from the service's server URL.

use crate::host::ServiceHandle;

/// Output type for RTMP and RTMPS servers.
pub const RTMP_OUTPUT: &str = "rtmp_output";
/// Output type for FTL servers.
pub const FTL_OUTPUT: &str = "ftl_output";
/// Output type for everything else (SRT, RIST, ...).
pub const MPEGTS_OUTPUT: &str = "ffmpeg_mpegts_muxer";

/// Chooses the network output type for a service.
pub trait OutputTypePolicy: Send + Sync {
    /// Returns the output type to create for `service`.
    fn output_type(&self, service: &dyn ServiceHandle) -> String;
}

/// Prefers the service's own output type, then maps the URL scheme.
///
/// | Server URL           | Output type           |
/// |----------------------|-----------------------|
/// | none                 | `rtmp_output`         |
/// | `rtmp://`, `rtmps://`| `rtmp_output`         |
/// | `ftl://`             | `ftl_output`          |
/// | anything else        | `ffmpeg_mpegts_muxer` |
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultOutputTypePolicy;

impl DefaultOutputTypePolicy {
    /// Maps a server URL to an output type.
    pub fn for_url(url: Option<&str>) -> &'static str {
        let Some(url) = url else {
            return RTMP_OUTPUT;
        };
        let scheme = url.split_once("://").map_or("", |(scheme, _)| scheme);
        match scheme.to_ascii_lowercase().as_str() {
            "rtmp" | "rtmps" => RTMP_OUTPUT,
            "ftl" => FTL_OUTPUT,
            _ => MPEGTS_OUTPUT,
        }
    }
}

impl OutputTypePolicy for DefaultOutputTypePolicy {
    fn output_type(&self, service: &dyn ServiceHandle) -> String {
        if let Some(preferred) = service.preferred_output_type().filter(|t| !t.is_empty()) {
            return preferred;
        }
        Self::for_url(service.server_url().as_deref()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Service {
        preferred: Option<&'static str>,
        url: Option<&'static str>,
    }

    impl ServiceHandle for Service {
        fn preferred_output_type(&self) -> Option<String> {
            self.preferred.map(str::to_string)
        }

        fn server_url(&self) -> Option<String> {
            self.url.map(str::to_string)
        }
    }

    #[test]
    fn test_url_schemes() {
        assert_eq!(DefaultOutputTypePolicy::for_url(Some("rtmp://a/b")), RTMP_OUTPUT);
        assert_eq!(DefaultOutputTypePolicy::for_url(Some("rtmps://a/b")), RTMP_OUTPUT);
        assert_eq!(DefaultOutputTypePolicy::for_url(Some("RTMP://a/b")), RTMP_OUTPUT);
        assert_eq!(DefaultOutputTypePolicy::for_url(Some("ftl://a")), FTL_OUTPUT);
        assert_eq!(DefaultOutputTypePolicy::for_url(Some("srt://a:9000")), MPEGTS_OUTPUT);
        assert_eq!(DefaultOutputTypePolicy::for_url(Some("rist://a")), MPEGTS_OUTPUT);
        assert_eq!(DefaultOutputTypePolicy::for_url(None), RTMP_OUTPUT);
    }

    #[test]
    fn test_preferred_type_wins() {
        let service = Service {
            preferred: Some("custom_output"),
            url: Some("srt://a"),
        };
        assert_eq!(DefaultOutputTypePolicy.output_type(&service), "custom_output");
    }

    #[test]
    fn test_empty_preferred_ignored() {
        let service = Service {
            preferred: Some(""),
            url: Some("ftl://a"),
        };
        assert_eq!(DefaultOutputTypePolicy.output_type(&service), FTL_OUTPUT);
    }
}
