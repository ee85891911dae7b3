//! Audio source kinds and selection from output settings.

use crate::config::MAX_AUDIO_MIXES;
use crate::source::SourceId;
use crate::OutputSettings;

/// Settings value that disables audio.
pub const NO_AUDIO: &str = "no_audio";

/// Prefix of settings values selecting a master mix track (`master_track_1`..).
pub const MASTER_TRACK_PREFIX: &str = "master_track_";

/// Which production adapter feeds the running output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AudioSourceKind {
    /// No adapter is registered; the output carries silence.
    #[default]
    Silence = 0,
    /// Audio passing through the filter itself.
    FilterTap = 1,
    /// Capture callback on another host source.
    NamedSource = 2,
    /// Raw audio of one master mix bus.
    MasterBus = 3,
}

impl AudioSourceKind {
    /// Converts from the atomic representation; unknown values map to `Silence`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::FilterTap,
            2 => Self::NamedSource,
            3 => Self::MasterBus,
            _ => Self::Silence,
        }
    }

    /// Returns a stable name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Silence => "silence",
            Self::FilterTap => "filter",
            Self::NamedSource => "source",
            Self::MasterBus => "master",
        }
    }
}

impl std::fmt::Display for AudioSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The audio source requested by the settings, before it is resolved against
/// the host.
///
/// # Example
///
/// ```
/// use branch_output::source::AudioSourceSelection;
/// use branch_output::OutputSettings;
///
/// let mut settings = OutputSettings::default();
/// settings.custom_audio_source = true;
/// settings.audio_source = "master_track_2".to_string();
///
/// assert_eq!(
///     AudioSourceSelection::from_settings(&settings),
///     AudioSourceSelection::MasterTrack { mix_index: 1 }
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSourceSelection {
    /// No audio.
    Silence,
    /// The filter's own audio.
    Filter,
    /// A master mix bus, zero-based.
    MasterTrack {
        /// Mix bus index in `0..MAX_AUDIO_MIXES`.
        mix_index: usize,
    },
    /// Another host source, looked up by id.
    Named(SourceId),
}

impl AudioSourceSelection {
    /// Parses the selection from `custom_audio_source` and `audio_source`.
    ///
    /// A master track number outside `1..=MAX_AUDIO_MIXES` selects silence.
    pub fn from_settings(settings: &OutputSettings) -> Self {
        if !settings.custom_audio_source {
            return Self::Filter;
        }
        Self::parse(&settings.audio_source)
    }

    fn parse(value: &str) -> Self {
        if value.is_empty() || value == NO_AUDIO {
            return Self::Silence;
        }
        if let Some(track) = value.strip_prefix(MASTER_TRACK_PREFIX) {
            return match track.parse::<usize>() {
                Ok(n) if (1..=MAX_AUDIO_MIXES).contains(&n) => Self::MasterTrack { mix_index: n - 1 },
                _ => Self::Silence,
            };
        }
        Self::Named(SourceId::new(value))
    }

    /// Returns the adapter kind this selection registers when it resolves.
    pub fn kind(&self) -> AudioSourceKind {
        match self {
            Self::Silence => AudioSourceKind::Silence,
            Self::Filter => AudioSourceKind::FilterTap,
            Self::MasterTrack { .. } => AudioSourceKind::MasterBus,
            Self::Named(_) => AudioSourceKind::NamedSource,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(value: &str) -> OutputSettings {
        OutputSettings {
            custom_audio_source: true,
            audio_source: value.to_string(),
            ..OutputSettings::default()
        }
    }

    #[test]
    fn test_filter_audio_by_default() {
        let settings = OutputSettings::default();
        assert_eq!(
            AudioSourceSelection::from_settings(&settings),
            AudioSourceSelection::Filter
        );
    }

    #[test]
    fn test_silence_values() {
        for value in ["", "no_audio"] {
            assert_eq!(
                AudioSourceSelection::from_settings(&custom(value)),
                AudioSourceSelection::Silence
            );
        }
    }

    #[test]
    fn test_master_track_range() {
        assert_eq!(
            AudioSourceSelection::from_settings(&custom("master_track_1")),
            AudioSourceSelection::MasterTrack { mix_index: 0 }
        );
        assert_eq!(
            AudioSourceSelection::from_settings(&custom("master_track_6")),
            AudioSourceSelection::MasterTrack { mix_index: 5 }
        );
        for bad in ["master_track_0", "master_track_7", "master_track_x"] {
            assert_eq!(
                AudioSourceSelection::from_settings(&custom(bad)),
                AudioSourceSelection::Silence,
                "{bad}"
            );
        }
    }

    #[test]
    fn test_named_source() {
        let selection = AudioSourceSelection::from_settings(&custom("4f1c-uuid"));
        assert_eq!(selection, AudioSourceSelection::Named(SourceId::new("4f1c-uuid")));
        assert_eq!(selection.kind(), AudioSourceKind::NamedSource);
    }

    #[test]
    fn test_kind_u8_roundtrip() {
        for kind in [
            AudioSourceKind::Silence,
            AudioSourceKind::FilterTap,
            AudioSourceKind::NamedSource,
            AudioSourceKind::MasterBus,
        ] {
            assert_eq!(AudioSourceKind::from_u8(kind as u8), kind);
        }
        assert_eq!(AudioSourceKind::from_u8(200), AudioSourceKind::Silence);
    }
}
