//! Output settings and the last-used settings file.
//!
//! The file lives in the platform config directory:
//! - Linux: `~/.config/branch-output/recently.json`
//! - macOS: `~/Library/Application Support/branch-output/recently.json`
//! - Windows: `%APPDATA%\branch-output\config\recently.json`

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// File name of the last-used settings.
pub const RECENT_SETTINGS_FILE: &str = "recently.json";

/// Settings of one branch output.
///
/// Keys the crate does not interpret are kept in `extra` and forwarded to
/// the host factories with the rest of the blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Server URL. The filter stays inactive while this is empty.
    #[serde(default)]
    pub server: String,
    /// Stream key.
    #[serde(default)]
    pub key: String,
    /// Whether the service authenticates with username and password.
    #[serde(default)]
    pub use_auth: bool,
    /// Service username.
    #[serde(default)]
    pub username: String,
    /// Service password.
    #[serde(default)]
    pub password: String,
    /// `false` streams the filter's own audio; `true` uses `audio_source`.
    #[serde(default)]
    pub custom_audio_source: bool,
    /// `no_audio`, `master_track_N` or a source id.
    #[serde(default)]
    pub audio_source: String,
    /// Video encoder type id.
    #[serde(default = "default_video_encoder")]
    pub video_encoder: String,
    /// Audio encoder type id.
    #[serde(default = "default_audio_encoder")]
    pub audio_encoder: String,
    /// Audio bitrate in kbit/s.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: u32,
    /// Everything else, passed through verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_video_encoder() -> String {
    "obs_x264".to_string()
}

fn default_audio_encoder() -> String {
    "ffmpeg_aac".to_string()
}

fn default_audio_bitrate() -> u32 {
    160
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            server: String::new(),
            key: String::new(),
            use_auth: false,
            username: String::new(),
            password: String::new(),
            custom_audio_source: false,
            audio_source: String::new(),
            video_encoder: default_video_encoder(),
            audio_encoder: default_audio_encoder(),
            audio_bitrate: default_audio_bitrate(),
            extra: serde_json::Map::new(),
        }
    }
}

impl OutputSettings {
    /// Returns `true` if a server is configured.
    pub fn has_server(&self) -> bool {
        !self.server.is_empty()
    }

    /// Returns the settings as the JSON blob handed to host factories.
    pub fn to_blob(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Returns the audio encoder's own settings.
    pub fn audio_encoder_blob(&self) -> serde_json::Value {
        serde_json::json!({ "bitrate": self.audio_bitrate })
    }

    /// Drops the destination and audio source so restored settings never
    /// stream somewhere by themselves.
    fn erase_destination(&mut self) {
        self.server.clear();
        self.key.clear();
        self.custom_audio_source = false;
        self.audio_source.clear();
    }
}

/// Reads and writes the last-used settings file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Creates a store for an explicit file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store in the platform config directory.
    pub fn from_project_dirs() -> Result<Self, SettingsError> {
        let dirs =
            ProjectDirs::from("", "", "branch-output").ok_or(SettingsError::NoConfigDir)?;
        Ok(Self::new(dirs.config_dir().join(RECENT_SETTINGS_FILE)))
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the file. Returns `None` if it does not exist.
    pub fn load(&self) -> Result<Option<OutputSettings>, SettingsError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SettingsError::io(&self.path, e)),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| SettingsError::Malformed {
                path: self.path.clone(),
                source,
            })
    }

    /// Loads the file for a newly created filter, without its server, key
    /// and audio source selection.
    pub fn load_recent(&self) -> Result<Option<OutputSettings>, SettingsError> {
        Ok(self.load()?.map(|mut settings| {
            settings.erase_destination();
            settings
        }))
    }

    /// Saves `settings`.
    ///
    /// Writes a temporary file first, keeps the previous file as `.bak`, then
    /// renames the temporary file into place.
    pub fn save(&self, settings: &OutputSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| SettingsError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(settings).map_err(|source| {
            SettingsError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| SettingsError::io(&tmp, e))?;

        if self.path.exists() {
            let bak = self.path.with_extension("json.bak");
            fs::copy(&self.path, &bak).map_err(|e| SettingsError::io(&bak, e))?;
        }

        fs::rename(&tmp, &self.path).map_err(|e| SettingsError::io(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}
