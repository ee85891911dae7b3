//! Error types for branch-output.
//!
//! Errors are split into two categories:
//! - **Start failures** ([`OutputError`]): abort one start attempt; the
//!   lifecycle stays idle and tries again on a later tick
//! - **Runtime conditions**: overflow, starvation and stop/restart decisions
//!   are not errors and surface via [`EventCallback`](crate::EventCallback)

use std::path::PathBuf;

/// Failure reported by a host factory or registration call.
///
/// Host integrations wrap whatever their media framework reports into a
/// message; the lifecycle only logs it and retries later.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HostError(String);

impl HostError {
    /// Creates a host error with the given message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the host's message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Failures that abort an output start attempt.
///
/// Every variant leaves the lifecycle idle with all partially acquired
/// resources released.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// The filter has no upstream source to branch from.
    #[error("filter source not found")]
    UpstreamMissing,

    /// The streaming service could not be created.
    #[error("service creation failed: {0}")]
    ServiceCreation(#[source] HostError),

    /// The network output could not be created.
    #[error("stream output '{kind}' creation failed: {source}")]
    OutputCreation {
        /// Output type that was requested.
        kind: String,
        /// Host failure.
        #[source]
        source: HostError,
    },

    /// The view rendering the upstream could not be associated.
    #[error("video output association failed: {0}")]
    ViewCreation(#[source] HostError),

    /// The host reported no audio configuration.
    #[error("host audio is not available")]
    AudioUnavailable,

    /// The configured audio source could not be tapped.
    #[error("audio source '{source_id}' retrieval failed: {source}")]
    AudioSourceRegistration {
        /// Source that was requested.
        source_id: String,
        /// Host failure.
        #[source]
        source: HostError,
    },

    /// The pull-side audio endpoint could not be opened.
    #[error("opening audio output failed: {0}")]
    AudioOutputOpen(#[source] HostError),

    /// The video encoder could not be created.
    #[error("video encoder '{id}' creation failed: {source}")]
    VideoEncoderCreation {
        /// Encoder id from the settings.
        id: String,
        /// Host failure.
        #[source]
        source: HostError,
    },

    /// The audio encoder could not be created.
    #[error("audio encoder '{id}' creation failed: {source}")]
    AudioEncoderCreation {
        /// Encoder id from the settings.
        id: String,
        /// Host failure.
        #[source]
        source: HostError,
    },

    /// The host refused to start the network output.
    #[error("starting stream output failed")]
    StartRejected,
}

/// Errors from loading or saving the last-used settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// No per-user configuration directory could be determined.
    #[error("could not determine config directory")]
    NoConfigDir,

    /// File I/O error.
    #[error("settings file error: {path}: {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON for [`OutputSettings`](crate::OutputSettings).
    #[error("settings file is malformed: {path}: {source}")]
    Malformed {
        /// Path to the file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl SettingsError {
    /// Creates an I/O error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from the filter registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A filter type id was registered more than once.
    #[error("duplicate filter id: {id}")]
    DuplicateFilterId {
        /// The duplicated id.
        id: String,
    },

    /// No filter type is registered under the id.
    #[error("unknown filter id: {id}")]
    UnknownFilterId {
        /// The requested id.
        id: String,
    },
}
