//! # branch-output
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Branches one video source of a live compositor into its own network
//! stream, with its own encoders and its own audio.
//!
//! A [`BranchFilter`] attached to a source owns one network output. Its
//! lifecycle is evaluated once per host tick: it starts the output when a
//! server is configured, restarts it after settings or size changes or a
//! failed connect, and stops it when the source is hidden or leaves every
//! scene.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use branch_output::{BranchFilterBuilder, OutputSettings, SettingsStore};
//!
//! let filter = BranchFilterBuilder::new("Branch Output 1", host)
//!     .settings(OutputSettings {
//!         server: "rtmp://live.example.com/app".to_string(),
//!         key: "secret".to_string(),
//!         ..OutputSettings::default()
//!     })
//!     .settings_store(SettingsStore::from_project_dirs()?)
//!     .on_event(|e| tracing::info!(?e, "branch output event"))
//!     .build();
//!
//! // Host audio thread
//! filter.filter_audio(&frame);
//!
//! // Host video thread, once per frame
//! filter.video_tick();
//! ```
//!
//! ## Architecture
//!
//! Audio crosses three thread boundaries:
//!
//! - **Capture threads**: one production adapter pushes planar frames into
//!   the [`AudioBridge`]
//! - **Mixing thread**: the host pulls exactly one period per callback
//!   through a [`PullConsumer`], mixed into the selected buses
//! - **Tick thread**: the [`OutputLifecycle`] starts and stops the output
//!   and logs what the bridge reported
//!
//! The bridge takes one short lock per push or drain and never allocates
//! except when the first larger chunk arrives. Diagnostics from the audio
//! path travel through a lock-free queue and are logged on the tick.
//!
//! [`AudioBridge`]: pipeline::AudioBridge
//! [`PullConsumer`]: pipeline::PullConsumer
//! [`OutputLifecycle`]: output::OutputLifecycle

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample counts and offsets
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod builder;
mod chunk;
mod config;
mod error;
mod event;
mod filter;
pub mod host;
pub mod output;
pub mod pipeline;
mod registry;
mod session;
mod settings;
pub mod source;

pub use builder::BranchFilterBuilder;
pub use chunk::ChunkHeader;
pub use config::{
    BridgeConfig, LifecycleConfig, AUDIO_OUTPUT_FRAMES, MAX_AUDIO_BUFFER_FRAMES,
    MAX_AUDIO_CHANNELS, MAX_AUDIO_MIXES,
};
pub use error::{HostError, OutputError, RegistryError, SettingsError};
pub use event::{event_callback, EventCallback, OutputEvent, RestartReason, StopReason};
pub use filter::BranchFilter;
pub use output::{OutputState, StartOutcome, TickAction};
pub use pipeline::{create_audio_bridge, MixBuffers, MixDestination};
pub use registry::{
    FilterConstructor, FilterContext, FilterDescriptor, FilterRegistry, BRANCH_OUTPUT_FILTER_ID,
};
pub use session::{SessionStats, TickSession, DEFAULT_TICK_PERIOD};
pub use settings::{OutputSettings, SettingsStore, RECENT_SETTINGS_FILE};
pub use source::{AudioFrame, SourceId};
