//! Audio path between the production adapters and the host mixer.
//!
//! Producers push into an [`AudioBridge`] from capture threads; the host's
//! mixing thread pulls fixed periods through a [`PullConsumer`]. The
//! [`OutputGate`] carries the lifecycle's state to both sides without locks.

mod bridge;
mod chunk_store;
mod gate;
mod mix;
mod pull;

pub use bridge::{
    create_audio_bridge, AudioBridge, BridgeNotice, DrainOutcome, NoticeReceiver, PushOutcome,
};
pub use chunk_store::{ChunkStore, ChunkView};
pub use gate::OutputGate;
pub use mix::{mix_and_clip, MixBuffers, MixDestination};
pub use pull::{PullConsumer, PullOutcome};
