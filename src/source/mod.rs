//! Production adapters that feed the audio bridge.
//!
//! Three mutually exclusive adapters normalize the host's different audio
//! callback shapes into one [`AudioFrame`] forwarded through a [`TapTarget`]:
//!
//! - [`FilterTapSlot`]: audio passing through the filter
//! - [`NamedSourceTap`]: capture callback on another host source
//! - [`MasterBusTap`]: raw audio of one master mix bus

mod filter_tap;
mod frame;
mod kind;
mod master_tap;
mod mock;
mod named_tap;
mod source_id;
mod tap;

pub use filter_tap::{FilterTapRegistration, FilterTapSlot};
pub use frame::AudioFrame;
pub use kind::{AudioSourceKind, AudioSourceSelection, MASTER_TRACK_PREFIX, NO_AUDIO};
pub use master_tap::MasterBusTap;
pub use mock::{ramp_value, MockSource};
pub use named_tap::NamedSourceTap;
pub use source_id::SourceId;
pub use tap::TapTarget;
