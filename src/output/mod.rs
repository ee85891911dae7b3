//! Network output lifecycle.

mod availability;
mod lifecycle;
mod protocol;
mod resources;

pub use availability::AvailabilityMonitor;
pub use lifecycle::{
    round_up_even, OutputLifecycle, OutputState, SkipReason, StartOutcome, TickAction,
    AUDIO_TRACK, SERVICE_KIND,
};
pub use protocol::{
    DefaultOutputTypePolicy, OutputTypePolicy, FTL_OUTPUT, MPEGTS_OUTPUT, RTMP_OUTPUT,
};
pub use resources::OutputResources;
