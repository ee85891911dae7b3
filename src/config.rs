//! Configuration types and host constants.

use std::time::Duration;

/// Maximum number of planar channels a host audio frame can carry.
pub const MAX_AUDIO_CHANNELS: usize = 8;

/// Number of parallel mix buses (tracks) exposed by the host mixer.
pub const MAX_AUDIO_MIXES: usize = 6;

/// Frames requested by the host mixer on every pull.
pub const AUDIO_OUTPUT_FRAMES: usize = 1024;

/// Ceiling on buffered frames before the bridge resets itself.
pub const MAX_AUDIO_BUFFER_FRAMES: usize = 131_071;

/// Configuration for the audio bridge buffer.
///
/// Use [`BridgeConfig::default()`] for the host's standard cadence.
///
/// # Example
///
/// ```
/// use branch_output::BridgeConfig;
///
/// let config = BridgeConfig {
///     max_buffer_frames: 48_000,
///     ..Default::default()
/// };
/// assert_eq!(config.output_frames, 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Buffered frames allowed before the whole buffer is dropped.
    ///
    /// A push that would take the buffer past this ceiling first resets it
    /// to empty and emits [`OutputEvent::BufferOverflow`].
    /// Default: [`MAX_AUDIO_BUFFER_FRAMES`]
    ///
    /// [`OutputEvent::BufferOverflow`]: crate::OutputEvent::BufferOverflow
    pub max_buffer_frames: usize,

    /// Frames drained per pull.
    ///
    /// Default: [`AUDIO_OUTPUT_FRAMES`]
    pub output_frames: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_buffer_frames: MAX_AUDIO_BUFFER_FRAMES,
            output_frames: AUDIO_OUTPUT_FRAMES,
        }
    }
}

/// Timing and retry configuration for the output lifecycle.
///
/// All intervals are measured against the host clock, so tests can drive
/// them with an injected clock instead of waiting.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// How long a connection attempt may run before the lifecycle checks
    /// whether the stream came up.
    ///
    /// Restarts for settings changes and geometry changes are also deferred
    /// until this window has elapsed.
    /// Default: 10s
    pub connect_timeout: Duration,

    /// Minimum interval between scene-graph reachability queries.
    ///
    /// Between queries the previous answer is reused.
    /// Default: 1s
    pub availability_check_interval: Duration,

    /// Delay before another start attempt after one failed.
    ///
    /// Default: 1s
    pub start_retry_backoff: Duration,

    /// Reconnect attempts the host output performs on its own.
    ///
    /// Default: 7
    pub output_max_retries: u32,

    /// Delay between the host output's own reconnect attempts.
    ///
    /// Default: 1s
    pub output_retry_delay: Duration,

    /// Capacity of the queue carrying bridge notices out of the audio threads.
    ///
    /// Notices are dropped when the queue is full.
    /// Default: 64
    pub notice_queue_capacity: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            availability_check_interval: Duration::from_secs(1),
            start_retry_backoff: Duration::from_secs(1),
            output_max_retries: 7,
            output_retry_delay: Duration::from_secs(1),
            notice_queue_capacity: 64,
        }
    }
}
