//! Runtime events for monitoring a branch output.
//!
//! Events are notifications, not errors. A failed start is retried on a later
//! tick and overflow or starvation never stop the output; the events exist
//! for logging and metrics.

use std::sync::Arc;

use crate::source::AudioSourceKind;

/// Why an output was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Explicit stop, restart or filter destruction.
    Requested,
    /// The filter's visibility toggle was switched off.
    SourceDisabled,
    /// The upstream width or height rounded to zero.
    ZeroGeometry,
    /// The upstream is no longer part of any scene.
    Unreachable,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Requested => "requested",
            Self::SourceDisabled => "source disabled",
            Self::ZeroGeometry => "zero geometry",
            Self::Unreachable => "source unreachable",
        })
    }
}

/// Why an output is being restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// The connect timeout elapsed and the output is not streaming.
    ConnectTimeout,
    /// Settings were updated since the last start.
    SettingsChanged,
    /// The upstream size changed since the last start.
    GeometryChanged,
}

impl std::fmt::Display for RestartReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ConnectTimeout => "connect timeout",
            Self::SettingsChanged => "settings changed",
            Self::GeometryChanged => "geometry changed",
        })
    }
}

/// Runtime events emitted by the output lifecycle.
///
/// # Example
///
/// ```
/// use branch_output::OutputEvent;
///
/// fn handle_event(event: OutputEvent) {
///     match event {
///         OutputEvent::OutputStarted { output_type, width, height, .. } => {
///             eprintln!("streaming via {output_type} at {width}x{height}");
///         }
///         OutputEvent::OutputStartFailed { error } => eprintln!("start failed: {error}"),
///         OutputEvent::BufferOverflow { dropped_frames, .. } => {
///             eprintln!("dropped {dropped_frames} frames");
///         }
///         other => eprintln!("{other:?}"),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// The network output started.
    OutputStarted {
        /// Output type that was created.
        output_type: String,
        /// Video width after even rounding.
        width: u32,
        /// Video height after even rounding.
        height: u32,
        /// Adapter feeding the output's audio.
        audio_source: AudioSourceKind,
        /// Settings revision the output runs with.
        revision: u64,
    },

    /// A start attempt failed; all partially acquired resources were released.
    OutputStartFailed {
        /// Description of the failure.
        error: String,
    },

    /// A running output was stopped.
    OutputStopped {
        /// Why it stopped.
        reason: StopReason,
    },

    /// The lifecycle is tearing the output down to start it again.
    RestartScheduled {
        /// Why it restarts.
        reason: RestartReason,
    },

    /// The audio bridge hit its ceiling and was reset.
    BufferOverflow {
        /// Frames discarded.
        dropped_frames: usize,
        /// Frames in the push that triggered the reset.
        incoming_frames: usize,
    },

    /// The mixer pulled with less than one period buffered. Emitted once per
    /// streak of starved pulls.
    AudioStarved {
        /// Frames that were buffered.
        available: usize,
        /// Frames the mixer asked for.
        requested: usize,
    },

    /// The bridge's scratch buffer grew.
    ScratchExpanded {
        /// Previous capacity in bytes.
        from_bytes: usize,
        /// New capacity in bytes.
        to_bytes: usize,
    },
}

/// Callback type for receiving runtime events.
///
/// Register one with
/// [`BranchFilterBuilder::on_event()`](crate::BranchFilterBuilder::on_event).
pub type EventCallback = Arc<dyn Fn(OutputEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use branch_output::{event_callback, OutputEvent};
///
/// let callback = event_callback(|event: OutputEvent| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(OutputEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}
