//! Audio bridge buffer between irregular producers and the fixed-cadence mixer.
//!
//! Producers push whatever they receive, whenever they receive it. The host
//! mixer pulls exactly one output period per call and must never wait, so
//! the bridge either serves a full period or nothing at all.
//!
//! A single lock covers an entire push or an entire drain. Inside the lock
//! the bridge only moves samples between memory it already owns; the scratch
//! buffer grows only when a larger chunk than any before shows up.
//!
//! The bridge never logs from inside the lock. Overflow, starvation onset and
//! scratch growth are queued as [`BridgeNotice`]s on a lock-free ring and
//! picked up by the lifecycle tick.

use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::config::{BridgeConfig, MAX_AUDIO_CHANNELS, MAX_AUDIO_MIXES};
use crate::pipeline::chunk_store::ChunkStore;
use crate::pipeline::mix::{mix_and_clip, MixDestination};
use crate::ChunkHeader;

/// Something the bridge observed that the control side should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeNotice {
    /// The buffer hit its ceiling and was reset.
    Overflow {
        /// Frames discarded by the reset.
        dropped_frames: usize,
        /// Frames in the push that triggered the reset.
        incoming_frames: usize,
    },
    /// A pull found fewer frames than one period; first of a streak.
    Starved {
        /// Frames that were buffered.
        available: usize,
        /// Frames the pull asked for.
        requested: usize,
    },
    /// The scratch buffer grew to fit a larger chunk.
    ScratchExpanded {
        /// Previous capacity in bytes.
        from_bytes: usize,
        /// New capacity in bytes.
        to_bytes: usize,
    },
}

/// What happened to a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The chunk was appended.
    Buffered,
    /// The buffer was reset first, then the chunk was appended.
    BufferedAfterReset {
        /// Frames discarded by the reset.
        dropped_frames: usize,
    },
    /// The push carried no frames or no channels and was ignored.
    Ignored,
    /// The chunk alone exceeds the ceiling; the buffer was reset and the
    /// chunk discarded.
    Rejected,
}

/// What happened to a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// A full period was mixed into the destinations.
    Drained {
        /// Frames mixed (always the requested count).
        frames: usize,
    },
    /// Not enough frames were buffered; nothing was written.
    Starved {
        /// Frames that were buffered.
        available: usize,
        /// Consecutive starved drains, including this one.
        streak: u64,
    },
}

impl DrainOutcome {
    /// Returns the number of frames written to the destinations.
    pub fn frames_written(&self) -> usize {
        match self {
            Self::Drained { frames } => *frames,
            Self::Starved { .. } => 0,
        }
    }
}

struct BridgeState {
    store: ChunkStore,
    buffered_frames: usize,
    scratch: Vec<f32>,
    starvation_streak: u64,
    received_any: bool,
    notices: HeapProd<BridgeNotice>,
}

/// Thread-safe, multi-channel chunk buffer with mixing drain.
///
/// Created when an output starts and dropped when it stops; exactly one
/// bridge exists per running output.
///
/// # Example
///
/// ```
/// use branch_output::{create_audio_bridge, BridgeConfig, MixBuffers};
///
/// let (bridge, _notices) = create_audio_bridge(2, 48_000, BridgeConfig::default(), 16);
///
/// let left = vec![0.25f32; 1024];
/// let right = vec![-0.25f32; 1024];
/// bridge.push(1024, 0, &[Some(&left), Some(&right)]);
///
/// let mut mixes = MixBuffers::new(1, 2, 1024);
/// let outcome = bridge.drain(1024, 0b1, &mut mixes);
/// assert_eq!(outcome.frames_written(), 1024);
/// assert_eq!(mixes.channel(0, 1)[0], -0.25);
/// ```
pub struct AudioBridge {
    channels: usize,
    sample_rate: u32,
    config: BridgeConfig,
    state: Mutex<BridgeState>,
}

impl AudioBridge {
    /// Appends one push worth of planar audio.
    ///
    /// `planes` holds one entry per host channel; `None` marks a channel the
    /// producer did not supply. Only present channels are stored. Entries
    /// beyond the bridge's channel count are ignored.
    pub fn push(&self, frames: u32, timestamp: u64, planes: &[Option<&[f32]>]) -> PushOutcome {
        let frame_count = frames as usize;
        let mut header = ChunkHeader::new(frames, timestamp);
        let empty: &[f32] = &[];
        let mut present = [empty; MAX_AUDIO_CHANNELS];
        for (ch, plane) in planes.iter().enumerate().take(self.channels) {
            let Some(plane) = plane else {
                continue;
            };
            debug_assert!(plane.len() >= frame_count, "channel {ch} plane is short");
            if plane.len() < frame_count {
                continue;
            }
            present[usize::from(header.channel_count)] = &plane[..frame_count];
            header.add_channel(ch);
        }

        if frame_count == 0 || header.channel_count == 0 {
            return PushOutcome::Ignored;
        }

        let mut state = self.state.lock();
        let mut outcome = PushOutcome::Buffered;

        if state.buffered_frames + frame_count > self.config.max_buffer_frames {
            let dropped_frames = state.buffered_frames;
            state.store.clear();
            state.buffered_frames = 0;
            let _ = state.notices.try_push(BridgeNotice::Overflow {
                dropped_frames,
                incoming_frames: frame_count,
            });
            if frame_count > self.config.max_buffer_frames {
                return PushOutcome::Rejected;
            }
            outcome = PushOutcome::BufferedAfterReset { dropped_frames };
        }

        state
            .store
            .push_back(header, &present[..usize::from(header.channel_count)]);

        let payload_len = header.payload_len();
        let capacity = state.scratch.capacity();
        if payload_len > capacity {
            state.scratch.reserve_exact(payload_len);
            let grown = state.scratch.capacity();
            let _ = state.notices.try_push(BridgeNotice::ScratchExpanded {
                from_bytes: capacity * 4,
                to_bytes: grown * 4,
            });
        }

        state.buffered_frames += frame_count;
        state.received_any = true;
        outcome
    }

    /// Mixes exactly `requested` frames into the buses selected by `mixers`.
    ///
    /// Bit `n` of `mixers` selects mix bus `n`. Samples are added onto the
    /// destination's existing content and clipped to `[-1.0, 1.0]`. When
    /// fewer than `requested` frames are buffered, nothing is written and the
    /// starvation streak grows.
    pub fn drain(
        &self,
        requested: usize,
        mixers: u32,
        destination: &mut dyn MixDestination,
    ) -> DrainOutcome {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.buffered_frames < requested {
            state.starvation_streak += 1;
            if state.starvation_streak == 1 {
                let _ = state.notices.try_push(BridgeNotice::Starved {
                    available: state.buffered_frames,
                    requested,
                });
            }
            return DrainOutcome::Starved {
                available: state.buffered_frames,
                streak: state.starvation_streak,
            };
        }
        state.starvation_streak = 0;

        let mut remaining = requested;
        while remaining > 0 {
            let Some(view) = state.store.peek_front() else {
                break;
            };
            let header = view.header;
            view.copy_into(&mut state.scratch);

            let consumed = header.consumed_offset as usize;
            let available = header.remaining() as usize;
            let take = available.min(remaining);
            let out_offset = requested - remaining;

            for mix in 0..MAX_AUDIO_MIXES {
                if mixers & (1 << mix) == 0 {
                    continue;
                }
                for ch in 0..self.channels {
                    let Some(src_offset) = header.channel_offset(ch) else {
                        continue;
                    };
                    let Some(out) = destination.channel_mut(mix, ch) else {
                        continue;
                    };
                    let start = src_offset + consumed;
                    let src = &state.scratch[start..start + take];
                    let Some(out) = out.get_mut(out_offset..) else {
                        continue;
                    };
                    mix_and_clip(out, src);
                }
            }

            if take == available {
                state.store.pop_front();
            } else {
                // `take < available` keeps the chunk live.
                #[allow(clippy::cast_possible_truncation)]
                state.store.overwrite_at(0, (consumed + take) as u32);
            }

            remaining -= take;
            state.buffered_frames -= take;
        }

        DrainOutcome::Drained {
            frames: requested - remaining,
        }
    }

    /// Drops all buffered audio and resets the frame accounting.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.store.clear();
        state.buffered_frames = 0;
        state.starvation_streak = 0;
    }

    /// Returns the frames currently buffered.
    pub fn buffered_frames(&self) -> usize {
        self.state.lock().buffered_frames
    }

    /// Returns the number of live chunks.
    pub fn chunk_count(&self) -> usize {
        self.state.lock().store.len()
    }

    /// Returns the current starvation streak.
    pub fn starvation_streak(&self) -> u64 {
        self.state.lock().starvation_streak
    }

    /// Returns `true` once any push has been buffered.
    pub fn has_received(&self) -> bool {
        self.state.lock().received_any
    }

    /// Returns the scratch buffer capacity in samples.
    pub fn scratch_capacity(&self) -> usize {
        self.state.lock().scratch.capacity()
    }

    /// Returns the configured channel count.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns the configured sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the bridge configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

impl std::fmt::Debug for AudioBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBridge")
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Receiving end of a bridge's notice queue.
pub struct NoticeReceiver {
    consumer: HeapCons<BridgeNotice>,
}

impl NoticeReceiver {
    /// Takes the oldest pending notice.
    pub fn try_recv(&mut self) -> Option<BridgeNotice> {
        self.consumer.try_pop()
    }

    /// Takes every pending notice.
    pub fn drain(&mut self) -> Vec<BridgeNotice> {
        self.consumer.pop_iter().collect()
    }
}

/// Creates a bridge and the receiver for its notices.
///
/// `channels` is clamped to [`MAX_AUDIO_CHANNELS`].
pub fn create_audio_bridge(
    channels: usize,
    sample_rate: u32,
    config: BridgeConfig,
    notice_capacity: usize,
) -> (std::sync::Arc<AudioBridge>, NoticeReceiver) {
    let ring = HeapRb::<BridgeNotice>::new(notice_capacity.max(1));
    let (producer, consumer) = ring.split();

    let bridge = AudioBridge {
        channels: channels.min(MAX_AUDIO_CHANNELS),
        sample_rate,
        config,
        state: Mutex::new(BridgeState {
            store: ChunkStore::new(),
            buffered_frames: 0,
            scratch: Vec::new(),
            starvation_streak: 0,
            received_any: false,
            notices: producer,
        }),
    };

    (std::sync::Arc::new(bridge), NoticeReceiver { consumer })
}
