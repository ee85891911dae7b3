//! Background tick driver.
//!
//! Hosts that render video call [`BranchFilter::video_tick`] themselves.
//! Hosts without a frame tick can hand the filter to a [`TickSession`],
//! which drives the lifecycle from a tokio task at a fixed period.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::filter::BranchFilter;
use crate::output::TickAction;

/// Tick period matching a 30 fps host.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(33);

/// Counters of a tick session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Ticks run.
    pub ticks: u64,
    /// Ticks that attempted a start from idle.
    pub starts: u64,
    /// Ticks that restarted a running output.
    pub restarts: u64,
    /// Ticks that stopped a running output.
    pub stops: u64,
}

enum SessionCommand {
    Stop,
}

struct SessionState {
    running: AtomicBool,
    ticks: AtomicU64,
    starts: AtomicU64,
    restarts: AtomicU64,
    stops: AtomicU64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            ticks: AtomicU64::new(0),
            starts: AtomicU64::new(0),
            restarts: AtomicU64::new(0),
            stops: AtomicU64::new(0),
        }
    }

    fn record(&self, action: TickAction) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let counter = match action {
            TickAction::Unchanged => return,
            TickAction::Start => &self.starts,
            TickAction::Restart(_) => &self.restarts,
            TickAction::Stop(_) => &self.stops,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handle to a running tick task.
///
/// Ticking runs until [`stop()`](TickSession::stop) is called or the handle
/// is dropped. Stopping the session does not stop the output; drop or
/// destroy the filter for that.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use branch_output::host::mock::MockHost;
/// use branch_output::{BranchFilterBuilder, TickSession};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let filter = Arc::new(BranchFilterBuilder::new("f", Arc::new(MockHost::new())).build());
/// let session = TickSession::spawn(Arc::clone(&filter), Duration::from_millis(10));
///
/// tokio::time::sleep(Duration::from_millis(50)).await;
/// session.stop().await;
/// # }
/// ```
pub struct TickSession {
    state: Arc<SessionState>,
    cmd_tx: mpsc::Sender<SessionCommand>,
    handle: Option<JoinHandle<()>>,
}

impl TickSession {
    /// Starts ticking `filter` every `period`. Must be called inside a tokio
    /// runtime.
    pub fn spawn(filter: Arc<BranchFilter>, period: Duration) -> Self {
        let state = Arc::new(SessionState::new());
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let handle = tokio::spawn(run(filter, period, Arc::clone(&state), cmd_rx));
        Self {
            state,
            cmd_tx,
            handle: Some(handle),
        }
    }

    /// Returns `true` while the task is ticking.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Returns the current counters.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            ticks: self.state.ticks.load(Ordering::Relaxed),
            starts: self.state.starts.load(Ordering::Relaxed),
            restarts: self.state.restarts.load(Ordering::Relaxed),
            stops: self.state.stops.load(Ordering::Relaxed),
        }
    }

    /// Stops ticking and waits for the task to finish.
    pub async fn stop(mut self) {
        if !self.state.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.cmd_tx.send(SessionCommand::Stop).await;
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TickSession {
    fn drop(&mut self) {
        if self.state.running.swap(false, Ordering::SeqCst) {
            let _ = self.cmd_tx.try_send(SessionCommand::Stop);
        }
    }
}

async fn run(
    filter: Arc<BranchFilter>,
    period: Duration,
    state: Arc<SessionState>,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::debug!(filter = %filter.name(), ?period, "tick session started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let action = filter.tick();
                state.record(action);
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Stop) | None => break,
                }
            }
        }
    }

    state.running.store(false, Ordering::SeqCst);
    tracing::debug!(filter = %filter.name(), "tick session stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::MockHost;
    use crate::{BranchFilterBuilder, OutputSettings};

    fn filter(host: &MockHost) -> Arc<BranchFilter> {
        Arc::new(
            BranchFilterBuilder::new("f", Arc::new(host.clone()))
                .settings(OutputSettings {
                    server: "rtmp://a/b".to_string(),
                    ..OutputSettings::default()
                })
                .build(),
        )
    }

    #[test]
    fn test_session_stats_default() {
        let stats = SessionStats::default();
        assert_eq!(stats.ticks, 0);
        assert_eq!(stats.starts, 0);
    }

    #[test]
    fn test_state_records_actions() {
        let state = SessionState::new();
        state.record(TickAction::Start);
        state.record(TickAction::Unchanged);
        state.record(TickAction::Stop(crate::StopReason::Requested));
        assert_eq!(state.ticks.load(Ordering::Relaxed), 3);
        assert_eq!(state.starts.load(Ordering::Relaxed), 1);
        assert_eq!(state.stops.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_ticks_filter() {
        let host = MockHost::new();
        let filter = filter(&host);
        let session = TickSession::spawn(Arc::clone(&filter), Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(55)).await;
        let stats = session.stats();
        assert!(stats.ticks >= 3, "ticks = {}", stats.ticks);
        assert_eq!(stats.starts, 1);
        assert!(filter.is_active());

        session.stop().await;
        assert!(filter.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_ticking() {
        let host = MockHost::new();
        let filter = filter(&host);
        let session = TickSession::spawn(Arc::clone(&filter), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(25)).await;

        let state = Arc::clone(&session.state);
        session.stop().await;
        let ticks = state.ticks.load(Ordering::Relaxed);
        assert!(!state.running.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(state.ticks.load(Ordering::Relaxed), ticks);
    }
}
