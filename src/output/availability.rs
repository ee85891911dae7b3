//! Rate-limited upstream availability check.

use std::time::Duration;

/// Caches the scene-graph answer for a fixed interval.
///
/// Walking every scene is too expensive for every tick, so the query runs at
/// most once per interval and the last answer is reused in between.
#[derive(Debug, Clone)]
pub struct AvailabilityMonitor {
    interval_ns: u64,
    last_checked_at: Option<u64>,
    last_result: bool,
}

impl AvailabilityMonitor {
    /// Creates a monitor that has never checked.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ns: u64::try_from(interval.as_nanos()).unwrap_or(u64::MAX),
            last_checked_at: None,
            last_result: true,
        }
    }

    /// Returns whether the upstream is available at `now_ns`, running `query`
    /// only when the interval has elapsed since the last query.
    pub fn check(&mut self, now_ns: u64, query: impl FnOnce() -> bool) -> bool {
        if let Some(last) = self.last_checked_at {
            if now_ns.saturating_sub(last) < self.interval_ns {
                return self.last_result;
            }
        }
        self.last_checked_at = Some(now_ns);
        self.last_result = query();
        self.last_result
    }

    /// Forgets the cached answer.
    pub fn reset(&mut self) {
        self.last_checked_at = None;
        self.last_result = true;
    }
}
