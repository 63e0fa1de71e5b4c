//! Elapsed-time and deadline tracking for polling loops.

use std::time::{Duration, Instant};

/// Records a start instant and an optional deadline.
///
/// Used by loops that poll for completion instead of blocking on a signal.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    started: Instant,
    deadline: Duration,
}

impl Timer {
    /// Timer started now with no deadline.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            deadline: Duration::ZERO,
        }
    }

    /// Restart the clock; `deadline_ms` is what [`Timer::is_timeup`] compares against.
    pub fn start(&mut self, deadline_ms: u32) {
        self.started = Instant::now();
        self.deadline = Duration::from_millis(u64::from(deadline_ms));
    }

    /// True once `ms` milliseconds have elapsed since `start`.
    pub fn is_timeup_after(&self, ms: u32) -> bool {
        self.started.elapsed() >= Duration::from_millis(u64::from(ms))
    }

    /// True once the stored deadline has elapsed. A zero deadline is
    /// already up.
    pub fn is_timeup(&self) -> bool {
        self.started.elapsed() >= self.deadline
    }

    /// Time since `start`.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Marks the end of a timed section. Does nothing.
    pub fn stop(&mut self) {}
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
