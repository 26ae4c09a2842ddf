//! Runtime controls for the tick runner.
//!
//! [`OperatorState`] is shared (behind an [`Arc`]) between the runner and
//! whatever drives it: a console, a signal handler, a test. Flags are
//! atomics so the tick loop reads them without locking.
//!
//! [`Arc`]: std::sync::Arc

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use crate::config::MAX_SPEED;

/// Marker for "no speed change requested".
const NO_SPEED_REQUEST: u8 = u8::MAX;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEndReason {
    /// Nothing left queued, scheduled, or awaiting completion.
    Idle,
    /// The configured tick limit was reached.
    MaxTicksReached,
    /// Stop was requested.
    OperatorStop,
}

/// Shared runtime control state for the runner.
#[derive(Debug)]
pub struct OperatorState {
    /// Whether ticking is paused.
    paused: AtomicBool,

    /// Wakes the loop on resume or stop.
    wake: Notify,

    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Real-time milliseconds per tick (runtime-adjustable).
    tick_interval_ms: AtomicU64,

    /// Speed to apply before the next tick, or [`NO_SPEED_REQUEST`].
    speed_request: AtomicU8,

    /// Maximum ticks to run (0 = unlimited).
    max_ticks: u64,

    /// When the state was created.
    started_at: DateTime<Utc>,
}

impl OperatorState {
    /// Create control state for a run.
    pub fn new(tick_interval_ms: u64, max_ticks: u64) -> Self {
        Self {
            paused: AtomicBool::new(false),
            wake: Notify::new(),
            stop_requested: AtomicBool::new(false),
            tick_interval_ms: AtomicU64::new(tick_interval_ms),
            speed_request: AtomicU8::new(NO_SPEED_REQUEST),
            max_ticks,
            started_at: Utc::now(),
        }
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Whether ticking is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause ticking. Scheduled deadlines are in ticks, so nothing comes due
    /// while paused.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume ticking.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.wake.notify_one();
    }

    /// Wait until not paused, or until stop is requested.
    pub async fn wait_if_paused(&self) {
        while self.is_paused() && !self.is_stop_requested() {
            self.wake.notified().await;
        }
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a clean stop after the current tick.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    // -----------------------------------------------------------------------
    // Tick interval and speed
    // -----------------------------------------------------------------------

    /// Current tick interval in milliseconds.
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.load(Ordering::Acquire)
    }

    /// Change the tick interval. Returns the previous value, or `None` if
    /// `ms` is 0 (rejected).
    pub fn set_tick_interval_ms(&self, ms: u64) -> Option<u64> {
        if ms == 0 {
            return None;
        }
        Some(self.tick_interval_ms.swap(ms, Ordering::AcqRel))
    }

    /// Ask the runner to change the regeneration speed before its next tick.
    /// Values above the maximum are clamped.
    pub fn request_speed(&self, speed: u8) {
        self.speed_request
            .store(speed.min(MAX_SPEED), Ordering::Release);
    }

    /// Take the pending speed request, if any.
    pub fn take_speed_request(&self) -> Option<u8> {
        match self.speed_request.swap(NO_SPEED_REQUEST, Ordering::AcqRel) {
            NO_SPEED_REQUEST => None,
            speed => Some(speed),
        }
    }

    // -----------------------------------------------------------------------
    // Bounds
    // -----------------------------------------------------------------------

    /// Whether `ticks_run` has reached the tick limit.
    pub const fn tick_limit_reached(&self, ticks_run: u64) -> bool {
        self.max_ticks > 0 && ticks_run >= self.max_ticks
    }

    /// Configured tick limit (0 = unlimited).
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// When the run started.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn pause_and_resume() {
        let state = OperatorState::new(50, 0);
        assert!(!state.is_paused());
        state.pause();
        assert!(state.is_paused());
        state.resume();
        assert!(!state.is_paused());
    }

    #[test]
    fn speed_request_is_taken_once() {
        let state = OperatorState::new(50, 0);
        assert_eq!(state.take_speed_request(), None);
        state.request_speed(42);
        assert_eq!(state.take_speed_request(), Some(MAX_SPEED));
        assert_eq!(state.take_speed_request(), None);
    }

    #[test]
    fn zero_tick_interval_rejected() {
        let state = OperatorState::new(50, 0);
        assert_eq!(state.set_tick_interval_ms(0), None);
        assert_eq!(state.set_tick_interval_ms(10), Some(50));
        assert_eq!(state.tick_interval_ms(), 10);
    }

    #[test]
    fn tick_limit() {
        assert!(!OperatorState::new(50, 0).tick_limit_reached(u64::MAX));
        let bounded = OperatorState::new(50, 3);
        assert!(!bounded.tick_limit_reached(2));
        assert!(bounded.tick_limit_reached(3));
    }

    #[tokio::test]
    async fn stop_releases_paused_waiter() {
        let state = Arc::new(OperatorState::new(50, 0));
        state.pause();
        let waiter = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.wait_if_paused().await })
        };
        state.request_stop();
        let joined = tokio::time::timeout(std::time::Duration::from_secs(1), waiter).await;
        assert!(matches!(joined, Ok(Ok(()))));
    }
}
