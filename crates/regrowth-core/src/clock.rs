//! Tick clock for the restoration scheduler.
//!
//! The clock is the single source of truth for scheduler time. Every
//! deadline (layer pacing, per-cell restore) is an absolute tick number
//! derived from it, so no component ever sleeps or keeps its own timer.
//!
//! All derivations use checked arithmetic (no silent overflow).

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,
}

/// Monotonic tick counter driven by the host tick loop.
///
/// The clock starts at tick 0 and advances once per host step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickClock {
    /// Current tick number (0 before the first advance).
    tick: u64,
}

impl TickClock {
    /// Create a clock at tick 0.
    pub const fn new() -> Self {
        Self { tick: 0 }
    }

    /// Create a clock at an explicit tick (useful for tests).
    pub const fn at(tick: u64) -> Self {
        Self { tick }
    }

    /// Advance the clock by one tick. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the tick counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        Ok(self.tick)
    }

    /// Return the current tick number.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Return the absolute tick that lies `delay` ticks from now,
    /// saturating at `u64::MAX`.
    pub const fn deadline_after(&self, delay: u64) -> u64 {
        self.tick.saturating_add(delay)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clock_starts_at_tick_zero() {
        let clock = TickClock::new();
        assert_eq!(clock.tick(), 0);
    }

    #[test]
    fn clock_advances() {
        let mut clock = TickClock::new();
        assert_eq!(clock.advance().unwrap(), 1);
        assert_eq!(clock.advance().unwrap(), 2);
        assert_eq!(clock.tick(), 2);
    }

    #[test]
    fn clock_refuses_to_overflow() {
        let mut clock = TickClock::at(u64::MAX);
        assert!(matches!(clock.advance(), Err(ClockError::TickOverflow)));
        assert_eq!(clock.tick(), u64::MAX);
    }

    #[test]
    fn deadline_saturates() {
        let clock = TickClock::at(u64::MAX.saturating_sub(1));
        assert_eq!(clock.deadline_after(10), u64::MAX);
        assert_eq!(TickClock::at(5).deadline_after(3), 8);
    }
}
