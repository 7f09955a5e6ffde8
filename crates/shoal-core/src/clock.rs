//! Simulation clock.
//!
//! The clock is the single source of truth for simulated time. Every
//! phase deadline, arrival and departure timer, speech expiry, and
//! suppression window is expressed in simulated milliseconds derived from
//! the tick counter, never in wall-clock time. This keeps every event
//! chain reproducible under test: `N` ticks always advance the same
//! amount of time regardless of scheduler jitter.
//!
//! All arithmetic is checked (no silent overflow).

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter or elapsed time would overflow.
    #[error("clock overflow: cannot advance beyond u64::MAX")]
    Overflow,

    /// Invalid tick interval (zero).
    #[error("invalid tick interval: {reason}")]
    InvalidInterval {
        /// Explanation of what is wrong with the interval.
        reason: String,
    },
}

/// Fixed-step simulation clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimClock {
    /// Number of ticks executed.
    tick: u64,
    /// Simulated milliseconds elapsed (`tick * tick_interval_ms`).
    now_ms: u64,
    /// Simulated milliseconds per tick.
    tick_interval_ms: u64,
}

impl SimClock {
    /// Create a clock at tick 0.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidInterval`] if `tick_interval_ms` is 0.
    pub fn new(tick_interval_ms: u64) -> Result<Self, ClockError> {
        if tick_interval_ms == 0 {
            return Err(ClockError::InvalidInterval {
                reason: "tick_interval_ms must be at least 1".to_owned(),
            });
        }
        Ok(Self {
            tick: 0,
            now_ms: 0,
            tick_interval_ms,
        })
    }

    /// Advance by one tick. Returns the new simulated time in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Overflow`] if either counter would overflow.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        let tick = self.tick.checked_add(1).ok_or(ClockError::Overflow)?;
        let now_ms = self
            .now_ms
            .checked_add(self.tick_interval_ms)
            .ok_or(ClockError::Overflow)?;
        self.tick = tick;
        self.now_ms = now_ms;
        Ok(now_ms)
    }

    /// Current tick number.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated milliseconds since start.
    pub const fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Simulated milliseconds per tick.
    pub const fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }

    /// Simulated time `delay_ms` from now, saturating at `u64::MAX`.
    pub const fn after(&self, delay_ms: u64) -> u64 {
        self.now_ms.saturating_add(delay_ms)
    }
}

/// Fraction of `duration_ms` elapsed since `started_ms`, clamped to `0.0..=1.0`.
///
/// A zero duration is treated as already complete.
#[allow(clippy::cast_precision_loss)]
pub fn progress(started_ms: u64, now_ms: u64, duration_ms: u64) -> f64 {
    if duration_ms == 0 {
        return 1.0;
    }
    let elapsed = now_ms.saturating_sub(started_ms);
    (elapsed as f64 / duration_ms as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn clock_starts_at_zero() {
        let clock = SimClock::new(50).unwrap();
        assert_eq!(clock.tick(), 0);
        assert_eq!(clock.now_ms(), 0);
    }

    #[test]
    fn clock_advances_by_interval() {
        let mut clock = SimClock::new(50).unwrap();
        assert_eq!(clock.advance().unwrap(), 50);
        assert_eq!(clock.advance().unwrap(), 100);
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.after(250), 350);
    }

    #[test]
    fn zero_interval_rejected() {
        assert!(SimClock::new(0).is_err());
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(progress(100, 100, 200), 0.0);
        assert_eq!(progress(100, 200, 200), 0.5);
        assert_eq!(progress(100, 900, 200), 1.0);
        assert_eq!(progress(100, 50, 200), 0.0);
        assert_eq!(progress(0, 0, 0), 1.0);
    }
}
