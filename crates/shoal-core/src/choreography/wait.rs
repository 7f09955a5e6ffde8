//! Bounded arrival wait for two-participant events.
//!
//! Participants are checked on a fixed poll interval against an explicit
//! deadline. The wait always settles: either both participants arrived, the
//! deadline passed, or the event cancelled it. It never blocks the tick.

use shoal_types::SyncOutcome;

use crate::config::SyncTuning;

/// Result of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPoll {
    /// Still waiting.
    Pending,
    /// Settled with the given outcome.
    Done(SyncOutcome),
}

/// A deadline-bounded wait for a condition checked on a poll interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrivalWait {
    deadline_ms: u64,
    poll_interval_ms: u64,
    next_poll_ms: u64,
    settled: Option<SyncOutcome>,
}

impl ArrivalWait {
    /// Start waiting at `now_ms`.
    pub fn new(now_ms: u64, tuning: &SyncTuning) -> Self {
        let poll_interval_ms = tuning.poll_interval_ms.max(1);
        Self {
            deadline_ms: now_ms.saturating_add(tuning.timeout_ms),
            poll_interval_ms,
            next_poll_ms: now_ms.saturating_add(poll_interval_ms),
            settled: None,
        }
    }

    /// Check the condition if a poll is due.
    ///
    /// `arrived` is only evaluated on poll boundaries and at the deadline.
    /// Once settled, the same outcome is returned on every call.
    pub fn poll(&mut self, now_ms: u64, arrived: impl FnOnce() -> bool) -> WaitPoll {
        if let Some(outcome) = self.settled {
            return WaitPoll::Done(outcome);
        }
        if now_ms >= self.deadline_ms {
            let outcome = if arrived() {
                SyncOutcome::Arrived
            } else {
                SyncOutcome::TimedOut
            };
            return self.settle(outcome);
        }
        if now_ms < self.next_poll_ms {
            return WaitPoll::Pending;
        }
        if arrived() {
            return self.settle(SyncOutcome::Arrived);
        }
        self.next_poll_ms = now_ms.saturating_add(self.poll_interval_ms);
        WaitPoll::Pending
    }

    /// Settle as cancelled, unless already settled.
    pub fn cancel(&mut self) -> SyncOutcome {
        *self.settled.get_or_insert(SyncOutcome::Cancelled)
    }

    /// Outcome, once settled.
    pub const fn outcome(&self) -> Option<SyncOutcome> {
        self.settled
    }

    fn settle(&mut self, outcome: SyncOutcome) -> WaitPoll {
        self.settled = Some(outcome);
        WaitPoll::Done(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> SyncTuning {
        SyncTuning {
            poll_interval_ms: 100,
            timeout_ms: 1_000,
            tolerance: 1.0,
        }
    }

    #[test]
    fn arrival_is_only_checked_on_poll_boundaries() {
        let mut wait = ArrivalWait::new(0, &tuning());
        let mut checks = 0_u32;
        for now in (0..100).step_by(50) {
            let _ = wait.poll(now, || {
                checks = checks.saturating_add(1);
                true
            });
        }
        assert_eq!(checks, 0);
        assert_eq!(wait.poll(100, || true), WaitPoll::Done(SyncOutcome::Arrived));
    }

    #[test]
    fn deadline_always_settles() {
        let mut wait = ArrivalWait::new(0, &tuning());
        for now in (0..1_000).step_by(50) {
            assert_eq!(wait.poll(now, || false), WaitPoll::Pending);
        }
        assert_eq!(
            wait.poll(1_000, || false),
            WaitPoll::Done(SyncOutcome::TimedOut)
        );
        assert_eq!(wait.outcome(), Some(SyncOutcome::TimedOut));
    }

    #[test]
    fn settled_outcome_is_sticky() {
        let mut wait = ArrivalWait::new(0, &tuning());
        assert_eq!(wait.poll(100, || true), WaitPoll::Done(SyncOutcome::Arrived));
        assert_eq!(wait.cancel(), SyncOutcome::Arrived);
        assert_eq!(
            wait.poll(5_000, || false),
            WaitPoll::Done(SyncOutcome::Arrived)
        );
    }

    #[test]
    fn cancel_settles_pending_wait() {
        let mut wait = ArrivalWait::new(0, &tuning());
        assert_eq!(wait.cancel(), SyncOutcome::Cancelled);
        assert_eq!(
            wait.poll(200, || true),
            WaitPoll::Done(SyncOutcome::Cancelled)
        );
    }
}
