//! Scheduling helpers for background worker loops.
//!
//! `IntervalScheduler` tracks a monotonic deadline for a periodic job that
//! may skip ticks (back off) without doing any work.

use std::time::{Duration, Instant};

/// Tracks monotonic deadlines for a periodic task
#[derive(Debug, Clone)]
pub struct IntervalScheduler {
    interval: Duration,
    next_deadline: Instant,
}

impl IntervalScheduler {
    /// Create a scheduler whose first tick is due immediately
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_deadline: Instant::now(),
        }
    }

    /// Configured tick interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time remaining until the next deadline (zero if already due)
    pub fn timeout(&self) -> Duration {
        self.next_deadline.saturating_duration_since(Instant::now())
    }

    /// Skip the current tick and reschedule one interval from now
    pub fn defer(&mut self) {
        self.next_deadline = Instant::now() + self.interval;
    }

    /// Record that the job ran and compute the next deadline
    pub fn executed(&mut self) {
        self.next_deadline = Instant::now() + self.interval;
    }

    /// Defer if `condition` holds, returning `true` when the tick was skipped
    pub fn skip_if(&mut self, condition: bool) -> bool {
        if condition {
            self.defer();
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_first_tick_is_due_immediately() {
        let scheduler = IntervalScheduler::new(Duration::from_millis(100));
        assert!(scheduler.timeout() <= Duration::from_millis(1));
    }

    #[test]
    fn test_skip_and_execute() {
        let mut scheduler = IntervalScheduler::new(Duration::from_millis(100));

        assert!(scheduler.skip_if(true));
        let after_skip = scheduler.timeout();
        assert!(after_skip > Duration::from_millis(80));
        assert!(after_skip <= Duration::from_millis(100));

        scheduler.executed();
        thread::sleep(Duration::from_millis(20));
        let after_execute = scheduler.timeout();
        assert!(after_execute <= Duration::from_millis(81));

        let before = scheduler.timeout();
        assert!(!scheduler.skip_if(false));
        assert!(scheduler.timeout() <= before);
    }

    #[test]
    fn test_timeout_saturates_at_zero() {
        let scheduler = IntervalScheduler::new(Duration::from_millis(1));
        thread::sleep(Duration::from_millis(5));
        assert_eq!(scheduler.timeout(), Duration::ZERO);
    }
}
