//! On/off toggle schedules.
//!
//! A schedule is a list of interval lengths alternating between enabled and disabled, starting
//! enabled: `[6, 3, 5, 1]` keeps the impairment on for 6s, off for 3s, on for 5s and off for 1s.

use std::time::Duration;

/// One step of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub enabled: bool,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToggleSchedule {
    intervals: Vec<Duration>,
}

impl ToggleSchedule {
    pub fn new(intervals: Vec<Duration>) -> Self {
        Self { intervals }
    }

    pub fn from_secs(secs: &[u64]) -> Self {
        Self::new(secs.iter().copied().map(Duration::from_secs).collect())
    }

    /// An empty schedule keeps the impairment enabled until interrupted.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Total length of the schedule, or `None` if it does not fit in a [`Duration`].
    pub fn total(&self) -> Option<Duration> {
        self.intervals
            .iter()
            .try_fold(Duration::ZERO, |total, interval| total.checked_add(*interval))
    }

    pub fn steps(&self) -> impl Iterator<Item = Step> + '_ {
        self.intervals
            .iter()
            .enumerate()
            .map(|(i, duration)| Step { enabled: i % 2 == 0, duration: *duration })
    }
}
