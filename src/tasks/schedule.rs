// src/tasks/schedule.rs

//! When a task is due
//!
//! A task is due when it has never been attempted or when its interval has
//! elapsed since the last attempt. Attempts count, not completions, so a task
//! that keeps failing does not run on every invocation.

use chrono::{DateTime, Duration, Utc};

/// Run policy of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheduler {
    /// Due on every invocation
    #[default]
    Always,
    /// Due once this many seconds have passed since the last attempt
    Interval(i64),
}

impl Scheduler {
    pub const fn hours(hours: i64) -> Self {
        Self::Interval(hours * 3600)
    }

    /// Check if a task last attempted at `last_attempted` is due at `now`
    pub fn needs_run(&self, last_attempted: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match (self, last_attempted) {
            (Self::Always, _) | (_, None) => true,
            (Self::Interval(seconds), Some(last)) => now - last >= Duration::seconds(*seconds),
        }
    }

    /// Next time the task is due, `None` when it already is
    pub fn next_run(&self, last_attempted: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.needs_run(last_attempted, now) {
            return None;
        }
        match (self, last_attempted) {
            (Self::Interval(seconds), Some(last)) => Some(last + Duration::seconds(*seconds)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Always => write!(f, "always"),
            Self::Interval(seconds) if seconds % 3600 == 0 => write!(f, "every {}h", seconds / 3600),
            Self::Interval(seconds) => write!(f, "every {}s", seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval() {
        let now = Utc::now();
        let sched = Scheduler::hours(4);

        assert!(sched.needs_run(None, now));
        assert!(!sched.needs_run(Some(now - Duration::hours(1)), now));
        assert!(sched.needs_run(Some(now - Duration::hours(4)), now));
        assert_eq!(
            sched.next_run(Some(now - Duration::hours(1)), now),
            Some(now + Duration::hours(3))
        );
    }

    #[test]
    fn test_always() {
        let now = Utc::now();
        assert!(Scheduler::Always.needs_run(Some(now), now));
        assert_eq!(Scheduler::Always.next_run(Some(now), now), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Scheduler::hours(4).to_string(), "every 4h");
        assert_eq!(Scheduler::Interval(90).to_string(), "every 90s");
        assert_eq!(Scheduler::Always.to_string(), "always");
    }
}
