use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::models::Timestamp;

/// Source of "now" for every record the network creates.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Clock pinned to a settable unix time. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    secs: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn starting_at(secs: i64) -> Self {
        ManualClock {
            secs: Arc::new(AtomicI64::new(secs)),
        }
    }

    pub fn set(&self, secs: i64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        from_unix(self.secs.load(Ordering::SeqCst))
    }
}

/// `None` when `secs` is outside chrono's range.
pub fn checked_from_unix(secs: i64) -> Option<Timestamp> {
    DateTime::<Utc>::from_timestamp(secs, 0)
}

/// Clock-side conversion; out-of-range values clamp to the epoch. Data files
/// go through [`checked_from_unix`] instead.
pub fn from_unix(secs: i64) -> Timestamp {
    checked_from_unix(secs).unwrap_or_default()
}

pub fn display_time(ts: &Timestamp) -> String {
    ts.format("%a %b %e %H:%M:%S %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::starting_at(100);
        let other = clock.clone();
        clock.advance(50);
        assert_eq!(other.now().timestamp(), 150);
        other.set(10);
        assert_eq!(clock.now().timestamp(), 10);
    }

    #[test]
    fn display_time_is_ctime_like() {
        assert_eq!(display_time(&from_unix(0)), "Thu Jan  1 00:00:00 1970");
    }
}
