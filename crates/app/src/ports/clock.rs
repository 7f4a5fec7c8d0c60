//! Clock port: where the time-event service reads the wall clock from.

use chrono::{Local, NaiveDateTime};
use parking_lot::Mutex;

use hubkit_domain::time::Timestamp;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current UTC instant, used to resolve absolute due dates.
    fn now(&self) -> Timestamp;

    /// Current local wall-clock time, used to match trigger schedules.
    fn local(&self) -> NaiveDateTime;
}

/// The host's real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        hubkit_domain::time::now()
    }

    fn local(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
///
/// Local time and UTC coincide, which keeps due-date arithmetic in tests
/// free of timezone offsets.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<NaiveDateTime>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Jump to an arbitrary wall-clock time.
    pub fn set(&self, at: NaiveDateTime) {
        *self.current.lock() = at;
    }

    /// Move forward by `delta`.
    pub fn advance(&self, delta: chrono::TimeDelta) {
        let mut current = self.current.lock();
        *current += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.current.lock().and_utc()
    }

    fn local(&self) -> NaiveDateTime {
        *self.current.lock()
    }
}
