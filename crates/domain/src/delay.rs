//! Delays: when a one-shot scheduled task becomes due.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Named relative offsets accepted by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delay {
    InAMinute,
    InFiveMinutes,
    InTenMinutes,
    InThirtyMinutes,
    InAnHour,
    InTwelveHours,
    InADay,
}

pub const IN_A_MINUTE: Delay = Delay::InAMinute;
pub const IN_FIVE_MINUTES: Delay = Delay::InFiveMinutes;
pub const IN_TEN_MINUTES: Delay = Delay::InTenMinutes;
pub const IN_THIRTY_MINUTES: Delay = Delay::InThirtyMinutes;
pub const IN_A_HOUR: Delay = Delay::InAnHour;
pub const IN_TWELVE_HOUR: Delay = Delay::InTwelveHours;
pub const IN_A_DAY: Delay = Delay::InADay;

impl Delay {
    /// Offset in seconds.
    #[must_use]
    pub fn as_secs(self) -> u64 {
        match self {
            Self::InAMinute => 60,
            Self::InFiveMinutes => 5 * 60,
            Self::InTenMinutes => 10 * 60,
            Self::InThirtyMinutes => 30 * 60,
            Self::InAnHour => 60 * 60,
            Self::InTwelveHours => 12 * 60 * 60,
            Self::InADay => 24 * 60 * 60,
        }
    }

    #[must_use]
    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.as_secs())
    }
}

/// When a scheduled task should fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    /// As soon as possible.
    Now,
    /// At an absolute UTC instant; past instants fire immediately.
    At(Timestamp),
    /// After a named offset.
    In(Delay),
    /// After an arbitrary duration.
    After(Duration),
}

impl Due {
    /// Remaining wait, measured from `now`.
    #[must_use]
    pub fn remaining(&self, now: Timestamp) -> Duration {
        match self {
            Self::Now => Duration::ZERO,
            Self::At(at) => (*at - now).to_std().unwrap_or(Duration::ZERO),
            Self::In(delay) => delay.as_duration(),
            Self::After(duration) => *duration,
        }
    }
}

impl From<Delay> for Due {
    fn from(value: Delay) -> Self {
        Self::In(value)
    }
}

impl From<Timestamp> for Due {
    fn from(value: Timestamp) -> Self {
        Self::At(value)
    }
}

impl From<Duration> for Due {
    fn from(value: Duration) -> Self {
        Self::After(value)
    }
}
