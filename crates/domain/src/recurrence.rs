//! Recurrence: the symbolic mode a periodic trigger is registered with.
//!
//! A recurrence expands into a canonical [`Schedule`]:
//!
//! | Mode | Hour | Minute | Second |
//! |------|------|--------|--------|
//! | `EVERY_SECONDS` | `*` | `*` | `*` |
//! | `EVERY_MINUTES` | `*` | `*` | `0` |
//! | `EVERY_HOURS` | `*` | `0` | random 1..=50 |
//! | `EVERY_HOURS_INACCURATE` | `*` | random 1..=50 | random 1..=50 |
//! | `EVERY_DAYS` | random 0..=4 | random 1..=50 | `0` |
//! | `EVERY_FIVE_MINUTES` | `*` | `*/5` | `0` |
//! | `EVERY_FIFTEEN_MINUTES` | `*` | `*/15` | `0` |
//! | `EVERY_THIRTY_MINUTES` | `*` | `*/30` | `0` |
//! | `EVERY_TEN_SECONDS` | `*` | `*` | `*/10` |
//! | `Custom` | caller-supplied | | |
//!
//! Random fields are rolled once, when the trigger is registered, so that
//! many hourly or daily jobs registered at boot do not all fire in the same
//! second.

use std::fmt;
use std::ops::RangeInclusive;

use rand::Rng;

use crate::error::HubError;
use crate::schedule::{Schedule, ScheduleField};

const JITTER_HOURS: RangeInclusive<u32> = 0..=4;
const JITTER_MINUTES: RangeInclusive<u32> = 1..=50;
const JITTER_SECONDS: RangeInclusive<u32> = 1..=50;

/// How often a trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recurrence {
    EverySeconds,
    EveryMinutes,
    EveryHours,
    EveryHoursInaccurate,
    EveryFiveMinutes,
    EveryFifteenMinutes,
    EveryThirtyMinutes,
    EveryTenSeconds,
    EveryDays,
    /// Caller-supplied schedule; wildcards and strides allowed.
    Custom(Schedule),
}

pub const EVERY_SECONDS: Recurrence = Recurrence::EverySeconds;
pub const EVERY_MINUTES: Recurrence = Recurrence::EveryMinutes;
pub const EVERY_HOURS: Recurrence = Recurrence::EveryHours;
pub const EVERY_HOURS_INACCURATE: Recurrence = Recurrence::EveryHoursInaccurate;
pub const EVERY_FIVE_MINUTES: Recurrence = Recurrence::EveryFiveMinutes;
pub const EVERY_FIFTEEN_MINUTES: Recurrence = Recurrence::EveryFifteenMinutes;
pub const EVERY_THIRTY_MINUTES: Recurrence = Recurrence::EveryThirtyMinutes;
pub const EVERY_TEN_SECONDS: Recurrence = Recurrence::EveryTenSeconds;
pub const EVERY_DAYS: Recurrence = Recurrence::EveryDays;
/// Constructor of a caller-supplied recurrence: `CUSTOM(schedule)`.
pub use Recurrence::Custom as CUSTOM;

impl Recurrence {
    /// Build a custom recurrence from textual patterns.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when a pattern is malformed or out
    /// of range.
    pub fn custom(hour: &str, minute: &str, second: &str) -> Result<Self, HubError> {
        Schedule::parse(hour, minute, second).map(Self::Custom)
    }

    /// Stable mode name, used in logs and key derivation.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::EverySeconds => "every_seconds",
            Self::EveryMinutes => "every_minutes",
            Self::EveryHours => "every_hours",
            Self::EveryHoursInaccurate => "every_hours_inaccurate",
            Self::EveryFiveMinutes => "every_five_minutes",
            Self::EveryFifteenMinutes => "every_fifteen_minutes",
            Self::EveryThirtyMinutes => "every_thirty_minutes",
            Self::EveryTenSeconds => "every_ten_seconds",
            Self::EveryDays => "every_days",
            Self::Custom(_) => "custom",
        }
    }

    /// Expand into a canonical schedule, rolling jitter with `rng`.
    #[must_use]
    pub fn expand<R: Rng + ?Sized>(&self, rng: &mut R) -> Schedule {
        use ScheduleField::{Any, Every, Exact};

        let (hour, minute, second) = match self {
            Self::EverySeconds => (Any, Any, Any),
            Self::EveryMinutes => (Any, Any, Exact(0)),
            Self::EveryHours => (Any, Exact(0), Exact(rng.gen_range(JITTER_SECONDS))),
            Self::EveryHoursInaccurate => (
                Any,
                Exact(rng.gen_range(JITTER_MINUTES)),
                Exact(rng.gen_range(JITTER_SECONDS)),
            ),
            Self::EveryDays => (
                Exact(rng.gen_range(JITTER_HOURS)),
                Exact(rng.gen_range(JITTER_MINUTES)),
                Exact(0),
            ),
            Self::EveryFiveMinutes => (Any, Every(5), Exact(0)),
            Self::EveryFifteenMinutes => (Any, Every(15), Exact(0)),
            Self::EveryThirtyMinutes => (Any, Every(30), Exact(0)),
            Self::EveryTenSeconds => (Any, Any, Every(10)),
            Self::Custom(schedule) => return *schedule,
        };

        Schedule {
            hour,
            minute,
            second,
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(schedule) => write!(f, "custom({schedule})"),
            other => f.write_str(other.name()),
        }
    }
}
