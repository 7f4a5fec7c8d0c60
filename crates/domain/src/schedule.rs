//! Schedule: the canonical `{hour, minute, second}` pattern of a trigger.
//!
//! Every field is one of:
//!
//! | Pattern | Meaning |
//! |---------|---------|
//! | `*` | matches any value |
//! | `N` | matches exactly `N` |
//! | `*/N` | matches when `value % N == 0` |
//!
//! A schedule fires for a given second only when all three fields match.

use std::fmt;

use crate::error::{HubError, ValidationError};
use crate::time::Tick;

const MAX_HOUR: u32 = 23;
const MAX_MINUTE: u32 = 59;
const MAX_SECOND: u32 = 59;

/// One field of a [`Schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleField {
    /// `*`
    Any,
    /// An exact value.
    Exact(u32),
    /// A `*/N` stride.
    Every(u32),
}

impl ScheduleField {
    /// Check whether the field matches the current wall-clock value.
    #[must_use]
    pub fn matches(self, value: u32) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == value,
            Self::Every(stride) => stride != 0 && value.is_multiple_of(stride),
        }
    }

    /// Parse a textual pattern (`*`, `12`, `*/5`) for the named field.
    ///
    /// Range checks are done by [`Schedule::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPattern`] if the text is not a
    /// recognised pattern.
    pub fn parse(field: &'static str, text: &str) -> Result<Self, ValidationError> {
        let text = text.trim();
        let invalid = || ValidationError::InvalidPattern {
            field,
            value: text.to_string(),
        };

        if text == "*" {
            return Ok(Self::Any);
        }
        if let Some(stride) = text.strip_prefix("*/") {
            return stride.parse().map(Self::Every).map_err(|_| invalid());
        }
        text.parse().map(Self::Exact).map_err(|_| invalid())
    }

    fn validate(self, field: &'static str, max: u32) -> Result<(), ValidationError> {
        match self {
            Self::Any => Ok(()),
            Self::Exact(value) if value > max => {
                Err(ValidationError::OutOfRange { field, value, max })
            }
            Self::Exact(_) => Ok(()),
            Self::Every(0) => Err(ValidationError::ZeroStride { field }),
            Self::Every(_) => Ok(()),
        }
    }
}

impl From<u32> for ScheduleField {
    fn from(value: u32) -> Self {
        Self::Exact(value)
    }
}

impl fmt::Display for ScheduleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Exact(value) => write!(f, "{value}"),
            Self::Every(stride) => write!(f, "*/{stride}"),
        }
    }
}

/// A canonical `{hour, minute, second}` pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Schedule {
    pub hour: ScheduleField,
    pub minute: ScheduleField,
    pub second: ScheduleField,
}

impl Schedule {
    /// Build and validate a schedule.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when an exact value is out of range
    /// or a stride is zero.
    pub fn new(
        hour: ScheduleField,
        minute: ScheduleField,
        second: ScheduleField,
    ) -> Result<Self, HubError> {
        let schedule = Self {
            hour,
            minute,
            second,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Parse a schedule from textual patterns, e.g. `("*/2", "0", "0")`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when a pattern is malformed or out
    /// of range.
    pub fn parse(hour: &str, minute: &str, second: &str) -> Result<Self, HubError> {
        Self::new(
            ScheduleField::parse("hour", hour)?,
            ScheduleField::parse("minute", minute)?,
            ScheduleField::parse("second", second)?,
        )
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when an exact value is out of range
    /// or a stride is zero.
    pub fn validate(&self) -> Result<(), HubError> {
        self.hour.validate("hour", MAX_HOUR)?;
        self.minute.validate("minute", MAX_MINUTE)?;
        self.second.validate("second", MAX_SECOND)?;
        Ok(())
    }

    /// Check whether all three fields match the given second.
    #[must_use]
    pub fn matches(&self, tick: Tick) -> bool {
        self.second.matches(tick.second)
            && self.minute.matches(tick.minute)
            && self.hour.matches(tick.hour)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.hour, self.minute, self.second)
    }
}
