//! Time and timestamp helpers.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// UTC timestamp used for absolute due dates.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// The wall-clock second a trigger fired for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl Tick {
    #[must_use]
    pub fn new(hour: u32, minute: u32, second: u32) -> Self {
        Self {
            hour,
            minute,
            second,
        }
    }
}

impl From<NaiveDateTime> for Tick {
    fn from(value: NaiveDateTime) -> Self {
        Self::new(value.hour(), value.minute(), value.second())
    }
}

impl std::fmt::Display for Tick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_build_tick_from_wall_clock() {
        let at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();
        assert_eq!(Tick::from(at), Tick::new(7, 8, 9));
    }

    #[test]
    fn should_display_tick_zero_padded() {
        assert_eq!(Tick::new(4, 0, 30).to_string(), "04:00:30");
    }
}
