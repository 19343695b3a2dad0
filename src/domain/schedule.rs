//! Time-of-day and calendar date helpers.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayError;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// A wall-clock time within a single day, stored as minutes since midnight.
///
/// Serialized as an `"HH:MM"` string. Ordering follows the clock, so two
/// values can be compared directly when checking interval overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String, example = "09:30")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    /// Builds a time from minutes since midnight. Returns `None` past 23:59.
    #[must_use]
    pub const fn from_minutes(minutes: u16) -> Option<Self> {
        if minutes < MINUTES_PER_DAY {
            Some(Self(minutes))
        } else {
            None
        }
    }

    /// Builds a time from an hour and minute pair.
    #[must_use]
    pub const fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self(hour * 60 + minute))
        } else {
            None
        }
    }

    /// Minutes elapsed since midnight.
    #[must_use]
    pub const fn minutes(self) -> u16 {
        self.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for TimeOfDay {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        time_to_minutes(s).map(Self)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Converts an `"HH:MM"` string into minutes since midnight.
///
/// Single-digit hours (`"9:05"`) are accepted; minutes must be two digits.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if the string is not a valid
/// 24-hour time.
pub fn time_to_minutes(s: &str) -> Result<u16, GatewayError> {
    let invalid = || GatewayError::InvalidRequest(format!("invalid time of day: {s:?}"));

    let (hours, minutes) = s.trim().split_once(':').ok_or_else(invalid)?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    // Digits only: `u16::from_str` accepts a leading '+'.
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let hours: u16 = hours.parse().map_err(|_| invalid())?;
    let minutes: u16 = minutes.parse().map_err(|_| invalid())?;

    TimeOfDay::from_hm(hours, minutes)
        .map(TimeOfDay::minutes)
        .ok_or_else(invalid)
}

/// Formats a calendar date for display, e.g. `Fri, May 10, 2024`.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format("%a, %b %-d, %Y").to_string()
}

/// Formats a time range for display, e.g. `09:00 - 10:30`.
#[must_use]
pub fn format_time_range(start: TimeOfDay, end: TimeOfDay) -> String {
    format!("{start} - {end}")
}

/// Returns `true` if the half-open intervals `[a_start, a_end)` and
/// `[b_start, b_end)` share at least one minute.
#[must_use]
pub fn intervals_overlap(
    a_start: TimeOfDay,
    a_end: TimeOfDay,
    b_start: TimeOfDay,
    b_end: TimeOfDay,
) -> bool {
    a_start < b_end && b_start < a_end
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn t(s: &str) -> TimeOfDay {
        let Ok(time) = s.parse() else {
            panic!("invalid test time {s}");
        };
        time
    }

    #[test]
    fn parses_hours_and_minutes() {
        assert_eq!(time_to_minutes("00:00").ok(), Some(0));
        assert_eq!(time_to_minutes("09:30").ok(), Some(570));
        assert_eq!(time_to_minutes("9:05").ok(), Some(545));
        assert_eq!(time_to_minutes("23:59").ok(), Some(1439));
    }

    #[test]
    fn rejects_malformed_times() {
        for bad in ["", "24:00", "12:60", "12", "12:5", "ab:cd", "123:00", "-1:00"] {
            assert!(time_to_minutes(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn rejects_signed_components() {
        for bad in ["+9:00", "+09:00", "09:+5", "+1:+1"] {
            assert!(time_to_minutes(bad).is_err(), "{bad} should be rejected");
        }
        assert!("+9:00".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn display_pads_to_two_digits() {
        assert_eq!(t("9:05").to_string(), "09:05");
        assert_eq!(format_time_range(t("09:00"), t("10:30")), "09:00 - 10:30");
    }

    #[test]
    fn serde_uses_clock_strings() {
        let Ok(json) = serde_json::to_string(&t("14:15")) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "\"14:15\"");
        assert!(serde_json::from_str::<TimeOfDay>("\"25:00\"").is_err());
    }

    #[test]
    fn formats_dates_for_display() {
        let Some(date) = NaiveDate::from_ymd_opt(2024, 5, 10) else {
            panic!("valid date");
        };
        assert_eq!(format_date(date), "Fri, May 10, 2024");
    }

    #[test]
    fn overlap_is_half_open() {
        assert!(intervals_overlap(
            t("09:00"),
            t("10:30"),
            t("10:00"),
            t("11:00")
        ));
        assert!(!intervals_overlap(
            t("09:00"),
            t("10:00"),
            t("10:00"),
            t("11:00")
        ));
        assert!(intervals_overlap(
            t("08:00"),
            t("12:00"),
            t("09:00"),
            t("10:00")
        ));
    }
}
