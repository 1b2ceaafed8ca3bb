//! Device-clock timestamps and time-of-day arithmetic.
//!
//! Wearables stamp every message with their own clock as a colon-delimited
//! string `"Y:M:D:h:m:s"`. The scheduler only ever reasons about the
//! time-of-day part, so this module keeps the arithmetic deliberately small:
//! no calendar, no time zones, no durations.
//!
//! # Range
//!
//! Field values are **not** range-checked. A device reporting hour `25`
//! produces a timestamp with hour `25`, and window checks against it simply
//! never match. Only structural problems (wrong field count, non-integer
//! fields) are rejected. Arithmetic on fields saturates, so even `i32::MAX`
//! or `i32::MIN` only ever yields a time that fails to match.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seconds added to the first tick to derive the catalog base time.
const BASE_TIME_OFFSET_SECONDS: i32 = 30;

/// Reminder window half-width in minutes (exclusive).
const WINDOW_MINUTES: u32 = 2;

/// Errors produced while parsing a device timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("expected 6 colon-separated fields, found {0}")]
    FieldCount(usize),

    #[error("field `{0}` is not an integer")]
    NotAnInteger(String),
}

/// A device timestamp: year, month, day, hour, minute, second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp {
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub hour: i32,
    pub minute: i32,
    pub second: i32,
}

impl Timestamp {
    pub fn new(year: i32, month: i32, day: i32, hour: i32, minute: i32, second: i32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// The hour/minute/second part of this timestamp.
    pub fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay::new(self.hour, self.minute, self.second)
    }

    /// Render as `hh:mm on Y/M/D`, the form caretakers read on the monitor.
    pub fn display_short(&self) -> String {
        format!(
            "{:02}:{:02} on {}/{:02}/{:02}",
            self.hour, self.minute, self.year, self.month, self.day
        )
    }
}

impl FromStr for Timestamp {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 6 {
            return Err(TimestampError::FieldCount(parts.len()));
        }

        let mut fields = [0i32; 6];
        for (slot, part) in fields.iter_mut().zip(&parts) {
            *slot = part
                .trim()
                .parse()
                .map_err(|_| TimestampError::NotAnInteger((*part).to_string()))?;
        }

        let [year, month, day, hour, minute, second] = fields;
        Ok(Self::new(year, month, day, hour, minute, second))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}:{:02}:{:02}:{:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

impl TryFrom<String> for Timestamp {
    type Error = TimestampError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.to_string()
    }
}

/// An hour/minute/second triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: i32,
    pub minute: i32,
    pub second: i32,
}

impl TimeOfDay {
    pub fn new(hour: i32, minute: i32, second: i32) -> Self {
        Self {
            hour,
            minute,
            second,
        }
    }

    /// Derive the catalog base time from the first tick a scheduler sees.
    ///
    /// Adds 30 seconds. When that overflows the minute, the seconds wrap
    /// (`second - 30`) and the minute advances; a minute overflow advances
    /// the hour, wrapping 23 to 0.
    pub fn base_from(now: Timestamp) -> Self {
        let mut time = now.time_of_day();

        if time.second > 59 - BASE_TIME_OFFSET_SECONDS {
            time.second -= BASE_TIME_OFFSET_SECONDS;
            time.minute = time.minute.saturating_add(1);
            if time.minute > 59 {
                time.minute = 0;
                time = time.next_hour();
            }
        } else {
            time.second = time.second.saturating_add(BASE_TIME_OFFSET_SECONDS);
        }

        time
    }

    /// Same minute and second, one hour later, wrapping 23 to 0.
    pub fn next_hour(self) -> Self {
        let hour = if self.hour == 23 { 0 } else { self.hour.saturating_add(1) };
        Self { hour, ..self }
    }

    /// Whether `now` falls inside the reminder window anchored at `self`.
    ///
    /// Due iff the hours match and the minutes differ by less than two.
    /// The window does not wrap across an hour boundary.
    pub fn is_due(&self, now: Timestamp) -> bool {
        now.hour == self.hour && now.minute.abs_diff(self.minute) < WINDOW_MINUTES
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}
