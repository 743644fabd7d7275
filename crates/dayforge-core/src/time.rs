//! Clock-time and quarter-hour arithmetic.
//!
//! Every scheduling decision is made on a grid of 15-minute slots. A day has
//! 96 quarters indexed `0..96`; quarter `q` covers `[q/4, (q+1)/4)` hours.
//! Fractional hours (`9.5` = 09:30) are used at the API surface, integer
//! quarter indices internally.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::storage::config::MAX_HORIZON_DAYS;

/// Number of quarter-hour slots in a day.
pub const QUARTERS_PER_DAY: u16 = 96;

/// Length of one slot in hours.
pub const QUARTER_HOURS: f64 = 0.25;

const MINUTES_PER_DAY: u16 = 24 * 60;

// Absorbs float noise such as 10.999999 when converting hours to quarters.
const EPSILON: f64 = 1e-6;

/// A wall-clock time with minute precision, `00:00` through `24:00`.
///
/// Serialized as `"HH:MM"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    pub const MIDNIGHT: ClockTime = ClockTime(0);
    pub const END_OF_DAY: ClockTime = ClockTime(MINUTES_PER_DAY);

    /// Build from hour and minute. Returns `None` outside `00:00..=24:00`.
    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if minute >= 60 {
            return None;
        }
        let total = hour.checked_mul(60)?.checked_add(minute)?;
        (total <= MINUTES_PER_DAY).then_some(Self(total))
    }

    /// Build from minutes since midnight, clamped to the day.
    pub fn from_minutes(minutes: i64) -> Self {
        Self(minutes.clamp(0, MINUTES_PER_DAY as i64) as u16)
    }

    /// Build from fractional hours, rounded to the nearest minute and clamped.
    pub fn from_hours(hours: f64) -> Self {
        if !hours.is_finite() {
            return Self::MIDNIGHT;
        }
        Self::from_minutes((hours * 60.0).round() as i64)
    }

    pub fn from_naive(time: NaiveTime) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    pub fn minute(self) -> u16 {
        self.0 % 60
    }

    pub fn as_hours(self) -> f64 {
        self.0 as f64 / 60.0
    }

    /// Subtract minutes, never going below midnight.
    pub fn saturating_sub_minutes(self, minutes: i64) -> Self {
        Self::from_minutes(self.0 as i64 - minutes)
    }

    pub fn saturating_add_minutes(self, minutes: i64) -> Self {
        Self::from_minutes(self.0 as i64 + minutes)
    }

    /// Round up to the next half-hour boundary.
    ///
    /// `:00` stays put, `:01`..`:30` becomes `:30`, anything later becomes
    /// the next full hour. This is the single rule used when a habit is
    /// displaced behind a meeting or session.
    pub fn round_up_half_hour(self) -> Self {
        match self.minute() {
            0 => self,
            1..=30 => Self::from_minutes((self.hour() * 60 + 30) as i64),
            _ => Self::from_minutes(((self.hour() + 1) * 60) as i64),
        }
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = String;

    /// Accepts `H:MM`, `HH:MM` and `HH:MM:SS` (seconds are ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split(':');
        let hour = parts.next().and_then(|p| p.parse::<u16>().ok());
        let minute = parts.next().and_then(|p| p.parse::<u16>().ok());
        match (hour, minute) {
            (Some(h), Some(m)) => {
                Self::from_hm(h, m).ok_or_else(|| format!("time out of range: {s}"))
            }
            _ => Err(format!("invalid time (expected HH:MM): {s}")),
        }
    }
}

impl TryFrom<String> for ClockTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

/// A `[start, end)` window in fractional hours, e.g. work hours `10.0..22.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourRange {
    pub start: f64,
    pub end: f64,
}

impl HourRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start.is_finite()
            && self.end.is_finite()
            && self.start >= 0.0
            && self.end <= 24.0
            && self.start < self.end
    }

    /// Quarters fully inside the window.
    pub fn quarters(&self) -> Range<u16> {
        let start = ((self.start * 4.0) - EPSILON).ceil().max(0.0) as u16;
        let end = ((self.end * 4.0) + EPSILON).floor().min(QUARTERS_PER_DAY as f64) as u16;
        start..end.max(start)
    }

    pub fn hours(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Start of quarter `q` in fractional hours.
pub fn quarter_to_hours(quarter: u16) -> f64 {
    quarter as f64 * QUARTER_HOURS
}

/// Quarters touched by an event `[start, start + duration)`, truncated at
/// midnight.
pub fn covered_quarters(start_hours: f64, duration_hours: f64) -> Range<u16> {
    if !start_hours.is_finite() || !duration_hours.is_finite() || duration_hours <= 0.0 {
        return 0..0;
    }
    let end_hours = (start_hours + duration_hours).min(24.0);
    let first = ((start_hours.max(0.0) * 4.0) + EPSILON).floor() as u16;
    let last = ((end_hours * 4.0) - EPSILON).ceil().max(0.0) as u16;
    let last = last.min(QUARTERS_PER_DAY);
    first.min(last)..last
}

/// First quarter starting at or after `time`.
pub fn next_quarter_at_or_after(time: NaiveTime) -> u16 {
    let seconds = time.num_seconds_from_midnight();
    seconds.div_ceil(15 * 60).min(QUARTERS_PER_DAY as u32) as u16
}

/// Render fractional hours as `HH:MM`.
pub fn format_hours(hours: f64) -> String {
    ClockTime::from_hours(hours).to_string()
}

/// Up to `count` consecutive dates beginning with `start`, stopping at the
/// last representable date.
pub fn day_range(start: NaiveDate, count: u32) -> Vec<NaiveDate> {
    start.iter_days().take(count as usize).collect()
}

/// `count` consecutive dates beginning with `start`, for caller-supplied
/// ranges. `count` must be within `1..=MAX_HORIZON_DAYS` and the whole range
/// must fit in the calendar.
pub fn checked_day_range(start: NaiveDate, count: u32) -> Result<Vec<NaiveDate>, ValidationError> {
    if count == 0 || count > MAX_HORIZON_DAYS {
        return Err(ValidationError::InvalidValue {
            field: "days".into(),
            message: format!("must be between 1 and {MAX_HORIZON_DAYS}, got {count}"),
        });
    }
    let days = day_range(start, count);
    if days.len() < count as usize {
        return Err(ValidationError::InvalidValue {
            field: "start".into(),
            message: format!("{count} days from {start} run past the last supported date"),
        });
    }
    Ok(days)
}

/// Dates from `start` to `end`, both inclusive.
pub fn dates_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .collect()
}

/// A set of weekdays parsed from names such as `"saturday"` or `"Sun"`.
///
/// Serialized as a list of names; unknown names are dropped when the set is
/// read, not on every lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct WeekdaySet {
    days: Vec<Weekday>,
}

impl WeekdaySet {
    /// Unknown names are skipped with a warning.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut days = Vec::new();
        for name in names {
            match name.as_ref().trim().parse::<Weekday>() {
                Ok(day) if !days.contains(&day) => days.push(day),
                Ok(_) => {}
                Err(_) => tracing::warn!(name = name.as_ref(), "ignoring unknown weekday name"),
            }
        }
        Self { days }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.days.contains(&date.weekday())
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

impl From<Vec<String>> for WeekdaySet {
    fn from(names: Vec<String>) -> Self {
        Self::from_names(&names)
    }
}

impl From<WeekdaySet> for Vec<String> {
    fn from(set: WeekdaySet) -> Self {
        set.days.iter().map(Weekday::to_string).collect()
    }
}
