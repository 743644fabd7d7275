//! Habit start-time resolution, including the 15-minute pull-back drift.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::schedule::{Habit, HabitRule};
use crate::time::ClockTime;

/// Minutes a pull-back habit moves earlier per day.
pub const PULL_BACK_MINUTES: i64 = 15;

/// A habit resolved onto a concrete date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitInstance {
    pub date: NaiveDate,
    pub start: ClockTime,
    pub duration_minutes: u32,
}

impl HabitInstance {
    pub fn start_hours(&self) -> f64 {
        self.start.as_hours()
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_minutes as f64 / 60.0
    }
}

/// Effective start time of `habit` on `date`.
///
/// An explicit start logged for the date always wins. Fixed habits otherwise
/// use their base time. Pull-back habits take the most recent log at or
/// before the date as the anchor (its start, or the base time when the log
/// has none) and move 15 minutes earlier for every day after the anchor,
/// never before midnight. Without any log the anchor is the base time on
/// the habit's anchor date.
pub fn resolve_start_time(habit: &Habit, date: NaiveDate) -> Option<ClockTime> {
    if let Some(start) = habit.log_for(date).and_then(|log| log.start_time) {
        return Some(start);
    }

    match habit.rule {
        HabitRule::Fixed => habit.start_time,
        HabitRule::PullBack15Min => {
            let latest_log = habit
                .logs
                .iter()
                .filter(|log| log.date <= date)
                .max_by_key(|log| log.date);

            let (anchor_date, anchor_time) = match latest_log {
                Some(log) => (Some(log.date), log.start_time.or(habit.start_time)?),
                None => (habit.anchor_date, habit.start_time?),
            };

            let Some(anchor_date) = anchor_date else {
                return Some(anchor_time);
            };
            let days = (date - anchor_date).num_days();
            if days <= 0 {
                return Some(anchor_time);
            }
            Some(anchor_time.saturating_sub_minutes(PULL_BACK_MINUTES * days))
        }
    }
}

/// Duration in minutes on `date`: the logged override or the habit default.
pub fn resolve_duration_minutes(habit: &Habit, date: NaiveDate) -> u32 {
    habit
        .log_for(date)
        .and_then(|log| log.duration_minutes)
        .unwrap_or(habit.duration_minutes)
}

/// Whether the habit's weekday filter includes `date`.
pub fn occurs_on(habit: &Habit, date: NaiveDate) -> bool {
    habit.weekdays.is_empty() || habit.weekdays.contains(date)
}

/// Resolve the habit onto `date`, or `None` when it does not run that day or
/// has no start time.
pub fn resolve_instance(habit: &Habit, date: NaiveDate) -> Option<HabitInstance> {
    if !occurs_on(habit, date) {
        return None;
    }
    let start = resolve_start_time(habit, date)?;
    let duration_minutes = resolve_duration_minutes(habit, date);
    if duration_minutes == 0 {
        return None;
    }
    Some(HabitInstance {
        date,
        start,
        duration_minutes,
    })
}
