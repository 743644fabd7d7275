//! Quarter-hour availability scanning.
//!
//! Enumerates the slots of one day inside a window, marking each as free or
//! taken and recording why. Used by both the task scheduler and the buffer
//! allocator so both see the same notion of "free".

use std::collections::BTreeMap;
use std::ops::Range;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::conflict::{ConflictMaps, ConflictReason, SlotKey};
use crate::time::{next_quarter_at_or_after, quarter_to_hours, HourRange, WeekdaySet};

/// One quarter-hour slot as seen by the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub date: NaiveDate,
    pub quarter: u16,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<ConflictReason>,
}

impl TimeSlot {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.date, self.quarter)
    }

    pub fn start_hours(&self) -> f64 {
        quarter_to_hours(self.quarter)
    }
}

/// Slots claimed during the current pass, with the id of whatever took them.
#[derive(Debug, Clone, Default)]
pub struct OccupiedSlots {
    slots: BTreeMap<SlotKey, String>,
}

impl OccupiedSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, date: NaiveDate, quarters: Range<u16>, owner: &str) {
        for quarter in quarters {
            self.slots
                .entry(SlotKey::new(date, quarter))
                .or_insert_with(|| owner.to_string());
        }
    }

    pub fn owner(&self, key: &SlotKey) -> Option<&str> {
        self.slots.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &SlotKey) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Scans days against the conflict maps.
///
/// Weekend days and past days yield no slots. On the current day, slots
/// begin at the next quarter-hour boundary at or after `now`; the same
/// rounding is used everywhere a pass needs "the current slot".
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityScanner<'a> {
    maps: &'a ConflictMaps,
    weekend: &'a WeekdaySet,
    now: NaiveDateTime,
}

impl<'a> AvailabilityScanner<'a> {
    pub fn new(maps: &'a ConflictMaps, weekend: &'a WeekdaySet, now: NaiveDateTime) -> Self {
        Self { maps, weekend, now }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// First quarter that may still be offered on `date`, or `None` if the
    /// whole date is in the past.
    pub fn earliest_quarter(&self, date: NaiveDate) -> Option<u16> {
        let today = self.now.date();
        if date < today {
            None
        } else if date == today {
            Some(next_quarter_at_or_after(self.now.time()))
        } else {
            Some(0)
        }
    }

    /// Ordered slots of `date` within `window`.
    pub fn scan(
        &self,
        date: NaiveDate,
        window: HourRange,
        occupied: &OccupiedSlots,
    ) -> Vec<TimeSlot> {
        if self.weekend.contains(date) {
            return Vec::new();
        }
        let Some(earliest) = self.earliest_quarter(date) else {
            return Vec::new();
        };
        let quarters = window.quarters();

        (quarters.start.max(earliest)..quarters.end)
            .map(|quarter| {
                let key = SlotKey::new(date, quarter);
                let mut reasons = self.maps.reasons(&key);
                if let Some(owner) = occupied.owner(&key) {
                    reasons.push(ConflictReason::Scheduled(owner.to_string()));
                }
                TimeSlot {
                    date,
                    quarter,
                    available: reasons.is_empty(),
                    reasons,
                }
            })
            .collect()
    }

    /// Available quarters of `date`, grouped into contiguous runs.
    pub fn free_runs(
        &self,
        date: NaiveDate,
        window: HourRange,
        occupied: &OccupiedSlots,
    ) -> Vec<Range<u16>> {
        free_runs(&self.scan(date, window, occupied))
    }
}

/// Group the available slots of an ordered slot list into contiguous runs.
pub fn free_runs(slots: &[TimeSlot]) -> Vec<Range<u16>> {
    let mut runs: Vec<Range<u16>> = Vec::new();
    for slot in slots.iter().filter(|s| s.available) {
        match runs.last_mut() {
            Some(run) if run.end == slot.quarter => run.end += 1,
            _ => runs.push(slot.quarter..slot.quarter + 1),
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::{FixedEvent, FixedEventKind};

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn weekend() -> WeekdaySet {
        WeekdaySet::from_names(&["saturday", "sunday"])
    }

    fn meeting_maps(date: NaiveDate, start: f64, duration: f64) -> ConflictMaps {
        let mut maps = ConflictMaps::new();
        maps.insert(FixedEvent {
            kind: FixedEventKind::Meeting,
            source_id: "m1".into(),
            title: "Standup".into(),
            date,
            start,
            duration,
            category_id: None,
            displaced_from: None,
        });
        maps
    }

    fn last_week() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 12)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn scan_marks_meeting_slots_unavailable() {
        let maps = meeting_maps(monday(), 10.0, 1.0);
        let weekend = weekend();
        let scanner = AvailabilityScanner::new(&maps, &weekend, last_week());
        let slots = scanner.scan(monday(), HourRange::new(9.0, 12.0), &OccupiedSlots::new());

        assert_eq!(slots.len(), 12);
        assert_eq!(slots.iter().filter(|s| s.available).count(), 8);
        let ten = slots.iter().find(|s| s.quarter == 40).unwrap();
        assert!(!ten.available);
        assert_eq!(ten.reasons, vec![ConflictReason::Meeting("m1".into())]);
    }

    #[test]
    fn weekend_and_past_days_are_empty() {
        let maps = ConflictMaps::new();
        let weekend = weekend();
        let now = monday().and_hms_opt(8, 0, 0).unwrap();
        let scanner = AvailabilityScanner::new(&maps, &weekend, now);
        let window = HourRange::new(9.0, 17.0);

        let saturday = NaiveDate::from_ymd_opt(2026, 10, 24).unwrap();
        assert!(scanner.scan(saturday, window, &OccupiedSlots::new()).is_empty());
        let last_friday = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert!(scanner.scan(last_friday, window, &OccupiedSlots::new()).is_empty());
    }

    #[test]
    fn today_starts_at_next_quarter() {
        let maps = ConflictMaps::new();
        let weekend = weekend();
        let now = monday().and_hms_opt(13, 7, 0).unwrap();
        let scanner = AvailabilityScanner::new(&maps, &weekend, now);
        let slots = scanner.scan(monday(), HourRange::new(9.0, 17.0), &OccupiedSlots::new());
        assert_eq!(slots.first().unwrap().quarter, 53);
        assert_eq!(slots.last().unwrap().quarter, 67);
    }

    #[test]
    fn in_pass_claims_block_slots() {
        let maps = ConflictMaps::new();
        let weekend = weekend();
        let scanner = AvailabilityScanner::new(&maps, &weekend, last_week());
        let mut occupied = OccupiedSlots::new();
        occupied.claim(monday(), 36..40, "task-1");

        let slots = scanner.scan(monday(), HourRange::new(9.0, 11.0), &occupied);
        assert!(!slots[0].available);
        assert_eq!(slots[0].reasons, vec![ConflictReason::Scheduled("task-1".into())]);
        assert_eq!(
            scanner.free_runs(monday(), HourRange::new(9.0, 11.0), &occupied),
            vec![40..44]
        );
    }

    #[test]
    fn free_runs_split_around_conflicts() {
        let maps = meeting_maps(monday(), 10.0, 1.0);
        let weekend = weekend();
        let scanner = AvailabilityScanner::new(&maps, &weekend, last_week());
        let runs = scanner.free_runs(monday(), HourRange::new(9.0, 17.0), &OccupiedSlots::new());
        assert_eq!(runs, vec![36..40, 44..68]);
    }
}
