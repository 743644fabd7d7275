//! Conflict maps: a quarter-hour occupancy index of every fixed event.
//!
//! Habits, sessions, meetings, task logs and the daily wind-down buffer are
//! tracked in five independent maps keyed by [`SlotKey`]. A slot may appear
//! in several maps; the scanner treats it as taken if any map has it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::habit;
use crate::schedule::{Habit, Meeting, Session, TaskLog};
use crate::storage::config::{WindDownConfig, WorkHours};
use crate::time::{covered_quarters, format_hours, quarter_to_hours, ClockTime};

/// Composite key of one quarter-hour slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub quarter: u16,
}

impl SlotKey {
    pub fn new(date: NaiveDate, quarter: u16) -> Self {
        Self { date, quarter }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedEventKind {
    Habit,
    Session,
    Meeting,
    TaskLog,
    WindDown,
}

impl FixedEventKind {
    pub const ALL: [FixedEventKind; 5] = [
        FixedEventKind::Habit,
        FixedEventKind::Session,
        FixedEventKind::Meeting,
        FixedEventKind::TaskLog,
        FixedEventKind::WindDown,
    ];

    fn index(self) -> usize {
        match self {
            FixedEventKind::Habit => 0,
            FixedEventKind::Session => 1,
            FixedEventKind::Meeting => 2,
            FixedEventKind::TaskLog => 3,
            FixedEventKind::WindDown => 4,
        }
    }
}

/// Why a slot is not available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ConflictReason {
    Habit(String),
    Session(String),
    Meeting(String),
    TaskLog(String),
    Buffer(String),
    /// Taken by a chunk placed earlier in the same pass.
    Scheduled(String),
}

/// A fixed commitment occupying calendar time for one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedEvent {
    pub kind: FixedEventKind,
    pub source_id: String,
    pub title: String,
    pub date: NaiveDate,
    /// Start in fractional hours.
    pub start: f64,
    pub duration: f64,
    #[serde(default)]
    pub category_id: Option<String>,
    /// Original start of a habit that was pushed behind a meeting or session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displaced_from: Option<f64>,
}

impl FixedEvent {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn reason(&self) -> ConflictReason {
        let id = self.source_id.clone();
        match self.kind {
            FixedEventKind::Habit => ConflictReason::Habit(id),
            FixedEventKind::Session => ConflictReason::Session(id),
            FixedEventKind::Meeting => ConflictReason::Meeting(id),
            FixedEventKind::TaskLog => ConflictReason::TaskLog(id),
            FixedEventKind::WindDown => ConflictReason::Buffer(id),
        }
    }
}

/// Flattened map entry for diagnostics and JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub date: NaiveDate,
    pub quarter: u16,
    pub time: String,
    pub kind: FixedEventKind,
    pub source_id: String,
    pub title: String,
}

/// The five occupancy maps plus the events they point at.
#[derive(Debug, Clone, Default)]
pub struct ConflictMaps {
    events: Vec<FixedEvent>,
    maps: [BTreeMap<SlotKey, usize>; 5],
}

impl ConflictMaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `event` in its kind's map. The first event to claim a slot in a
    /// given map stays its owner.
    pub fn insert(&mut self, event: FixedEvent) {
        let index = self.events.len();
        let map = &mut self.maps[event.kind.index()];
        for quarter in covered_quarters(event.start, event.duration) {
            map.entry(SlotKey::new(event.date, quarter)).or_insert(index);
        }
        self.events.push(event);
    }

    pub fn owner(&self, kind: FixedEventKind, key: &SlotKey) -> Option<&FixedEvent> {
        self.maps[kind.index()]
            .get(key)
            .and_then(|index| self.events.get(*index))
    }

    pub fn is_occupied(&self, key: &SlotKey) -> bool {
        self.maps.iter().any(|map| map.contains_key(key))
    }

    /// One reason per map holding the slot.
    pub fn reasons(&self, key: &SlotKey) -> Vec<ConflictReason> {
        FixedEventKind::ALL
            .iter()
            .filter_map(|kind| self.owner(*kind, key))
            .map(FixedEvent::reason)
            .collect()
    }

    pub fn events(&self) -> &[FixedEvent] {
        &self.events
    }

    pub fn slot_count(&self, kind: FixedEventKind) -> usize {
        self.maps[kind.index()].len()
    }

    pub fn entries(&self) -> Vec<ConflictEntry> {
        let mut entries = Vec::new();
        for kind in FixedEventKind::ALL {
            for (key, index) in &self.maps[kind.index()] {
                let event = &self.events[*index];
                entries.push(ConflictEntry {
                    date: key.date,
                    quarter: key.quarter,
                    time: format_hours(quarter_to_hours(key.quarter)),
                    kind,
                    source_id: event.source_id.clone(),
                    title: event.title.clone(),
                });
            }
        }
        entries.sort_by(|a, b| (a.date, a.quarter).cmp(&(b.date, b.quarter)));
        entries
    }
}

/// The reserved end-of-day block for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindDownBlock {
    pub date: NaiveDate,
    pub start: ClockTime,
    pub duration_minutes: u32,
    /// Set for today's shortened block.
    #[serde(default)]
    pub expires_at: Option<NaiveDateTime>,
}

impl WindDownBlock {
    pub fn start_hours(&self) -> f64 {
        self.start.as_hours()
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_minutes as f64 / 60.0
    }

    pub fn source_id(&self) -> String {
        format!("wind-down-{}", self.date)
    }
}

/// Generate wind-down blocks for every non-past date in `days`.
///
/// Today's block is shortened and is not produced at all once `now` has
/// passed the configured expiry. A block colliding with a meeting moves to
/// the meeting's end and is dropped when that start reaches the latest
/// allowed start.
pub fn wind_down_blocks(
    days: &[NaiveDate],
    meetings: &[Meeting],
    now: NaiveDateTime,
    config: &WindDownConfig,
) -> Vec<WindDownBlock> {
    if !config.enabled {
        return Vec::new();
    }
    let today = now.date();
    let mut blocks = Vec::new();

    for &date in days.iter().filter(|d| **d >= today) {
        let (duration_minutes, expires_at) = if date == today {
            if now.time() >= naive(config.today_expires_at) {
                continue;
            }
            (
                config.today_duration_minutes,
                Some(date.and_time(naive(config.today_expires_at))),
            )
        } else {
            (config.duration_minutes, None)
        };

        let duration = duration_minutes as f64 / 60.0;
        let mut start = config.start.as_hours();
        let mut day_meetings: Vec<&Meeting> =
            meetings.iter().filter(|m| m.date == date).collect();
        day_meetings.sort_by(|a, b| a.start_hours().total_cmp(&b.start_hours()));

        for meeting in day_meetings {
            if overlaps(start, duration, meeting.start_hours(), meeting.end_hours()) {
                start = meeting.end_hours();
            }
        }
        if start >= config.latest_start.as_hours() {
            tracing::debug!(%date, "wind-down block pushed past latest start, dropped");
            continue;
        }

        blocks.push(WindDownBlock {
            date,
            start: ClockTime::from_hours(start),
            duration_minutes,
            expires_at,
        });
    }
    blocks
}

/// Raw fixed-event inputs for one pass.
#[derive(Debug, Clone, Copy)]
pub struct FixedInputs<'a> {
    pub habits: &'a [Habit],
    pub sessions: &'a [Session],
    pub meetings: &'a [Meeting],
    pub task_logs: &'a [TaskLog],
    pub wind_down: &'a [WindDownBlock],
}

/// Build the five conflict maps for `days`.
///
/// Habits hidden from the calendar are skipped. A habit overlapping a
/// meeting is pushed to the meeting's end rounded up to the next half hour;
/// the same rule then applies against sessions.
pub fn build_conflict_maps(
    inputs: FixedInputs<'_>,
    days: &[NaiveDate],
    work_hours: &WorkHours,
) -> ConflictMaps {
    let in_range: BTreeSet<NaiveDate> = days.iter().copied().collect();
    let mut maps = ConflictMaps::new();

    for meeting in inputs.meetings.iter().filter(|m| in_range.contains(&m.date)) {
        maps.insert(FixedEvent {
            kind: FixedEventKind::Meeting,
            source_id: meeting.id.clone(),
            title: meeting.title.clone(),
            date: meeting.date,
            start: meeting.start_hours(),
            duration: meeting.duration_hours,
            category_id: meeting.category_id.clone(),
            displaced_from: None,
        });
    }

    for session in inputs.sessions.iter().filter(|s| in_range.contains(&s.date)) {
        maps.insert(FixedEvent {
            kind: FixedEventKind::Session,
            source_id: session.id.clone(),
            title: session.project_id.clone().unwrap_or_else(|| "session".into()),
            date: session.date,
            start: session_start(session, work_hours),
            duration: session.duration_hours,
            category_id: session.category_id.clone(),
            displaced_from: None,
        });
    }

    for &date in days {
        let meetings = blockers(
            inputs
                .meetings
                .iter()
                .filter(|m| m.date == date)
                .map(|m| (m.start_hours(), m.end_hours())),
        );
        let sessions = blockers(inputs.sessions.iter().filter(|s| s.date == date).map(|s| {
            let start = session_start(s, work_hours);
            (start, start + s.duration_hours)
        }));

        for habit in inputs.habits.iter().filter(|h| h.show_on_calendar) {
            let Some(instance) = habit::resolve_instance(habit, date) else {
                continue;
            };
            let original = instance.start_hours();
            let duration = instance.duration_hours();
            let start = displace(displace(original, duration, &meetings), duration, &sessions);

            maps.insert(FixedEvent {
                kind: FixedEventKind::Habit,
                source_id: habit.id.clone(),
                title: habit.name.clone(),
                date,
                start,
                duration,
                category_id: habit.category_id.clone(),
                displaced_from: (start != original).then_some(original),
            });
        }
    }

    for log in inputs.task_logs.iter().filter(|l| in_range.contains(&l.date)) {
        let Some(start) = log.start() else {
            continue;
        };
        maps.insert(FixedEvent {
            kind: FixedEventKind::TaskLog,
            source_id: log.id.clone(),
            title: log.task_id.clone(),
            date: log.date,
            start: start.as_hours(),
            duration: log.duration_hours(),
            category_id: None,
            displaced_from: None,
        });
    }

    for block in inputs.wind_down.iter().filter(|b| in_range.contains(&b.date)) {
        maps.insert(FixedEvent {
            kind: FixedEventKind::WindDown,
            source_id: block.source_id(),
            title: "Wind down".into(),
            date: block.date,
            start: block.start_hours(),
            duration: block.duration_hours(),
            category_id: None,
            displaced_from: None,
        });
    }

    maps
}

fn session_start(session: &Session, work_hours: &WorkHours) -> f64 {
    session
        .start_time
        .map(ClockTime::as_hours)
        .unwrap_or_else(|| work_hours.for_date(session.date).start)
}

fn blockers(intervals: impl Iterator<Item = (f64, f64)>) -> Vec<(f64, f64)> {
    let mut list: Vec<(f64, f64)> = intervals.collect();
    list.sort_by(|a, b| a.0.total_cmp(&b.0));
    list
}

fn overlaps(start: f64, duration: f64, other_start: f64, other_end: f64) -> bool {
    start < other_end && start + duration > other_start
}

/// Push `start` past every blocker it overlaps, visiting blockers in start order.
fn displace(start: f64, duration: f64, blockers: &[(f64, f64)]) -> f64 {
    blockers.iter().fold(start, |start, &(block_start, block_end)| {
        if overlaps(start, duration, block_start, block_end) {
            ClockTime::from_hours(block_end).round_up_half_hour().as_hours()
        } else {
            start
        }
    })
}

fn naive(time: ClockTime) -> NaiveTime {
    NaiveTime::from_hms_opt((time.hour() % 24) as u32, time.minute() as u32, 0)
        .unwrap_or(NaiveTime::MIN)
}
