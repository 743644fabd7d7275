//! End-to-end scheduling scenarios through the public API.
//!
//! Covers the calendar rules that span several modules: habit drift feeding
//! the conflict maps, tasks avoiding every fixed event, and buffers staying
//! clear of tasks. Property tests check the no-overlap and balance
//! invariants on random calendars.

use std::collections::{BTreeSet, HashMap};

use chrono::{NaiveDate, NaiveDateTime};
use dayforge_core::availability::{AvailabilityScanner, OccupiedSlots};
use dayforge_core::buffer::{collect_free_slots, BufferAllocator, BufferConfig, BufferRequest};
use dayforge_core::conflict::{build_conflict_maps, FixedInputs, SlotKey};
use dayforge_core::schedule::{Habit, HabitRule, Meeting, Priority, Task};
use dayforge_core::scheduler::{ScheduleRequest, TaskScheduler};
use dayforge_core::storage::config::{BufferStrategy, WorkHours};
use dayforge_core::time::{covered_quarters, day_range, ClockTime, HourRange, WeekdaySet};
use dayforge_core::resolve_start_time;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn before_range() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn weekend() -> WeekdaySet {
    WeekdaySet::from_names(&["saturday", "sunday"])
}

fn meeting(id: &str, date: NaiveDate, hour: u16, minute: u16, hours: f64) -> Meeting {
    Meeting {
        id: id.into(),
        title: id.into(),
        category_id: None,
        date,
        start_time: ClockTime::from_hm(hour, minute).unwrap(),
        duration_hours: hours,
    }
}

fn inputs<'a>(habits: &'a [Habit], meetings: &'a [Meeting]) -> FixedInputs<'a> {
    FixedInputs {
        habits,
        sessions: &[],
        meetings,
        task_logs: &[],
        wind_down: &[],
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn pull_back_habit_drifts_into_the_conflict_maps() {
    let mut habit = Habit::new("wake", "Wake up", ClockTime::from_hm(9, 0).unwrap());
    habit.rule = HabitRule::PullBack15Min;
    habit.anchor_date = Some(monday());

    let wednesday = monday() + chrono::Duration::days(2);
    assert_eq!(resolve_start_time(&habit, wednesday), ClockTime::from_hm(8, 30));

    let days = day_range(monday(), 3);
    let maps = build_conflict_maps(inputs(&[habit], &[]), &days, &WorkHours::new(9.0, 17.0));
    // 08:30-09:00 on Wednesday.
    assert!(maps.is_occupied(&SlotKey::new(wednesday, 34)));
    assert!(!maps.is_occupied(&SlotKey::new(wednesday, 36)));
}

#[test]
fn displaced_habit_is_not_double_booked_with_tasks() {
    let mut lunch = Habit::new("lunch", "Lunch", ClockTime::from_hm(12, 0).unwrap());
    lunch.duration_minutes = 60;
    let meetings = vec![meeting("review", monday(), 11, 30, 1.0)];
    let days = [monday()];
    let hours = WorkHours::new(9.0, 17.0);
    let maps = build_conflict_maps(inputs(&[lunch], &meetings), &days, &hours);

    // Meeting ends 12:30, which is already on the half hour.
    assert!(maps.is_occupied(&SlotKey::new(monday(), 50)));
    assert!(maps.is_occupied(&SlotKey::new(monday(), 53)));
    assert!(!maps.is_occupied(&SlotKey::new(monday(), 54)));

    let weekend = weekend();
    let tasks = vec![Task::new("t1", "Deep work", 8.0)];
    let completed = HashMap::new();
    let outcome = TaskScheduler::new(&hours, &weekend).plan(ScheduleRequest {
        tasks: &tasks,
        completed_hours: &completed,
        placeholder: None,
        maps: &maps,
        days: &days,
        now: before_range(),
    });

    let starts: Vec<f64> = outcome.chunks[&monday()].iter().map(|c| c.start).collect();
    assert_eq!(starts, vec![9.0, 13.5]);
    assert_eq!(outcome.scheduled_hours("t1"), 6.0);
}

#[test]
fn buffers_fill_what_tasks_leave() {
    let hours = WorkHours::new(9.0, 12.0);
    let weekend = weekend();
    let days = [monday()];
    let maps = build_conflict_maps(inputs(&[], &[]), &days, &hours);
    let tasks = vec![Task::new("t1", "Task", 2.0).with_priority(Priority::High)];
    let completed = HashMap::new();
    let outcome = TaskScheduler::new(&hours, &weekend).plan(ScheduleRequest {
        tasks: &tasks,
        completed_hours: &completed,
        placeholder: None,
        maps: &maps,
        days: &days,
        now: before_range(),
    });

    let scanner = AvailabilityScanner::new(&maps, &weekend, before_range());
    let free = collect_free_slots(&scanner, &days, |d| hours.for_date(d), &outcome.occupied);
    let configs = vec![BufferConfig {
        category_id: "reading".into(),
        weekly_hours: 5.0,
        priority: 3,
    }];
    let spent = HashMap::new();
    let cutoffs = Default::default();
    let blocks = BufferAllocator::new(BufferStrategy::Contended)
        .allocate(BufferRequest {
            configs: &configs,
            spent: &spent,
            free_slots: &free,
            cutoffs: &cutoffs,
        })
        .unwrap();

    assert_eq!(blocks.len(), 1);
    assert_eq!((blocks[0].start, blocks[0].duration), (11.0, 1.0));
    assert_eq!(blocks[0].remaining_quota_hours, 4.0);
}

// ============================================================================
// Properties
// ============================================================================

fn meeting_strategy() -> impl Strategy<Value = (u16, u16, u16)> {
    // (day offset, start quarter, length in quarters)
    (0u16..5, 32u16..80, 1u16..12)
}

fn task_strategy() -> impl Strategy<Value = (u8, f64)> {
    (0u8..4, 0.25f64..10.0)
}

proptest! {
    #[test]
    fn chunks_never_overlap_and_respect_balances(
        raw_meetings in prop::collection::vec(meeting_strategy(), 0..8),
        raw_tasks in prop::collection::vec(task_strategy(), 1..6),
    ) {
        let hours = WorkHours::new(9.0, 18.0);
        let weekend = weekend();
        let days = day_range(monday(), 5);
        let meetings: Vec<Meeting> = raw_meetings
            .iter()
            .enumerate()
            .map(|(i, &(day, quarter, len))| Meeting {
                id: format!("m{i}"),
                title: "Meeting".into(),
                category_id: None,
                date: monday() + chrono::Duration::days(day as i64),
                start_time: ClockTime::from_minutes(quarter as i64 * 15),
                duration_hours: len as f64 * 0.25,
            })
            .collect();
        let tasks: Vec<Task> = raw_tasks
            .iter()
            .enumerate()
            .map(|(i, &(priority, estimate))| {
                let priority = match priority {
                    0 => Priority::High,
                    1 => Priority::Medium,
                    2 => Priority::Low,
                    _ => Priority::Placeholder,
                };
                Task::new(format!("t{i}"), "Task", estimate).with_priority(priority)
            })
            .collect();

        let maps = build_conflict_maps(inputs(&[], &meetings), &days, &hours);
        let completed = HashMap::new();
        let outcome = TaskScheduler::new(&hours, &weekend).plan(ScheduleRequest {
            tasks: &tasks,
            completed_hours: &completed,
            placeholder: None,
            maps: &maps,
            days: &days,
            now: before_range(),
        });

        let mut seen = BTreeSet::new();
        for chunk in outcome.chunks.values().flatten() {
            prop_assert!(chunk.start >= 9.0 && chunk.end() <= 18.0 + 1e-9);
            for q in covered_quarters(chunk.start, chunk.duration) {
                let key = SlotKey::new(chunk.date, q);
                prop_assert!(!maps.is_occupied(&key));
                prop_assert!(seen.insert(key));
            }
        }
        for task in &tasks {
            let placed = outcome.scheduled_hours(&task.id);
            let left = outcome.unscheduled.get(&task.id).copied().unwrap_or(0.0);
            prop_assert!(placed <= task.estimated_hours + 1e-9);
            prop_assert!((placed + left - task.estimated_hours).abs() < 1e-6);
        }
    }

    #[test]
    fn buffers_stay_within_quota_and_free_slots(
        taken in prop::collection::vec((0u16..3, 36u16..72), 0..40),
        quotas in prop::collection::vec((1u8..20, 0u8..11), 1..4),
        priority_strategy in any::<bool>(),
    ) {
        let days = day_range(monday(), 3);
        let mut occupied = OccupiedSlots::new();
        for &(day, q) in &taken {
            occupied.claim(monday() + chrono::Duration::days(day as i64), q..q + 1, "task");
        }
        let maps = build_conflict_maps(inputs(&[], &[]), &days, &WorkHours::new(9.0, 18.0));
        let weekend = weekend();
        let scanner = AvailabilityScanner::new(&maps, &weekend, before_range());
        let free = collect_free_slots(&scanner, &days, |_| HourRange::new(9.0, 18.0), &occupied);

        let configs: Vec<BufferConfig> = quotas
            .iter()
            .enumerate()
            .map(|(i, &(hours, priority))| BufferConfig {
                category_id: format!("c{i}"),
                weekly_hours: hours as f64 * 0.5,
                priority,
            })
            .collect();
        let strategy = if priority_strategy { BufferStrategy::Priority } else { BufferStrategy::Contended };
        let spent = HashMap::new();
        let cutoffs = Default::default();
        let blocks = BufferAllocator::new(strategy)
            .allocate(BufferRequest {
                configs: &configs,
                spent: &spent,
                free_slots: &free,
                cutoffs: &cutoffs,
            })
            .unwrap();

        let mut seen = BTreeSet::new();
        for block in &blocks {
            for q in block.quarters() {
                let key = SlotKey::new(block.date, q);
                prop_assert!(!occupied.contains(&key));
                prop_assert!(seen.insert(key));
            }
        }
        for config in &configs {
            let total: f64 = blocks
                .iter()
                .filter(|b| b.category_id == config.category_id)
                .map(|b| b.duration)
                .sum();
            prop_assert!(total <= config.weekly_hours + 1e-9);
        }
    }
}
