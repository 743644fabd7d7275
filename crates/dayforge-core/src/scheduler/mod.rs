//! Greedy task scheduler.
//!
//! This module places flexible tasks into free quarter-hour slots:
//! - Walks days in order and tasks in priority order
//! - Turns each contiguous run of free slots into a chunk
//! - Splits a task across gaps and days until its remaining hours are used
//! - Persists only today's chunks; every chunk is returned to the caller

pub mod revenue;

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::availability::{free_runs, AvailabilityScanner, OccupiedSlots};
use crate::conflict::ConflictMaps;
use crate::provider::LogPersistence;
use crate::schedule::{Priority, Task, TaskLog};
use crate::storage::config::WorkHours;
use crate::time::{format_hours, quarter_to_hours, ClockTime, WeekdaySet, QUARTER_HOURS};

// Remaining balances below this are treated as done.
const HOURS_EPSILON: f64 = 1e-6;

/// A contiguous scheduled fragment of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledChunk {
    pub task_id: String,
    pub title: String,
    pub priority: Priority,
    pub date: NaiveDate,
    /// Start in fractional hours.
    pub start: f64,
    pub duration: f64,
}

impl ScheduledChunk {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn start_time(&self) -> ClockTime {
        ClockTime::from_hours(self.start)
    }

    pub fn label(&self) -> String {
        format!(
            "{} {}-{} {}",
            self.date,
            format_hours(self.start),
            format_hours(self.end()),
            self.title
        )
    }
}

/// Chunks grouped by date.
pub type ScheduledDays = BTreeMap<NaiveDate, Vec<ScheduledChunk>>;

/// Everything one scheduling run needs besides the calendar settings.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleRequest<'a> {
    pub tasks: &'a [Task],
    /// Hours already worked per task id.
    pub completed_hours: &'a HashMap<String, f64>,
    /// Synthetic revenue task, always scheduled after real work.
    pub placeholder: Option<&'a Task>,
    pub maps: &'a ConflictMaps,
    pub days: &'a [NaiveDate],
    pub now: NaiveDateTime,
}

/// Result of a scheduling run.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOutcome {
    pub chunks: ScheduledDays,
    /// Hours that did not fit in the range, per task id.
    pub unscheduled: BTreeMap<String, f64>,
    /// Slots the chunks occupy.
    pub occupied: OccupiedSlots,
}

impl ScheduleOutcome {
    pub fn chunk_count(&self) -> usize {
        self.chunks.values().map(Vec::len).sum()
    }

    pub fn scheduled_hours(&self, task_id: &str) -> f64 {
        self.chunks
            .values()
            .flatten()
            .filter(|c| c.task_id == task_id)
            .map(|c| c.duration)
            .sum()
    }
}

#[derive(Debug, Clone)]
struct PendingTask {
    id: String,
    title: String,
    priority: Priority,
    remaining: f64,
}

/// Greedy, deterministic task scheduler.
pub struct TaskScheduler<'a> {
    work_hours: &'a WorkHours,
    weekend: &'a WeekdaySet,
}

impl<'a> TaskScheduler<'a> {
    pub fn new(work_hours: &'a WorkHours, weekend: &'a WeekdaySet) -> Self {
        Self {
            work_hours,
            weekend,
        }
    }

    /// Place every eligible task without touching persistence.
    ///
    /// Tasks are ordered high, medium, low, then the placeholder, keeping
    /// input order within a priority. On each day the first unfinished task
    /// takes every free run until it is done; the next task then gets what
    /// is left. A task that does not fit by the end of the range keeps its
    /// remainder in [`ScheduleOutcome::unscheduled`].
    pub fn plan(&self, request: ScheduleRequest<'_>) -> ScheduleOutcome {
        let mut queue = pending_tasks(request.tasks, request.completed_hours, request.placeholder);
        let scanner = AvailabilityScanner::new(request.maps, self.weekend, request.now);
        let mut outcome = ScheduleOutcome::default();

        for &date in request.days {
            let window = self.work_hours.for_date(date);

            while let Some(task) = queue.first_mut() {
                let runs = free_runs(&scanner.scan(date, window, &outcome.occupied));
                if runs.is_empty() {
                    break;
                }

                for run in runs {
                    if task.remaining <= HOURS_EPSILON {
                        break;
                    }
                    let needed = ((task.remaining / QUARTER_HOURS) - HOURS_EPSILON).ceil() as u16;
                    let take = needed.min(run.end - run.start);
                    let duration = (take as f64 * QUARTER_HOURS).min(task.remaining);

                    outcome.occupied.claim(date, run.start..run.start + take, &task.id);
                    outcome.chunks.entry(date).or_default().push(ScheduledChunk {
                        task_id: task.id.clone(),
                        title: task.title.clone(),
                        priority: task.priority,
                        date,
                        start: quarter_to_hours(run.start),
                        duration,
                    });
                    task.remaining -= duration;
                }

                if task.remaining > HOURS_EPSILON {
                    // Every free run of the day was used.
                    break;
                }
                tracing::debug!(task_id = %task.id, %date, "task fully scheduled");
                queue.remove(0);
            }

            if queue.is_empty() {
                break;
            }
        }

        for task in queue {
            tracing::debug!(task_id = %task.id, hours = task.remaining, "task left partly unscheduled");
            outcome.unscheduled.insert(task.id, task.remaining);
        }
        outcome
    }

    /// Schedule all tasks and persist the chunks landing on today.
    ///
    /// A failed save is logged and swallowed: the in-memory schedule is still
    /// returned so the calendar stays usable.
    pub fn schedule_all_tasks(
        &self,
        request: ScheduleRequest<'_>,
        persistence: &dyn LogPersistence,
        user_id: &str,
    ) -> ScheduleOutcome {
        let outcome = self.plan(request);
        let today = request.now.date();

        if let Some(chunks) = outcome.chunks.get(&today).filter(|c| !c.is_empty()) {
            if let Err(e) = persistence.save_task_chunks(chunks, user_id) {
                tracing::warn!(user_id, error = %e, "failed to persist today's chunks");
            }
        }
        outcome
    }
}

fn pending_tasks(
    tasks: &[Task],
    completed_hours: &HashMap<String, f64>,
    placeholder: Option<&Task>,
) -> Vec<PendingTask> {
    let mut queue: Vec<PendingTask> = tasks
        .iter()
        .filter(|t| t.is_schedulable())
        .chain(placeholder)
        .filter_map(|t| {
            let done = completed_hours.get(&t.id).copied().unwrap_or(0.0);
            let remaining = t.estimated_hours - done;
            (remaining > HOURS_EPSILON).then(|| PendingTask {
                id: t.id.clone(),
                title: t.title.clone(),
                priority: t.priority,
                remaining,
            })
        })
        .collect();
    queue.sort_by_key(|t| t.priority.rank());
    queue
}

/// Hours worked per task id, summed from the logs' actual durations.
pub fn completed_hours_by_task(logs: &[TaskLog]) -> HashMap<String, f64> {
    let mut hours: HashMap<String, f64> = HashMap::new();
    for log in logs {
        let worked = log.worked_hours();
        if worked > 0.0 {
            *hours.entry(log.task_id.clone()).or_default() += worked;
        }
    }
    hours
}

/// Hours already spoken for per task id: worked hours where work was
/// recorded, otherwise the scheduled duration of logs still on the calendar.
///
/// Used as the scheduling balance so a task with surviving scheduled logs is
/// not placed twice.
pub fn committed_hours_by_task(logs: &[TaskLog]) -> HashMap<String, f64> {
    let mut hours: HashMap<String, f64> = HashMap::new();
    for log in logs {
        let committed = if log.actual_duration.is_some() {
            log.worked_hours()
        } else {
            log.scheduled_duration.unwrap_or(0.0).max(0.0)
        };
        if committed > 0.0 {
            *hours.entry(log.task_id.clone()).or_default() += committed;
        }
    }
    hours
}
