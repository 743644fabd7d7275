//! Schedule input types: tasks, projects, habits, sessions, meetings and logs.
//!
//! These are the records the data provider hands to the engine. Each one has
//! explicit, typed fields so the scheduling code never probes loosely shaped
//! records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::time::{ClockTime, WeekdaySet};

/// Scheduling priority of a task.
///
/// `Placeholder` is reserved for the synthetic billable-revenue task and
/// always yields to real work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
    Placeholder,
}

impl Priority {
    /// Sort rank, lower runs first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
            Priority::Placeholder => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

/// A flexible work item the scheduler places into free time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub estimated_hours: f64,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub billable: bool,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    /// Sub-tasks are tracked under their parent and never scheduled on their own.
    #[serde(default)]
    pub parent_task_id: Option<String>,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>, estimated_hours: f64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            estimated_hours,
            priority: Priority::default(),
            billable: false,
            project_id: None,
            status: TaskStatus::Todo,
            parent_task_id: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn billable(mut self) -> Self {
        self.billable = true;
        self
    }

    /// Top-level, open and with a positive estimate.
    pub fn is_schedulable(&self) -> bool {
        self.parent_task_id.is_none()
            && self.status != TaskStatus::Completed
            && self.estimated_hours > 0.0
    }
}

/// A project groups tasks and carries the hourly rate used for billing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub hourly_rate: Option<f64>,
    #[serde(default)]
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitRule {
    /// Always at the base time unless a daily log overrides it.
    #[default]
    Fixed,
    /// Drifts 15 minutes earlier per day since the last explicit start.
    #[serde(rename = "pull_back_15min")]
    PullBack15Min,
}

/// Per-day override recorded against a habit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitLog {
    pub date: NaiveDate,
    #[serde(default)]
    pub start_time: Option<ClockTime>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub start_time: Option<ClockTime>,
    #[serde(default = "default_habit_minutes")]
    pub duration_minutes: u32,
    #[serde(default)]
    pub rule: HabitRule,
    /// Date the base start time applies from; the pull-back drift counts
    /// days after it.
    #[serde(default)]
    pub anchor_date: Option<NaiveDate>,
    /// Weekday names the habit runs on. Empty means every day.
    #[serde(default)]
    pub weekdays: WeekdaySet,
    #[serde(default = "default_true")]
    pub show_on_calendar: bool,
    /// Marks the evening habit whose start is the day's buffer cutoff.
    #[serde(default)]
    pub is_wind_down: bool,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub logs: Vec<HabitLog>,
}

fn default_habit_minutes() -> u32 {
    30
}

fn default_true() -> bool {
    true
}

impl Habit {
    pub fn new(id: impl Into<String>, name: impl Into<String>, start_time: ClockTime) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            start_time: Some(start_time),
            duration_minutes: default_habit_minutes(),
            rule: HabitRule::Fixed,
            anchor_date: None,
            weekdays: WeekdaySet::default(),
            show_on_calendar: true,
            is_wind_down: false,
            category_id: None,
            logs: Vec::new(),
        }
    }

    pub fn log_for(&self, date: NaiveDate) -> Option<&HabitLog> {
        self.logs.iter().find(|log| log.date == date)
    }
}

/// A recurring project work session pinned to a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    pub date: NaiveDate,
    /// Falls back to the work-hours start when nothing was recorded.
    #[serde(default)]
    pub start_time: Option<ClockTime>,
    pub duration_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category_id: Option<String>,
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub duration_hours: f64,
}

impl Meeting {
    pub fn start_hours(&self) -> f64 {
        self.start_time.as_hours()
    }

    pub fn end_hours(&self) -> f64 {
        self.start_hours() + self.duration_hours
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskLogStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
}

/// A scheduled or worked block of a task on a specific date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLog {
    pub id: String,
    pub task_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub scheduled_start_time: Option<ClockTime>,
    #[serde(default)]
    pub scheduled_duration: Option<f64>,
    #[serde(default)]
    pub actual_start_time: Option<ClockTime>,
    #[serde(default)]
    pub actual_duration: Option<f64>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub status: TaskLogStatus,
}

impl TaskLog {
    /// Actual start wins over the scheduled one.
    pub fn start(&self) -> Option<ClockTime> {
        self.actual_start_time.or(self.scheduled_start_time)
    }

    /// Actual, then scheduled, then estimated duration, then one hour.
    pub fn duration_hours(&self) -> f64 {
        self.actual_duration
            .or(self.scheduled_duration)
            .or(self.estimated_hours)
            .unwrap_or(1.0)
    }

    /// Hours actually worked, zero when nothing was recorded.
    pub fn worked_hours(&self) -> f64 {
        self.actual_duration.unwrap_or(0.0).max(0.0)
    }
}
