//! Weekly planned/actual hours and billable revenue.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::schedule::{Project, Task, TaskLog};
use crate::scheduler::revenue::task_rate;
use crate::scheduler::ScheduledDays;

/// Hours and revenue of one project in the week. `None` collects work
/// without a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectHours {
    pub project_id: Option<String>,
    pub planned_hours: f64,
    pub actual_hours: f64,
    pub billable_hours: f64,
    pub billable_revenue: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkSummary {
    pub week_start: Option<NaiveDate>,
    pub week_end: Option<NaiveDate>,
    pub planned_hours: f64,
    /// Hours of the revenue placeholder, kept apart from real work.
    pub placeholder_hours: f64,
    pub actual_hours: f64,
    pub billable_hours: f64,
    /// Revenue earned by billable hours actually worked this week.
    pub billable_revenue: f64,
    pub projects: Vec<ProjectHours>,
}

/// Accumulates a [`WorkSummary`] for one week.
pub struct SummaryBuilder<'a> {
    week: (NaiveDate, NaiveDate),
    tasks: &'a [Task],
    projects: &'a [Project],
    default_rate: f64,
    summary: WorkSummary,
    per_project: BTreeMap<Option<String>, ProjectHours>,
}

impl<'a> SummaryBuilder<'a> {
    pub fn new(
        week: (NaiveDate, NaiveDate),
        tasks: &'a [Task],
        projects: &'a [Project],
        default_rate: f64,
    ) -> Self {
        Self {
            week,
            tasks,
            projects,
            default_rate,
            summary: WorkSummary {
                week_start: Some(week.0),
                week_end: Some(week.1),
                ..WorkSummary::default()
            },
            per_project: BTreeMap::new(),
        }
    }

    fn task(&self, id: &str) -> Option<&'a Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn entry(&mut self, task: Option<&Task>) -> &mut ProjectHours {
        let project_id = task.and_then(|t| t.project_id.clone());
        self.per_project
            .entry(project_id.clone())
            .or_insert_with(|| ProjectHours {
                project_id,
                ..ProjectHours::default()
            })
    }

    /// Count worked hours from task logs.
    pub fn add_logs(mut self, logs: &[TaskLog]) -> Self {
        let week = self.week;
        for log in logs.iter().filter(|l| within(week, l.date)) {
            let hours = log.worked_hours();
            if hours <= 0.0 {
                continue;
            }
            let task = self.task(&log.task_id);
            let revenue = task
                .filter(|t| t.billable)
                .map(|t| hours * task_rate(t, self.projects, self.default_rate));

            self.summary.actual_hours += hours;
            if let Some(revenue) = revenue {
                self.summary.billable_hours += hours;
                self.summary.billable_revenue += revenue;
            }
            let entry = self.entry(task);
            entry.actual_hours += hours;
            if let Some(revenue) = revenue {
                entry.billable_hours += hours;
                entry.billable_revenue += revenue;
            }
        }
        self
    }

    /// Count planned hours from scheduled chunks.
    pub fn add_chunks(mut self, chunks: &ScheduledDays) -> Self {
        let week = self.week;
        for chunk in chunks.values().flatten().filter(|c| within(week, c.date)) {
            match self.task(&chunk.task_id) {
                Some(task) => {
                    self.summary.planned_hours += chunk.duration;
                    self.entry(Some(task)).planned_hours += chunk.duration;
                }
                None => self.summary.placeholder_hours += chunk.duration,
            }
        }
        self
    }

    pub fn build(mut self) -> WorkSummary {
        self.summary.projects = self.per_project.into_values().collect();
        self.summary
    }
}

fn within(week: (NaiveDate, NaiveDate), date: NaiveDate) -> bool {
    date >= week.0 && date <= week.1
}

impl WorkSummary {
    /// Summary of worked time only.
    pub fn from_logs(
        week: (NaiveDate, NaiveDate),
        logs: &[TaskLog],
        tasks: &[Task],
        projects: &[Project],
        default_rate: f64,
    ) -> Self {
        SummaryBuilder::new(week, tasks, projects, default_rate)
            .add_logs(logs)
            .build()
    }

    /// Billable revenue already earned this week.
    pub fn completed_billable_revenue(&self) -> f64 {
        self.billable_revenue
    }

    pub fn project(&self, project_id: Option<&str>) -> Option<&ProjectHours> {
        self.projects
            .iter()
            .find(|p| p.project_id.as_deref() == project_id)
    }
}
