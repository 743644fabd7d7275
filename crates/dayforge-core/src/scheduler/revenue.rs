//! Weekly billable-revenue target.
//!
//! When the open billable work cannot reach the weekly target, a synthetic
//! placeholder task fills the gap at the lowest priority.

use std::collections::HashMap;

use crate::schedule::{Priority, Project, Task};
use crate::storage::config::BillingConfig;

pub const PLACEHOLDER_TASK_ID: &str = "billable-placeholder";
pub const PLACEHOLDER_TITLE: &str = "Billable work";

/// Hourly rate of `task`: its project's rate, else `default_rate`.
pub fn task_rate(task: &Task, projects: &[Project], default_rate: f64) -> f64 {
    task.project_id
        .as_deref()
        .and_then(|pid| projects.iter().find(|p| p.id == pid))
        .and_then(|p| p.hourly_rate)
        .unwrap_or(default_rate)
}

/// Revenue still open in the scheduled billable backlog.
pub fn projected_revenue(
    tasks: &[Task],
    projects: &[Project],
    completed_hours: &HashMap<String, f64>,
    default_rate: f64,
) -> f64 {
    tasks
        .iter()
        .filter(|t| t.billable && t.is_schedulable())
        .map(|t| {
            let done = completed_hours.get(&t.id).copied().unwrap_or(0.0);
            (t.estimated_hours - done).max(0.0) * task_rate(t, projects, default_rate)
        })
        .sum()
}

/// Revenue the week still misses once backlog and earned revenue count.
pub fn remaining_revenue(
    billing: &BillingConfig,
    tasks: &[Task],
    projects: &[Project],
    completed_hours: &HashMap<String, f64>,
    completed_billable_revenue: f64,
) -> f64 {
    let projected = projected_revenue(tasks, projects, completed_hours, billing.default_hourly_rate);
    (billing.weekly_revenue_target - projected - completed_billable_revenue).max(0.0)
}

/// Placeholder task covering the revenue gap, if any.
pub fn placeholder_task(
    billing: &BillingConfig,
    tasks: &[Task],
    projects: &[Project],
    completed_hours: &HashMap<String, f64>,
    completed_billable_revenue: f64,
) -> Option<Task> {
    if !billing.enabled {
        return None;
    }
    if billing.default_hourly_rate <= 0.0 {
        tracing::warn!(
            rate = billing.default_hourly_rate,
            "non-positive default hourly rate, skipping revenue placeholder"
        );
        return None;
    }

    let remaining = remaining_revenue(
        billing,
        tasks,
        projects,
        completed_hours,
        completed_billable_revenue,
    );
    if remaining <= 0.0 {
        return None;
    }

    let hours = (remaining / billing.default_hourly_rate).ceil();
    tracing::debug!(remaining, hours, "revenue placeholder sized");
    Some(
        Task::new(PLACEHOLDER_TASK_ID, PLACEHOLDER_TITLE, hours)
            .with_priority(Priority::Placeholder)
            .billable(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn billing() -> BillingConfig {
        BillingConfig {
            enabled: true,
            weekly_revenue_target: 1000.0,
            default_hourly_rate: 65.0,
        }
    }

    #[test]
    fn placeholder_covers_the_gap() {
        let task = placeholder_task(&billing(), &[], &[], &HashMap::new(), 500.0).unwrap();
        assert_eq!(task.id, PLACEHOLDER_TASK_ID);
        assert_eq!(task.estimated_hours, 8.0);
        assert_eq!(task.priority, Priority::Placeholder);
        assert!(task.billable);
    }

    #[test]
    fn disabled_billing_has_no_placeholder() {
        let mut cfg = billing();
        cfg.enabled = false;
        assert!(placeholder_task(&cfg, &[], &[], &HashMap::new(), 0.0).is_none());
    }

    #[test]
    fn target_met_by_backlog() {
        let projects = vec![Project {
            id: "acme".into(),
            name: "Acme".into(),
            hourly_rate: Some(100.0),
            category_id: None,
        }];
        let tasks = vec![Task::new("t1", "Client work", 6.0).with_project("acme").billable()];
        assert!(placeholder_task(&billing(), &tasks, &projects, &HashMap::new(), 400.0).is_none());
    }

    #[test]
    fn completed_hours_shrink_the_backlog() {
        let tasks = vec![Task::new("t1", "Client work", 4.0).billable()];
        let completed = HashMap::from([("t1".to_string(), 3.0)]);
        // 1h open at $65 leaves $935, or 15h at the default rate.
        let task = placeholder_task(&billing(), &tasks, &[], &completed, 0.0).unwrap();
        assert_eq!(task.estimated_hours, 15.0);
    }

    #[test]
    fn non_billable_tasks_do_not_count() {
        let tasks = vec![Task::new("t1", "Chores", 20.0)];
        assert_eq!(
            remaining_revenue(&billing(), &tasks, &[], &HashMap::new(), 0.0),
            1000.0
        );
    }

    #[test]
    fn zero_rate_disables_placeholder() {
        let mut cfg = billing();
        cfg.default_hourly_rate = 0.0;
        assert!(placeholder_task(&cfg, &[], &[], &HashMap::new(), 0.0).is_none());
    }

    #[test]
    fn project_rate_overrides_default() {
        let projects = vec![Project {
            id: "p".into(),
            name: "P".into(),
            hourly_rate: Some(120.0),
            category_id: None,
        }];
        let task = Task::new("t", "T", 1.0).with_project("p");
        assert_eq!(task_rate(&task, &projects, 65.0), 120.0);
        assert_eq!(task_rate(&Task::new("u", "U", 1.0), &projects, 65.0), 65.0);
    }
}
