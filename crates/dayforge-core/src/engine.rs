//! One full planning pass.
//!
//! The engine ties the pieces together: settings and data in, conflict maps,
//! task chunks, the revenue placeholder and category buffers out. Results are
//! returned in a [`PlanCache`] the caller owns and hands back on the next
//! pass; when the inputs hash to the same value the cached plan is reused.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::availability::AvailabilityScanner;
use crate::buffer::{
    collect_free_slots, day_cutoffs, spent_hours_by_category, validate_configs, BufferAllocator,
    BufferBlock, BufferRequest, CategorySources,
};
use crate::conflict::{build_conflict_maps, wind_down_blocks, FixedInputs, WindDownBlock};
use crate::error::Result;
use crate::provider::{DataProvider, DateWindow, LogPersistence, PlanInputs, SettingsProvider};
use crate::scheduler::revenue::placeholder_task;
use crate::scheduler::{
    committed_hours_by_task, completed_hours_by_task, ScheduleRequest, ScheduledDays, TaskScheduler,
};
use crate::storage::Config;
use crate::summary::{SummaryBuilder, WorkSummary};
use crate::time::{dates_between, day_range, next_quarter_at_or_after, ClockTime};

/// The result of a pass, owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanCache {
    pub input_hash: String,
    pub generated_at: DateTime<Utc>,
    pub today: NaiveDate,
    pub chunks: ScheduledDays,
    pub buffers: Vec<BufferBlock>,
    pub wind_down: Vec<WindDownBlock>,
    pub summary: WorkSummary,
    /// Task id to hours that did not fit in the horizon.
    pub unscheduled: BTreeMap<String, f64>,
}

/// Counters describing one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub regenerated: bool,
    pub input_hash: String,
    pub cleared_logs: usize,
    pub chunk_count: usize,
    pub scheduled_hours: f64,
    pub unscheduled_hours: f64,
    pub placeholder_hours: Option<f64>,
    pub buffer_blocks: usize,
    pub buffer_hours: f64,
}

#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub cache: PlanCache,
    pub report: PassReport,
}

#[derive(Serialize)]
struct HashSource<'a> {
    inputs: &'a PlanInputs,
    settings: &'a Config,
    today: NaiveDate,
    quarter: u16,
}

/// SHA-256 over everything a pass reads, as hex.
///
/// The current quarter is part of the hash so a cached plan never offers
/// slots that have already started.
pub fn input_hash(
    inputs: &PlanInputs,
    settings: &Config,
    today: NaiveDate,
    quarter: u16,
) -> Result<String> {
    let bytes = serde_json::to_vec(&HashSource {
        inputs,
        settings,
        today,
        quarter,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Runs planning passes against the given collaborators.
pub struct PlanningEngine<'a> {
    data: &'a dyn DataProvider,
    logs: &'a dyn LogPersistence,
    settings: &'a dyn SettingsProvider,
}

impl<'a> PlanningEngine<'a> {
    pub fn new(
        data: &'a dyn DataProvider,
        logs: &'a dyn LogPersistence,
        settings: &'a dyn SettingsProvider,
    ) -> Self {
        Self {
            data,
            logs,
            settings,
        }
    }

    fn load_settings(&self, user_id: &str) -> Config {
        match self.settings.settings(user_id) {
            Ok(config) => config.sanitized(),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "failed to load settings, using defaults");
                Config::default()
            }
        }
    }

    /// Run one pass for `user_id` at `now`.
    ///
    /// Scheduled logs from the current quarter onward are cleared first,
    /// then data is loaded. If `cache` was built from identical inputs it is
    /// returned as is (today's chunks are written back so the store matches
    /// it); otherwise the plan is rebuilt.
    ///
    /// # Errors
    /// Returns an error if the data provider fails or a buffer config is
    /// invalid. Log persistence failures are logged and ignored.
    pub fn plan(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        cache: Option<PlanCache>,
    ) -> Result<PlanOutcome> {
        let span = tracing::info_span!("plan", user_id);
        let _guard = span.enter();

        let config = self.load_settings(user_id);
        let local_now: NaiveDateTime = now.with_timezone(&config.week.tz()).naive_local();
        let today = local_now.date();
        let quarter = next_quarter_at_or_after(local_now.time());
        let horizon = day_range(today, config.scheduling.horizon_days);
        let week = config.week.week_bounds(today);

        let cleared_logs = self
            .logs
            .clear_logs_from_time_forward(user_id, today, ClockTime::from_minutes(quarter as i64 * 15))
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to clear scheduled logs");
                0
            });

        let horizon_end = horizon.last().copied().unwrap_or(today);
        let window = DateWindow::new(week.0.min(today), week.1.max(horizon_end));
        let mut inputs = self.data.load(user_id, window)?;
        match self.logs.stored_logs(user_id, window) {
            Ok(stored) => inputs.merge_logs(stored),
            Err(e) => tracing::warn!(error = %e, "failed to read stored logs"),
        }
        validate_configs(&inputs.buffers)?;

        let hash = input_hash(&inputs, &config, today, quarter)?;
        if let Some(cache) = cache.filter(|c| c.input_hash == hash) {
            tracing::info!(hash = %hash, "inputs unchanged, reusing plan");
            if let Some(chunks) = cache.chunks.get(&today).filter(|c| !c.is_empty()) {
                if let Err(e) = self.logs.save_task_chunks(chunks, user_id) {
                    tracing::warn!(error = %e, "failed to persist today's chunks");
                }
            }
            let report = PassReport {
                regenerated: false,
                cleared_logs,
                ..report_for(&cache)
            };
            return Ok(PlanOutcome { cache, report });
        }

        let wind_down = wind_down_blocks(&horizon, &inputs.meetings, local_now, &config.wind_down);
        let maps = build_conflict_maps(
            FixedInputs {
                habits: &inputs.habits,
                sessions: &inputs.sessions,
                meetings: &inputs.meetings,
                task_logs: &inputs.task_logs,
                wind_down: &wind_down,
            },
            &horizon,
            &config.work_hours,
        );

        let completed = completed_hours_by_task(&inputs.task_logs);
        let worked = WorkSummary::from_logs(
            week,
            &inputs.task_logs,
            &inputs.tasks,
            &inputs.projects,
            config.billing.default_hourly_rate,
        );
        let placeholder = placeholder_task(
            &config.billing,
            &inputs.tasks,
            &inputs.projects,
            &completed,
            worked.completed_billable_revenue(),
        );

        let committed = committed_hours_by_task(&inputs.task_logs);
        let weekend = config.weekend();
        let outcome = TaskScheduler::new(&config.work_hours, &weekend).schedule_all_tasks(
            ScheduleRequest {
                tasks: &inputs.tasks,
                completed_hours: &committed,
                placeholder: placeholder.as_ref(),
                maps: &maps,
                days: &horizon,
                now: local_now,
            },
            self.logs,
            user_id,
        );

        let buffer_days = dates_between(today, week.1);
        let spent = spent_hours_by_category(
            CategorySources {
                habits: &inputs.habits,
                sessions: &inputs.sessions,
                meetings: &inputs.meetings,
                task_logs: &inputs.task_logs,
                tasks: &inputs.tasks,
                projects: &inputs.projects,
            },
            &dates_between(week.0, week.1),
        );
        let scanner = AvailabilityScanner::new(&maps, &weekend, local_now);
        let free_slots = collect_free_slots(
            &scanner,
            &buffer_days,
            |date| config.buffer_window(date),
            &outcome.occupied,
        );
        let cutoffs = day_cutoffs(&buffer_days, &inputs.habits, &config.week);
        let buffers = BufferAllocator::new(config.buffers.strategy).allocate(BufferRequest {
            configs: &inputs.buffers,
            spent: &spent,
            free_slots: &free_slots,
            cutoffs: &cutoffs,
        })?;

        let summary = SummaryBuilder::new(
            week,
            &inputs.tasks,
            &inputs.projects,
            config.billing.default_hourly_rate,
        )
        .add_logs(&inputs.task_logs)
        .add_chunks(&outcome.chunks)
        .build();

        let cache = PlanCache {
            input_hash: hash,
            generated_at: now,
            today,
            chunks: outcome.chunks,
            buffers,
            wind_down,
            summary,
            unscheduled: outcome.unscheduled,
        };
        let report = PassReport {
            regenerated: true,
            cleared_logs,
            placeholder_hours: placeholder.map(|t| t.estimated_hours),
            ..report_for(&cache)
        };
        tracing::info!(
            chunks = report.chunk_count,
            scheduled_hours = report.scheduled_hours,
            unscheduled_hours = report.unscheduled_hours,
            buffers = report.buffer_blocks,
            "plan regenerated"
        );
        Ok(PlanOutcome { cache, report })
    }
}

fn report_for(cache: &PlanCache) -> PassReport {
    let chunks = cache.chunks.values().flatten();
    PassReport {
        regenerated: false,
        input_hash: cache.input_hash.clone(),
        cleared_logs: 0,
        chunk_count: cache.chunks.values().map(Vec::len).sum(),
        scheduled_hours: chunks.map(|c| c.duration).sum(),
        unscheduled_hours: cache.unscheduled.values().sum(),
        placeholder_hours: None,
        buffer_blocks: cache.buffers.len(),
        buffer_hours: cache.buffers.iter().map(|b| b.duration).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MemoryLogStore, MemoryProvider, NullPersistence};
    use crate::schedule::Task;
    use chrono::TimeZone;

    fn config() -> Config {
        let mut config = Config::default();
        config.work_hours.start = 9.0;
        config.work_hours.end = 17.0;
        config.wind_down.enabled = false;
        config
    }

    fn monday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()
    }

    #[test]
    fn hash_changes_with_inputs() {
        let config = config();
        let today = monday_morning().date_naive();
        let empty = PlanInputs::default();
        let mut with_task = PlanInputs::default();
        with_task.tasks.push(Task::new("t1", "Task", 1.0));

        let a = input_hash(&empty, &config, today, 32).unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, input_hash(&empty, &config, today, 32).unwrap());
        assert_ne!(a, input_hash(&with_task, &config, today, 32).unwrap());
        assert_ne!(a, input_hash(&empty, &config, today, 33).unwrap());
    }

    #[test]
    fn pass_schedules_and_persists_today() {
        let mut provider = MemoryProvider::default();
        provider.inputs_mut().tasks.push(Task::new("t1", "Task", 3.0));
        let store = MemoryLogStore::new();
        let config = config();

        let outcome = PlanningEngine::new(&provider, &store, &config)
            .plan("u1", monday_morning(), None)
            .unwrap();
        assert!(outcome.report.regenerated);
        assert_eq!(outcome.report.scheduled_hours, 3.0);
        assert_eq!(store.saved("u1").len(), 1);
    }

    #[test]
    fn earlier_scheduled_logs_are_not_planned_twice() {
        let mut provider = MemoryProvider::default();
        provider.inputs_mut().tasks.push(Task::new("t1", "Task", 3.0));
        let store = MemoryLogStore::new();
        let config = config();
        let engine = PlanningEngine::new(&provider, &store, &config);

        engine.plan("u1", monday_morning(), None).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap();
        let outcome = engine.plan("u1", later, None).unwrap();

        // The 09:00-12:00 chunk started before 10:00, so it stays stored and
        // nothing new is scheduled.
        assert_eq!(outcome.report.cleared_logs, 0);
        assert_eq!(outcome.report.chunk_count, 0);
        assert_eq!(store.saved("u1").len(), 1);
    }

    #[test]
    fn unchanged_inputs_reuse_the_cache() {
        let mut provider = MemoryProvider::default();
        provider.inputs_mut().tasks.push(Task::new("t1", "Task", 3.0));
        let store = MemoryLogStore::new();
        let config = config();
        let engine = PlanningEngine::new(&provider, &NullPersistence, &config);

        let first = engine.plan("u1", monday_morning(), None).unwrap();
        let second = engine
            .plan("u1", monday_morning(), Some(first.cache.clone()))
            .unwrap();
        assert!(!second.report.regenerated);
        assert_eq!(second.cache, first.cache);

        // Stored chunks are cleared and written back on a cache hit.
        let engine = PlanningEngine::new(&provider, &store, &config);
        let first = engine.plan("u1", monday_morning(), None).unwrap();
        assert_eq!(store.saved("u1").len(), 1);
        let second = engine.plan("u1", monday_morning(), Some(first.cache)).unwrap();
        assert!(!second.report.regenerated);
        assert_eq!(second.report.cleared_logs, 1);
        assert_eq!(store.saved("u1").len(), 1);
    }
}
