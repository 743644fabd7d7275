//! JSON request handler over the core operations.
//!
//! A request is `{"method": "...", "params": {...}}`; the response is
//! `{"ok": true, "result": ...}` or `{"ok": false, "error": "..."}`. Every
//! method calls the same functions the library exposes directly, so a remote
//! caller and an in-process caller get identical answers.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::buffer::{BufferAllocator, BufferConfig, BufferRequest, FreeSlots};
use crate::conflict::{build_conflict_maps, FixedEventKind, FixedInputs, WindDownBlock};
use crate::error::{CoreError, Result};
use crate::habit::resolve_start_time;
use crate::provider::NullPersistence;
use crate::schedule::{Habit, Meeting, Project, Session, Task, TaskLog};
use crate::scheduler::revenue::placeholder_task;
use crate::scheduler::{ScheduleRequest, TaskScheduler};
use crate::storage::config::{BillingConfig, BufferStrategy, WorkHours};
use crate::storage::Config;
use crate::time::{checked_day_range, WeekdaySet};

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RpcResponse {
    fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    fn failure(error: impl std::fmt::Display) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct HabitParams {
    habit: Habit,
    date: NaiveDate,
}

#[derive(Deserialize)]
struct RangeParams {
    start: NaiveDate,
    #[serde(default = "default_days")]
    days: u32,
    #[serde(default)]
    work_hours: Option<WorkHours>,
}

fn default_days() -> u32 {
    7
}

impl RangeParams {
    fn days(&self) -> Result<Vec<NaiveDate>> {
        Ok(checked_day_range(self.start, self.days)?)
    }
}

#[derive(Deserialize)]
struct ConflictParams {
    #[serde(flatten)]
    range: RangeParams,
    #[serde(default)]
    habits: Vec<Habit>,
    #[serde(default)]
    sessions: Vec<Session>,
    #[serde(default)]
    meetings: Vec<Meeting>,
    #[serde(default)]
    task_logs: Vec<TaskLog>,
    #[serde(default)]
    wind_down: Vec<WindDownBlock>,
}

#[derive(Deserialize)]
struct ScheduleParams {
    #[serde(flatten)]
    fixed: ConflictParams,
    tasks: Vec<Task>,
    #[serde(default)]
    completed_hours: HashMap<String, f64>,
    #[serde(default)]
    placeholder: Option<Task>,
    #[serde(default)]
    weekend_days: Option<Vec<String>>,
    now: NaiveDateTime,
}

#[derive(Deserialize)]
struct BufferParams {
    configs: Vec<BufferConfig>,
    #[serde(default)]
    spent: HashMap<String, f64>,
    free_slots: FreeSlots,
    #[serde(default)]
    cutoffs: BTreeMap<NaiveDate, f64>,
    #[serde(default)]
    strategy: Option<BufferStrategy>,
}

#[derive(Deserialize)]
struct PlaceholderParams {
    #[serde(default)]
    billing: Option<BillingConfig>,
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    completed_hours: HashMap<String, f64>,
    #[serde(default)]
    completed_billable_revenue: f64,
}

/// Dispatches JSON requests. Settings fill in parameters a request omits.
#[derive(Debug, Clone, Default)]
pub struct RpcHandler {
    config: Config,
}

impl RpcHandler {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Handle a raw JSON request and return the JSON response text.
    pub fn handle(&self, request: &str) -> String {
        let response = match serde_json::from_str::<RpcRequest>(request) {
            Ok(request) => self.dispatch(&request),
            Err(e) => RpcResponse::failure(format!("invalid request: {e}")),
        };
        serde_json::to_string(&response)
            .unwrap_or_else(|e| format!(r#"{{"ok":false,"error":"{e}"}}"#))
    }

    pub fn dispatch(&self, request: &RpcRequest) -> RpcResponse {
        tracing::debug!(method = %request.method, "rpc request");
        match self.call(&request.method, request.params.clone()) {
            Ok(result) => RpcResponse::success(result),
            Err(e) => {
                tracing::debug!(method = %request.method, error = %e, "rpc request failed");
                RpcResponse::failure(e)
            }
        }
    }

    fn call(&self, method: &str, params: Value) -> Result<Value> {
        match method {
            "resolve_habit_start_time" => {
                let p: HabitParams = parse(params)?;
                Ok(json!(resolve_start_time(&p.habit, p.date)))
            }
            "build_conflict_maps" => {
                let p: ConflictParams = parse(params)?;
                let days = p.range.days()?;
                let work_hours = self.work_hours(&p.range)?;
                let maps = build_conflict_maps(fixed_inputs(&p), &days, &work_hours);
                let counts: BTreeMap<FixedEventKind, usize> = FixedEventKind::ALL
                    .iter()
                    .map(|&kind| (kind, maps.slot_count(kind)))
                    .collect();
                Ok(json!({
                    "events": maps.events(),
                    "slot_counts": counts,
                    "entries": maps.entries(),
                }))
            }
            "schedule_all_tasks" => {
                let p: ScheduleParams = parse(params)?;
                let days = p.fixed.range.days()?;
                let work_hours = self.work_hours(&p.fixed.range)?;
                let weekend = match &p.weekend_days {
                    Some(names) => WeekdaySet::from_names(names),
                    None => self.config.weekend(),
                };
                let maps = build_conflict_maps(fixed_inputs(&p.fixed), &days, &work_hours);
                let outcome = TaskScheduler::new(&work_hours, &weekend).schedule_all_tasks(
                    ScheduleRequest {
                        tasks: &p.tasks,
                        completed_hours: &p.completed_hours,
                        placeholder: p.placeholder.as_ref(),
                        maps: &maps,
                        days: &days,
                        now: p.now,
                    },
                    &NullPersistence,
                    "rpc",
                );
                Ok(json!({
                    "chunks": outcome.chunks,
                    "unscheduled": outcome.unscheduled,
                }))
            }
            "allocate_buffers" => {
                let p: BufferParams = parse(params)?;
                let strategy = p.strategy.unwrap_or(self.config.buffers.strategy);
                let blocks = BufferAllocator::new(strategy).allocate(BufferRequest {
                    configs: &p.configs,
                    spent: &p.spent,
                    free_slots: &p.free_slots,
                    cutoffs: &p.cutoffs,
                })?;
                Ok(serde_json::to_value(blocks)?)
            }
            "placeholder_task" => {
                let p: PlaceholderParams = parse(params)?;
                let billing = p.billing.unwrap_or_else(|| self.config.billing.clone());
                Ok(json!(placeholder_task(
                    &billing,
                    &p.tasks,
                    &p.projects,
                    &p.completed_hours,
                    p.completed_billable_revenue,
                )))
            }
            other => Err(CoreError::Custom(format!("unknown method: {other}"))),
        }
    }

    fn work_hours(&self, range: &RangeParams) -> Result<WorkHours> {
        let work_hours = range
            .work_hours
            .clone()
            .unwrap_or_else(|| self.config.work_hours.clone());
        work_hours.validate()?;
        Ok(work_hours)
    }
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T> {
    Ok(serde_json::from_value(params)?)
}

fn fixed_inputs(p: &ConflictParams) -> FixedInputs<'_> {
    FixedInputs {
        habits: &p.habits,
        sessions: &p.sessions,
        meetings: &p.meetings,
        task_logs: &p.task_logs,
        wind_down: &p.wind_down,
    }
}
