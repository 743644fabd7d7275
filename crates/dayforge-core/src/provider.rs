//! Collaborator seams for a planning pass.
//!
//! The engine never talks to a backend directly. It reads user data through
//! [`DataProvider`], reads settings through [`SettingsProvider`] and writes
//! today's schedule through [`LogPersistence`]. Implementations here cover
//! tests (in-memory) and local use (a JSON snapshot file); the SQLite log
//! store lives in [`crate::storage::log_store`].

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::buffer::BufferConfig;
use crate::error::{CoreError, Result};
use crate::schedule::{Habit, Meeting, Project, Session, Task, TaskLog, TaskLogStatus};
use crate::scheduler::ScheduledChunk;
use crate::storage::Config;
use crate::time::ClockTime;

/// Inclusive date window a pass reads data for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// All user data one pass consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanInputs {
    #[serde(default)]
    pub habits: Vec<Habit>,
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub meetings: Vec<Meeting>,
    #[serde(default)]
    pub task_logs: Vec<TaskLog>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub buffers: Vec<BufferConfig>,
}

impl PlanInputs {
    /// Keep dated records inside `window`. Habits, tasks, projects and
    /// buffer configs are undated and kept whole.
    pub fn within(mut self, window: DateWindow) -> Self {
        self.sessions.retain(|s| window.contains(s.date));
        self.meetings.retain(|m| window.contains(m.date));
        self.task_logs.retain(|l| window.contains(l.date));
        self
    }

    /// Append logs whose id is not already present.
    pub fn merge_logs(&mut self, logs: Vec<TaskLog>) {
        for log in logs {
            if !self.task_logs.iter().any(|l| l.id == log.id) {
                self.task_logs.push(log);
            }
        }
    }
}

/// Source of habits, sessions, meetings, logs, tasks, projects and buffers.
pub trait DataProvider {
    /// Short identifier used in errors and logs.
    fn name(&self) -> &str;

    fn load(&self, user_id: &str, window: DateWindow) -> Result<PlanInputs>;
}

/// Writes engine-scheduled chunks as task logs.
///
/// Clearing only removes logs the engine scheduled; logs with actual work
/// recorded are kept.
pub trait LogPersistence {
    fn save_task_chunks(&self, chunks: &[ScheduledChunk], user_id: &str) -> Result<()>;

    fn clear_logs_for_date(&self, user_id: &str, date: NaiveDate) -> Result<usize>;

    /// Clear logs on `date` starting at or after `from`, and on every later
    /// date.
    fn clear_logs_from_time_forward(
        &self,
        user_id: &str,
        date: NaiveDate,
        from: ClockTime,
    ) -> Result<usize>;

    /// Logs this store holds for the window, fed back as fixed events.
    fn stored_logs(&self, _user_id: &str, _window: DateWindow) -> Result<Vec<TaskLog>> {
        Ok(Vec::new()) // default: nothing stored
    }
}

pub trait SettingsProvider {
    fn settings(&self, user_id: &str) -> Result<Config>;
}

impl SettingsProvider for Config {
    fn settings(&self, _user_id: &str) -> Result<Config> {
        Ok(self.clone())
    }
}

/// Settings read from the TOML config file on every pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSettings;

impl SettingsProvider for FileSettings {
    fn settings(&self, _user_id: &str) -> Result<Config> {
        Config::load()
    }
}

/// In-memory data, the same for every user.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    inputs: PlanInputs,
}

impl MemoryProvider {
    pub fn new(inputs: PlanInputs) -> Self {
        Self { inputs }
    }

    pub fn inputs_mut(&mut self) -> &mut PlanInputs {
        &mut self.inputs
    }
}

impl DataProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(&self, _user_id: &str, window: DateWindow) -> Result<PlanInputs> {
        Ok(self.inputs.clone().within(window))
    }
}

/// Data read from a JSON snapshot of [`PlanInputs`].
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    path: PathBuf,
}

impl SnapshotProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the whole snapshot without windowing.
    pub fn read(&self) -> Result<PlanInputs> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            CoreError::provider(self.name(), format!("{}: {e}", self.path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            CoreError::provider(self.name(), format!("{}: {e}", self.path.display()))
        })
    }
}

impl DataProvider for SnapshotProvider {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn load(&self, _user_id: &str, window: DateWindow) -> Result<PlanInputs> {
        Ok(self.read()?.within(window))
    }
}

/// Persistence that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPersistence;

impl LogPersistence for NullPersistence {
    fn save_task_chunks(&self, _chunks: &[ScheduledChunk], _user_id: &str) -> Result<()> {
        Ok(())
    }

    fn clear_logs_for_date(&self, _user_id: &str, _date: NaiveDate) -> Result<usize> {
        Ok(0)
    }

    fn clear_logs_from_time_forward(
        &self,
        _user_id: &str,
        _date: NaiveDate,
        _from: ClockTime,
    ) -> Result<usize> {
        Ok(0)
    }
}

/// Read-only view over another store, for passes that must not write.
///
/// Saves and clears are dropped, but a forward clear is remembered so that
/// [`LogPersistence::stored_logs`] returns exactly the logs a real pass would
/// still see after clearing.
pub struct PreviewLogs<'a> {
    inner: &'a dyn LogPersistence,
    cleared_from: Cell<Option<(NaiveDate, ClockTime)>>,
}

impl<'a> PreviewLogs<'a> {
    pub fn new(inner: &'a dyn LogPersistence) -> Self {
        Self {
            inner,
            cleared_from: Cell::new(None),
        }
    }

    fn would_clear(&self, log: &TaskLog) -> bool {
        let Some((date, from)) = self.cleared_from.get() else {
            return false;
        };
        log.status == TaskLogStatus::Scheduled
            && log.actual_start_time.is_none()
            && (log.date > date
                || (log.date == date && log.scheduled_start_time.is_some_and(|t| t >= from)))
    }
}

impl LogPersistence for PreviewLogs<'_> {
    fn save_task_chunks(&self, _chunks: &[ScheduledChunk], _user_id: &str) -> Result<()> {
        Ok(())
    }

    fn clear_logs_for_date(&self, _user_id: &str, _date: NaiveDate) -> Result<usize> {
        Ok(0)
    }

    fn clear_logs_from_time_forward(
        &self,
        _user_id: &str,
        date: NaiveDate,
        from: ClockTime,
    ) -> Result<usize> {
        self.cleared_from.set(Some((date, from)));
        Ok(0)
    }

    fn stored_logs(&self, user_id: &str, window: DateWindow) -> Result<Vec<TaskLog>> {
        let mut logs = self.inner.stored_logs(user_id, window)?;
        logs.retain(|log| !self.would_clear(log));
        Ok(logs)
    }
}

/// Chunks kept in memory per user. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    chunks: RefCell<Vec<(String, ScheduledChunk)>>,
    failing: bool,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn saved(&self, user_id: &str) -> Vec<ScheduledChunk> {
        self.chunks
            .borrow()
            .iter()
            .filter(|(user, _)| user == user_id)
            .map(|(_, chunk)| chunk.clone())
            .collect()
    }

    fn check(&self) -> Result<()> {
        if self.failing {
            return Err(CoreError::provider("memory-log", "store unavailable"));
        }
        Ok(())
    }

    fn remove_where(&self, keep: impl Fn(&str, &ScheduledChunk) -> bool) -> usize {
        let mut chunks = self.chunks.borrow_mut();
        let before = chunks.len();
        chunks.retain(|(user, chunk)| keep(user, chunk));
        before - chunks.len()
    }
}

impl LogPersistence for MemoryLogStore {
    fn save_task_chunks(&self, chunks: &[ScheduledChunk], user_id: &str) -> Result<()> {
        self.check()?;
        self.chunks
            .borrow_mut()
            .extend(chunks.iter().map(|c| (user_id.to_string(), c.clone())));
        Ok(())
    }

    fn clear_logs_for_date(&self, user_id: &str, date: NaiveDate) -> Result<usize> {
        self.check()?;
        Ok(self.remove_where(|user, chunk| user != user_id || chunk.date != date))
    }

    fn clear_logs_from_time_forward(
        &self,
        user_id: &str,
        date: NaiveDate,
        from: ClockTime,
    ) -> Result<usize> {
        self.check()?;
        Ok(self.remove_where(|user, chunk| {
            user != user_id
                || chunk.date < date
                || (chunk.date == date && chunk.start < from.as_hours())
        }))
    }

    fn stored_logs(&self, user_id: &str, window: DateWindow) -> Result<Vec<TaskLog>> {
        Ok(self
            .saved(user_id)
            .into_iter()
            .filter(|c| window.contains(c.date))
            .enumerate()
            .map(|(i, c)| chunk_log(format!("mem-{i}-{}", c.task_id), &c))
            .collect())
    }
}

/// A task log describing a scheduled (not yet worked) chunk.
pub fn chunk_log(id: String, chunk: &ScheduledChunk) -> TaskLog {
    TaskLog {
        id,
        task_id: chunk.task_id.clone(),
        date: chunk.date,
        scheduled_start_time: Some(chunk.start_time()),
        scheduled_duration: Some(chunk.duration),
        actual_start_time: None,
        actual_duration: None,
        estimated_hours: None,
        status: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Priority;
    use std::io::Write;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn chunk(date: NaiveDate, start: f64) -> ScheduledChunk {
        ScheduledChunk {
            task_id: "t1".into(),
            title: "Task".into(),
            priority: Priority::Medium,
            date,
            start,
            duration: 1.0,
        }
    }

    #[test]
    fn window_filters_dated_records() {
        let inputs = PlanInputs {
            meetings: vec![Meeting {
                id: "m".into(),
                title: "Old".into(),
                category_id: None,
                date: monday() - chrono::Duration::days(30),
                start_time: ClockTime::from_hm(9, 0).unwrap(),
                duration_hours: 1.0,
            }],
            tasks: vec![Task::new("t", "T", 1.0)],
            ..PlanInputs::default()
        };
        let provider = MemoryProvider::new(inputs);
        let loaded = provider
            .load("u1", DateWindow::new(monday(), monday() + chrono::Duration::days(6)))
            .unwrap();
        assert!(loaded.meetings.is_empty());
        assert_eq!(loaded.tasks.len(), 1);
    }

    #[test]
    fn memory_store_clears_forward_only() {
        let store = MemoryLogStore::new();
        let tuesday = monday().succ_opt().unwrap();
        store
            .save_task_chunks(&[chunk(monday(), 9.0), chunk(monday(), 14.0), chunk(tuesday, 9.0)], "u1")
            .unwrap();
        store.save_task_chunks(&[chunk(tuesday, 9.0)], "u2").unwrap();

        let removed = store
            .clear_logs_from_time_forward("u1", monday(), ClockTime::from_hm(12, 0).unwrap())
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.saved("u1").len(), 1);
        assert_eq!(store.saved("u2").len(), 1);
        assert_eq!(store.clear_logs_for_date("u1", monday()).unwrap(), 1);
    }

    #[test]
    fn preview_hides_cleared_logs_without_writing() {
        let store = MemoryLogStore::new();
        let tuesday = monday().succ_opt().unwrap();
        store
            .save_task_chunks(&[chunk(monday(), 9.0), chunk(monday(), 14.0), chunk(tuesday, 9.0)], "u1")
            .unwrap();
        let window = DateWindow::new(monday(), tuesday);

        let preview = PreviewLogs::new(&store);
        assert_eq!(preview.stored_logs("u1", window).unwrap().len(), 3);
        preview
            .clear_logs_from_time_forward("u1", monday(), ClockTime::from_hm(12, 0).unwrap())
            .unwrap();
        preview.save_task_chunks(&[chunk(tuesday, 15.0)], "u1").unwrap();

        let visible = preview.stored_logs("u1", window).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].scheduled_start_time, ClockTime::from_hm(9, 0));
        assert_eq!(visible[0].date, monday());
        assert_eq!(store.saved("u1").len(), 3);
    }

    #[test]
    fn snapshot_reads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"tasks": [{{"id": "t1", "title": "Draft", "estimated_hours": 2, "priority": "high"}}]}}"#
        )
        .unwrap();

        let provider = SnapshotProvider::new(file.path());
        let inputs = provider
            .load("u1", DateWindow::new(monday(), monday()))
            .unwrap();
        assert_eq!(inputs.tasks[0].priority, Priority::High);
        assert!(inputs.habits.is_empty());
    }

    #[test]
    fn missing_snapshot_is_a_provider_error() {
        let provider = SnapshotProvider::new("/nonexistent/dayforge.json");
        let err = provider.read().unwrap_err();
        assert!(matches!(err, CoreError::Provider { .. }));
    }

    #[test]
    fn merge_skips_known_ids() {
        let mut inputs = PlanInputs::default();
        let log = chunk_log("l1".into(), &chunk(monday(), 9.0));
        inputs.merge_logs(vec![log.clone(), log]);
        assert_eq!(inputs.task_logs.len(), 1);
    }
}
