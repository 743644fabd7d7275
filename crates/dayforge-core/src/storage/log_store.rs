//! SQLite-backed task log store.
//!
//! Holds the chunks the engine scheduled for today plus any actual work
//! recorded against them. Scheduled rows without recorded work are the only
//! rows the engine ever clears.

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{data_dir, migrations};
use crate::error::{DatabaseError, Result};
use crate::provider::{DateWindow, LogPersistence};
use crate::schedule::{TaskLog, TaskLogStatus};
use crate::scheduler::ScheduledChunk;
use crate::time::ClockTime;

/// One row of the `task_logs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLog {
    pub id: String,
    pub user_id: String,
    pub task_id: String,
    pub title: String,
    pub date: NaiveDate,
    pub scheduled_start: Option<ClockTime>,
    pub scheduled_duration: Option<f64>,
    pub actual_start: Option<ClockTime>,
    pub actual_duration: Option<f64>,
    pub status: TaskLogStatus,
    pub created_at: String,
}

impl StoredLog {
    pub fn to_task_log(&self) -> TaskLog {
        TaskLog {
            id: self.id.clone(),
            task_id: self.task_id.clone(),
            date: self.date,
            scheduled_start_time: self.scheduled_start,
            scheduled_duration: self.scheduled_duration,
            actual_start_time: self.actual_start,
            actual_duration: self.actual_duration,
            estimated_hours: None,
            status: self.status,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let date: String = row.get("date")?;
        let status: String = row.get("status")?;
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            task_id: row.get("task_id")?,
            title: row.get("title")?,
            date: date.parse().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
            })?,
            scheduled_start: parse_time(row.get("scheduled_start")?),
            scheduled_duration: row.get("scheduled_duration")?,
            actual_start: parse_time(row.get("actual_start")?),
            actual_duration: row.get("actual_duration")?,
            status: status_from_str(&status),
            created_at: row.get("created_at")?,
        })
    }
}

fn parse_time(value: Option<String>) -> Option<ClockTime> {
    value.and_then(|v| match v.parse() {
        Ok(time) => Some(time),
        Err(e) => {
            tracing::warn!(value = %v, error = %e, "ignoring malformed stored time");
            None
        }
    })
}

fn status_str(status: TaskLogStatus) -> &'static str {
    match status {
        TaskLogStatus::Scheduled => "scheduled",
        TaskLogStatus::InProgress => "in_progress",
        TaskLogStatus::Completed => "completed",
    }
}

fn status_from_str(status: &str) -> TaskLogStatus {
    match status {
        "in_progress" => TaskLogStatus::InProgress,
        "completed" => TaskLogStatus::Completed,
        _ => TaskLogStatus::Scheduled,
    }
}

const SELECT_COLUMNS: &str = "SELECT id, user_id, task_id, title, date, scheduled_start,
        scheduled_duration, actual_start, actual_duration, status, created_at
     FROM task_logs";

/// SQLite store for task logs.
pub struct LogStore {
    conn: Connection,
}

impl LogStore {
    /// Open the store at `~/.config/dayforge/logs.db`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_path(&data_dir()?.join("logs.db"))
    }

    /// Open the store at `path`, creating and migrating it as needed.
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory store.
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Logs of `user_id`, optionally limited to a date window, oldest first.
    pub fn list_logs(&self, user_id: &str, window: Option<DateWindow>) -> Result<Vec<StoredLog>> {
        let (start, end) = match window {
            Some(w) => (w.start.to_string(), w.end.to_string()),
            None => ("0000-01-01".to_string(), "9999-12-31".to_string()),
        };
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date, scheduled_start, created_at"
        ))?;
        let rows = stmt.query_map(params![user_id, start, end], StoredLog::from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get(&self, id: &str) -> Result<Option<StoredLog>> {
        let log = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                StoredLog::from_row,
            )
            .optional()?;
        Ok(log)
    }

    /// Record actual work against a log and mark it completed.
    ///
    /// Returns `false` when no log has that id.
    pub fn record_actual(
        &self,
        id: &str,
        start: Option<ClockTime>,
        duration_hours: f64,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE task_logs
             SET actual_start = COALESCE(?2, scheduled_start), actual_duration = ?3, status = ?4
             WHERE id = ?1",
            params![
                id,
                start.map(|s| s.to_string()),
                duration_hours,
                status_str(TaskLogStatus::Completed)
            ],
        )?;
        Ok(changed > 0)
    }
}

impl LogPersistence for LogStore {
    fn save_task_chunks(&self, chunks: &[ScheduledChunk], user_id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let created_at = Utc::now().to_rfc3339();
        for chunk in chunks {
            tx.execute(
                "INSERT INTO task_logs
                    (id, user_id, task_id, title, date, scheduled_start, scheduled_duration, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    user_id,
                    chunk.task_id,
                    chunk.title,
                    chunk.date.to_string(),
                    chunk.start_time().to_string(),
                    chunk.duration,
                    status_str(TaskLogStatus::Scheduled),
                    created_at,
                ],
            )?;
        }
        tx.commit()?;
        tracing::debug!(user_id, count = chunks.len(), "saved task chunks");
        Ok(())
    }

    fn clear_logs_for_date(&self, user_id: &str, date: NaiveDate) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM task_logs
             WHERE user_id = ?1 AND date = ?2 AND status = 'scheduled' AND actual_start IS NULL",
            params![user_id, date.to_string()],
        )?;
        Ok(removed)
    }

    fn clear_logs_from_time_forward(
        &self,
        user_id: &str,
        date: NaiveDate,
        from: ClockTime,
    ) -> Result<usize> {
        // Stored times are zero-padded HH:MM, so text order is time order.
        let removed = self.conn.execute(
            "DELETE FROM task_logs
             WHERE user_id = ?1
               AND status = 'scheduled' AND actual_start IS NULL
               AND (date > ?2 OR (date = ?2 AND scheduled_start >= ?3))",
            params![user_id, date.to_string(), from.to_string()],
        )?;
        Ok(removed)
    }

    fn stored_logs(&self, user_id: &str, window: DateWindow) -> Result<Vec<TaskLog>> {
        Ok(self
            .list_logs(user_id, Some(window))?
            .iter()
            .map(StoredLog::to_task_log)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Priority;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn chunk(date: NaiveDate, start: f64, duration: f64) -> ScheduledChunk {
        ScheduledChunk {
            task_id: "t1".into(),
            title: "Write report".into(),
            priority: Priority::High,
            date,
            start,
            duration,
        }
    }

    #[test]
    fn save_and_list() {
        let store = LogStore::open_memory().unwrap();
        store
            .save_task_chunks(&[chunk(monday(), 13.0, 2.0), chunk(monday(), 9.5, 1.0)], "u1")
            .unwrap();

        let logs = store.list_logs("u1", None).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].scheduled_start, ClockTime::from_hm(9, 30));
        assert_eq!(logs[1].title, "Write report");
        assert_eq!(logs[1].status, TaskLogStatus::Scheduled);
        assert!(store.list_logs("u2", None).unwrap().is_empty());
    }

    #[test]
    fn clear_forward_keeps_earlier_and_worked_logs() {
        let store = LogStore::open_memory().unwrap();
        let tuesday = monday().succ_opt().unwrap();
        store
            .save_task_chunks(
                &[
                    chunk(monday(), 9.0, 1.0),
                    chunk(monday(), 14.0, 1.0),
                    chunk(monday(), 16.0, 1.0),
                    chunk(tuesday, 9.0, 1.0),
                ],
                "u1",
            )
            .unwrap();
        let worked = store
            .list_logs("u1", None)
            .unwrap()
            .into_iter()
            .find(|l| l.scheduled_start == ClockTime::from_hm(16, 0))
            .unwrap();
        assert!(store.record_actual(&worked.id, None, 0.75).unwrap());

        let removed = store
            .clear_logs_from_time_forward("u1", monday(), ClockTime::from_hm(12, 0).unwrap())
            .unwrap();
        assert_eq!(removed, 2);

        let left = store.list_logs("u1", None).unwrap();
        assert_eq!(left.len(), 2);
        assert_eq!(left[1].actual_duration, Some(0.75));
        assert_eq!(left[1].actual_start, ClockTime::from_hm(16, 0));
        assert_eq!(left[1].status, TaskLogStatus::Completed);
    }

    #[test]
    fn clear_for_date_only_touches_that_date() {
        let store = LogStore::open_memory().unwrap();
        let tuesday = monday().succ_opt().unwrap();
        store
            .save_task_chunks(&[chunk(monday(), 9.0, 1.0), chunk(tuesday, 9.0, 1.0)], "u1")
            .unwrap();
        assert_eq!(store.clear_logs_for_date("u1", monday()).unwrap(), 1);
        assert_eq!(store.list_logs("u1", None).unwrap()[0].date, tuesday);
    }

    #[test]
    fn stored_logs_feed_back_as_task_logs() {
        let store = LogStore::open_memory().unwrap();
        store.save_task_chunks(&[chunk(monday(), 10.0, 1.5)], "u1").unwrap();
        let logs = store
            .stored_logs("u1", DateWindow::new(monday(), monday()))
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].start(), ClockTime::from_hm(10, 0));
        assert_eq!(logs[0].duration_hours(), 1.5);
        assert_eq!(logs[0].worked_hours(), 0.0);
    }

    #[test]
    fn file_store_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.db");
        {
            let store = LogStore::open_path(&path).unwrap();
            store.save_task_chunks(&[chunk(monday(), 9.0, 1.0)], "u1").unwrap();
        }
        let store = LogStore::open_path(&path).unwrap();
        assert_eq!(store.list_logs("u1", None).unwrap().len(), 1);
        assert!(store.get("missing").unwrap().is_none());
    }
}
