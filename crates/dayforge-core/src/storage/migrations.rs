//! Database schema migrations for the log store.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: task log table.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS task_logs (
            id                  TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL,
            task_id             TEXT NOT NULL,
            date                TEXT NOT NULL,
            scheduled_start     TEXT,
            scheduled_duration  REAL,
            actual_start        TEXT,
            actual_duration     REAL,
            status              TEXT NOT NULL DEFAULT 'scheduled',
            created_at          TEXT NOT NULL
        );",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: chunk titles and a per-user date index.
///
/// Backfills `title` with the task id for rows written before titles were
/// stored.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "ALTER TABLE task_logs ADD COLUMN title TEXT NOT NULL DEFAULT '';
         UPDATE task_logs SET title = task_id WHERE title = '';
         CREATE INDEX IF NOT EXISTS idx_task_logs_user_date ON task_logs(user_id, date);",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_from_scratch() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);

        conn.execute(
            "INSERT INTO task_logs (id, user_id, task_id, date, status, created_at, title)
             VALUES ('l1', 'u1', 't1', '2026-10-19', 'scheduled', '2026-10-19T08:00:00Z', 'Draft')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_migrate_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn test_incremental_migration_backfills_titles() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        conn.execute(
            "INSERT INTO task_logs (id, user_id, task_id, date, status, created_at)
             VALUES ('l1', 'u1', 'task-7', '2026-10-19', 'scheduled', '2026-10-19T08:00:00Z')",
            [],
        )
        .unwrap();

        migrate(&conn).unwrap();

        let title: String = conn
            .query_row("SELECT title FROM task_logs WHERE id = 'l1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(title, "task-7");
        assert_eq!(get_schema_version(&conn), 2);
    }
}
