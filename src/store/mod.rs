//! SQLite-backed reminder persistence with the free-plan gate.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::parser::Frequency;
use crate::store::models::{NewReminder, Plan, Reminder, ReminderStatus};

pub mod models;

/// Pending-reminder ceiling on the free plan.
const FREE_PLAN_LIMIT: i64 = 10;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("free plan limit of {FREE_PLAN_LIMIT} pending reminders reached")]
    FreePlanLimit,
    #[error("reminder not found")]
    NotFound,
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored value is corrupt: {0}")]
    Corrupt(String),
}

pub struct ReminderStore {
    conn: Arc<Mutex<Connection>>,
}

impl ReminderStore {
    /// Opens or creates the database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        // Migrations run synchronously before wrapping in the async mutex.
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Inserts a FREE user row if absent. Auth is stubbed, so this runs
    /// once at startup for the stand-in user.
    pub async fn ensure_user(&self, user_id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR IGNORE INTO users (id, plan) VALUES (?1, ?2)",
            params![user_id, format_plan(Plan::Free)],
        )?;
        Ok(())
    }

    pub async fn set_plan(&self, user_id: &str, plan: Plan) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE users SET plan = ?2 WHERE id = ?1",
            params![user_id, format_plan(plan)],
        )?;
        Ok(())
    }

    pub async fn create_reminder(
        &self,
        user_id: &str,
        new: NewReminder,
    ) -> Result<Reminder, StoreError> {
        let conn = self.conn.lock().await;

        let plan: Option<String> = conn
            .query_row(
                "SELECT plan FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        let plan = plan
            .as_deref()
            .map(parse_plan)
            .transpose()?
            .unwrap_or(Plan::Free);

        // Count and insert under the same lock so the gate cannot race.
        if plan == Plan::Free {
            let pending: i64 = conn.query_row(
                "SELECT COUNT(*) FROM reminders WHERE user_id = ?1 AND status = 'PENDING'",
                params![user_id],
                |row| row.get(0),
            )?;
            if pending >= FREE_PLAN_LIMIT {
                return Err(StoreError::FreePlanLimit);
            }
        }

        let reminder = Reminder {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            content: new.content,
            raw_text: new.raw_text,
            is_recurring: new.is_recurring,
            frequency: new.frequency,
            days_of_week: new.days_of_week,
            next_run_at: new.next_run_at,
            status: ReminderStatus::Pending,
            created_at: Utc::now().fixed_offset(),
        };

        let days_json = reminder
            .days_of_week
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;

        conn.execute(
            "INSERT INTO reminders (id, user_id, content, raw_text, is_recurring, frequency, \
             days_of_week, next_run_at, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                reminder.id,
                reminder.user_id,
                reminder.content,
                reminder.raw_text,
                reminder.is_recurring,
                reminder.frequency.map(format_frequency),
                days_json,
                reminder.next_run_at.to_rfc3339(),
                format_status(reminder.status),
                reminder.created_at.to_rfc3339(),
            ],
        )?;

        Ok(reminder)
    }

    /// Pending reminders for a user, soonest first.
    pub async fn pending_reminders(&self, user_id: &str) -> Result<Vec<Reminder>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, content, raw_text, is_recurring, frequency, days_of_week, \
             next_run_at, status, created_at \
             FROM reminders WHERE user_id = ?1 AND status = 'PENDING' \
             ORDER BY next_run_at ASC",
        )?;
        let mut rows = stmt.query(params![user_id])?;

        let mut reminders = Vec::new();
        while let Some(row) = rows.next()? {
            reminders.push(row_to_reminder(row)?);
        }
        Ok(reminders)
    }

    /// Deletes a reminder scoped to its owner.
    pub async fn delete_reminder(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute(
            "DELETE FROM reminders WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        // The bundled SQLite is compiled with SQLITE_DEFAULT_FOREIGN_KEYS=1;
        // restore the stock default so a reminder row can exist before its
        // users row (unknown users fall back to the free plan).
        "PRAGMA foreign_keys=OFF;
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            plan TEXT NOT NULL DEFAULT 'FREE'
        );
        CREATE TABLE IF NOT EXISTS reminders (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            content TEXT NOT NULL,
            raw_text TEXT NOT NULL,
            is_recurring INTEGER NOT NULL DEFAULT 0,
            frequency TEXT,
            days_of_week TEXT,
            next_run_at TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING',
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_reminders_user_status
            ON reminders(user_id, status);",
    )
}

fn row_to_reminder(row: &Row) -> Result<Reminder, StoreError> {
    let frequency: Option<String> = row.get("frequency")?;
    let days_of_week: Option<String> = row.get("days_of_week")?;
    let next_run_at: String = row.get("next_run_at")?;
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;

    Ok(Reminder {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        content: row.get("content")?,
        raw_text: row.get("raw_text")?,
        is_recurring: row.get("is_recurring")?,
        frequency: frequency.as_deref().map(parse_frequency).transpose()?,
        days_of_week: days_of_week
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|err| StoreError::Corrupt(err.to_string()))?,
        next_run_at: parse_datetime(&next_run_at)?,
        status: parse_status(&status)?,
        created_at: parse_datetime(&created_at)?,
    })
}

fn parse_datetime(value: &str) -> Result<DateTime<FixedOffset>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map_err(|err| StoreError::Corrupt(format!("bad datetime {value:?}: {err}")))
}

fn format_plan(plan: Plan) -> &'static str {
    match plan {
        Plan::Free => "FREE",
        Plan::Pro => "PRO",
    }
}

fn parse_plan(value: &str) -> Result<Plan, StoreError> {
    match value {
        "FREE" => Ok(Plan::Free),
        "PRO" => Ok(Plan::Pro),
        other => Err(StoreError::Corrupt(format!("unknown plan {other:?}"))),
    }
}

fn format_frequency(frequency: Frequency) -> &'static str {
    match frequency {
        Frequency::Daily => "DAILY",
        Frequency::Weekly => "WEEKLY",
        Frequency::Monthly => "MONTHLY",
    }
}

fn parse_frequency(value: &str) -> Result<Frequency, StoreError> {
    match value {
        "DAILY" => Ok(Frequency::Daily),
        "WEEKLY" => Ok(Frequency::Weekly),
        "MONTHLY" => Ok(Frequency::Monthly),
        other => Err(StoreError::Corrupt(format!("unknown frequency {other:?}"))),
    }
}

fn format_status(status: ReminderStatus) -> &'static str {
    match status {
        ReminderStatus::Pending => "PENDING",
        ReminderStatus::Done => "DONE",
    }
}

fn parse_status(value: &str) -> Result<ReminderStatus, StoreError> {
    match value {
        "PENDING" => Ok(ReminderStatus::Pending),
        "DONE" => Ok(ReminderStatus::Done),
        other => Err(StoreError::Corrupt(format!("unknown status {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone;

    use super::*;

    const USER: &str = "temp-user-id";

    fn at(day: u32, hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::west_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, day, hour, 0, 0)
            .unwrap()
    }

    fn gym_reminder(day: u32) -> NewReminder {
        NewReminder {
            content: "academia".to_string(),
            raw_text: "academia toda segunda às 7h".to_string(),
            is_recurring: true,
            frequency: Some(Frequency::Weekly),
            days_of_week: Some(BTreeSet::from([1])),
            next_run_at: at(day, 7),
        }
    }

    async fn store_with_user() -> ReminderStore {
        let store = ReminderStore::open_in_memory().unwrap();
        store.ensure_user(USER).await.unwrap();
        store
    }

    #[tokio::test]
    async fn round_trips_a_reminder() {
        let store = store_with_user().await;
        let created = store.create_reminder(USER, gym_reminder(13)).await.unwrap();

        let reminders = store.pending_reminders(USER).await.unwrap();
        assert_eq!(reminders.len(), 1);
        let stored = &reminders[0];
        assert_eq!(stored.id, created.id);
        assert_eq!(stored.content, "academia");
        assert_eq!(stored.raw_text, "academia toda segunda às 7h");
        assert!(stored.is_recurring);
        assert_eq!(stored.frequency, Some(Frequency::Weekly));
        assert_eq!(stored.days_of_week, Some(BTreeSet::from([1])));
        assert_eq!(stored.next_run_at, at(13, 7));
        assert_eq!(stored.status, ReminderStatus::Pending);
    }

    #[tokio::test]
    async fn lists_soonest_first() {
        let store = store_with_user().await;
        for day in [20, 10, 15] {
            store.create_reminder(USER, gym_reminder(day)).await.unwrap();
        }

        let reminders = store.pending_reminders(USER).await.unwrap();
        let days: Vec<u32> = reminders
            .iter()
            .map(|r| chrono::Datelike::day(&r.next_run_at))
            .collect();
        assert_eq!(days, vec![10, 15, 20]);
    }

    #[tokio::test]
    async fn free_plan_caps_at_ten_pending() {
        let store = store_with_user().await;
        for _ in 0..10 {
            store.create_reminder(USER, gym_reminder(13)).await.unwrap();
        }

        let err = store
            .create_reminder(USER, gym_reminder(13))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::FreePlanLimit));

        // Deleting one frees a slot.
        let id = store.pending_reminders(USER).await.unwrap()[0].id.clone();
        store.delete_reminder(USER, &id).await.unwrap();
        store.create_reminder(USER, gym_reminder(13)).await.unwrap();
    }

    #[tokio::test]
    async fn pro_plan_is_uncapped() {
        let store = store_with_user().await;
        store.set_plan(USER, Plan::Pro).await.unwrap();
        for _ in 0..11 {
            store.create_reminder(USER, gym_reminder(13)).await.unwrap();
        }
        assert_eq!(store.pending_reminders(USER).await.unwrap().len(), 11);
    }

    #[tokio::test]
    async fn delete_is_owner_scoped() {
        let store = store_with_user().await;
        store.ensure_user("someone-else").await.unwrap();
        let created = store.create_reminder(USER, gym_reminder(13)).await.unwrap();

        let err = store
            .delete_reminder("someone-else", &created.id)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
        store.delete_reminder(USER, &created.id).await.unwrap();
        assert!(store.pending_reminders(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lembretes.db");
        let store = ReminderStore::open(&path).unwrap();
        store.ensure_user(USER).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn unknown_user_defaults_to_free_plan() {
        let store = ReminderStore::open_in_memory().unwrap();
        // No users row at all: the gate still applies.
        for _ in 0..10 {
            store
                .create_reminder("ghost", gym_reminder(13))
                .await
                .unwrap();
        }
        let err = store
            .create_reminder("ghost", gym_reminder(13))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::FreePlanLimit));
    }
}
