//! Read-only view of the CRUD-owned domain state.
//!
//! The engine consumes transactions, food diary, goals, calendar events,
//! custom reminders, and workout schedules strictly as snapshots; the one
//! write contract is flagging a calendar event after its same-day reminder
//! went out. Producers never touch the store — the cycle fetches one
//! [`DomainSnapshot`] per subject and hands it to them.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use rusqlite::Connection;

use rotina_core::clock::TimeContext;
use rotina_core::error::{Result, RotinaError};
use rotina_core::types::{
    CalendarEvent, CustomReminder, DailyGoals, DiaryEntry, DomainSnapshot, Subject, WorkoutSlot,
};

/// Read contracts the producers depend on, plus the single write.
#[async_trait]
pub trait DomainStore: Send + Sync {
    /// Subjects eligible for notifications: active and addressable.
    async fn eligible_subjects(&self) -> Result<Vec<Subject>>;

    /// Everything the producers may look at for one subject, as of `ctx`.
    async fn snapshot(&self, subject: &Subject, ctx: &TimeContext) -> Result<DomainSnapshot>;

    /// Flag an event so its same-day reminder never re-fires even if the
    /// ledger is degraded.
    async fn mark_event_dispatched(&self, event_id: &str) -> Result<()>;
}

/// SQLite-backed domain store.
///
/// In production the tables belong to the CRUD application and this
/// adapter only reads them; `open` still creates them when absent so the
/// daemon can run against an empty database.
pub struct SqliteDomain {
    conn: Mutex<Connection>,
    /// How many days of events one snapshot covers.
    horizon_days: i64,
}

impl SqliteDomain {
    pub fn open(path: &Path, horizon_days: i64) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| RotinaError::Store(format!("Domain open: {e}")))?;
        Self::from_connection(conn, horizon_days)
    }

    pub fn from_connection(conn: Connection, horizon_days: i64) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS subjects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                phone TEXT NOT NULL DEFAULT '',
                active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject_id TEXT NOT NULL,
                amount REAL NOT NULL,            -- income > 0, expense < 0
                category TEXT NOT NULL DEFAULT '',
                occurred_on TEXT NOT NULL        -- YYYY-MM-DD
            );

            CREATE TABLE IF NOT EXISTS diary_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject_id TEXT NOT NULL,
                eaten_on TEXT NOT NULL,          -- YYYY-MM-DD
                meal TEXT,                       -- 'Café da manhã' | 'Almoço' | 'Jantar'
                description TEXT NOT NULL DEFAULT '',
                calories REAL NOT NULL DEFAULT 0,
                protein_g REAL NOT NULL DEFAULT 0,
                water_ml REAL NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS goals (
                subject_id TEXT PRIMARY KEY,
                calories REAL NOT NULL DEFAULT 0,
                protein_g REAL NOT NULL DEFAULT 0,
                water_ml REAL NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                subject_id TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                starts_at TEXT NOT NULL,         -- RFC3339 UTC
                dispatched INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS reminders (
                id TEXT PRIMARY KEY,
                subject_id TEXT NOT NULL,
                label TEXT NOT NULL DEFAULT '',
                remind_at TEXT NOT NULL,         -- HH:MM
                active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS workout_slots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject_id TEXT NOT NULL,
                weekday INTEGER NOT NULL,        -- 0 = Monday
                remind_at TEXT NOT NULL,         -- HH:MM
                label TEXT NOT NULL DEFAULT ''
            );",
        )
        .map_err(|e| RotinaError::Store(format!("Domain migrate: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
            horizon_days,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RotinaError::Store(format!("Domain lock poisoned: {e}")))
    }

    fn month_balance(
        conn: &Connection,
        subject_id: &str,
        month_start: NaiveDate,
        today: NaiveDate,
    ) -> Result<Option<f64>> {
        conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM transactions
             WHERE subject_id = ?1 AND occurred_on >= ?2 AND occurred_on <= ?3",
            rusqlite::params![subject_id, month_start.to_string(), today.to_string()],
            |row| {
                let count: i64 = row.get(0)?;
                let sum: f64 = row.get(1)?;
                Ok(if count == 0 { None } else { Some(sum) })
            },
        )
        .map_err(|e| RotinaError::Store(format!("Balance query: {e}")))
    }

    fn month_expenses(
        conn: &Connection,
        subject_id: &str,
        month_start: NaiveDate,
        today: NaiveDate,
    ) -> Result<Vec<(String, f64)>> {
        let mut stmt = conn
            .prepare(
                "SELECT category, SUM(-amount) AS total FROM transactions
                 WHERE subject_id = ?1 AND amount < 0
                   AND occurred_on >= ?2 AND occurred_on <= ?3
                 GROUP BY category ORDER BY total DESC",
            )
            .map_err(|e| RotinaError::Store(format!("Expense query: {e}")))?;
        let rows = stmt
            .query_map(
                rusqlite::params![subject_id, month_start.to_string(), today.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
            )
            .map_err(|e| RotinaError::Store(format!("Expense query: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn diary_week(conn: &Connection, subject_id: &str, today: NaiveDate) -> Result<Vec<DiaryEntry>> {
        let week_ago = today - Duration::days(6);
        let mut stmt = conn
            .prepare(
                "SELECT eaten_on, meal, description, calories, protein_g, water_ml
                 FROM diary_entries
                 WHERE subject_id = ?1 AND eaten_on >= ?2 AND eaten_on <= ?3
                 ORDER BY eaten_on",
            )
            .map_err(|e| RotinaError::Store(format!("Diary query: {e}")))?;
        let rows = stmt
            .query_map(
                rusqlite::params![subject_id, week_ago.to_string(), today.to_string()],
                |row| {
                    let date: String = row.get(0)?;
                    Ok(DiaryEntry {
                        date: date.parse().unwrap_or(today),
                        meal: row.get(1)?,
                        description: row.get(2)?,
                        calories: row.get(3)?,
                        protein_g: row.get(4)?,
                        water_ml: row.get(5)?,
                    })
                },
            )
            .map_err(|e| RotinaError::Store(format!("Diary query: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn goals(conn: &Connection, subject_id: &str) -> Result<Option<DailyGoals>> {
        let row = conn.query_row(
            "SELECT calories, protein_g, water_ml FROM goals WHERE subject_id = ?1",
            [subject_id],
            |row| {
                Ok(DailyGoals {
                    calories: row.get(0)?,
                    protein_g: row.get(1)?,
                    water_ml: row.get(2)?,
                })
            },
        );
        match row {
            Ok(goals) => Ok(Some(goals)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(RotinaError::Store(format!("Goals query: {e}"))),
        }
    }

    fn upcoming_events(
        conn: &Connection,
        subject_id: &str,
        day_start: DateTime<Utc>,
        horizon_days: i64,
    ) -> Result<Vec<CalendarEvent>> {
        let until = day_start + Duration::days(horizon_days);
        let mut stmt = conn
            .prepare(
                "SELECT id, title, starts_at, dispatched FROM events
                 WHERE subject_id = ?1 AND starts_at >= ?2 AND starts_at < ?3
                 ORDER BY starts_at",
            )
            .map_err(|e| RotinaError::Store(format!("Events query: {e}")))?;
        let rows = stmt
            .query_map(
                rusqlite::params![subject_id, day_start.to_rfc3339(), until.to_rfc3339()],
                |row| {
                    let starts_at: String = row.get(2)?;
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        starts_at,
                        row.get::<_, i64>(3)? != 0,
                    ))
                },
            )
            .map_err(|e| RotinaError::Store(format!("Events query: {e}")))?;

        Ok(rows
            .filter_map(|r| r.ok())
            .filter_map(|(id, title, starts_at, dispatched)| {
                match DateTime::parse_from_rfc3339(&starts_at) {
                    Ok(dt) => Some(CalendarEvent {
                        id,
                        title,
                        starts_at: dt.with_timezone(&Utc),
                        dispatched,
                    }),
                    Err(e) => {
                        tracing::warn!("Event {id}: unparseable starts_at '{starts_at}': {e}");
                        None
                    }
                }
            })
            .collect())
    }

    fn active_reminders(conn: &Connection, subject_id: &str) -> Result<Vec<CustomReminder>> {
        let mut stmt = conn
            .prepare("SELECT id, label, remind_at FROM reminders WHERE subject_id = ?1 AND active = 1")
            .map_err(|e| RotinaError::Store(format!("Reminders query: {e}")))?;
        let rows = stmt
            .query_map([subject_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| RotinaError::Store(format!("Reminders query: {e}")))?;
        Ok(rows
            .filter_map(|r| r.ok())
            .filter_map(|(id, label, remind_at)| {
                parse_time(&remind_at).map(|time| CustomReminder { id, label, time })
            })
            .collect())
    }

    fn workouts_for(conn: &Connection, subject_id: &str, weekday: Weekday) -> Result<Vec<WorkoutSlot>> {
        let mut stmt = conn
            .prepare("SELECT remind_at, label FROM workout_slots WHERE subject_id = ?1 AND weekday = ?2")
            .map_err(|e| RotinaError::Store(format!("Workout query: {e}")))?;
        let rows = stmt
            .query_map(
                rusqlite::params![subject_id, weekday.num_days_from_monday() as i64],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .map_err(|e| RotinaError::Store(format!("Workout query: {e}")))?;
        Ok(rows
            .filter_map(|r| r.ok())
            .filter_map(|(remind_at, label)| {
                parse_time(&remind_at).map(|time| WorkoutSlot { weekday, time, label })
            })
            .collect())
    }
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

#[async_trait]
impl DomainStore for SqliteDomain {
    async fn eligible_subjects(&self) -> Result<Vec<Subject>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, name, phone, active FROM subjects WHERE active = 1 AND phone != '' ORDER BY id")
            .map_err(|e| RotinaError::Store(format!("Subjects query: {e}")))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Subject {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    phone: row.get(2)?,
                    active: row.get::<_, i64>(3)? != 0,
                })
            })
            .map_err(|e| RotinaError::Store(format!("Subjects query: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn snapshot(&self, subject: &Subject, ctx: &TimeContext) -> Result<DomainSnapshot> {
        let conn = self.lock()?;
        let month_start = ctx.month_start();
        Ok(DomainSnapshot {
            month_balance: Self::month_balance(&conn, &subject.id, month_start, ctx.date)?,
            month_expenses: Self::month_expenses(&conn, &subject.id, month_start, ctx.date)?,
            diary: Self::diary_week(&conn, &subject.id, ctx.date)?,
            goals: Self::goals(&conn, &subject.id)?,
            events: Self::upcoming_events(&conn, &subject.id, ctx.day_start, self.horizon_days)?,
            reminders: Self::active_reminders(&conn, &subject.id)?,
            workouts: Self::workouts_for(&conn, &subject.id, ctx.date.weekday())?,
        })
    }

    async fn mark_event_dispatched(&self, event_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("UPDATE events SET dispatched = 1 WHERE id = ?1", [event_id])
            .map_err(|e| RotinaError::Store(format!("Event update: {e}")))?;
        Ok(())
    }
}
