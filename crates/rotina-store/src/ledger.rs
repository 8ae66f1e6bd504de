//! Idempotency ledger — the durable record of every send.
//!
//! The ledger is the one piece of state that makes the engine exactly-once
//! per dedup key: a candidate is only dispatched when no success record
//! exists for its (subject, kind, dedup_key), and a concurrent insert of
//! the same key is treated as "already recorded", never as a failure.
//!
//! Deployments predating the engine carry the send log under a legacy
//! table with different column names. Instead of probing on every call,
//! the available columns are inspected once at startup and resolved into a
//! [`LedgerSchema`]; if neither the primary nor the legacy table exposes
//! the minimum columns the ledger degrades to fail-open (never dedup,
//! never count) with a warning rather than taking the whole cycle down.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use rotina_core::error::{Result, RotinaError};
use rotina_core::types::{AlertKind, AlertRecord, RecordStatus};

/// Candidate column names per logical field, in preference order.
const SUBJECT_COLS: &[&str] = &["subject_id", "user_id", "usuario_id", "phone"];
const KIND_COLS: &[&str] = &["alert_kind", "alert_type", "kind", "type", "tipo"];
const KEY_COLS: &[&str] = &["dedup_key", "alert_key", "date_key", "chave"];
const STATUS_COLS: &[&str] = &["status", "situacao"];
const DETAIL_COLS: &[&str] = &["detail", "error_detail", "message", "mensagem"];
const SENT_AT_COLS: &[&str] = &["sent_at", "created_at", "timestamp", "data_envio"];

/// How the ledger's logical fields map onto a concrete table.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    pub table: String,
    pub subject: String,
    pub kind: String,
    pub key: String,
    pub status: Option<String>,
    pub detail: Option<String>,
    pub sent_at: Option<String>,
}

/// Resolved once at startup; never re-probed per call.
#[derive(Debug, Clone)]
pub enum LedgerSchema {
    Resolved(ColumnMap),
    /// Neither table qualified — dedup fails open.
    Disabled,
}

/// Outcome of a `record` attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// A row for this key already existed (concurrent writer, or replay).
    AlreadyRecorded,
    /// Degraded mode, or an audit entry the table cannot represent.
    Skipped,
}

pub struct Ledger {
    conn: Mutex<Connection>,
    schema: LedgerSchema,
}

impl Ledger {
    /// Open the ledger database and resolve the table schema.
    pub fn open(path: &Path, primary: &str, fallback: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| RotinaError::Store(format!("Ledger open: {e}")))?;
        Self::from_connection(conn, primary, fallback)
    }

    /// Resolve against an existing connection (tests, shared files).
    ///
    /// On a fresh database (neither table present) the canonical primary
    /// table is created, including the partial unique index that turns a
    /// concurrent duplicate insert into a constraint violation instead of
    /// a double send.
    pub fn from_connection(conn: Connection, primary: &str, fallback: &str) -> Result<Self> {
        if !table_exists(&conn, primary)? && !table_exists(&conn, fallback)? {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {primary} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    subject_id TEXT NOT NULL,
                    alert_kind TEXT NOT NULL,
                    dedup_key TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'success',
                    detail TEXT,
                    sent_at TEXT NOT NULL
                );
                CREATE UNIQUE INDEX IF NOT EXISTS {primary}_once
                    ON {primary}(subject_id, alert_kind, dedup_key)
                    WHERE status = 'success';"
            ))
            .map_err(|e| RotinaError::Store(format!("Ledger migrate: {e}")))?;
        }

        let schema = resolve_schema(&conn, primary, fallback);
        Ok(Self {
            conn: Mutex::new(conn),
            schema,
        })
    }

    pub fn schema(&self) -> &LedgerSchema {
        &self.schema
    }

    /// True when a success record exists for this occurrence.
    /// Degraded mode always answers false (fail open).
    pub fn was_sent(&self, subject_id: &str, kind: AlertKind, dedup_key: &str) -> Result<bool> {
        let map = match &self.schema {
            LedgerSchema::Resolved(m) => m,
            LedgerSchema::Disabled => return Ok(false),
        };
        let conn = self.lock()?;
        let mut sql = format!(
            "SELECT 1 FROM {} WHERE {} = ?1 AND {} = ?2 AND {} = ?3",
            map.table, map.subject, map.kind, map.key
        );
        if let Some(status) = &map.status {
            sql.push_str(&format!(" AND {status} = 'success'"));
        }
        sql.push_str(" LIMIT 1");

        let found = conn
            .query_row(&sql, rusqlite::params![subject_id, kind.as_str(), dedup_key], |_| Ok(()))
            .map(|_| true)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(false),
                other => Err(other),
            })
            .map_err(|e| RotinaError::Store(format!("Ledger read: {e}")))?;
        Ok(found)
    }

    /// Persist a send record. A unique-constraint violation means another
    /// writer got there first and is reported as `AlreadyRecorded` — the
    /// caller must not count the send again.
    ///
    /// Error audits are only written when the table can distinguish them
    /// (a status column exists); otherwise they are skipped so a failed
    /// attempt never masquerades as a successful send.
    pub fn record(
        &self,
        subject_id: &str,
        kind: AlertKind,
        dedup_key: &str,
        status: RecordStatus,
        detail: Option<&str>,
        sent_at: DateTime<Utc>,
    ) -> Result<RecordOutcome> {
        let map = match &self.schema {
            LedgerSchema::Resolved(m) => m,
            LedgerSchema::Disabled => return Ok(RecordOutcome::Skipped),
        };
        if map.status.is_none() && status == RecordStatus::Error {
            return Ok(RecordOutcome::Skipped);
        }

        let mut cols = vec![map.subject.as_str(), map.kind.as_str(), map.key.as_str()];
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(subject_id.to_string()),
            Box::new(kind.as_str()),
            Box::new(dedup_key.to_string()),
        ];
        if let Some(c) = &map.status {
            cols.push(c.as_str());
            values.push(Box::new(status.as_str()));
        }
        if let Some(c) = &map.detail {
            cols.push(c.as_str());
            values.push(Box::new(detail.map(|d| d.to_string())));
        }
        if let Some(c) = &map.sent_at {
            cols.push(c.as_str());
            values.push(Box::new(sent_at.to_rfc3339()));
        }

        let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            map.table,
            cols.join(", "),
            placeholders.join(", ")
        );

        let conn = self.lock()?;
        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        match conn.execute(&sql, params.as_slice()) {
            Ok(_) => Ok(RecordOutcome::Recorded),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Ok(RecordOutcome::AlreadyRecorded)
            }
            Err(e) => Err(RotinaError::Store(format!("Ledger write: {e}"))),
        }
    }

    /// Successful sends for a subject inside `[day_start, day_end)` —
    /// the daily quota seed. Without a timestamp column (or in degraded
    /// mode) the count is 0: the cap fails open like dedup does.
    pub fn success_count(
        &self,
        subject_id: &str,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<u32> {
        let map = match &self.schema {
            LedgerSchema::Resolved(m) => m,
            LedgerSchema::Disabled => return Ok(0),
        };
        let sent_at = match &map.sent_at {
            Some(c) => c,
            None => {
                tracing::debug!("Ledger table {} has no timestamp column; daily cap inactive", map.table);
                return Ok(0);
            }
        };

        let mut sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1 AND {} >= ?2 AND {} < ?3",
            map.table, map.subject, sent_at, sent_at
        );
        if let Some(status) = &map.status {
            sql.push_str(&format!(" AND {status} = 'success'"));
        }

        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                &sql,
                rusqlite::params![subject_id, day_start.to_rfc3339(), day_end.to_rfc3339()],
                |row| row.get(0),
            )
            .map_err(|e| RotinaError::Store(format!("Ledger count: {e}")))?;
        Ok(count.max(0) as u32)
    }

    /// Most recent record for an occurrence, when the schema can express it.
    pub fn last_record(
        &self,
        subject_id: &str,
        kind: AlertKind,
        dedup_key: &str,
    ) -> Result<Option<AlertRecord>> {
        let map = match &self.schema {
            LedgerSchema::Resolved(m) => m,
            LedgerSchema::Disabled => return Ok(None),
        };
        let status_col = map.status.clone().unwrap_or_else(|| "'success'".into());
        let detail_col = map.detail.clone().unwrap_or_else(|| "NULL".into());
        let sent_col = map.sent_at.clone().unwrap_or_else(|| "''".into());
        let sql = format!(
            "SELECT {status_col}, {detail_col}, {sent_col} FROM {} \
             WHERE {} = ?1 AND {} = ?2 AND {} = ?3 ORDER BY rowid DESC LIMIT 1",
            map.table, map.subject, map.kind, map.key
        );

        let conn = self.lock()?;
        let row = conn
            .query_row(&sql, rusqlite::params![subject_id, kind.as_str(), dedup_key], |row| {
                let status: String = row.get(0)?;
                let detail: Option<String> = row.get(1)?;
                let sent_at: String = row.get(2)?;
                Ok((status, detail, sent_at))
            });

        match row {
            Ok((status, detail, sent_at)) => Ok(Some(AlertRecord {
                subject_id: subject_id.to_string(),
                kind,
                dedup_key: dedup_key.to_string(),
                status: if status == "error" {
                    RecordStatus::Error
                } else {
                    RecordStatus::Success
                },
                detail,
                sent_at: DateTime::parse_from_rfc3339(&sent_at)
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or_default(),
            })),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(RotinaError::Store(format!("Ledger read: {e}"))),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RotinaError::Store(format!("Ledger lock poisoned: {e}")))
    }
}

fn resolve_schema(conn: &Connection, primary: &str, fallback: &str) -> LedgerSchema {
    match map_table(conn, primary) {
        Some(map) => {
            tracing::debug!("Ledger bound to table '{}' ({:?})", primary, map);
            LedgerSchema::Resolved(map)
        }
        None => match map_table(conn, fallback) {
            Some(map) => {
                tracing::warn!(
                    "Ledger table '{}' lacks the minimum columns; using legacy '{}'",
                    primary,
                    fallback
                );
                LedgerSchema::Resolved(map)
            }
            None => {
                tracing::warn!(
                    "Neither '{}' nor '{}' exposes subject/key/kind columns — \
                     dedup and daily cap DISABLED (fail open)",
                    primary,
                    fallback
                );
                LedgerSchema::Disabled
            }
        },
    }
}

/// Map a table's columns onto the logical ledger fields. The minimum is
/// subject + dedup key + kind; status/detail/timestamp are optional.
fn map_table(conn: &Connection, table: &str) -> Option<ColumnMap> {
    let cols = table_columns(conn, table)?;
    if cols.is_empty() {
        return None;
    }
    let find = |candidates: &[&str]| -> Option<String> {
        candidates
            .iter()
            .find(|c| cols.iter().any(|have| have == *c))
            .map(|c| c.to_string())
    };
    let subject = find(SUBJECT_COLS)?;
    let key = find(KEY_COLS)?;
    let kind = find(KIND_COLS)?;
    Some(ColumnMap {
        table: table.to_string(),
        subject,
        kind,
        key,
        status: find(STATUS_COLS),
        detail: find(DETAIL_COLS),
        sent_at: find(SENT_AT_COLS),
    })
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |_| Ok(()),
    )
    .map(|_| true)
    .or_else(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(false),
        other => Err(other),
    })
    .map_err(|e| RotinaError::Store(format!("Ledger introspection: {e}")))
}

fn table_columns(conn: &Connection, table: &str) -> Option<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})")).ok()?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1)).ok()?;
    Some(rows.filter_map(|r| r.ok()).collect())
}
