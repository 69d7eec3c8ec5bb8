//! Durable credit ledger: per-user balances plus an append-only entry log.
//!
//! The store offers read-your-writes consistency per user and nothing more;
//! balance mutation and entry append are independent calls with no multi-key
//! transaction between them. Consumers that need the audit trail to explain
//! every balance change treat the append as best-effort.
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Immutable audit record of one balance change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub user_id: String,
    pub delta: i64,
    pub balance_after: i64,
    pub description: String,
    pub category: EntryCategory,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCategory {
    Usage,
    Refund,
    Grant,
}

impl EntryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryCategory::Usage => "usage",
            EntryCategory::Refund => "refund",
            EntryCategory::Grant => "grant",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "usage" => Some(EntryCategory::Usage),
            "refund" => Some(EntryCategory::Refund),
            "grant" => Some(EntryCategory::Grant),
            _ => None,
        }
    }
}

/// Per-user balance storage with an append-only audit log.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current balance for `user_id`; users never seen before read as 0.
    async fn get_balance(&self, user_id: &str) -> AppResult<i64>;

    async fn set_balance(&self, user_id: &str, credits: i64) -> AppResult<()>;

    async fn append_entry(&self, entry: LedgerEntry) -> AppResult<()>;
}

/// SQLite-backed ledger. Each call opens a connection on a blocking thread;
/// the handle itself is a cheap clonable path.
#[derive(Clone, Debug)]
pub struct SqliteLedger {
    path: PathBuf,
}

impl SqliteLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SqliteLedger { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create tables if they do not exist yet.
    pub async fn init(&self) -> AppResult<()> {
        let path = self.path.clone();
        run_blocking(move || {
            let conn = open_connection(&path)?;
            init_schema(&conn)
        })
        .await
        .map_err(|e| AppError::LedgerUnavailable(e.to_string()))
    }

    /// All entries for a user, oldest first. Used by the admin CLI.
    pub async fn entries_for(&self, user_id: &str) -> AppResult<Vec<LedgerEntry>> {
        let path = self.path.clone();
        let user_id = user_id.to_string();
        run_blocking(move || {
            let conn = open_connection(&path)?;
            init_schema(&conn)?;
            let mut stmt = conn.prepare(
                "SELECT user_id, delta, balance_after, description, category, created_at
                 FROM ledger_entries WHERE user_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(rusqlite::params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?;
            let mut entries = Vec::new();
            for row in rows {
                let (user_id, delta, balance_after, description, category, created_at) = row?;
                entries.push(LedgerEntry {
                    user_id,
                    delta,
                    balance_after,
                    description,
                    category: EntryCategory::parse(&category).unwrap_or(EntryCategory::Usage),
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .map(|t| t.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                });
            }
            Ok(entries)
        })
        .await
        .map_err(|e| AppError::LedgerUnavailable(e.to_string()))
    }
}

#[async_trait]
impl LedgerStore for SqliteLedger {
    async fn get_balance(&self, user_id: &str) -> AppResult<i64> {
        let path = self.path.clone();
        let user_id = user_id.to_string();
        run_blocking(move || {
            let conn = open_connection(&path)?;
            init_schema(&conn)?;
            let credits: Option<i64> = conn
                .query_row(
                    "SELECT credits FROM balances WHERE user_id = ?1",
                    rusqlite::params![user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(credits.unwrap_or(0))
        })
        .await
        .map_err(|e| AppError::LedgerUnavailable(e.to_string()))
    }

    async fn set_balance(&self, user_id: &str, credits: i64) -> AppResult<()> {
        let path = self.path.clone();
        let user_id = user_id.to_string();
        run_blocking(move || {
            let conn = open_connection(&path)?;
            init_schema(&conn)?;
            conn.execute(
                "INSERT INTO balances (user_id, credits) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET credits = excluded.credits",
                rusqlite::params![user_id, credits],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| AppError::LedgerWriteFailed(e.to_string()))
    }

    async fn append_entry(&self, entry: LedgerEntry) -> AppResult<()> {
        let path = self.path.clone();
        run_blocking(move || {
            let conn = open_connection(&path)?;
            init_schema(&conn)?;
            conn.execute(
                "INSERT INTO ledger_entries
                 (user_id, delta, balance_after, description, category, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    entry.user_id,
                    entry.delta,
                    entry.balance_after,
                    entry.description,
                    entry.category.as_str(),
                    entry.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| AppError::LedgerWriteFailed(e.to_string()))
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, rusqlite::Error>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, rusqlite::Error> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(join_err) => Err(rusqlite::Error::ToSqlConversionFailure(Box::new(join_err))),
    }
}

fn open_connection(path: &Path) -> Result<rusqlite::Connection, rusqlite::Error> {
    let conn = rusqlite::Connection::open(path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(conn)
}

fn init_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS balances (
            user_id TEXT PRIMARY KEY,
            credits INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS ledger_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            delta INTEGER NOT NULL,
            balance_after INTEGER NOT NULL,
            description TEXT NOT NULL,
            category TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_ledger_entries_user
            ON ledger_entries (user_id);",
    )
}
