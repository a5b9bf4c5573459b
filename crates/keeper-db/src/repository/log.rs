//! # Action Log Repository
//!
//! The asset history. Rows are written in the same transaction as the state
//! change they describe and are never updated or deleted afterwards (the
//! schema enforces this with triggers).

use sqlx::{Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use keeper_core::{LogAction, LogEntry};

/// Column list for `action_logs` SELECT queries.
const COLUMNS: &str = "\
    id, action, item_id, target_type, target_id, actor_id, \
    note, location_id, next_audit_date, created_at";

/// Appends one entry using any executor, typically an open transaction.
pub(crate) async fn append<'e, E>(executor: E, entry: &LogEntry) -> DbResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    debug!(id = %entry.id, action = ?entry.action, item_id = %entry.item_id, "Appending log entry");

    let query = format!(
        "INSERT INTO action_logs ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    );
    sqlx::query(&query)
        .bind(&entry.id)
        .bind(entry.action)
        .bind(&entry.item_id)
        .bind(entry.target_type)
        .bind(&entry.target_id)
        .bind(&entry.actor_id)
        .bind(&entry.note)
        .bind(&entry.location_id)
        .bind(entry.next_audit_date)
        .bind(entry.created_at)
        .execute(executor)
        .await?;

    Ok(())
}

/// Read access to the action log.
#[derive(Debug, Clone)]
pub struct LogRepository {
    pool: SqlitePool,
}

impl LogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LogRepository { pool }
    }

    /// History of one asset, oldest first.
    pub async fn for_item(&self, item_id: &str) -> DbResult<Vec<LogEntry>> {
        let query = format!(
            "SELECT {COLUMNS} FROM action_logs WHERE item_id = ? ORDER BY created_at, rowid"
        );
        let entries = sqlx::query_as::<_, LogEntry>(&query)
            .bind(item_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Number of entries of `action` for one asset.
    pub async fn count_for_item(&self, item_id: &str, action: LogAction) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM action_logs WHERE item_id = ? AND action = ?",
        )
        .bind(item_id)
        .bind(action)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Most recent entry of `action` for one asset.
    pub async fn latest(&self, item_id: &str, action: LogAction) -> DbResult<Option<LogEntry>> {
        let query = format!(
            "SELECT {COLUMNS} FROM action_logs WHERE item_id = ? AND action = ? \
             ORDER BY created_at DESC, rowid DESC LIMIT 1"
        );
        let entry = sqlx::query_as::<_, LogEntry>(&query)
            .bind(item_id)
            .bind(action)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// Total number of entries, for diagnostics.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM action_logs")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
