use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracemark_types::events::EngineEvent;

use crate::Database;
use crate::codec::{json_col, ts};

/// Undelivered outbox entry.
#[derive(Debug, Clone)]
pub struct OutboxRow {
    pub id: i64,
    pub event: EngineEvent,
    pub attempts: u32,
}

/// Queue an event inside the caller's transaction.
pub fn enqueue(conn: &Connection, event: &EngineEvent, now: DateTime<Utc>) -> Result<i64> {
    conn.execute(
        "INSERT INTO outbox (event, created_at) VALUES (?1, ?2)",
        (serde_json::to_string(event)?, ts(&now)),
    )?;
    Ok(conn.last_insert_rowid())
}

/// Oldest undelivered events that have not exhausted their attempts.
pub fn pending(conn: &Connection, limit: u32, max_attempts: u32) -> Result<Vec<OutboxRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, event, attempts FROM outbox
         WHERE delivered_at IS NULL AND attempts < ?2
         ORDER BY id LIMIT ?1",
    )?;
    let rows = stmt
        .query_map((limit, max_attempts), |row| {
            Ok(OutboxRow {
                id: row.get(0)?,
                event: json_col(row, 1)?,
                attempts: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn mark_delivered(conn: &Connection, id: i64, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE outbox SET delivered_at = ?2, attempts = attempts + 1 WHERE id = ?1",
        (id, ts(&now)),
    )?;
    Ok(())
}

pub fn record_failure(conn: &Connection, id: i64, error: &str) -> Result<()> {
    conn.execute(
        "UPDATE outbox SET attempts = attempts + 1, last_error = ?2 WHERE id = ?1",
        (id, error),
    )?;
    Ok(())
}

impl Database {
    pub fn pending_events(&self, limit: u32, max_attempts: u32) -> Result<Vec<OutboxRow>> {
        self.with_conn(|conn| pending(conn, limit, max_attempts))
    }
}
