use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracemark_types::api::ReconciliationEntry;
use tracemark_types::models::ContentKind;
use uuid::Uuid;

use crate::Database;
use crate::codec::{enum_col, time_col, ts, uuid_col};

/// Record a publish evaluation that failed open.
pub fn record(
    conn: &Connection,
    content_id: Uuid,
    owner_id: Uuid,
    kind: ContentKind,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO reconciliation_events (content_id, owner_id, kind, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (content_id.to_string(), owner_id.to_string(), kind.as_str(), reason, ts(&now)),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn unresolved(conn: &Connection, limit: u32) -> Result<Vec<ReconciliationEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, content_id, owner_id, kind, reason, created_at FROM reconciliation_events
         WHERE resolved_at IS NULL ORDER BY id LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok(ReconciliationEntry {
                id: row.get(0)?,
                content_id: uuid_col(row, 1)?,
                owner_id: uuid_col(row, 2)?,
                kind: enum_col(row, 3)?,
                reason: row.get(4)?,
                created_at: time_col(row, 5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Close open entries for content that has since been evaluated.
pub fn resolve_for_content(
    conn: &Connection,
    content_id: Uuid,
    kind: ContentKind,
    now: DateTime<Utc>,
) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE reconciliation_events SET resolved_at = ?3
         WHERE content_id = ?1 AND kind = ?2 AND resolved_at IS NULL",
        (content_id.to_string(), kind.as_str(), ts(&now)),
    )?;
    Ok(changed)
}

impl Database {
    pub fn unresolved_reconciliation(&self, limit: u32) -> Result<Vec<ReconciliationEntry>> {
        self.with_conn(|conn| unresolved(conn, limit))
    }
}
