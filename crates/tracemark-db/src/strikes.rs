use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracemark_types::models::{StrikeCategory, StrikeEntry};
use uuid::Uuid;

use crate::Database;
use crate::codec::{enum_col, time_col, ts, uuid_col};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikeIncrement {
    /// Count after the call.
    pub count: u32,
    /// False when the idempotency key had already been consumed.
    pub applied: bool,
}

/// Atomically add one strike, at most once per idempotency key.
pub fn increment(
    conn: &Connection,
    account_id: Uuid,
    category: StrikeCategory,
    idempotency_key: &str,
    now: DateTime<Utc>,
) -> Result<StrikeIncrement> {
    let claimed = conn.execute(
        "INSERT OR IGNORE INTO strike_events (idempotency_key, account_id, category, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        (idempotency_key, account_id.to_string(), category.as_str(), ts(&now)),
    )?;

    if claimed == 0 {
        return Ok(StrikeIncrement {
            count: count(conn, account_id, category)?,
            applied: false,
        });
    }

    let count: u32 = conn.query_row(
        "INSERT INTO strike_ledger (account_id, category, strikes, updated_at)
         VALUES (?1, ?2, 1, ?3)
         ON CONFLICT(account_id, category) DO UPDATE SET
            strikes = strikes + 1,
            updated_at = excluded.updated_at
         RETURNING strikes",
        (account_id.to_string(), category.as_str(), ts(&now)),
        |r| r.get(0),
    )?;

    Ok(StrikeIncrement {
        count,
        applied: true,
    })
}

pub fn count(conn: &Connection, account_id: Uuid, category: StrikeCategory) -> Result<u32> {
    let count = conn.query_row(
        "SELECT COALESCE(MAX(strikes), 0) FROM strike_ledger WHERE account_id = ?1 AND category = ?2",
        (account_id.to_string(), category.as_str()),
        |r| r.get(0),
    )?;
    Ok(count)
}

pub fn entries(conn: &Connection, account_id: Uuid) -> Result<Vec<StrikeEntry>> {
    let mut stmt = conn.prepare(
        "SELECT account_id, category, strikes, updated_at FROM strike_ledger
         WHERE account_id = ?1 ORDER BY category",
    )?;
    let rows = stmt
        .query_map([account_id.to_string()], |row| {
            Ok(StrikeEntry {
                account_id: uuid_col(row, 0)?,
                category: enum_col(row, 1)?,
                count: row.get(2)?,
                updated_at: time_col(row, 3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn total(conn: &Connection, account_id: Uuid) -> Result<u32> {
    let total = conn.query_row(
        "SELECT COALESCE(SUM(strikes), 0) FROM strike_ledger WHERE account_id = ?1",
        [account_id.to_string()],
        |r| r.get(0),
    )?;
    Ok(total)
}

impl Database {
    pub fn strike_count(&self, account_id: Uuid, category: StrikeCategory) -> Result<u32> {
        self.with_conn(|conn| count(conn, account_id, category))
    }

    pub fn strike_entries(&self, account_id: Uuid) -> Result<Vec<StrikeEntry>> {
        self.with_conn(|conn| entries(conn, account_id))
    }

    pub fn strike_total(&self, account_id: Uuid) -> Result<u32> {
        self.with_conn(|conn| total(conn, account_id))
    }
}
