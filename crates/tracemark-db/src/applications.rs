use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use tracemark_types::models::{ApplicationStatus, ProtectionApplication};
use uuid::Uuid;

use crate::codec::{enum_col, opt_time_col, opt_uuid_col, time_col, ts, uuid_col};
use crate::{Database, OptionalExt};

fn map_application(row: &Row) -> rusqlite::Result<ProtectionApplication> {
    Ok(ProtectionApplication {
        id: uuid_col(row, 0)?,
        account_id: uuid_col(row, 1)?,
        organization_name: row.get(2)?,
        website: row.get(3)?,
        details: row.get(4)?,
        status: enum_col(row, 5)?,
        reviewer_id: opt_uuid_col(row, 6)?,
        reviewer_note: row.get(7)?,
        created_at: time_col(row, 8)?,
        reviewed_at: opt_time_col(row, 9)?,
    })
}

pub fn insert(conn: &Connection, app: &ProtectionApplication) -> Result<()> {
    conn.execute(
        "INSERT INTO protection_applications
            (id, account_id, organization_name, website, details, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            app.id.to_string(),
            app.account_id.to_string(),
            app.organization_name,
            app.website,
            app.details,
            app.status.as_str(),
            ts(&app.created_at),
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<ProtectionApplication>> {
    conn.query_row(
        "SELECT id, account_id, organization_name, website, details, status, reviewer_id,
                reviewer_note, created_at, reviewed_at
         FROM protection_applications WHERE id = ?1",
        [id.to_string()],
        map_application,
    )
    .optional()
}

pub fn has_pending(conn: &Connection, account_id: Uuid) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM protection_applications
                       WHERE account_id = ?1 AND status = 'pending')",
        [account_id.to_string()],
        |r| r.get(0),
    )?;
    Ok(exists)
}

/// Same single-winner rule as claim resolution.
pub fn resolve(
    conn: &Connection,
    id: Uuid,
    status: ApplicationStatus,
    reviewer_id: Uuid,
    reviewer_note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE protection_applications
         SET status = ?2, reviewer_id = ?3, reviewer_note = ?4, reviewed_at = ?5
         WHERE id = ?1 AND status = 'pending'",
        rusqlite::params![
            id.to_string(),
            status.as_str(),
            reviewer_id.to_string(),
            reviewer_note,
            ts(&now),
        ],
    )?;
    Ok(changed > 0)
}

impl Database {
    pub fn get_application(&self, id: Uuid) -> Result<Option<ProtectionApplication>> {
        self.with_conn(|conn| get(conn, id))
    }
}
