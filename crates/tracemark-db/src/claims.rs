use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use tracemark_types::models::{ClaimStatus, CopyrightClaim};
use uuid::Uuid;

use crate::codec::{enum_col, json_col, opt_time_col, opt_uuid_col, time_col, ts, uuid_col};
use crate::{Database, OptionalExt};

const CLAIM_COLUMNS: &str = "id, post_id, filer_id, disputed_owner_id, status, matched_post_id,
    matched_author_id, owner_name, owner_email, proof_description, proof_urls, reviewer_id,
    reviewer_note, created_at, reviewed_at";

fn map_claim(row: &Row) -> rusqlite::Result<CopyrightClaim> {
    Ok(CopyrightClaim {
        id: uuid_col(row, 0)?,
        post_id: uuid_col(row, 1)?,
        filer_id: uuid_col(row, 2)?,
        disputed_owner_id: uuid_col(row, 3)?,
        status: enum_col(row, 4)?,
        matched_post_id: opt_uuid_col(row, 5)?,
        matched_author_id: opt_uuid_col(row, 6)?,
        owner_name: row.get(7)?,
        owner_email: row.get(8)?,
        proof_description: row.get(9)?,
        proof_urls: json_col(row, 10)?,
        reviewer_id: opt_uuid_col(row, 11)?,
        reviewer_note: row.get(12)?,
        created_at: time_col(row, 13)?,
        reviewed_at: opt_time_col(row, 14)?,
    })
}

pub fn insert(conn: &Connection, claim: &CopyrightClaim) -> Result<()> {
    conn.execute(
        "INSERT INTO copyright_claims
            (id, post_id, filer_id, disputed_owner_id, status, matched_post_id, matched_author_id,
             owner_name, owner_email, proof_description, proof_urls, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        rusqlite::params![
            claim.id.to_string(),
            claim.post_id.to_string(),
            claim.filer_id.to_string(),
            claim.disputed_owner_id.to_string(),
            claim.status.as_str(),
            claim.matched_post_id.map(|id| id.to_string()),
            claim.matched_author_id.map(|id| id.to_string()),
            claim.owner_name,
            claim.owner_email,
            claim.proof_description,
            serde_json::to_string(&claim.proof_urls)?,
            ts(&claim.created_at),
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<CopyrightClaim>> {
    let sql = format!("SELECT {} FROM copyright_claims WHERE id = ?1", CLAIM_COLUMNS);
    conn.query_row(&sql, [id.to_string()], map_claim).optional()
}

pub fn list_by_status(conn: &Connection, status: ClaimStatus, limit: u32) -> Result<Vec<CopyrightClaim>> {
    let sql = format!(
        "SELECT {} FROM copyright_claims WHERE status = ?1 ORDER BY created_at LIMIT ?2",
        CLAIM_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params![status.as_str(), limit], map_claim)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn has_pending(conn: &Connection, post_id: Uuid, filer_id: Uuid) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM copyright_claims
                       WHERE post_id = ?1 AND filer_id = ?2 AND status = 'pending')",
        (post_id.to_string(), filer_id.to_string()),
        |r| r.get(0),
    )?;
    Ok(exists)
}

/// Move a pending claim to a terminal status. Returns false if the claim was
/// not pending, so exactly one reviewer action can win.
pub fn resolve(
    conn: &Connection,
    id: Uuid,
    status: ClaimStatus,
    reviewer_id: Uuid,
    reviewer_note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE copyright_claims
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

/// Associate a verified owner with a post. Returns false if already recorded.
pub fn insert_verification(
    conn: &Connection,
    account_id: Uuid,
    post_id: Uuid,
    claim_id: Uuid,
    now: DateTime<Utc>,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO copyright_verifications (account_id, post_id, claim_id, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        (account_id.to_string(), post_id.to_string(), claim_id.to_string(), ts(&now)),
    )?;
    Ok(inserted > 0)
}

pub fn is_verified_owner(conn: &Connection, account_id: Uuid, post_id: Uuid) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM copyright_verifications WHERE account_id = ?1 AND post_id = ?2)",
        (account_id.to_string(), post_id.to_string()),
        |r| r.get(0),
    )?;
    Ok(exists)
}

impl Database {
    pub fn get_claim(&self, id: Uuid) -> Result<Option<CopyrightClaim>> {
        self.with_conn(|conn| get(conn, id))
    }

    pub fn list_claims(&self, status: ClaimStatus, limit: u32) -> Result<Vec<CopyrightClaim>> {
        self.with_conn(|conn| list_by_status(conn, status, limit))
    }
}
