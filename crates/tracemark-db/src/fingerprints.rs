use anyhow::Result;
use rusqlite::{Connection, Row};
use tracemark_types::models::{ContentFingerprint, ContentKind};
use uuid::Uuid;

use crate::codec::{enum_col, json_col, time_col, ts, uuid_col};
use crate::{Database, OptionalExt};

const FINGERPRINT_COLUMNS: &str = "id, content_id, owner_id, kind, signature, protected, created_at";

fn map_fingerprint(row: &Row) -> rusqlite::Result<ContentFingerprint> {
    Ok(ContentFingerprint {
        id: uuid_col(row, 0)?,
        content_id: uuid_col(row, 1)?,
        owner_id: uuid_col(row, 2)?,
        kind: enum_col(row, 3)?,
        signature: json_col(row, 4)?,
        protected: row.get(5)?,
        created_at: time_col(row, 6)?,
    })
}

/// Store a fingerprint. Returns false if (content_id, kind) already has one.
pub fn insert(conn: &Connection, fp: &ContentFingerprint) -> Result<bool> {
    let signature = serde_json::to_string(&fp.signature)?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO fingerprints
            (id, content_id, owner_id, kind, signature, digest, protected, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            fp.id.to_string(),
            fp.content_id.to_string(),
            fp.owner_id.to_string(),
            fp.kind.as_str(),
            signature,
            fp.signature.digest(),
            fp.protected,
            ts(&fp.created_at),
        ],
    )?;
    Ok(inserted > 0)
}

pub fn get_by_content(
    conn: &Connection,
    content_id: Uuid,
    kind: ContentKind,
) -> Result<Option<ContentFingerprint>> {
    let sql = format!(
        "SELECT {} FROM fingerprints WHERE content_id = ?1 AND kind = ?2",
        FINGERPRINT_COLUMNS
    );
    conn.query_row(&sql, (content_id.to_string(), kind.as_str()), map_fingerprint)
        .optional()
}

/// Comparison targets of one kind, oldest first, excluding one owner.
pub fn candidates(
    conn: &Connection,
    kind: ContentKind,
    exclude_owner: Uuid,
    protected_only: bool,
) -> Result<Vec<ContentFingerprint>> {
    let sql = format!(
        "SELECT {} FROM fingerprints
         WHERE kind = ?1 AND owner_id != ?2 AND (?3 = 0 OR protected = 1)
         ORDER BY created_at, id",
        FINGERPRINT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params![kind.as_str(), exclude_owner.to_string(), protected_only],
            map_fingerprint,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Drop every fingerprint of permanently deleted content.
pub fn delete_for_content(conn: &Connection, content_id: Uuid) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM fingerprints WHERE content_id = ?1",
        [content_id.to_string()],
    )?;
    Ok(deleted)
}

impl Database {
    pub fn get_fingerprint(
        &self,
        content_id: Uuid,
        kind: ContentKind,
    ) -> Result<Option<ContentFingerprint>> {
        self.with_conn(|conn| get_by_content(conn, content_id, kind))
    }

    pub fn fingerprint_candidates(
        &self,
        kind: ContentKind,
        exclude_owner: Uuid,
        protected_only: bool,
    ) -> Result<Vec<ContentFingerprint>> {
        self.with_conn(|conn| candidates(conn, kind, exclude_owner, protected_only))
    }
}
