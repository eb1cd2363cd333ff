use anyhow::Result;
use rusqlite::{Connection, Row};
use tracemark_types::models::{DecisionKind, ModerationDecision, TargetType};
use uuid::Uuid;

use crate::Database;
use crate::codec::{enum_col, opt_uuid_col, time_col, ts, uuid_col};

fn map_decision(row: &Row) -> rusqlite::Result<ModerationDecision> {
    Ok(ModerationDecision {
        id: uuid_col(row, 0)?,
        target_type: enum_col(row, 1)?,
        target_id: uuid_col(row, 2)?,
        decision: enum_col(row, 3)?,
        reason: row.get(4)?,
        moderator_id: row.get(5)?,
        decision_code: row.get(6)?,
        matched_fingerprint_id: opt_uuid_col(row, 7)?,
        score: row.get(8)?,
        created_at: time_col(row, 9)?,
    })
}

/// Append to the audit log. Decisions are never updated or deleted.
pub fn append(conn: &Connection, decision: &ModerationDecision) -> Result<()> {
    conn.execute(
        "INSERT INTO moderation_decisions
            (id, target_type, target_id, decision, reason, moderator_id, decision_code,
             matched_fingerprint_id, score, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            decision.id.to_string(),
            decision.target_type.as_str(),
            decision.target_id.to_string(),
            decision.decision.as_str(),
            decision.reason,
            decision.moderator_id,
            decision.decision_code,
            decision.matched_fingerprint_id.map(|id| id.to_string()),
            decision.score,
            ts(&decision.created_at),
        ],
    )?;
    Ok(())
}

pub fn for_target(
    conn: &Connection,
    target_type: TargetType,
    target_id: Uuid,
) -> Result<Vec<ModerationDecision>> {
    let mut stmt = conn.prepare(
        "SELECT id, target_type, target_id, decision, reason, moderator_id, decision_code,
                matched_fingerprint_id, score, created_at
         FROM moderation_decisions
         WHERE target_type = ?1 AND target_id = ?2
         ORDER BY created_at, rowid",
    )?;
    let rows = stmt
        .query_map((target_type.as_str(), target_id.to_string()), map_decision)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_of(conn: &Connection, decision: DecisionKind) -> Result<u32> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM moderation_decisions WHERE decision = ?1",
        [decision.as_str()],
        |r| r.get(0),
    )?;
    Ok(count)
}

impl Database {
    pub fn decisions_for(
        &self,
        target_type: TargetType,
        target_id: Uuid,
    ) -> Result<Vec<ModerationDecision>> {
        self.with_conn(|conn| for_target(conn, target_type, target_id))
    }

    pub fn decision_count(&self, decision: DecisionKind) -> Result<u32> {
        self.with_conn(|conn| count_of(conn, decision))
    }
}
