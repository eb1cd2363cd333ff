use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use tracemark_types::models::{Account, AccountType};
use uuid::Uuid;

use crate::codec::{enum_col, opt_time_col, time_col, ts, uuid_col};
use crate::{Database, OptionalExt};

const ACCOUNT_COLUMNS: &str =
    "id, email_verified, account_type, status, protection_enabled, protection_granted_at, created_at";

fn map_account(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: uuid_col(row, 0)?,
        email_verified: row.get(1)?,
        account_type: enum_col(row, 2)?,
        status: enum_col(row, 3)?,
        protection_enabled: row.get(4)?,
        protection_granted_at: opt_time_col(row, 5)?,
        created_at: time_col(row, 6)?,
    })
}

/// Register an unknown account with conservative defaults. Returns true if inserted.
pub fn ensure(conn: &Connection, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO accounts (id, created_at) VALUES (?1, ?2)",
        (id.to_string(), ts(&now)),
    )?;
    Ok(inserted > 0)
}

/// Apply account facts reported by the auth collaborator. Status and
/// protection are owned by this service and left untouched.
pub fn upsert(
    conn: &Connection,
    id: Uuid,
    email_verified: bool,
    account_type: AccountType,
    created_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO accounts (id, email_verified, account_type, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
            email_verified = excluded.email_verified,
            account_type = excluded.account_type,
            created_at = CASE WHEN ?5 THEN excluded.created_at ELSE accounts.created_at END",
        rusqlite::params![
            id.to_string(),
            email_verified,
            account_type.as_str(),
            ts(&created_at.unwrap_or(now)),
            created_at.is_some(),
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<Account>> {
    let sql = format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLUMNS);
    conn.query_row(&sql, [id.to_string()], map_account).optional()
}

/// Move an active account into moderation. Returns false if it already was.
pub fn escalate(conn: &Connection, id: Uuid) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE accounts SET status = 'moderation' WHERE id = ?1 AND status = 'active'",
        [id.to_string()],
    )?;
    Ok(changed > 0)
}

/// Enable protection. Returns false if it was already enabled.
pub fn grant_protection(conn: &Connection, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE accounts SET protection_enabled = 1, protection_granted_at = ?2
         WHERE id = ?1 AND protection_enabled = 0",
        (id.to_string(), ts(&now)),
    )?;
    Ok(changed > 0)
}

pub fn unprotected_ids(conn: &Connection) -> Result<Vec<Uuid>> {
    let mut stmt =
        conn.prepare("SELECT id FROM accounts WHERE protection_enabled = 0 ORDER BY created_at")?;
    let ids = stmt
        .query_map([], |row| uuid_col(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

impl Database {
    pub fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        self.with_conn(|conn| get(conn, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tracemark_types::models::AccountStatus;

    #[test]
    fn upsert_keeps_service_owned_fields() {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        let now = Utc::now();

        db.with_tx(|conn| {
            ensure(conn, id, now)?;
            grant_protection(conn, id, now)?;
            escalate(conn, id)?;
            upsert(conn, id, true, AccountType::Organization, None, now)
        })
        .unwrap();

        let account = db.get_account(id).unwrap().unwrap();
        assert!(account.email_verified);
        assert!(account.protection_enabled);
        assert_eq!(account.status, AccountStatus::Moderation);
        assert_eq!(account.account_type, AccountType::Organization);
    }

    #[test]
    fn escalate_and_grant_report_changes_once() {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        let created = Utc::now() - Duration::days(30);

        db.with_tx(|conn| upsert(conn, id, false, AccountType::Individual, Some(created), Utc::now()))
            .unwrap();

        let (first, second, g1, g2) = db
            .with_tx(|conn| {
                Ok::<_, anyhow::Error>((
                    escalate(conn, id)?,
                    escalate(conn, id)?,
                    grant_protection(conn, id, Utc::now())?,
                    grant_protection(conn, id, Utc::now())?,
                ))
            })
            .unwrap();
        assert!(first && !second);
        assert!(g1 && !g2);

        let account = db.get_account(id).unwrap().unwrap();
        assert_eq!(ts(&account.created_at), ts(&created));
    }
}
