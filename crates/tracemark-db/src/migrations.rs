use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("DB: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE accounts (
                id                      TEXT PRIMARY KEY,
                email_verified          INTEGER NOT NULL DEFAULT 0,
                account_type            TEXT NOT NULL DEFAULT 'individual',
                status                  TEXT NOT NULL DEFAULT 'active',
                protection_enabled      INTEGER NOT NULL DEFAULT 0,
                protection_granted_at   TEXT,
                created_at              TEXT NOT NULL
            );

            CREATE TABLE posts (
                id                  TEXT PRIMARY KEY,
                author_id           TEXT NOT NULL REFERENCES accounts(id),
                visibility          TEXT NOT NULL DEFAULT 'published',
                duplicate_content   INTEGER NOT NULL DEFAULT 0,
                copyright_match     INTEGER NOT NULL DEFAULT 0,
                nsfw                INTEGER NOT NULL DEFAULT 0,
                copyright_verified  INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE INDEX idx_posts_author ON posts(author_id, visibility);

            CREATE TABLE fingerprints (
                id          TEXT PRIMARY KEY,
                content_id  TEXT NOT NULL,
                owner_id    TEXT NOT NULL,
                kind        TEXT NOT NULL,
                signature   TEXT NOT NULL,
                digest      TEXT NOT NULL,
                protected   INTEGER NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE(content_id, kind)
            );

            CREATE INDEX idx_fingerprints_kind ON fingerprints(kind, protected, created_at);
            CREATE INDEX idx_fingerprints_digest ON fingerprints(kind, digest);

            CREATE TABLE strike_ledger (
                account_id  TEXT NOT NULL,
                category    TEXT NOT NULL,
                strikes     INTEGER NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (account_id, category)
            );

            CREATE TABLE strike_events (
                idempotency_key TEXT PRIMARY KEY,
                account_id      TEXT NOT NULL,
                category        TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE copyright_claims (
                id                  TEXT PRIMARY KEY,
                post_id             TEXT NOT NULL REFERENCES posts(id),
                filer_id            TEXT NOT NULL,
                disputed_owner_id   TEXT NOT NULL,
                status              TEXT NOT NULL DEFAULT 'pending',
                matched_post_id     TEXT,
                matched_author_id   TEXT,
                owner_name          TEXT NOT NULL,
                owner_email         TEXT NOT NULL,
                proof_description   TEXT NOT NULL,
                proof_urls          TEXT NOT NULL,
                reviewer_id         TEXT,
                reviewer_note       TEXT,
                created_at          TEXT NOT NULL,
                reviewed_at         TEXT
            );

            CREATE INDEX idx_claims_status ON copyright_claims(status, created_at);
            CREATE INDEX idx_claims_post ON copyright_claims(post_id, filer_id, status);

            CREATE TABLE copyright_verifications (
                account_id  TEXT NOT NULL,
                post_id     TEXT NOT NULL REFERENCES posts(id),
                claim_id    TEXT NOT NULL REFERENCES copyright_claims(id),
                created_at  TEXT NOT NULL,
                PRIMARY KEY (account_id, post_id)
            );

            CREATE TABLE protection_applications (
                id                  TEXT PRIMARY KEY,
                account_id          TEXT NOT NULL REFERENCES accounts(id),
                organization_name   TEXT NOT NULL,
                website             TEXT,
                details             TEXT NOT NULL,
                status              TEXT NOT NULL DEFAULT 'pending',
                reviewer_id         TEXT,
                reviewer_note       TEXT,
                created_at          TEXT NOT NULL,
                reviewed_at         TEXT
            );

            CREATE INDEX idx_applications_account ON protection_applications(account_id, status);

            CREATE TABLE moderation_decisions (
                id                      TEXT PRIMARY KEY,
                target_type             TEXT NOT NULL,
                target_id               TEXT NOT NULL,
                decision                TEXT NOT NULL,
                reason                  TEXT NOT NULL,
                moderator_id            TEXT NOT NULL,
                decision_code           TEXT NOT NULL,
                matched_fingerprint_id  TEXT,
                score                   REAL,
                created_at              TEXT NOT NULL
            );

            CREATE INDEX idx_decisions_target ON moderation_decisions(target_type, target_id, created_at);

            CREATE TABLE outbox (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                event           TEXT NOT NULL,
                attempts        INTEGER NOT NULL DEFAULT 0,
                last_error      TEXT,
                created_at      TEXT NOT NULL,
                delivered_at    TEXT
            );

            CREATE INDEX idx_outbox_pending ON outbox(delivered_at, id);

            CREATE TABLE reconciliation_events (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                content_id  TEXT NOT NULL,
                owner_id    TEXT NOT NULL,
                kind        TEXT NOT NULL,
                reason      TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                resolved_at TEXT
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_rerunnable() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}
