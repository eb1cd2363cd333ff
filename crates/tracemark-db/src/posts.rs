use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use tracemark_types::models::{Post, PostVisibility};
use uuid::Uuid;

use crate::codec::{enum_col, time_col, ts, uuid_col};
use crate::{Database, OptionalExt};

/// Moderation markers carried on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFlag {
    DuplicateContent,
    CopyrightMatch,
    Nsfw,
}

impl PostFlag {
    fn column(self) -> &'static str {
        match self {
            PostFlag::DuplicateContent => "duplicate_content",
            PostFlag::CopyrightMatch => "copyright_match",
            PostFlag::Nsfw => "nsfw",
        }
    }
}

fn map_post(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: uuid_col(row, 0)?,
        author_id: uuid_col(row, 1)?,
        visibility: enum_col(row, 2)?,
        duplicate_content: row.get(3)?,
        copyright_match: row.get(4)?,
        nsfw: row.get(5)?,
        copyright_verified: row.get(6)?,
        created_at: time_col(row, 7)?,
        updated_at: time_col(row, 8)?,
    })
}

/// Record a published post. Returns false if it was already known.
pub fn ensure(conn: &Connection, id: Uuid, author_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO posts (id, author_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        (id.to_string(), author_id.to_string(), ts(&now)),
    )?;
    Ok(inserted > 0)
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<Post>> {
    conn.query_row(
        "SELECT id, author_id, visibility, duplicate_content, copyright_match, nsfw,
                copyright_verified, created_at, updated_at
         FROM posts WHERE id = ?1",
        [id.to_string()],
        map_post,
    )
    .optional()
}

/// Raw visibility write. Callers validate the transition first.
pub fn set_visibility(
    conn: &Connection,
    id: Uuid,
    visibility: PostVisibility,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE posts SET visibility = ?2, updated_at = ?3 WHERE id = ?1",
        (id.to_string(), visibility.as_str(), ts(&now)),
    )?;
    Ok(())
}

pub fn set_flag(conn: &Connection, id: Uuid, flag: PostFlag, now: DateTime<Utc>) -> Result<()> {
    let sql = format!(
        "UPDATE posts SET {} = 1, updated_at = ?2 WHERE id = ?1",
        flag.column()
    );
    conn.execute(&sql, (id.to_string(), ts(&now)))?;
    Ok(())
}

/// Clear every moderation flag and mark the post copyright-verified.
pub fn mark_copyright_verified(conn: &Connection, id: Uuid, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE posts
         SET duplicate_content = 0, copyright_match = 0, nsfw = 0, copyright_verified = 1,
             updated_at = ?2
         WHERE id = ?1",
        (id.to_string(), ts(&now)),
    )?;
    Ok(())
}

pub fn published_count(conn: &Connection, author_id: Uuid) -> Result<u32> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE author_id = ?1 AND visibility = 'published'",
        [author_id.to_string()],
        |r| r.get(0),
    )?;
    Ok(count)
}

/// Posts still held for moderation because of a duplicate or copyright match.
pub fn open_violation_count(conn: &Connection, author_id: Uuid) -> Result<u32> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM posts
         WHERE author_id = ?1 AND visibility = 'pending_moderation'
           AND (duplicate_content = 1 OR copyright_match = 1)",
        [author_id.to_string()],
        |r| r.get(0),
    )?;
    Ok(count)
}

impl Database {
    pub fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        self.with_conn(|conn| get(conn, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts;

    #[test]
    fn verification_clears_flags_and_violation_counts_follow_visibility() {
        let db = Database::open_in_memory().unwrap();
        let author = Uuid::new_v4();
        let post = Uuid::new_v4();
        let now = Utc::now();

        db.with_tx(|conn| {
            accounts::ensure(conn, author, now)?;
            ensure(conn, post, author, now)?;
            set_flag(conn, post, PostFlag::DuplicateContent, now)?;
            set_flag(conn, post, PostFlag::Nsfw, now)?;
            set_visibility(conn, post, PostVisibility::PendingModeration, now)
        })
        .unwrap();

        db.with_conn(|conn| {
            assert_eq!(published_count(conn, author)?, 0);
            assert_eq!(open_violation_count(conn, author)?, 1);
            Ok(())
        })
        .unwrap();

        db.with_tx(|conn| {
            mark_copyright_verified(conn, post, now)?;
            set_visibility(conn, post, PostVisibility::Published, now)
        })
        .unwrap();

        let stored = db.get_post(post).unwrap().unwrap();
        assert_eq!(stored.visibility, PostVisibility::Published);
        assert!(!stored.duplicate_content && !stored.nsfw && !stored.copyright_match);
        assert!(stored.copyright_verified);
    }
}
