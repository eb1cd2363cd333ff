use anyhow::Result;
use chrono::{DateTime, Utc};
use tracemark_db::{Connection, posts};
use tracemark_types::models::{Post, PostVisibility};
use tracing::debug;

/// Every post visibility change goes through here. Returns false, writing
/// nothing, when the move is not in the transition table.
pub(crate) fn transition(
    conn: &Connection,
    post: &Post,
    next: PostVisibility,
    now: DateTime<Utc>,
) -> Result<bool> {
    if !post.visibility.can_transition_to(next) {
        debug!(
            "Post {} stays {} (no transition to {})",
            post.id, post.visibility, next
        );
        return Ok(false);
    }
    posts::set_visibility(conn, post.id, next, now)?;
    Ok(true)
}
