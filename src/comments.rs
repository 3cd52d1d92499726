use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::db::models::{Author, Comment};
use crate::error::{AppError, AppResult};
use crate::feed::{author_or_placeholder, resolve_authors};

pub const MAX_COMMENT_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct ThreadComment {
    pub comment: Comment,
    pub author: Author,
}

fn comment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get("id")?,
        post_id: row.get("post_id")?,
        user_id: row.get("user_id")?,
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Comments on a post, oldest first, with their authors.
pub fn list(conn: &Connection, post_id: &str) -> rusqlite::Result<Vec<ThreadComment>> {
    let mut stmt = conn.prepare(
        "SELECT id, post_id, user_id, content, created_at, updated_at
         FROM comments
         WHERE post_id = ?1
         ORDER BY created_at ASC, id ASC",
    )?;
    let comments = stmt
        .query_map(params![post_id], comment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let authors = resolve_authors(conn, comments.iter().map(|c| c.user_id.as_str()))?;
    Ok(comments
        .into_iter()
        .map(|comment| ThreadComment {
            author: author_or_placeholder(&authors, &comment.user_id),
            comment,
        })
        .collect())
}

pub fn count(conn: &Connection, post_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
        params![post_id],
        |r| r.get(0),
    )
}

pub fn validate_content(raw: &str) -> AppResult<String> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::BadRequest(format!(
            "Comment must be {} characters or less",
            MAX_COMMENT_CHARS
        )));
    }
    Ok(content.to_string())
}

pub fn add(conn: &Connection, post_id: &str, user_id: &str, raw: &str) -> AppResult<Comment> {
    let content = validate_content(raw)?;

    if crate::posts::find_post(conn, post_id)?.is_none() {
        return Err(AppError::NotFound);
    }

    let comment_id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO comments (id, post_id, user_id, content) VALUES (?1, ?2, ?3, ?4)",
        params![comment_id, post_id, user_id, content],
    )?;

    let comment = conn.query_row(
        "SELECT id, post_id, user_id, content, created_at, updated_at FROM comments WHERE id = ?1",
        params![comment_id],
        comment_from_row,
    )?;
    Ok(comment)
}

/// Delete a comment if and only if `user_id` wrote it. Returns the post the
/// removed comment belonged to, or `None` when nothing matched.
pub fn delete(conn: &Connection, comment_id: &str, user_id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "DELETE FROM comments WHERE id = ?1 AND user_id = ?2 RETURNING post_id",
        params![comment_id, user_id],
        |r| r.get(0),
    )
    .optional()
}
