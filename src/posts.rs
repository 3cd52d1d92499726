use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::Post;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    NotOwner,
}

pub fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        content: row.get("content")?,
        media_url: row.get("media_url")?,
        created_at: row.get("created_at")?,
    })
}

pub fn find_post(conn: &Connection, post_id: &str) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        "SELECT id, user_id, content, media_url, created_at FROM posts WHERE id = ?1",
        params![post_id],
        post_from_row,
    )
    .optional()
}

pub fn insert_post(
    conn: &Connection,
    user_id: &str,
    content: &str,
    media_url: Option<&str>,
) -> rusqlite::Result<Post> {
    let post_id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO posts (id, user_id, content, media_url) VALUES (?1, ?2, ?3, ?4)",
        params![post_id, user_id, content, media_url],
    )?;
    conn.query_row(
        "SELECT id, user_id, content, media_url, created_at FROM posts WHERE id = ?1",
        params![post_id],
        post_from_row,
    )
}

/// Delete a post owned by `user_id`. Likes and comments go with it.
pub fn delete_post(conn: &Connection, post_id: &str, user_id: &str) -> rusqlite::Result<DeleteOutcome> {
    let owner: Option<String> = conn
        .query_row(
            "SELECT user_id FROM posts WHERE id = ?1",
            params![post_id],
            |r| r.get(0),
        )
        .optional()?;

    match owner {
        None => Ok(DeleteOutcome::NotFound),
        Some(owner) if owner != user_id => Ok(DeleteOutcome::NotOwner),
        Some(_) => {
            conn.execute(
                "DELETE FROM posts WHERE id = ?1 AND user_id = ?2",
                params![post_id, user_id],
            )?;
            Ok(DeleteOutcome::Deleted)
        }
    }
}
