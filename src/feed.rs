//! Loading posts with their likes, comment ids and authors.
//!
//! Authors are resolved in a second step: one batched profile lookup keyed by
//! the distinct author ids, merged in memory. Authors without a profile row
//! get a placeholder.

use std::collections::{BTreeSet, HashMap};

use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;

use crate::db::models::{Author, Post};
use crate::posts::post_from_row;

#[derive(Debug, Clone, Serialize)]
pub struct FeedItem {
    pub post: Post,
    pub author: Author,
    pub like_user_ids: Vec<String>,
    pub comment_ids: Vec<String>,
}

impl FeedItem {
    pub fn like_count(&self) -> i64 {
        self.like_user_ids.len() as i64
    }

    pub fn comment_count(&self) -> i64 {
        self.comment_ids.len() as i64
    }

    pub fn liked_by(&self, user_id: &str) -> bool {
        self.like_user_ids.iter().any(|id| id == user_id)
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Look up authors for a set of user ids in one query.
pub fn resolve_authors<'a>(
    conn: &Connection,
    user_ids: impl IntoIterator<Item = &'a str>,
) -> rusqlite::Result<HashMap<String, Author>> {
    let ids: BTreeSet<&str> = user_ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = format!(
        "SELECT id, username, avatar_url FROM profiles WHERE id IN ({})",
        placeholders(ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
        Ok(Author {
            id: row.get(0)?,
            username: row.get(1)?,
            avatar_url: row.get(2)?,
        })
    })?;

    let mut authors = HashMap::new();
    for author in rows {
        let author = author?;
        authors.insert(author.id.clone(), author);
    }
    Ok(authors)
}

pub fn author_or_placeholder(authors: &HashMap<String, Author>, user_id: &str) -> Author {
    authors
        .get(user_id)
        .cloned()
        .unwrap_or_else(|| Author::placeholder(user_id))
}

/// Every post, newest first.
pub fn load_feed(conn: &Connection) -> rusqlite::Result<Vec<FeedItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, content, media_url, created_at FROM posts
         ORDER BY created_at DESC, id DESC",
    )?;
    let posts = stmt
        .query_map([], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    attach(conn, posts)
}

/// One author's posts, newest first.
pub fn load_user_posts(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<FeedItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, content, media_url, created_at FROM posts
         WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC",
    )?;
    let posts = stmt
        .query_map(params![user_id], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    attach(conn, posts)
}

pub fn load_post(conn: &Connection, post_id: &str) -> rusqlite::Result<Option<FeedItem>> {
    let Some(post) = crate::posts::find_post(conn, post_id)? else {
        return Ok(None);
    };
    Ok(attach(conn, vec![post])?.into_iter().next())
}

fn group_by_post(
    conn: &Connection,
    sql: &str,
    post_ids: &[&str],
) -> rusqlite::Result<HashMap<String, Vec<String>>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(post_ids.iter()), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        let (post_id, value) = row?;
        grouped.entry(post_id).or_default().push(value);
    }
    Ok(grouped)
}

fn attach(conn: &Connection, posts: Vec<Post>) -> rusqlite::Result<Vec<FeedItem>> {
    if posts.is_empty() {
        return Ok(Vec::new());
    }

    let post_ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
    let marks = placeholders(post_ids.len());

    let mut likes = group_by_post(
        conn,
        &format!(
            "SELECT post_id, user_id FROM likes WHERE post_id IN ({marks}) ORDER BY created_at"
        ),
        &post_ids,
    )?;
    let mut comments = group_by_post(
        conn,
        &format!(
            "SELECT post_id, id FROM comments WHERE post_id IN ({marks}) ORDER BY created_at, id"
        ),
        &post_ids,
    )?;
    let authors = resolve_authors(conn, posts.iter().map(|p| p.user_id.as_str()))?;

    Ok(posts
        .into_iter()
        .map(|post| FeedItem {
            author: author_or_placeholder(&authors, &post.user_id),
            like_user_ids: likes.remove(&post.id).unwrap_or_default(),
            comment_ids: comments.remove(&post.id).unwrap_or_default(),
            post,
        })
        .collect())
}
