//! Display structs shared by the page templates.

use chrono::{NaiveDateTime, Utc};

use crate::comments::ThreadComment;
use crate::db::models::Author;
use crate::feed::FeedItem;
use crate::likes::LikeState;

pub struct AuthorView {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub initial: String,
}

impl From<Author> for AuthorView {
    fn from(author: Author) -> Self {
        let initial = author
            .username
            .chars()
            .next()
            .map(|c| c.to_uppercase().to_string())
            .unwrap_or_else(|| "?".to_string());
        Self {
            id: author.id,
            username: author.username,
            avatar_url: author.avatar_url,
            initial,
        }
    }
}

pub struct PostCard {
    pub id: String,
    pub author: AuthorView,
    pub content: String,
    pub media_url: Option<String>,
    pub created_at: String,
    pub like_count: i64,
    pub liked: bool,
    pub comment_count: i64,
    pub can_delete: bool,
}

impl PostCard {
    pub fn new(item: FeedItem, viewer_id: &str) -> Self {
        let like = LikeState::seed(&item, viewer_id);
        Self {
            comment_count: item.comment_count(),
            can_delete: item.post.user_id == viewer_id,
            id: item.post.id,
            author: item.author.into(),
            content: item.post.content,
            media_url: item.post.media_url,
            created_at: parse_and_format_time(&item.post.created_at),
            like_count: like.count,
            liked: like.liked,
        }
    }
}

pub struct CommentView {
    pub id: String,
    pub author: AuthorView,
    pub content: String,
    pub created_at: String,
    pub can_delete: bool,
}

impl CommentView {
    pub fn new(tc: ThreadComment, viewer_id: &str) -> Self {
        Self {
            can_delete: tc.comment.user_id == viewer_id,
            id: tc.comment.id,
            author: tc.author.into(),
            content: tc.comment.content,
            created_at: parse_and_format_time(&tc.comment.created_at),
        }
    }
}

/// Accepts both second and millisecond precision timestamps.
pub fn parse_and_format_time(db_time: &str) -> String {
    NaiveDateTime::parse_from_str(db_time, "%Y-%m-%d %H:%M:%S%.f")
        .map(|dt| format_relative_time(&dt))
        .unwrap_or_else(|_| db_time.to_string())
}

pub fn format_relative_time(dt: &NaiveDateTime) -> String {
    let diff = Utc::now().naive_utc().signed_duration_since(*dt);

    if diff.num_seconds() < 60 {
        return "just now".to_string();
    }
    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }
    dt.format("%b %-d, %Y").to_string()
}
