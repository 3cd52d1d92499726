use askama::Template;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::extractors::RequireUser;
use crate::realtime::{ChangeEvent, ChangeKind};
use crate::routes::home::{safe_redirect, Html, RedirectForm};
use crate::routes::views::{CommentView, PostCard};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/post.html")]
pub struct PostTemplate {
    pub viewer_id: String,
    pub return_to: String,
    pub post: PostCard,
    pub comments: Vec<CommentView>,
    pub draft: String,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct CommentForm {
    pub content: String,
}

fn render_post(
    state: &AppState,
    viewer_id: &str,
    post_id: &str,
    draft: String,
    error: Option<String>,
) -> AppResult<PostTemplate> {
    let conn = state.db.get()?;
    let item = crate::feed::load_post(&conn, post_id)?.ok_or(AppError::NotFound)?;
    let comments = crate::comments::list(&conn, post_id)?
        .into_iter()
        .map(|c| CommentView::new(c, viewer_id))
        .collect();

    Ok(PostTemplate {
        viewer_id: viewer_id.to_string(),
        return_to: format!("/post/{}", post_id),
        post: PostCard::new(item, viewer_id),
        comments,
        draft,
        error,
    })
}

/// GET /post/{id}: a post with its comment thread
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<String>,
) -> AppResult<Html<PostTemplate>> {
    Ok(Html(render_post(&state, &user.id, &post_id, String::new(), None)?))
}

/// POST /post/{id}/comments
pub async fn add_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let result = {
        let conn = state.db.get()?;
        crate::comments::add(&conn, &post_id, &user.id, &form.content)
    };

    match result {
        Ok(comment) => {
            state.changes.publish(ChangeEvent::comment(
                ChangeKind::Insert,
                &comment.id,
                &post_id,
            ));
            Ok(Redirect::to(&format!("/post/{}", post_id)).into_response())
        }
        Err(AppError::BadRequest(msg)) => {
            let page = render_post(&state, &user.id, &post_id, form.content, Some(msg))?;
            Ok((StatusCode::BAD_REQUEST, Html(page)).into_response())
        }
        Err(e) => Err(e),
    }
}

/// POST /comments/{id}/delete: only the author's own comment is removed
pub async fn delete_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(comment_id): Path<String>,
    Form(form): Form<RedirectForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let removed = crate::comments::delete(&conn, &comment_id, &user.id)?;

    let target = match removed {
        Some(post_id) => {
            state.changes.publish(ChangeEvent::comment(
                ChangeKind::Delete,
                &comment_id,
                &post_id,
            ));
            form.redirect.unwrap_or_else(|| format!("/post/{}", post_id))
        }
        None => {
            tracing::debug!(
                "Comment {} not deleted: missing or not owned by {}",
                comment_id,
                user.id
            );
            form.redirect.unwrap_or_else(|| "/".to_string())
        }
    };
    Ok(Redirect::to(safe_redirect(Some(&target))).into_response())
}
