use askama::Template;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::composer::{self, ComposeError, PostDraft};
use crate::error::{AppError, AppResult};
use crate::extractors::RequireUser;
use crate::likes::LikeState;
use crate::media::ImageUpload;
use crate::posts::DeleteOutcome;
use crate::realtime::{ChangeEvent, ChangeKind};
use crate::routes::views::PostCard;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub viewer_id: String,
    pub return_to: String,
    pub posts: Vec<PostCard>,
    pub draft: String,
    pub error: Option<String>,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

#[derive(Deserialize)]
pub struct RedirectForm {
    pub redirect: Option<String>,
}

/// Only same-site paths; anything else goes back to the feed.
pub fn safe_redirect(target: Option<&str>) -> &str {
    match target {
        Some(t) if t.starts_with('/') && !t.starts_with("//") && !t.contains('\\') => t,
        _ => "/",
    }
}

fn render_feed(
    state: &AppState,
    viewer_id: &str,
    draft: String,
    error: Option<String>,
) -> AppResult<HomeTemplate> {
    let conn = state.db.get()?;
    let posts = crate::feed::load_feed(&conn)?
        .into_iter()
        .map(|item| PostCard::new(item, viewer_id))
        .collect();
    Ok(HomeTemplate {
        viewer_id: viewer_id.to_string(),
        return_to: "/".to_string(),
        posts,
        draft,
        error,
    })
}

/// GET /: composer and feed
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> AppResult<Html<HomeTemplate>> {
    Ok(Html(render_feed(&state, &user.id, String::new(), None)?))
}

pub async fn read_post_draft(mut multipart: Multipart) -> AppResult<PostDraft> {
    let mut draft = PostDraft::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "content" => draft.content = field.text().await?,
            "image" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                draft.image = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }
    Ok(draft)
}

/// POST /posts: submit the composer
pub async fn create_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let draft = read_post_draft(multipart).await?;
    let content = draft.content.clone();

    match composer::submit(&state, &user.id, &user.email, draft).await {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(e) => {
            let status = match e {
                ComposeError::Failed => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            };
            let page = render_feed(&state, &user.id, content, Some(e.to_string()))?;
            Ok((status, Html(page)).into_response())
        }
    }
}

/// POST /posts/{id}/delete
pub async fn delete_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<String>,
    Form(form): Form<RedirectForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    match crate::posts::delete_post(&conn, &post_id, &user.id)? {
        DeleteOutcome::Deleted => {
            tracing::info!("User {} deleted post {}", user.id, post_id);
            state
                .changes
                .publish(ChangeEvent::post(ChangeKind::Delete, &post_id));
            let own_page = format!("/post/{}", post_id);
            let target = match safe_redirect(form.redirect.as_deref()) {
                t if t == own_page => "/",
                t => t,
            };
            Ok(Redirect::to(target).into_response())
        }
        DeleteOutcome::NotFound => Err(AppError::NotFound),
        DeleteOutcome::NotOwner => Err(AppError::Forbidden),
    }
}

/// POST /posts/{id}/like: toggle the caller's like
pub async fn toggle_like(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<String>,
    Form(form): Form<RedirectForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let item = crate::feed::load_post(&conn, &post_id)?.ok_or(AppError::NotFound)?;

    let mut like = LikeState::seed(&item, &user.id);
    let kind = like.toggle(&conn, &post_id, &user.id)?;
    state
        .changes
        .publish(ChangeEvent::like(kind, &user.id, &post_id));

    Ok(Redirect::to(safe_redirect(form.redirect.as_deref())).into_response())
}
