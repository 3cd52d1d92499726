use askama::Template;
use axum::extract::{Multipart, Path, State};
use axum::response::{IntoResponse, Redirect, Response};

use crate::db::models::Profile;
use crate::error::{AppError, AppResult};
use crate::extractors::RequireUser;
use crate::media::ImageUpload;
use crate::profiles::{ProfileChanges, ProfileSource};
use crate::routes::home::Html;
use crate::routes::views::{parse_and_format_time, PostCard};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub viewer_id: String,
    pub return_to: String,
    pub profile: Profile,
    pub initial: String,
    pub joined: String,
    pub from_shadow: bool,
    pub is_own: bool,
    pub posts: Vec<PostCard>,
    pub error: Option<String>,
}

async fn render_profile(
    state: &AppState,
    viewer_id: &str,
    profile_id: &str,
    error: Option<String>,
) -> AppResult<ProfileTemplate> {
    let view = state
        .profiles
        .view(profile_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let posts = {
        let conn = state.db.get()?;
        crate::feed::load_user_posts(&conn, profile_id)?
            .into_iter()
            .map(|item| PostCard::new(item, viewer_id))
            .collect()
    };

    let initial = view
        .profile
        .username
        .chars()
        .next()
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_default();

    Ok(ProfileTemplate {
        viewer_id: viewer_id.to_string(),
        return_to: format!("/profile/{}", profile_id),
        initial,
        joined: parse_and_format_time(&view.profile.created_at),
        from_shadow: view.source == ProfileSource::Shadow,
        is_own: viewer_id == profile_id,
        profile: view.profile,
        posts,
        error,
    })
}

/// GET /profile/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(profile_id): Path<String>,
) -> AppResult<Html<ProfileTemplate>> {
    Ok(Html(render_profile(&state, &user.id, &profile_id, None).await?))
}

/// Text fields become changes; a chosen avatar file wins over the avatar URL field.
pub async fn read_profile_form(
    mut multipart: Multipart,
    max_avatar_bytes: usize,
) -> AppResult<ProfileChanges> {
    let mut changes = ProfileChanges::default();
    let mut avatar: Option<ImageUpload> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "username" => changes.username = Some(field.text().await?),
            "full_name" => changes.full_name = Some(field.text().await?),
            "bio" => changes.bio = Some(field.text().await?),
            "avatar_url" => changes.avatar_url = Some(field.text().await?),
            "avatar" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                avatar = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    if let Some(upload) = avatar.filter(|a| !a.is_empty()) {
        let url = upload
            .to_data_url(max_avatar_bytes)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        changes.avatar_url = Some(url);
    }
    Ok(changes)
}

/// POST /profile: edit the caller's own profile
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let result = match read_profile_form(multipart, state.config.media.max_avatar_bytes).await {
        Ok(changes) => state.profiles.update(&user.id, &changes).await.map(|_| ()),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => Ok(Redirect::to(&format!("/profile/{}", user.id)).into_response()),
        Err(e @ (AppError::BadRequest(_) | AppError::Conflict(_))) => {
            let status = e.status();
            let page = render_profile(&state, &user.id, &user.id, Some(e.public_message())).await?;
            Ok((status, Html(page)).into_response())
        }
        Err(e) => Err(e),
    }
}
