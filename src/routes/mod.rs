pub mod assets;
pub mod auth;
pub mod debug;
pub mod graphql;
pub mod home;
pub mod post;
pub mod profile;
pub mod realtime;
pub mod views;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Multipart overhead allowed on top of the largest accepted image.
const UPLOAD_SLACK_BYTES: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    // Oversized images still reach the composer so it can report them
    let body_limit = state.config.media.max_image_bytes * 2 + UPLOAD_SLACK_BYTES;

    Router::new()
        .route("/", get(home::index))
        .route("/posts", post(home::create_post))
        .route("/posts/{id}/delete", post(home::delete_post))
        .route("/posts/{id}/like", post(home::toggle_like))
        .route("/post/{id}", get(post::show))
        .route("/post/{id}/comments", post(post::add_comment))
        .route("/comments/{id}/delete", post(post::delete_comment))
        .route("/profile", post(profile::update))
        .route("/profile/{id}", get(profile::show))
        .route("/debug", get(debug::index))
        .route("/assets/{*path}", get(assets::serve))
        .merge(auth::router())
        .merge(graphql::router())
        .merge(realtime::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
