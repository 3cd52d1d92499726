use askama::Template;
use axum::extract::State;

use crate::diagnostics::{self, Diagnostics};
use crate::error::AppResult;
use crate::extractors::RequireUser;
use crate::profiles::ShadowStore;
use crate::routes::home::Html;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/debug.html")]
pub struct DebugTemplate {
    pub viewer_id: String,
    pub email: String,
    pub shadow_key: String,
    pub diagnostics: Diagnostics,
    pub profile_json: String,
    pub shadow_json: String,
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {}>", e))
}

/// GET /debug: profile bootstrap diagnostics for the caller
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> AppResult<Html<DebugTemplate>> {
    let diagnostics = diagnostics::collect(&state, &user.id).await?;
    Ok(Html(DebugTemplate {
        viewer_id: user.id.clone(),
        shadow_key: ShadowStore::key(&user.id),
        profile_json: pretty(&diagnostics.profile),
        shadow_json: pretty(&diagnostics.shadow_records),
        email: user.email,
        diagnostics,
    }))
}
